//! Instrumentation bridge
//!
//! Adapter for measurement callbacks from an instrumentation library.
//! Each observed measurement becomes one `MetricsLogger::record` call:
//!
//! | Instrument                         | Recorded as |
//! |------------------------------------|-------------|
//! | Counter, ObservableCounter         | Counter     |
//! | Histogram                          | Histogram   |
//! | ObservableGauge                    | Gauge       |
//! | UpDownCounter, ObservableUpDown... | Gauge       |
//!
//! Up-down counters report a running value, so they map to gauges rather
//! than to summed counters.

use serde::{Deserialize, Serialize};

use crate::logger::MetricsLogger;
use crate::metrics::MetricKind;

/// Instrument type reported by the instrumentation library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Counter,
    ObservableCounter,
    Histogram,
    ObservableGauge,
    UpDownCounter,
    ObservableUpDownCounter,
}

impl InstrumentKind {
    pub fn metric_kind(self) -> MetricKind {
        match self {
            InstrumentKind::Counter | InstrumentKind::ObservableCounter => MetricKind::Counter,
            InstrumentKind::Histogram => MetricKind::Histogram,
            InstrumentKind::ObservableGauge
            | InstrumentKind::UpDownCounter
            | InstrumentKind::ObservableUpDownCounter => MetricKind::Gauge,
        }
    }
}

/// Forwards instrument measurements into a [`MetricsLogger`]
#[derive(Debug, Clone)]
pub struct InstrumentBridge {
    logger: MetricsLogger,
}

impl InstrumentBridge {
    pub fn new(logger: MetricsLogger) -> Self {
        InstrumentBridge { logger }
    }

    /// Record one measurement; attributes become `key:value` tags
    pub fn on_measurement<K, V>(
        &self,
        instrument: InstrumentKind,
        name: &str,
        value: f64,
        attributes: &[(K, V)],
    ) where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let tags = attribute_tags(attributes);
        self.logger
            .record(instrument.metric_kind(), name, value, &tags, None);
    }
}

/// Format attributes as `key:value` tags, preserving order
pub fn attribute_tags<K, V>(attributes: &[(K, V)]) -> Vec<String>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    attributes
        .iter()
        .map(|(k, v)| format!("{}:{}", k.as_ref(), v.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{AggregationBuffer, SeriesType};
    use std::sync::Arc;

    fn bridge() -> (InstrumentBridge, MetricsLogger) {
        let logger = MetricsLogger::new(Arc::new(AggregationBuffer::default()));
        (InstrumentBridge::new(logger.clone()), logger)
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(InstrumentKind::ObservableCounter.metric_kind(), MetricKind::Counter);
        assert_eq!(InstrumentKind::Histogram.metric_kind(), MetricKind::Histogram);
        assert_eq!(InstrumentKind::UpDownCounter.metric_kind(), MetricKind::Gauge);
        assert_eq!(InstrumentKind::ObservableGauge.metric_kind(), MetricKind::Gauge);
    }

    #[test]
    fn test_attributes_become_tags() {
        let (bridge, logger) = bridge();
        bridge.on_measurement(
            InstrumentKind::Counter,
            "http.server.requests",
            1.0,
            &[("method", "GET"), ("status", "200")],
        );
        bridge.on_measurement(
            InstrumentKind::Counter,
            "http.server.requests",
            1.0,
            &[("status", "200"), ("method", "GET")],
        );

        let series = logger.flush();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].series_type, SeriesType::Count);
        assert_eq!(series[0].scalar_value(), Some(2.0));
        assert_eq!(series[0].tags, vec!["method:GET", "status:200"]);
    }

    #[test]
    fn test_up_down_counter_keeps_latest() {
        let (bridge, logger) = bridge();
        let no_attributes: &[(&str, &str)] = &[];
        bridge.on_measurement(InstrumentKind::UpDownCounter, "connections", 5.0, no_attributes);
        bridge.on_measurement(InstrumentKind::UpDownCounter, "connections", 3.0, no_attributes);

        let series = logger.flush();
        assert_eq!(series[0].series_type, SeriesType::Gauge);
        assert_eq!(series[0].scalar_value(), Some(3.0));
    }
}
