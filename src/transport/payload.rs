//! Wire payloads
//!
//! Two JSON shapes, one per endpoint:
//!
//! ```text
//! /api/v2/series
//! {"series":[{"metric":"m","type":0,"points":[{"timestamp":1,"value":2.0}],
//!             "resources":[{"name":"host","type":"host"}],"tags":["a:b"]}]}
//!
//! /api/v1/distribution_points
//! {"series":[{"metric":"m","host":"host","points":[[1,[2.0,3.0]]],
//!             "tags":["a:b"],"type":"distribution"}]}
//! ```
//!
//! Absent optional fields are omitted, never sent as `null`.
//!
//! JSON has no NaN or infinity and `serde_json` writes them as `null`, so
//! non-finite values are dropped here with a warning naming the metric. A
//! partition left with nothing to send is rejected with
//! `SubmitError::Serialization` before any request is made.

use bytes::Bytes;
use serde::Serialize;
use tracing::warn;

use crate::error::SubmitError;
use crate::metrics::{Series, SeriesPoints};

#[derive(Serialize)]
struct Envelope<T> {
    series: Vec<T>,
}

#[derive(Serialize)]
struct ScalarEntry<'a> {
    metric: &'a str,
    #[serde(rename = "type")]
    series_type: u8,
    points: Vec<ScalarPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resources: Option<[Resource<'a>; 1]>,
    tags: &'a [String],
}

#[derive(Serialize)]
struct ScalarPoint {
    timestamp: i64,
    value: f64,
}

#[derive(Serialize)]
struct Resource<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct DistributionEntry<'a> {
    metric: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    points: Vec<(i64, Vec<f64>)>,
    tags: &'a [String],
    #[serde(rename = "type")]
    kind: &'static str,
}

fn host_of(series: &Series) -> Option<&str> {
    Some(series.host.as_str()).filter(|h| !h.is_empty())
}

fn reject_if_all_dropped(offered: usize, kept: usize) -> Result<(), SubmitError> {
    if offered > 0 && kept == 0 {
        return Err(SubmitError::Serialization(format!(
            "all {} series held only non-finite values",
            offered
        )));
    }
    Ok(())
}

/// Encode scalar series for the series endpoint
///
/// Distribution series in the input are skipped. Non-finite points are
/// dropped; a series with no finite point is dropped whole.
pub fn encode_series(series: &[&Series]) -> Result<Bytes, SubmitError> {
    let mut offered = 0;
    let mut entries: Vec<ScalarEntry<'_>> = Vec::with_capacity(series.len());

    for s in series {
        let SeriesPoints::Scalar(points) = &s.points else {
            continue;
        };
        offered += 1;

        let finite: Vec<ScalarPoint> = points
            .iter()
            .filter(|p| p.value.is_finite())
            .map(|p| ScalarPoint {
                timestamp: p.timestamp,
                value: p.value,
            })
            .collect();
        let dropped = points.len() - finite.len();
        if finite.is_empty() {
            warn!(metric = %s.metric, dropped, "dropping series with only non-finite values");
            continue;
        }
        if dropped > 0 {
            warn!(metric = %s.metric, dropped, "dropping non-finite points from series");
        }

        entries.push(ScalarEntry {
            metric: &s.metric,
            series_type: s.series_type.code(),
            points: finite,
            resources: host_of(s).map(|name| [Resource { name, kind: "host" }]),
            tags: &s.tags,
        });
    }

    reject_if_all_dropped(offered, entries.len())?;
    Ok(Bytes::from(serde_json::to_vec(&Envelope { series: entries })?))
}

/// Encode distribution series for the distribution endpoint
///
/// Scalar series in the input are skipped. Non-finite samples are dropped,
/// then empty buckets, then series with no bucket left.
pub fn encode_distributions(series: &[&Series]) -> Result<Bytes, SubmitError> {
    let mut offered = 0;
    let mut entries: Vec<DistributionEntry<'_>> = Vec::with_capacity(series.len());

    for s in series {
        let SeriesPoints::Distribution(points) = &s.points else {
            continue;
        };
        offered += 1;

        let mut dropped = 0;
        let finite: Vec<(i64, Vec<f64>)> = points
            .iter()
            .filter_map(|p| {
                let values: Vec<f64> = p.values.iter().copied().filter(|v| v.is_finite()).collect();
                dropped += p.values.len() - values.len();
                (!values.is_empty()).then_some((p.timestamp, values))
            })
            .collect();
        if finite.is_empty() {
            warn!(metric = %s.metric, dropped, "dropping distribution with only non-finite values");
            continue;
        }
        if dropped > 0 {
            warn!(metric = %s.metric, dropped, "dropping non-finite samples from distribution");
        }

        entries.push(DistributionEntry {
            metric: &s.metric,
            host: host_of(s),
            points: finite,
            tags: &s.tags,
            kind: "distribution",
        });
    }

    reject_if_all_dropped(offered, entries.len())?;
    Ok(Bytes::from(serde_json::to_vec(&Envelope { series: entries })?))
}
