//! Metrics agent
//!
//! Runs the pipeline standalone and reports a few agent-level metrics every
//! second until Ctrl+C, then flushes and exits.
//!
//! ## Environment Variables
//!
//! | Variable          | Default         | Description                  |
//! |-------------------|-----------------|------------------------------|
//! | DD_API_KEY        | (required)      | API key                      |
//! | DD_SITE           | datadoghq.com   | Intake site                  |
//! | DD_HOSTNAME       | $HOSTNAME       | Reported host                |
//! | DD_TAGS           |                 | Default tags                 |
//! | DD_METRICS_CONFIG |                 | Optional TOML config file    |
//! | LOG_FORMAT        | text            | `json` for structured logs   |

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::time::{Duration, Instant};

use datadog_metrics::observability::{init_tracing, LogFormat};
use datadog_metrics::{MetricsConfig, MetricsLogger, MetricsPipeline};
use tracing::{error, info};

fn load_config() -> Result<MetricsConfig, datadog_metrics::ConfigError> {
    let mut config = match std::env::var("DD_METRICS_CONFIG") {
        Ok(path) if !path.trim().is_empty() => MetricsConfig::from_file(path.trim())?,
        _ => MetricsConfig::default(),
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

fn report_agent_metrics(logger: &MetricsLogger, started: Instant, tick_lag: Duration) {
    let tags = ["component:agent"];
    logger.gauge("agent.uptime_seconds", started.elapsed().as_secs_f64(), &tags);
    logger.increment("agent.heartbeat", &tags);
    logger.histogram("agent.tick_lag_ms", tick_lag.as_secs_f64() * 1000.0, &tags);
    logger.distribution("agent.tick_lag_ms.dist", tick_lag.as_secs_f64() * 1000.0, &tags);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(LogFormat::from_env());

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid metrics configuration");
            return Err(e.into());
        }
    };
    if !datadog_metrics::config::sites::is_known(&config.site) {
        info!(site = %config.site, "using a site outside the known intake list");
    }

    let pipeline = MetricsPipeline::start(&config)?;
    info!(
        site = %config.site,
        host = %config.resolved_host(),
        flush_interval_secs = config.flush_interval_secs,
        "metrics agent running, press Ctrl+C to stop"
    );

    let started = Instant::now();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            scheduled = tick.tick() => {
                let lag = tokio::time::Instant::now().saturating_duration_since(scheduled);
                report_agent_metrics(&pipeline.logger, started, lag);
            }
        }
    }

    info!("shutting down metrics agent");
    pipeline.shutdown().await;
    Ok(())
}
