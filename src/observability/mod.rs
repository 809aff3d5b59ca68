//! Logging setup
//!
//! ## Environment Variables
//!
//! | Variable   | Default | Description                      |
//! |------------|---------|----------------------------------|
//! | RUST_LOG   | info    | `tracing_subscriber` env filter  |
//! | LOG_FORMAT | text    | `json` for one JSON object/line  |

use tracing_subscriber::EnvFilter;

/// Output format of the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; anything but `json` is text
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global fmt subscriber
///
/// Returns quietly if a subscriber is already installed, so tests and
/// embedding applications can call it more than once.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
