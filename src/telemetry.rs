//! Log output initialization.
//!
//! Events go to stderr so stdout stays free for reports. The format comes
//! from `FEEDMERGE_LOG_FORMAT` (`pretty` or `json`) when set, otherwise
//! from the `[log]` config section. The filter comes from `RUST_LOG` when
//! set, otherwise from `log.level`, otherwise `info`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::config::{LogConfig, LogFormat};

/// Environment variable overriding the configured log format.
pub const FORMAT_ENV: &str = "FEEDMERGE_LOG_FORMAT";

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &LogConfig) {
    let format = resolve_format(std::env::var(FORMAT_ENV).ok().as_deref(), config.format);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(config.level.as_deref().unwrap_or("info"))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

fn resolve_format(env: Option<&str>, configured: LogFormat) -> LogFormat {
    match env.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
        Some("") | None => configured,
        Some(other) => {
            eprintln!("warning: ignoring unknown {FORMAT_ENV} value '{other}'");
            configured
        }
    }
}
