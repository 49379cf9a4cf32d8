use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("ecogares={},tower_http=info", config.level)))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format.as_str() {
        "compact" => registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .try_init()?,
        _ => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()?,
    }
    Ok(())
}
