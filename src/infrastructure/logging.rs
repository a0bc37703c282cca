//! Logging bootstrap: EnvFilter assembled from the config, console layer,
//! and an optional non-blocking file layer under `logs/`.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the process lifetime.
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialize the global tracing subscriber. RUST_LOG, when set,
/// overrides the configured level and module filters.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(build_directives(config)))
        .map_err(|e| anyhow!("Invalid log filter: {e}"))?;

    let console_layer = config
        .console_output
        .then(|| fmt::layer().with_target(false));

    let file_layer = if config.file_output {
        let appender = rolling::daily("logs", "mapcoords.log");
        let (writer, guard) = non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        Some(fmt::layer().with_writer(writer).with_ansi(false))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

fn build_directives(config: &LoggingConfig) -> String {
    let mut directives = config.level.clone();
    let mut modules: Vec<_> = config.module_filters.iter().collect();
    modules.sort();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_combine_level_and_module_filters() {
        let mut config = LoggingConfig::default();
        config.level = "debug".to_string();
        config.module_filters.clear();
        config
            .module_filters
            .insert("hyper".to_string(), "warn".to_string());

        assert_eq!(build_directives(&config), "debug,hyper=warn");
    }

    #[test]
    fn directives_are_deterministic() {
        let config = LoggingConfig::default();
        assert_eq!(build_directives(&config), build_directives(&config));
    }
}
