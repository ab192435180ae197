//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the filter from `RUST_LOG`, else `CORE_LOG_LEVEL`
//! - Pick pretty or JSON output from `CORE_LOG_FORMAT`
//!
//! # Design Decisions
//! - Runs before configuration is loaded so configuration errors can be logged
//! - Lenient: unknown values fall back to defaults with a warning; the strict
//!   check of the same keys belongs to `CoreConfig::from_env`

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::loader::{LOG_FORMAT, LOG_LEVEL};
use crate::config::validation::LOG_LEVELS;
use crate::config::{Environment, LogFormat};

const DEFAULT_LEVEL: &str = "info";

/// Resolved logging settings plus anything that had to be ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directives: String,
    pub format: LogFormat,
    pub warnings: Vec<String>,
}

/// Work out filter directives and output format from the environment.
pub fn resolve(env: &Environment) -> LogSettings {
    let mut warnings = Vec::new();

    let format = match env.get(LOG_FORMAT).map(str::parse::<LogFormat>) {
        Some(Ok(format)) => format,
        Some(Err(e)) => {
            warnings.push(format!("{}: {}; using pretty", LOG_FORMAT, e));
            LogFormat::Pretty
        }
        None => LogFormat::Pretty,
    };

    let directives = match env.get("RUST_LOG") {
        Some(custom) if EnvFilter::try_new(custom).is_ok() => custom.to_string(),
        other => {
            if let Some(custom) = other {
                warnings.push(format!("ignoring unparsable RUST_LOG `{}`", custom));
            }
            let level = env
                .get(LOG_LEVEL)
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
            let level = if LOG_LEVELS.contains(&level.as_str()) {
                level
            } else {
                warnings.push(format!(
                    "{}: unknown level `{}`; using {}",
                    LOG_LEVEL, level, DEFAULT_LEVEL
                ));
                DEFAULT_LEVEL.to_string()
            };
            default_directives(&level)
        }
    };

    LogSettings {
        directives,
        format,
        warnings,
    }
}

/// Directives for our own crate and the HTTP middleware at `level`.
pub fn default_directives(level: &str) -> String {
    format!("warn,core_service={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed (e.g. in tests).
pub fn init(env: &Environment) -> bool {
    let settings = resolve(env);
    let filter = EnvFilter::try_new(&settings.directives)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(DEFAULT_LEVEL)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init().is_ok(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init().is_ok(),
    };

    for warning in &settings.warnings {
        tracing::warn!("{}", warning);
    }

    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info_pretty() {
        let settings = resolve(&Environment::default());
        assert_eq!(settings.directives, default_directives("info"));
        assert_eq!(settings.format, LogFormat::Pretty);
        assert!(settings.warnings.is_empty());
    }

    #[test]
    fn rust_log_wins_over_level() {
        let env = Environment::from_pairs([("RUST_LOG", "trace"), (LOG_LEVEL, "error")]);
        assert_eq!(resolve(&env).directives, "trace");
    }

    #[test]
    fn bad_values_fall_back_with_warnings() {
        let env = Environment::from_pairs([(LOG_LEVEL, "chatty"), (LOG_FORMAT, "xml")]);
        let settings = resolve(&env);
        assert_eq!(settings.directives, default_directives("info"));
        assert_eq!(settings.format, LogFormat::Pretty);
        assert_eq!(settings.warnings.len(), 2);
    }

    #[test]
    fn json_format_and_level() {
        let env = Environment::from_pairs([(LOG_LEVEL, "DEBUG"), (LOG_FORMAT, "json")]);
        let settings = resolve(&env);
        assert_eq!(settings.directives, default_directives("debug"));
        assert_eq!(settings.format, LogFormat::Json);
    }
}
