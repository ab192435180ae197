//! Configuration loading from the environment.

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::config::env::{Environment, Lookup};
use crate::config::schema::{
    AdminConfig, CoreConfig, ListenerConfig, ObservabilityConfig, ServiceConfig, TimeoutConfig,
};
use crate::config::validation::{validate_config, ValidationError};

pub const BIND_ADDRESS: &str = "CORE_BIND_ADDRESS";
pub const SERVICE_KIND: &str = "CORE_SERVICE_KIND";
pub const SERVICE_NAME: &str = "CORE_SERVICE_NAME";
pub const MAX_CONNECTIONS: &str = "CORE_MAX_CONNECTIONS";
pub const REQUEST_TIMEOUT_SECS: &str = "CORE_REQUEST_TIMEOUT_SECS";
pub const IDLE_TIMEOUT_SECS: &str = "CORE_IDLE_TIMEOUT_SECS";
pub const SHUTDOWN_TIMEOUT_SECS: &str = "CORE_SHUTDOWN_TIMEOUT_SECS";
pub const LOG_LEVEL: &str = "CORE_LOG_LEVEL";
pub const LOG_FORMAT: &str = "CORE_LOG_FORMAT";
pub const METRICS_ENABLED: &str = "CORE_METRICS_ENABLED";
pub const METRICS_ADDRESS: &str = "CORE_METRICS_ADDRESS";
pub const ADMIN_API_KEY: &str = "CORE_ADMIN_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {key}")]
    Missing { key: &'static str },

    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("environment variable {key} is not valid UTF-8")]
    NotUnicode { key: &'static str },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    /// The environment key this error is about, when there is exactly one.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            ConfigError::Missing { key }
            | ConfigError::Invalid { key, .. }
            | ConfigError::NotUnicode { key } => Some(*key),
            ConfigError::Validation(errors) if errors.len() == 1 => Some(errors[0].field),
            ConfigError::Validation(_) => None,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl CoreConfig {
    /// Parse and validate configuration from an environment snapshot.
    pub fn from_env(env: &Environment) -> Result<Self, ConfigError> {
        let service_defaults = ServiceConfig::default();
        let timeout_defaults = TimeoutConfig::default();
        let observability_defaults = ObservabilityConfig::default();

        let bind_address = required(env, BIND_ADDRESS)?;
        let mut listener = ListenerConfig::new(bind_address);
        listener.max_connections = parsed_or(env, MAX_CONNECTIONS, listener.max_connections)?;

        let config = CoreConfig {
            service: ServiceConfig {
                kind: parsed_or(env, SERVICE_KIND, service_defaults.kind)?,
                name: text_or(env, SERVICE_NAME, service_defaults.name)?,
            },
            listener,
            timeouts: TimeoutConfig {
                request_secs: parsed_or(env, REQUEST_TIMEOUT_SECS, timeout_defaults.request_secs)?,
                idle_secs: parsed_or(env, IDLE_TIMEOUT_SECS, timeout_defaults.idle_secs)?,
                shutdown_secs: parsed_or(env, SHUTDOWN_TIMEOUT_SECS, timeout_defaults.shutdown_secs)?,
            },
            observability: ObservabilityConfig {
                log_level: text_or(env, LOG_LEVEL, observability_defaults.log_level)?
                    .to_ascii_lowercase(),
                log_format: parsed_or(env, LOG_FORMAT, observability_defaults.log_format)?,
                metrics_enabled: flag_or(env, METRICS_ENABLED, observability_defaults.metrics_enabled)?,
                metrics_address: parsed_or(env, METRICS_ADDRESS, observability_defaults.metrics_address)?,
            },
            admin: AdminConfig {
                api_key: optional_text(env, ADMIN_API_KEY)?,
            },
        };

        validate_config(&config).map_err(ConfigError::Validation)?;

        Ok(config)
    }
}

fn optional_text(env: &Environment, key: &'static str) -> Result<Option<String>, ConfigError> {
    match env.lookup(key) {
        Lookup::Present(v) => Ok(Some(v.to_string())),
        Lookup::Absent => Ok(None),
        Lookup::NotUnicode => Err(ConfigError::NotUnicode { key }),
    }
}

fn text_or(env: &Environment, key: &'static str, default: String) -> Result<String, ConfigError> {
    Ok(optional_text(env, key)?.unwrap_or(default))
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn required<T>(env: &Environment, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env.lookup(key) {
        Lookup::Present(raw) => parse_value(key, raw),
        Lookup::Absent => Err(ConfigError::Missing { key }),
        Lookup::NotUnicode => Err(ConfigError::NotUnicode { key }),
    }
}

fn parsed_or<T>(env: &Environment, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env.lookup(key) {
        Lookup::Present(raw) => parse_value(key, raw),
        Lookup::Absent => Ok(default),
        Lookup::NotUnicode => Err(ConfigError::NotUnicode { key }),
    }
}

fn flag_or(env: &Environment, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env.lookup(key) {
        Lookup::Present(raw) => parse_flag(raw).ok_or_else(|| ConfigError::Invalid {
            key,
            value: raw.to_string(),
            reason: "expected true/false, 1/0, yes/no or on/off".to_string(),
        }),
        Lookup::Absent => Ok(default),
        Lookup::NotUnicode => Err(ConfigError::NotUnicode { key }),
    }
}

/// Parse a boolean flag the way shells usually spell them.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogFormat, ServiceKind};

    fn env(pairs: &[(&str, &str)]) -> Environment {
        Environment::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = CoreConfig::from_env(&env(&[(BIND_ADDRESS, "127.0.0.1:7000")])).unwrap();
        assert_eq!(config.listener.bind_address.port(), 7000);
        assert_eq!(config.listener.max_connections, 10_000);
        assert_eq!(config.service.kind, ServiceKind::Http);
        assert_eq!(config.service.name, "core-service");
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(!config.observability.metrics_enabled);
        assert_eq!(config.admin.api_key, None);
    }

    #[test]
    fn full_environment_is_honoured() {
        let config = CoreConfig::from_env(&env(&[
            (BIND_ADDRESS, "0.0.0.0:9000"),
            (SERVICE_KIND, "Echo"),
            (SERVICE_NAME, "edge-echo"),
            (MAX_CONNECTIONS, "64"),
            (REQUEST_TIMEOUT_SECS, "5"),
            (IDLE_TIMEOUT_SECS, "7"),
            (SHUTDOWN_TIMEOUT_SECS, "3"),
            (LOG_LEVEL, "DEBUG"),
            (LOG_FORMAT, "json"),
            (METRICS_ENABLED, "yes"),
            (METRICS_ADDRESS, "127.0.0.1:9100"),
            (ADMIN_API_KEY, "secret"),
        ]))
        .unwrap();

        assert_eq!(config.service.kind, ServiceKind::Echo);
        assert_eq!(config.service.name, "edge-echo");
        assert_eq!(config.listener.max_connections, 64);
        assert_eq!(config.timeouts.request_secs, 5);
        assert_eq!(config.timeouts.idle_secs, 7);
        assert_eq!(config.timeouts.shutdown_secs, 3);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.observability.metrics_enabled);
        assert_eq!(config.observability.metrics_address.port(), 9100);
        assert_eq!(config.admin.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn missing_bind_address_is_reported() {
        let err = CoreConfig::from_env(&env(&[(SERVICE_KIND, "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: BIND_ADDRESS }));

        let err = CoreConfig::from_env(&env(&[(BIND_ADDRESS, "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: BIND_ADDRESS }));
    }

    #[test]
    fn malformed_values_name_their_key() {
        let cases = [
            (BIND_ADDRESS, "localhost"),
            (SERVICE_KIND, "grpc"),
            (MAX_CONNECTIONS, "-1"),
            (REQUEST_TIMEOUT_SECS, "ten"),
            (LOG_FORMAT, "xml"),
            (METRICS_ENABLED, "maybe"),
            (METRICS_ADDRESS, "9090"),
        ];
        for (key, value) in cases {
            let mut pairs = vec![(BIND_ADDRESS, "127.0.0.1:7000")];
            pairs.retain(|(k, _)| *k != key);
            pairs.push((key, value));
            let err = CoreConfig::from_env(&env(&pairs)).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { .. }),
                "{} = {} should be invalid, got {:?}",
                key,
                value,
                err
            );
            assert_eq!(err.key(), Some(key));
        }
    }

    #[test]
    fn non_unicode_value_is_rejected() {
        let environment = env(&[(BIND_ADDRESS, "127.0.0.1:7000")]).with_non_unicode(ADMIN_API_KEY);
        let err = CoreConfig::from_env(&environment).unwrap_err();
        assert!(matches!(err, ConfigError::NotUnicode { key: ADMIN_API_KEY }));
    }

    #[test]
    fn validation_errors_are_collected() {
        let err = CoreConfig::from_env(&env(&[
            (BIND_ADDRESS, "127.0.0.1:7000"),
            (MAX_CONNECTIONS, "0"),
            (IDLE_TIMEOUT_SECS, "0"),
        ]))
        .unwrap_err();
        match &err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(err.key(), None);
        let message = err.to_string();
        assert!(message.contains("CORE_MAX_CONNECTIONS"));
        assert!(message.contains("CORE_IDLE_TIMEOUT_SECS"));
    }

    #[test]
    fn flags_accept_common_spellings() {
        for raw in ["1", "TRUE", "yes", "On"] {
            assert_eq!(parse_flag(raw), Some(true));
        }
        for raw in ["0", "false", "NO", "off"] {
            assert_eq!(parse_flag(raw), Some(false));
        }
        assert_eq!(parse_flag("2"), None);
    }
}
