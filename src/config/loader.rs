//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{Environment, GateConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: TOML file when given (defaults otherwise), then
/// process environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GateConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GateConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<GateConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `SERVER_PORT`, `REDIS_URI` and `NODE_ENV` on top of file values.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("SERVER_PORT") {
        let port: u16 = port.trim().parse().map_err(|_| ConfigError::Env {
            var: "SERVER_PORT",
            message: format!("not a port number: {port}"),
        })?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(uri) = lookup("REDIS_URI") {
        config.store.url = uri;
    }

    if let Some(env) = lookup("NODE_ENV") {
        config.environment = Environment::from_env_value(&env);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GateConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("SERVER_PORT", "8088"),
                ("REDIS_URI", "redis://cache:6380"),
                ("NODE_ENV", "production"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:8088");
        assert_eq!(config.store.url, "redis://cache:6380");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let mut config = GateConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("SERVER_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "SERVER_PORT", .. }));
    }

    #[test]
    fn test_no_env_leaves_config_untouched() {
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, env(&[])).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:5000");
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(parse_config("global_limit = 3"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file_validates() {
        let path = std::env::temp_dir().join(format!("request-gate-{}.toml", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "[sensitive_limit]\nmax = 0").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        fs::remove_file(&path).unwrap();

        match err {
            ConfigError::Validation(errors) => {
                assert!(errors.iter().any(|e| e.field == "sensitive_limit.max"))
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let config = parse_config(include_str!("../../config/gate.example.toml")).unwrap();
        assert!(validate_config(&config).is_ok());

        let defaults = GateConfig::default();
        assert_eq!(config.listener.bind_address, defaults.listener.bind_address);
        assert_eq!(config.global_limit.points, defaults.global_limit.points);
        assert_eq!(config.sensitive_limit.window_ms, defaults.sensitive_limit.window_ms);
        assert_eq!(config.security.max_body_size, defaults.security.max_body_size);
    }
}
