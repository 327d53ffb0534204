//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProbeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<ProbeConfig, ConfigError> {
    let config: ProbeConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Read a TOML file without semantic checks. Callers that layer overrides
/// on top validate the merged result themselves.
pub fn read_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ProbeConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    tracing::debug!(path = %path.display(), host = %config.endpoint.host, "Configuration read");
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/tls-probe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = parse_config("[endpoint\nhost = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn semantic_errors_are_collected() {
        let err = parse_config("[endpoint]\nport = 0\n[security]\nverify_server = false\n")
            .unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(err_string(&errors).contains("endpoint.port"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_file_loads() {
        let dir = std::env::temp_dir().join(format!("tls-probe-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("probe.toml");
        fs::write(
            &path,
            "[endpoint]\nhost = \"127.0.0.1\"\n[credentials]\nroot_ca = \"ca.crt\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.endpoint.host, "127.0.0.1");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn read_config_skips_semantic_checks() {
        let dir = std::env::temp_dir().join(format!("tls-probe-read-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("probe.toml");
        fs::write(&path, "[endpoint]\nport = 0\n").unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.endpoint.port, 0);
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    fn err_string(errors: &[ValidationError]) -> String {
        ConfigError::Validation(errors.to_vec()).to_string()
    }
}
