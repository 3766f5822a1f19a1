use email_store::config::{Config as StoreConfig, ValidationError};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

pub const PORT_VAR: &str = "PORT";
pub const SPREADSHEET_ID_VAR: &str = "SPREADSHEET_ID";

#[derive(Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}

#[derive(Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    pub sentry_dsn: String,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
pub struct Config {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
    #[serde(flatten)]
    pub store: StoreConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Reads the optional config file, applies environment overrides and validates.
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        let config = config.with_env_overrides(lookup)?;
        config.store.validate()?;
        Ok(config)
    }

    fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = non_empty(PORT_VAR) {
            self.store.listener.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: PORT_VAR,
                value: port.clone(),
            })?;
        }

        if let Some(spreadsheet_id) = non_empty(SPREADSHEET_ID_VAR) {
            self.store.remote.spreadsheet_id = spreadsheet_id.trim().to_string();
        }

        Ok(self)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
            listener:
                host: 127.0.0.1
                port: 8080
            remote:
                spreadsheet_id: sheet-from-file
                range: "Signups!A:B"
            local:
                path: /var/lib/intake/emails.xlsx
            static_dir: public
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            logging:
                sentry_dsn: https://key@sentry.example.com/1
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::load(Some(tmp.path()), env(&[])).expect("load config");

        assert_eq!(config.store.listener.port, 8080);
        assert_eq!(config.store.remote.spreadsheet_id, "sheet-from-file");
        assert_eq!(config.store.remote.range, "Signups!A:B");
        assert_eq!(
            config.store.remote.api_url.as_str(),
            "https://sheets.googleapis.com/"
        );
        assert_eq!(
            config.store.local.path,
            PathBuf::from("/var/lib/intake/emails.xlsx")
        );
        assert_eq!(config.store.static_dir, Some(PathBuf::from("public")));
        assert_eq!(
            config.metrics,
            Some(MetricsConfig {
                statsd_host: "127.0.0.1".into(),
                statsd_port: 8125
            })
        );
        assert!(config.logging.is_some());
    }

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load(None, env(&[])).expect("load config");
        assert_eq!(config, Config::default());
        assert_eq!(config.store.listener.host, "0.0.0.0");
        assert_eq!(config.store.listener.port, 3000);
        assert_eq!(config.store.remote.spreadsheet_id, "");
    }

    #[test]
    fn test_env_overrides() {
        let tmp = write_tmp_file(
            r#"
            listener: {host: 0.0.0.0, port: 8080}
            remote: {spreadsheet_id: sheet-from-file}
            "#,
        );
        let lookup = env(&[(PORT_VAR, "9000"), (SPREADSHEET_ID_VAR, "  sheet-from-env\n")]);
        let config = Config::load(Some(tmp.path()), lookup).expect("load config");
        assert_eq!(config.store.listener.port, 9000);
        assert_eq!(config.store.remote.spreadsheet_id, "sheet-from-env");

        // Blank values leave the file settings alone.
        let lookup = env(&[(PORT_VAR, ""), (SPREADSHEET_ID_VAR, " ")]);
        let config = Config::load(Some(tmp.path()), lookup).expect("load config");
        assert_eq!(config.store.listener.port, 8080);
        assert_eq!(config.store.remote.spreadsheet_id, "sheet-from-file");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Config::load(None, env(&[(PORT_VAR, "http")])),
            Err(ConfigError::InvalidEnv { name: PORT_VAR, .. })
        ));
        assert!(matches!(
            Config::load(None, env(&[(PORT_VAR, "0")])),
            Err(ConfigError::Invalid(ValidationError::InvalidPort))
        ));
        assert!(matches!(
            Config::load(Some(Path::new("/nonexistent/intake.yaml")), env(&[])),
            Err(ConfigError::LoadError(_))
        ));

        let tmp = write_tmp_file("listener: {host: 0.0.0.0, port: not_a_number}");
        assert!(matches!(
            Config::load(Some(tmp.path()), env(&[])),
            Err(ConfigError::ParseError(_))
        ));

        let tmp = write_tmp_file("remote: {api_url: not-a-url}");
        assert!(matches!(
            Config::load(Some(tmp.path()), env(&[])),
            Err(ConfigError::ParseError(_))
        ));
    }
}
