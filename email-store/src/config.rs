use serde::Deserialize;
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_RANGE: &str = "Email Data!A:B";
pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/";
pub const DEFAULT_LOCAL_PATH: &str = "emails.xlsx";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("port cannot be 0")]
    InvalidPort,

    #[error("remote range cannot be empty")]
    EmptyRange,

    #[error("local store path cannot be empty")]
    EmptyLocalPath,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

/// Where the remote tier appends rows.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct RemoteStore {
    /// Empty means the remote tier is not configured.
    pub spreadsheet_id: String,
    pub range: String,
    pub api_url: Url,
}

impl Default for RemoteStore {
    fn default() -> Self {
        RemoteStore {
            spreadsheet_id: String::new(),
            range: DEFAULT_RANGE.into(),
            api_url: Url::parse(DEFAULT_SHEETS_API_URL).expect("default API URL is valid"),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct LocalStore {
    pub path: PathBuf,
}

impl Default for LocalStore {
    fn default() -> Self {
        LocalStore {
            path: DEFAULT_LOCAL_PATH.into(),
        }
    }
}

#[derive(Clone, Default, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub remote: RemoteStore,
    #[serde(default)]
    pub local: LocalStore,
    /// Directory served for any path not handled by the API, e.g. the sign-up page.
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.listener.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.remote.range.trim().is_empty() {
            return Err(ValidationError::EmptyRange);
        }
        if self.local.path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyLocalPath);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.remote.range, "Email Data!A:B");
        assert_eq!(config.local.path, PathBuf::from("emails.xlsx"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        let mut config = Config::default();
        config.remote.range = " ".into();
        assert_eq!(config.validate(), Err(ValidationError::EmptyRange));

        let mut config = Config::default();
        config.local.path = PathBuf::new();
        assert_eq!(config.validate(), Err(ValidationError::EmptyLocalPath));
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(serde_json::from_str::<RemoteStore>(r#"{"api_url": "not a url"}"#).is_err());
    }
}
