use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::fmt;

/// Raw form payload. `email` is kept as untyped JSON so that missing and
/// non-string values reach validation instead of failing deserialization.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub email: Option<serde_json::Value>,
}

impl Submission {
    pub fn new<E: Into<String>>(email: E) -> Self {
        Submission {
            email: Some(serde_json::Value::String(email.into())),
        }
    }
}

/// An email that passed validation: non-empty text containing `@`.
#[derive(Clone, Debug, PartialEq)]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(value: Option<&serde_json::Value>) -> Option<Self> {
        match value {
            Some(serde_json::Value::String(s)) if !s.is_empty() && s.contains('@') => {
                Some(EmailAddress(s.clone()))
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted row.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub email: String,
    pub timestamp: String,
}

impl Record {
    pub fn new<E, T>(email: E, timestamp: T) -> Self
    where
        E: Into<String>,
        T: Into<String>,
    {
        Record {
            email: email.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Stamps the address with the current time, e.g. `2024-05-01T12:00:00.000Z`.
    pub fn now(email: &EmailAddress) -> Self {
        Record::at(email, Utc::now())
    }

    pub fn at(email: &EmailAddress, time: DateTime<Utc>) -> Self {
        Record {
            email: email.as_str().to_string(),
            timestamp: time.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// The store that received a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Remote,
    Local,
}

impl Tier {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Tier::Remote => "remote",
            Tier::Local => "local",
        }
    }
}
