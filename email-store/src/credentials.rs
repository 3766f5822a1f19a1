//! Loads the service-account key that authorizes the remote tier.
//!
//! The base64 form takes priority over the raw JSON form. A value that is
//! present but unusable disables the remote tier rather than failing startup.
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde_json::{Map, Value};
use std::fmt;

pub const CREDENTIALS_BASE64_VAR: &str = "GOOGLE_CREDENTIALS_BASE64";
pub const CREDENTIALS_VAR: &str = "GOOGLE_CREDENTIALS";

// Accepts padded and unpadded input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credentials must be a JSON object")]
    NotAnObject,
}

/// Opaque service-account key.
#[derive(Clone, PartialEq)]
pub struct Credential {
    key: Map<String, Value>,
}

impl Credential {
    pub fn from_json(json: &[u8]) -> Result<Self, CredentialError> {
        match serde_json::from_slice(json)? {
            Value::Object(key) => Ok(Credential { key }),
            _ => Err(CredentialError::NotAnObject),
        }
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let compact: String = encoded
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let decoded = LENIENT_BASE64.decode(compact)?;
        Credential::from_json(&decoded)
    }

    /// Resolves the credential from configuration variables.
    ///
    /// `lookup` returns the value of a variable, normally `std::env::var`.
    /// Empty values count as unset. Returns `None` when neither variable is
    /// set or the one that is set cannot be parsed.
    pub fn from_env<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(encoded) = non_empty(CREDENTIALS_BASE64_VAR) {
            return Credential::from_base64(&encoded)
                .inspect_err(|err| {
                    tracing::error!(error = %err, "Failed to parse {CREDENTIALS_BASE64_VAR}");
                })
                .ok();
        }

        if let Some(raw) = non_empty(CREDENTIALS_VAR) {
            return Credential::from_json(raw.as_bytes())
                .inspect_err(|err| {
                    tracing::error!(error = %err, "Failed to parse {CREDENTIALS_VAR} (raw)");
                })
                .ok();
        }

        None
    }

    /// Service account identity, if the key carries one.
    pub fn client_email(&self) -> Option<&str> {
        self.key.get("client_email").and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.key.clone())
    }
}

// Never print key material.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_email", &self.client_email())
            .finish_non_exhaustive()
    }
}
