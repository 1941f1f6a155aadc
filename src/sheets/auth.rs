use super::ExportError;
use crate::config::{CredentialSource, CredentialsConfig};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCOPES: [&str; 2] = [
    "https://spreadsheets.google.com/feeds",
    "https://www.googleapis.com/auth/drive",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SERVICE_ACCOUNT_TYPE: &str = "service_account";
const ASSERTION_LIFETIME_S: i64 = 3600;

/// The fields of a Google service-account key file that we use.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Read the key JSON from the configured file or environment variable.
    pub fn load(config: &CredentialsConfig) -> Result<Self, ExportError> {
        let json = match config.source {
            CredentialSource::File => {
                let path = Path::new(&config.path_or_var_name);
                tracing::info!(path = %path.display(), "checking if credentials file exists");
                if !path.exists() {
                    return Err(ExportError::CredentialsFileMissing(config.path_or_var_name.clone()));
                }
                tracing::info!("reading credentials file");
                std::fs::read_to_string(path).map_err(|e| {
                    anyhow::Error::new(e)
                        .context(format!("failed to read credentials file {}", path.display()))
                })?
            }
            CredentialSource::Env => {
                tracing::info!(var = %config.path_or_var_name, "reading credentials from environment");
                match std::env::var(&config.path_or_var_name) {
                    Ok(v) if !v.trim().is_empty() => v,
                    _ => {
                        return Err(ExportError::CredentialsEnvMissing(
                            config.path_or_var_name.clone(),
                        ))
                    }
                }
            }
        };
        tracing::info!(length = json.len(), "credentials length in characters");
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        let json = json.strip_prefix('\u{feff}').unwrap_or(json);
        let key: Self = serde_json::from_str(json).map_err(ExportError::MalformedCredentials)?;
        match key.key_type.as_deref() {
            Some(SERVICE_ACCOUNT_TYPE) => {}
            other => tracing::warn!(
                key_type = ?other,
                "credentials are not a service account key; authorization will likely fail"
            ),
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs OAuth2 JWT-bearer assertions for a service account.
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: Vec<String>,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey, scopes: &[&str]) -> Result<Self, ExportError> {
        let pem = unescape_pem(&key.private_key);
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| ExportError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self {
            key,
            encoding_key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    pub fn token_uri(&self) -> &str {
        &self.key.token_uri
    }

    pub fn claims(&self, now: i64) -> Claims {
        Claims {
            iss: self.key.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.key.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_S,
        }
    }

    /// Build a signed RS256 JWT for the token endpoint.
    pub fn assertion(&self, now: i64) -> Result<String, ExportError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        encode(&header, &self.claims(now), &self.encoding_key).map_err(|e| match e.kind() {
            // The PEM wrapper parses lazily; a bad key body only shows up when signing.
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat | ErrorKind::RsaFailedSigning => {
                ExportError::InvalidPrivateKey(e.to_string())
            }
            _ => ExportError::Other(anyhow::Error::new(e).context("failed to sign JWT assertion")),
        })
    }
}

/// Keys pasted into env vars often carry literal "\n" sequences instead of newlines.
fn unescape_pem(pem: &str) -> String {
    pem.replace("\\n", "\n").trim().to_string()
}
