//! OAuth session from an authorized-user credential (the `token.json` that
//! Google's installed-app flow writes).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use coursecal_core::config::CredentialsConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{GoogleError, GoogleResult};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// scopes, account, universe_domain, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Where the credential was read from. Only file credentials are written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Env(String),
    File(PathBuf),
}

pub struct Session {
    credential: AuthorizedUser,
    source: CredentialSource,
    http: reqwest::Client,
}

impl Session {
    /// The env var wins over the file when it is set.
    pub fn load(config: &CredentialsConfig) -> GoogleResult<Self> {
        if let Ok(json) = std::env::var(&config.env_var) {
            if !json.trim().is_empty() {
                debug!(env_var = %config.env_var, "Using credential from environment");
                return Self::from_json(&json, CredentialSource::Env(config.env_var.clone()));
            }
        }

        Self::from_file(&config.path)
    }

    pub fn from_file(path: &Path) -> GoogleResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GoogleError::Credentials(format!("Failed to read credential from {}: {}", path.display(), e))
        })?;

        Self::from_json(&contents, CredentialSource::File(path.to_path_buf()))
    }

    pub fn from_json(json: &str, source: CredentialSource) -> GoogleResult<Self> {
        let credential: AuthorizedUser = serde_json::from_str(json)
            .map_err(|e| GoogleError::Credentials(format!("Failed to parse authorized-user credential: {}", e)))?;

        Ok(Session {
            credential,
            source,
            http: reqwest::Client::new(),
        })
    }

    pub fn is_expired(&self) -> bool {
        match (&self.credential.token, self.credential.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= expiry,
            // No recorded expiry: use the token until the API rejects it
            (Some(_), None) => false,
        }
    }

    /// A valid access token, refreshed first if needed.
    pub async fn access_token(&mut self) -> GoogleResult<String> {
        if self.is_expired() {
            self.refresh().await?;
        }

        self.credential
            .token
            .clone()
            .ok_or_else(|| GoogleError::Auth("No access token after refresh".into()))
    }

    pub async fn refresh(&mut self) -> GoogleResult<()> {
        #[derive(Deserialize)]
        struct RefreshResponse {
            access_token: String,
            expires_in: i64,
            #[serde(default)]
            refresh_token: Option<String>,
        }

        let response = self
            .http
            .post(&self.credential.token_uri)
            .form(&[
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.as_str()),
                ("refresh_token", self.credential.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleError::Auth(format!("{}: {}", status, body)));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| GoogleError::Auth(format!("Failed to parse refresh response: {}", e)))?;

        self.credential.token = Some(refreshed.access_token);
        self.credential.expiry = Some(Utc::now() + Duration::seconds(refreshed.expires_in));
        // Google typically doesn't return a new refresh_token on refresh
        if let Some(refresh_token) = refreshed.refresh_token.filter(|t| !t.is_empty()) {
            self.credential.refresh_token = refresh_token;
        }

        info!("Access token refreshed");
        self.save()
    }

    /// Write the credential back to its file. Env credentials are left alone.
    fn save(&self) -> GoogleResult<()> {
        let CredentialSource::File(path) = &self.source else {
            return Ok(());
        };

        let contents = serde_json::to_string_pretty(&self.credential)
            .map_err(|e| GoogleError::Credentials(format!("Failed to serialize credential: {}", e)))?;

        std::fs::write(path, contents).map_err(|e| {
            GoogleError::Credentials(format!("Failed to write credential to {}: {}", path.display(), e))
        })?;

        // Set to owner-only (0600) since file contains OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(|e| {
                GoogleError::Credentials(format!("Failed to set permissions on {}: {}", path.display(), e))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(extra: &str) -> String {
        format!(
            r#"{{"refresh_token":"r","client_id":"c","client_secret":"s","scopes":["x"]{}}}"#,
            extra
        )
    }

    #[test]
    fn missing_token_counts_as_expired() {
        let session = Session::from_json(&credential(""), CredentialSource::Env("CREDS".into())).unwrap();
        assert!(session.is_expired());
        assert_eq!(session.credential.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn future_expiry_is_valid() {
        let expiry = (Utc::now() + Duration::hours(1)).to_rfc3339();
        let json = credential(&format!(r#","token":"t","expiry":"{}""#, expiry));
        let session = Session::from_json(&json, CredentialSource::Env("CREDS".into())).unwrap();
        assert!(!session.is_expired());
    }

    #[test]
    fn unknown_fields_survive() {
        let session = Session::from_json(&credential(""), CredentialSource::Env("CREDS".into())).unwrap();
        let out = serde_json::to_value(&session.credential).unwrap();
        assert_eq!(out["scopes"][0], "x");
    }

    #[test]
    fn malformed_credential_is_rejected() {
        let err = Session::from_json("{}", CredentialSource::Env("CREDS".into()))
            .err()
            .unwrap();
        assert!(matches!(err, GoogleError::Credentials(_)));
    }
}
