use std::fmt;

use serde::Deserialize;

use crate::error::VaultError;

/// Authentication section of the secret store configuration.
///
/// Exactly one of `token` or the `roleId`/`secretId` pair must be set.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    pub token: Option<String>,
    pub role_id: Option<String>,
    pub secret_id: Option<String>,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("role_id", &self.role_id)
            .field("secret_id", &self.secret_id.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AuthSettings {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn app_role(role_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            role_id: Some(role_id.into()),
            secret_id: Some(secret_id.into()),
            ..Default::default()
        }
    }

    pub fn resolve(self) -> Result<VaultAuth, VaultError> {
        let token = self.token.filter(|t| !t.trim().is_empty());
        let role_id = self.role_id.filter(|r| !r.trim().is_empty());
        let secret_id = self.secret_id.filter(|s| !s.trim().is_empty());
        match (token, role_id, secret_id) {
            (Some(token), None, None) => Ok(VaultAuth::Token(token)),
            (None, Some(role_id), Some(secret_id)) => Ok(VaultAuth::AppRole { role_id, secret_id }),
            (Some(_), _, _) => Err(VaultError::Configuration(
                "both a token and app-role credentials are configured".into(),
            )),
            (None, None, None) => Err(VaultError::Configuration(
                "no secret store credentials configured".into(),
            )),
            (None, _, _) => Err(VaultError::Configuration(
                "app-role authentication needs both roleId and secretId".into(),
            )),
        }
    }
}

/// How the connection authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum VaultAuth {
    /// Fixed token, treated as never expiring.
    Token(String),
    /// Credentials exchanged for a short-lived token, again on every expiry.
    AppRole { role_id: String, secret_id: String },
}

impl fmt::Debug for VaultAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultAuth::Token(_) => f.write_str("Token(<redacted>)"),
            VaultAuth::AppRole { role_id, .. } => f
                .debug_struct("AppRole")
                .field("role_id", role_id)
                .field("secret_id", &"<redacted>")
                .finish(),
        }
    }
}
