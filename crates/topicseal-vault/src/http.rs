//! KV v2 session over the store's HTTP API.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use topicseal_keys::{SecretMetadata, SecretResponse};
use tracing::debug;

use crate::error::VaultError;
use crate::session::{LoginGrant, SecretStoreSession};

const DEFAULT_KV_MOUNT: &str = "secret";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Connection settings for [`HttpVaultSession`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSessionOptions {
    /// Base URL, e.g. `https://vault.internal:8200`.
    pub address: String,
    /// KV v2 mount point.
    pub mount: String,
    pub namespace: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for HttpSessionOptions {
    fn default() -> Self {
        Self {
            address: String::new(),
            mount: DEFAULT_KV_MOUNT.to_string(),
            namespace: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl HttpSessionOptions {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}

/// Blocking HTTP client for a KV v2 secret store.
#[derive(Debug, Clone)]
pub struct HttpVaultSession {
    client: Client,
    options: HttpSessionOptions,
}

impl HttpVaultSession {
    pub fn new(options: HttpSessionOptions) -> Result<Self, VaultError> {
        if options.address.trim().is_empty() {
            return Err(VaultError::Configuration(
                "secret store address is empty".into(),
            ));
        }
        let timeout = if options.request_timeout_secs == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(options.request_timeout_secs)
        };
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| VaultError::Configuration(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, options })
    }

    /// Settings this session was built with.
    pub fn options(&self) -> &HttpSessionOptions {
        &self.options
    }

    fn url(&self, api_path: &str) -> String {
        format!(
            "{}/{}",
            self.options.address.trim_end_matches('/'),
            api_path.trim_start_matches('/')
        )
    }

    fn with_namespace(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.options.namespace {
            Some(ns) => builder.header("X-Vault-Namespace", ns),
            None => builder,
        }
    }

    fn send(&self, builder: RequestBuilder, api_path: &str) -> Result<String, VaultError> {
        let response = self
            .with_namespace(builder)
            .send()
            .map_err(|err| VaultError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(VaultError::Status {
                status: status.as_u16(),
                path: api_path.to_string(),
            });
        }
        response
            .text()
            .map_err(|err| VaultError::Transport(err.to_string()))
    }
}

impl SecretStoreSession for HttpVaultSession {
    fn login_app_role(&self, role_id: &str, secret_id: &str) -> Result<LoginGrant, VaultError> {
        let api_path = "v1/auth/approle/login";
        let builder = self
            .client
            .post(self.url(api_path))
            .json(&json!({ "role_id": role_id, "secret_id": secret_id }));
        let body = self
            .send(builder, api_path)
            .map_err(|err| VaultError::Login(err.to_string()))?;
        parse_login_response(&body)
    }

    fn read(
        &self,
        token: &str,
        path: &str,
        version: Option<u32>,
    ) -> Result<SecretResponse, VaultError> {
        let api_path = kv_data_path(&self.options.mount, path, version);
        debug!(path, version, "reading secret");
        let builder = self
            .client
            .get(self.url(&api_path))
            .header("X-Vault-Token", token);
        let body = self.send(builder, &api_path)?;
        parse_kv_response(&body)
    }
}

fn kv_data_path(mount: &str, path: &str, version: Option<u32>) -> String {
    let mut api_path = format!(
        "v1/{}/data/{}",
        mount.trim_matches('/'),
        path.trim_start_matches('/')
    );
    if let Some(v) = version {
        api_path.push_str(&format!("?version={v}"));
    }
    api_path
}

#[derive(Deserialize)]
struct KvReadResponse {
    data: KvDataEnvelope,
}

#[derive(Deserialize)]
struct KvDataEnvelope {
    #[serde(default)]
    data: Option<HashMap<String, Value>>,
    #[serde(default)]
    metadata: Option<KvVersionMetadata>,
}

#[derive(Deserialize)]
struct KvVersionMetadata {
    version: u32,
    created_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
    #[serde(default)]
    renewable: bool,
}

/// Parse a KV v2 read body. Non-string attribute values are ignored.
pub fn parse_kv_response(body: &str) -> Result<SecretResponse, VaultError> {
    let parsed: KvReadResponse = serde_json::from_str(body)
        .map_err(|err| VaultError::MalformedResponse(format!("failed to decode read response: {err}")))?;
    let data = parsed
        .data
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| match value {
            Value::String(s) => Some((name, s)),
            _ => None,
        })
        .collect();
    let metadata = parsed.data.metadata.map(|m| SecretMetadata {
        version: m.version,
        created_time: m.created_time,
    });
    Ok(SecretResponse { data, metadata })
}

/// Parse an app-role login body.
pub fn parse_login_response(body: &str) -> Result<LoginGrant, VaultError> {
    let parsed: LoginResponse = serde_json::from_str(body)
        .map_err(|err| VaultError::MalformedResponse(format!("failed to decode login response: {err}")))?;
    if parsed.auth.client_token.is_empty() {
        return Err(VaultError::MalformedResponse(
            "login response carries an empty client token".into(),
        ));
    }
    Ok(LoginGrant {
        client_token: parsed.auth.client_token,
        lease_duration: Duration::from_secs(parsed.auth.lease_duration),
        renewable: parsed.auth.renewable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ_BODY: &str = r#"{
        "request_id": "1b3c",
        "lease_id": "",
        "renewable": false,
        "data": {
            "data": {"value": "gZvWT1IN0mM5sK3sK0V2Wfzo9Jmk4tUPt7gxRsuN3LY=", "rotations": 3},
            "metadata": {
                "created_time": "2026-03-22T02:24:06.945319214Z",
                "deletion_time": "",
                "destroyed": false,
                "version": 3
            }
        }
    }"#;

    #[test]
    fn parses_kv_read() {
        let secret = parse_kv_response(READ_BODY).unwrap();
        assert_eq!(
            secret.data.get("value").map(String::as_str),
            Some("gZvWT1IN0mM5sK3sK0V2Wfzo9Jmk4tUPt7gxRsuN3LY=")
        );
        assert!(!secret.data.contains_key("rotations"));
        assert_eq!(secret.metadata.unwrap().version, 3);
    }

    #[test]
    fn deleted_version_has_no_data() {
        let body = r#"{"data": {"data": null, "metadata": {"created_time": "2026-03-22T02:24:06Z", "version": 4}}}"#;
        let secret = parse_kv_response(body).unwrap();
        assert!(secret.data.is_empty());
        assert_eq!(secret.metadata.unwrap().version, 4);
    }

    #[test]
    fn malformed_read_is_rejected() {
        assert!(matches!(
            parse_kv_response("{\"errors\":[]}"),
            Err(VaultError::MalformedResponse(_))
        ));
        assert!(parse_kv_response("not json").is_err());
    }

    #[test]
    fn parses_login() {
        let body = r#"{"auth": {"client_token": "s.abc", "lease_duration": 2764800, "renewable": true, "policies": ["default"]}}"#;
        let grant = parse_login_response(body).unwrap();
        assert_eq!(grant.client_token, "s.abc");
        assert_eq!(grant.lease_duration, Duration::from_secs(2_764_800));
        assert!(grant.renewable);
    }

    #[test]
    fn empty_login_token_is_rejected() {
        let body = r#"{"auth": {"client_token": ""}}"#;
        assert!(parse_login_response(body).is_err());
    }

    #[test]
    fn builds_kv_paths() {
        assert_eq!(kv_data_path("secret", "kafka/orders", None), "v1/secret/data/kafka/orders");
        assert_eq!(
            kv_data_path("/kv/", "/kafka/orders", Some(2)),
            "v1/kv/data/kafka/orders?version=2"
        );
    }

    #[test]
    fn url_joins_address_and_path() {
        let session = HttpVaultSession::new(HttpSessionOptions::new("https://vault.local:8200/")).unwrap();
        assert_eq!(
            session.url("/v1/auth/approle/login"),
            "https://vault.local:8200/v1/auth/approle/login"
        );
    }

    #[test]
    fn empty_address_is_configuration_error() {
        assert!(matches!(
            HttpVaultSession::new(HttpSessionOptions::default()),
            Err(VaultError::Configuration(_))
        ));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: HttpSessionOptions =
            serde_json::from_str(r#"{"address": "https://vault.local"}"#).unwrap();
        assert_eq!(opts.mount, "secret");
        assert_eq!(opts.request_timeout_secs, 15);
    }
}
