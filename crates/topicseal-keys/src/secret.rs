//! Minimal read contract against the secret store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::KeyError;

/// Version metadata of a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMetadata {
    pub version: u32,
    pub created_time: DateTime<Utc>,
}

/// A secret as returned by the store: named string attributes plus metadata.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretResponse {
    pub data: HashMap<String, String>,
    pub metadata: Option<SecretMetadata>,
}

impl std::fmt::Debug for SecretResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut attributes: Vec<&String> = self.data.keys().collect();
        attributes.sort();
        f.debug_struct("SecretResponse")
            .field("attributes", &attributes)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Reads secrets. Any non-success response or malformed body is an error.
pub trait SecretReader: Send + Sync {
    /// Latest version of the secret at `path`.
    fn read(&self, path: &str) -> Result<SecretResponse, KeyError>;

    /// A pinned version of the secret at `path`.
    fn read_version(&self, path: &str, version: u32) -> Result<SecretResponse, KeyError>;
}

impl<T> SecretReader for Arc<T>
where
    T: SecretReader + ?Sized,
{
    fn read(&self, path: &str) -> Result<SecretResponse, KeyError> {
        (**self).read(path)
    }

    fn read_version(&self, path: &str, version: u32) -> Result<SecretResponse, KeyError> {
        (**self).read_version(path, version)
    }
}
