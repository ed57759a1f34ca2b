use serde::{Deserialize, Serialize};

/// Opaque token issued by the backend on login.
///
/// The backend also accepts this value as the `user_id` parameter on every
/// authenticated request, so the same opaque string identifies and
/// authenticates the user. It carries no expiry; only an explicit logout
/// discards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Per-file outcome reported by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Indexed,
    Failed,
    Error,
}
