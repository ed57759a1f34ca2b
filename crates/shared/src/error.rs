use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error payload shapes the backend is known to emit: handler-level
/// failures arrive as `{"error": …}`, framework rejections as
/// `{"detail": …}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiErrorBody {
    pub fn message(&self) -> Option<&str> {
        self.error.as_deref().or(self.detail.as_deref())
    }
}

/// A non-success response with whatever display message could be
/// extracted from the body.
#[derive(Debug, Clone, Error)]
#[error("server rejected request ({status}): {message}")]
pub struct ApiRejection {
    pub status: u16,
    pub message: String,
}

impl ApiRejection {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_handler_error_message() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"error":"index unavailable"}"#).expect("body");
        assert_eq!(body.message(), Some("index unavailable"));
    }

    #[test]
    fn extracts_framework_detail_message() {
        let body: ApiErrorBody = serde_json::from_str(r#"{"detail":"Invalid credentials"}"#).expect("body");
        assert_eq!(body.message(), Some("Invalid credentials"));
    }

    #[test]
    fn empty_body_has_no_message() {
        let body: ApiErrorBody = serde_json::from_str("{}").expect("body");
        assert_eq!(body.message(), None);
    }
}
