use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::UploadStatus;

/// One document the backend holds for the current session.
///
/// Entries are mirrored exactly as the server reports them: same order,
/// duplicates included. `timestamp` is absent for listings from backends
/// that predate the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentListResponse {
    #[serde(default)]
    pub files: Vec<DocumentRecord>,
}

/// Per-file result inside the upload response. The server reports failed
/// files alongside indexed ones; only indexed entries become documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub filename: String,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_chunks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    /// The document record this outcome created, if the server indexed it.
    pub fn as_created_record(&self) -> Option<DocumentRecord> {
        matches!(self.status, UploadStatus::Indexed).then(|| DocumentRecord {
            filename: self.filename.clone(),
            timestamp: self.timestamp,
            num_chunks: self.num_chunks,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub uploads: Vec<UploadOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_tolerates_extra_server_fields() {
        let raw = r#"{"files":[{"filename":"report.pdf","timestamp":"2024-05-01T12:00:00Z","num_chunks":12,"user_id":"abc","_id":"6633"}]}"#;
        let parsed: DocumentListResponse = serde_json::from_str(raw).expect("listing");
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].filename, "report.pdf");
        assert_eq!(parsed.files[0].num_chunks, Some(12));
    }

    #[test]
    fn listing_allows_absent_timestamp() {
        let raw = r#"{"files":[{"filename":"scan.pdf"}]}"#;
        let parsed: DocumentListResponse = serde_json::from_str(raw).expect("listing");
        assert_eq!(parsed.files[0].timestamp, None);
    }

    #[test]
    fn only_indexed_outcomes_create_records() {
        let raw = r#"{"uploads":[
            {"filename":"a.pdf","status":"indexed","num_chunks":3,"timestamp":"2024-05-01T12:00:00Z"},
            {"filename":"b.pdf","status":"failed","error":"No text chunks extracted."},
            {"filename":"c.pdf","status":"error","error":"boom"}
        ]}"#;
        let parsed: UploadResponse = serde_json::from_str(raw).expect("uploads");
        let created: Vec<_> = parsed
            .uploads
            .iter()
            .filter_map(UploadOutcome::as_created_record)
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].filename, "a.pdf");
        assert_eq!(created[0].num_chunks, Some(3));
    }
}
