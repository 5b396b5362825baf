//! Source catalog payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{IngestionTrigger, JobSnapshot};

/// Catalog lifecycle state of a knowledge source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Pending,
    Quarantined,
}

/// One catalog entry returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub alias: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub location: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub size_bytes: i64,
    pub last_updated: DateTime<Utc>,
    pub status: SourceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Quarantine state returned by removal operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineInfo {
    pub reason: String,
    pub requested: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub documents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
}

/// Catalog listing request body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceListRequest {
    #[serde(default)]
    pub trace_id: String,
}

/// Request body registering a new knowledge source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCreateRequest {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub source_type: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Request body mutating metadata for an existing source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceUpdateRequest {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SourceStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Request body quarantining a source and removing it from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRemoveRequest {
    #[serde(default)]
    pub trace_id: String,
    pub reason: String,
}

/// Request body triggering an index rebuild.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReindexRequest {
    #[serde(default)]
    pub trace_id: String,
    #[serde(default)]
    pub trigger: IngestionTrigger,
    #[serde(default)]
    pub force: bool,
}

/// Catalog listing payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceListResponse {
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Result of add/update/remove mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMutationResponse {
    pub source: SourceRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_job: Option<JobSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarantine: Option<QuarantineInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_record_type_field_name() {
        let record = SourceRecord {
            alias: "linux-man".into(),
            source_type: "directory".into(),
            location: "/usr/share/man".into(),
            language: "en".into(),
            size_bytes: 1024,
            last_updated: Utc::now(),
            status: SourceStatus::Active,
            checksum: None,
            notes: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "directory");
        assert!(value.get("source_type").is_none());
        assert_eq!(value["status"], "active");
    }

    #[test]
    fn test_reindex_request_defaults() {
        let request: ReindexRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.trigger, IngestionTrigger::Manual);
        assert!(!request.force);
        assert!(request.trace_id.is_empty());
    }

    #[test]
    fn test_list_response_backfills_sources() {
        let raw = r#"{"updated_at": "2024-11-20T00:00:00Z"}"#;
        let response: SourceListResponse = serde_json::from_str(raw).unwrap();
        assert!(response.sources.is_empty());
    }
}
