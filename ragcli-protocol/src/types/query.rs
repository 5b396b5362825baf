//! Query endpoint payloads

use serde::{Deserialize, Serialize};

/// Request body for `/v1/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub max_context_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// A single reference entry returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryReference {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Inline citation metadata provided by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCitation {
    pub alias: String,
    pub document_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// Structured answer returned by the backend query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub references: Vec<QueryReference>,
    #[serde(default)]
    pub citations: Vec<QueryCitation>,
    pub confidence: f64,
    pub trace_id: String,
    #[serde(default)]
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval_latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub no_answer: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_empty_optionals() {
        let request = QueryRequest {
            question: "How do I change file permissions?".into(),
            conversation_id: None,
            max_context_tokens: 4096,
            trace_id: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("conversation_id").is_none());
        assert!(value.get("trace_id").is_none());
        assert_eq!(value["max_context_tokens"], 4096);
    }

    #[test]
    fn test_response_collections_default_when_missing() {
        let raw = r#"{
            "summary": "Use chmod.",
            "confidence": 0.82,
            "trace_id": "trace-1"
        }"#;

        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        assert!(response.steps.is_empty());
        assert!(response.references.is_empty());
        assert!(response.citations.is_empty());
        assert!(!response.no_answer);
    }
}
