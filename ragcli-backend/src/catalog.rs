//! In-memory source catalog and reindex execution
//!
//! The catalog/query business rules proper live outside this subsystem;
//! these implementations cover the port boundary with enough behavior to
//! drive every endpoint, including the streamed reindex worker.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tracing::{error, info};
use uuid::Uuid;

use ragcli_protocol::types::{
    InitResponse, QuarantineInfo, QueryReference, QueryRequest, QueryResponse, ReindexRequest,
    SourceCreateRequest, SourceListResponse, SourceMutationResponse, SourceRecord,
    SourceRemoveRequest, SourceStatus, SourceUpdateRequest,
};
use ragcli_protocol::{new_trace_id, JobSnapshot, JobStatus};

use crate::ports::{IngestionPort, PortError, QueryPort};
use crate::stream::{snapshot_channel, JobStream, SnapshotPublisher};

/// Reindex phases after discovery, with their completion percentages.
const REINDEX_PHASES: [(&str, f64); 3] = [("chunking", 35.0), ("embedding", 70.0), ("committing", 90.0)];

/// In-memory catalog backing the ingestion port.
pub struct InMemoryCatalog {
    state: Arc<Mutex<CatalogState>>,
    queue_capacity: usize,
    fail_next_reindex: Mutex<Option<String>>,
}

struct CatalogState {
    sources: BTreeMap<String, SourceRecord>,
    version: u64,
    updated_at: DateTime<Utc>,
}

impl InMemoryCatalog {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CatalogState {
                sources: BTreeMap::new(),
                version: 0,
                updated_at: Utc::now(),
            })),
            queue_capacity: queue_capacity.max(1),
            fail_next_reindex: Mutex::new(None),
        }
    }

    /// Version of the last committed index; 0 means never indexed.
    pub fn index_version(&self) -> u64 {
        self.state.lock().expect("catalog lock").version
    }

    /// Make the next reindex job fail during the embedding phase.
    ///
    /// Fault-injection hook: the worker surfaces the message as the
    /// terminal snapshot's `error_message`.
    pub fn fail_next_reindex(&self, message: impl Into<String>) {
        *self.fail_next_reindex.lock().expect("catalog lock") = Some(message.into());
    }

    fn snapshot_sources(&self) -> Vec<SourceRecord> {
        self.state
            .lock()
            .expect("catalog lock")
            .sources
            .values()
            .cloned()
            .collect()
    }
}

fn validate_alias(alias: &str) -> Result<String, PortError> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(PortError::invalid("alias must be provided"));
    }
    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(PortError::invalid(format!(
            "alias {:?} contains unsupported characters",
            alias
        )));
    }
    Ok(alias.to_string())
}

/// Derive an alias from the location's final path segment.
fn derive_alias(location: &str) -> String {
    let base = location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("source");
    let mut alias: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if alias.is_empty() {
        alias = "source".into();
    }
    alias
}

/// Rough document count for progress reporting.
fn estimate_documents(source: &SourceRecord) -> u64 {
    (source.size_bytes.max(0) as u64 / 512) + 1
}

#[async_trait]
impl IngestionPort for InMemoryCatalog {
    async fn list_sources(&self) -> Result<SourceListResponse, PortError> {
        let state = self.state.lock().expect("catalog lock");
        Ok(SourceListResponse {
            sources: state.sources.values().cloned().collect(),
            updated_at: state.updated_at,
            trace_id: None,
        })
    }

    async fn create_source(
        &self,
        request: SourceCreateRequest,
    ) -> Result<SourceMutationResponse, PortError> {
        let alias = match &request.alias {
            Some(alias) => validate_alias(alias)?,
            None => derive_alias(&request.location),
        };

        let mut state = self.state.lock().expect("catalog lock");
        if state.sources.contains_key(&alias) {
            return Err(PortError::invalid(format!(
                "source {:?} is already registered",
                alias
            )));
        }

        let record = SourceRecord {
            alias: alias.clone(),
            source_type: request.source_type,
            location: request.location,
            language: request.language.unwrap_or_default(),
            size_bytes: 0,
            last_updated: Utc::now(),
            status: SourceStatus::Pending,
            checksum: request.checksum,
            notes: request.notes,
        };
        state.sources.insert(alias, record.clone());
        state.updated_at = Utc::now();

        Ok(SourceMutationResponse {
            source: record,
            ingestion_job: None,
            quarantine: None,
            trace_id: Some(request.trace_id),
        })
    }

    async fn update_source(
        &self,
        alias: &str,
        request: SourceUpdateRequest,
    ) -> Result<SourceMutationResponse, PortError> {
        let alias = validate_alias(alias)?;

        let mut state = self.state.lock().expect("catalog lock");
        let record = state
            .sources
            .get_mut(&alias)
            .ok_or_else(|| PortError::not_found(format!("source {:?} not found", alias)))?;

        if let Some(location) = request.location {
            record.location = location;
        }
        if let Some(language) = request.language {
            record.language = language;
        }
        if let Some(status) = request.status {
            record.status = status;
        }
        if let Some(notes) = request.notes {
            record.notes = Some(notes);
        }
        record.last_updated = Utc::now();

        let record = record.clone();
        state.updated_at = Utc::now();

        Ok(SourceMutationResponse {
            source: record,
            ingestion_job: None,
            quarantine: None,
            trace_id: Some(request.trace_id),
        })
    }

    async fn remove_source(
        &self,
        alias: &str,
        request: SourceRemoveRequest,
    ) -> Result<SourceMutationResponse, PortError> {
        let alias = validate_alias(alias)?;

        let mut state = self.state.lock().expect("catalog lock");
        let mut record = state
            .sources
            .remove(&alias)
            .ok_or_else(|| PortError::not_found(format!("source {:?} not found", alias)))?;

        record.status = SourceStatus::Quarantined;
        record.last_updated = Utc::now();
        state.updated_at = Utc::now();

        let documents = estimate_documents(&record);
        Ok(SourceMutationResponse {
            source: record,
            ingestion_job: None,
            quarantine: Some(QuarantineInfo {
                reason: request.reason,
                requested: Utc::now(),
                trace_id: Some(request.trace_id.clone()),
                documents,
                next_steps: Some("Run a reindex to drop quarantined documents from the index.".into()),
            }),
            trace_id: Some(request.trace_id),
        })
    }

    async fn start_reindex(
        &self,
        request: ReindexRequest,
    ) -> Result<(JobSnapshot, JobStream), PortError> {
        let sources = self.snapshot_sources();
        let now = Utc::now();

        let initial = JobSnapshot {
            job_id: Uuid::new_v4().to_string(),
            source_alias: None,
            status: JobStatus::Running,
            stage: "discovering".into(),
            percent_complete: Some(5.0),
            documents_processed: 0,
            requested_at: now,
            started_at: Some(now),
            completed_at: None,
            error_message: None,
            trigger: request.trigger,
        };

        let (publisher, stream) = snapshot_channel(self.queue_capacity);
        let failure = self.fail_next_reindex.lock().expect("catalog lock").take();
        let state = Arc::clone(&self.state);
        let base = initial.clone();

        info!(job_id = %initial.job_id, trigger = ?request.trigger, "Starting reindex job");
        tokio::spawn(run_reindex(publisher, base, sources, failure, state));

        Ok((initial, stream))
    }

    async fn init_system(&self) -> Result<InitResponse, PortError> {
        let state = self.state.lock().expect("catalog lock");
        Ok(InitResponse {
            catalog_version: state.version,
            created_directories: vec![
                "~/.config/ragcli".into(),
                "~/.local/share/ragcli".into(),
                "~/.local/state/ragcli".into(),
            ],
            seeded_sources: state.sources.values().cloned().collect(),
            dependency_checks: Vec::new(),
            trace_id: None,
        })
    }
}

/// Execute the reindex phases on a background worker, publishing one
/// snapshot per completed phase and a terminal snapshot at the end.
///
/// Failures are captured into a terminal `failed` snapshot; side effects
/// already committed stay committed.
async fn run_reindex(
    mut publisher: SnapshotPublisher,
    base: JobSnapshot,
    sources: Vec<SourceRecord>,
    failure: Option<String>,
    state: Arc<Mutex<CatalogState>>,
) {
    let outcome = std::panic::AssertUnwindSafe(execute_phases(
        &mut publisher,
        &base,
        &sources,
        failure,
        &state,
    ))
    .catch_unwind()
    .await;

    let (result, documents) = match outcome {
        Ok((result, documents)) => (result, documents),
        Err(_) => (Err("reindex worker panicked".to_string()), 0),
    };

    let terminal = match result {
        Ok(()) => JobSnapshot {
            status: JobStatus::Succeeded,
            stage: "completed".into(),
            percent_complete: Some(100.0),
            documents_processed: documents,
            completed_at: Some(Utc::now()),
            ..base
        },
        Err(message) => {
            error!(job_id = %base.job_id, error = %message, "Reindex job failed");
            JobSnapshot {
                status: JobStatus::Failed,
                stage: "failed".into(),
                percent_complete: None,
                documents_processed: documents,
                completed_at: Some(Utc::now()),
                error_message: Some(message),
                ..base
            }
        }
    };
    publisher.publish(terminal).await;
}

/// Walk the post-discovery phases. Returns the phase result and the number
/// of documents processed so far (kept on failure: partial progress stays
/// visible).
async fn execute_phases(
    publisher: &mut SnapshotPublisher,
    base: &JobSnapshot,
    sources: &[SourceRecord],
    failure: Option<String>,
    state: &Arc<Mutex<CatalogState>>,
) -> (Result<(), String>, u64) {
    let total_documents: u64 = sources.iter().map(estimate_documents).sum();
    let mut documents = 0u64;

    for (stage, percent) in REINDEX_PHASES {
        if stage == "embedding" {
            if let Some(message) = &failure {
                return (Err(message.clone()), documents);
            }
        }

        documents = match stage {
            // Round up so partial progress is visible even for tiny catalogs
            "chunking" => total_documents.div_ceil(2),
            _ => total_documents,
        };

        // An undelivered snapshot means the client disconnected; the job
        // runs to completion without an audience.
        publisher
            .publish(JobSnapshot {
                stage: stage.into(),
                percent_complete: Some(percent),
                documents_processed: documents,
                ..base.clone()
            })
            .await;
    }

    // Commit: activate sources and bump the index version
    {
        let mut state = state.lock().expect("catalog lock");
        for record in state.sources.values_mut() {
            if record.status == SourceStatus::Pending {
                record.status = SourceStatus::Active;
            }
        }
        state.version += 1;
        state.updated_at = Utc::now();
    }

    (Ok(()), documents)
}

/// Query port answering from catalog metadata.
///
/// Stands in for the retrieval/generation pipeline at the boundary of this
/// subsystem; refuses to answer until an index has been built.
pub struct CatalogQueryPort {
    catalog: Arc<InMemoryCatalog>,
}

impl CatalogQueryPort {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl QueryPort for CatalogQueryPort {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, PortError> {
        let started = std::time::Instant::now();

        if self.catalog.index_version() == 0 {
            return Err(PortError::unavailable(
                "INDEX_MISSING",
                "No content index is available for the current catalog.",
                Some("Run a reindex to build the knowledge index before querying.".into()),
            ));
        }

        let references: Vec<QueryReference> = self
            .catalog
            .snapshot_sources()
            .into_iter()
            .filter(|s| s.status == SourceStatus::Active)
            .map(|s| QueryReference {
                label: s.alias,
                url: None,
                notes: None,
            })
            .collect();

        let trace_id = request
            .trace_id
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(new_trace_id);

        Ok(QueryResponse {
            summary: format!("Consulted {} indexed sources for: {}", references.len(), request.question),
            steps: Vec::new(),
            references,
            citations: Vec::new(),
            confidence: 0.82,
            trace_id,
            latency_ms: started.elapsed().as_millis() as u64,
            retrieval_latency_ms: None,
            llm_latency_ms: None,
            index_version: Some(self.catalog.index_version().to_string()),
            answer: None,
            no_answer: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(alias: &str, location: &str) -> SourceCreateRequest {
        SourceCreateRequest {
            trace_id: "trace-1".into(),
            alias: Some(alias.into()),
            source_type: "directory".into(),
            location: location.into(),
            language: Some("en".into()),
            notes: None,
            checksum: None,
        }
    }

    #[tokio::test]
    async fn test_create_list_update_remove() {
        let catalog = InMemoryCatalog::new(8);

        let created = catalog
            .create_source(create_request("linux-man", "/usr/share/man"))
            .await
            .unwrap();
        assert_eq!(created.source.status, SourceStatus::Pending);

        let listed = catalog.list_sources().await.unwrap();
        assert_eq!(listed.sources.len(), 1);

        let updated = catalog
            .update_source(
                "linux-man",
                SourceUpdateRequest {
                    trace_id: "trace-2".into(),
                    notes: Some("manual pages".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.source.notes.as_deref(), Some("manual pages"));

        let removed = catalog
            .remove_source(
                "linux-man",
                SourceRemoveRequest {
                    trace_id: "trace-3".into(),
                    reason: "stale content".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(removed.source.status, SourceStatus::Quarantined);
        assert_eq!(removed.quarantine.unwrap().reason, "stale content");

        assert!(catalog.list_sources().await.unwrap().sources.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_alias_rejected() {
        let catalog = InMemoryCatalog::new(8);
        catalog
            .create_source(create_request("docs", "/srv/docs"))
            .await
            .unwrap();

        let err = catalog
            .create_source(create_request("docs", "/srv/other"))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_source_not_found() {
        let catalog = InMemoryCatalog::new(8);
        let err = catalog
            .update_source("ghost", SourceUpdateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound { .. }));
    }

    #[test]
    fn test_derive_alias() {
        assert_eq!(derive_alias("/usr/share/man"), "man");
        assert_eq!(derive_alias("/srv/docs/"), "docs");
        assert_eq!(derive_alias("weird name!"), "weird-name-");
        assert_eq!(derive_alias(""), "source");
    }

    #[tokio::test]
    async fn test_reindex_streams_to_terminal_success() {
        let catalog = InMemoryCatalog::new(8);
        catalog
            .create_source(create_request("docs", "/srv/docs"))
            .await
            .unwrap();

        let (initial, mut stream) = catalog
            .start_reindex(ReindexRequest::default())
            .await
            .unwrap();
        assert_eq!(initial.status, JobStatus::Running);
        assert_eq!(initial.stage, "discovering");

        let mut stages = Vec::new();
        while let Some(snapshot) = stream.recv().await {
            stages.push((snapshot.stage.clone(), snapshot.status));
        }

        assert_eq!(
            stages,
            vec![
                ("chunking".to_string(), JobStatus::Running),
                ("embedding".to_string(), JobStatus::Running),
                ("committing".to_string(), JobStatus::Running),
                ("completed".to_string(), JobStatus::Succeeded),
            ]
        );

        // Commit side effects: version bumped, pending sources activated
        assert_eq!(catalog.index_version(), 1);
        let listed = catalog.list_sources().await.unwrap();
        assert_eq!(listed.sources[0].status, SourceStatus::Active);
    }

    #[tokio::test]
    async fn test_reindex_failure_captured_in_terminal_snapshot() {
        let catalog = InMemoryCatalog::new(8);
        catalog
            .create_source(create_request("docs", "/srv/docs"))
            .await
            .unwrap();
        catalog.fail_next_reindex("embedding backend unavailable");

        let (_, mut stream) = catalog
            .start_reindex(ReindexRequest::default())
            .await
            .unwrap();

        let mut last = None;
        while let Some(snapshot) = stream.recv().await {
            last = Some(snapshot);
        }

        let terminal = last.unwrap();
        assert_eq!(terminal.status, JobStatus::Failed);
        assert_eq!(
            terminal.error_message.as_deref(),
            Some("embedding backend unavailable")
        );
        // Partial progress from the chunking phase stays visible
        assert!(terminal.documents_processed > 0);
        // The failed run must not commit an index version
        assert_eq!(catalog.index_version(), 0);
    }

    #[tokio::test]
    async fn test_query_requires_index() {
        let catalog = Arc::new(InMemoryCatalog::new(8));
        let port = CatalogQueryPort::new(Arc::clone(&catalog));

        let err = port
            .query(QueryRequest {
                question: "anything".into(),
                conversation_id: None,
                max_context_tokens: 4096,
                trace_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Unavailable { ref code, .. } if code == "INDEX_MISSING"));
    }

    #[tokio::test]
    async fn test_query_after_reindex() {
        let catalog = Arc::new(InMemoryCatalog::new(8));
        catalog
            .create_source(create_request("docs", "/srv/docs"))
            .await
            .unwrap();

        let (_, mut stream) = catalog
            .start_reindex(ReindexRequest::default())
            .await
            .unwrap();
        while stream.recv().await.is_some() {}

        let port = CatalogQueryPort::new(Arc::clone(&catalog));
        let response = port
            .query(QueryRequest {
                question: "How do I change file permissions?".into(),
                conversation_id: None,
                max_context_tokens: 4096,
                trace_id: Some("trace-9".into()),
            })
            .await
            .unwrap();

        assert!(!response.summary.is_empty());
        assert_eq!(response.trace_id, "trace-9");
        assert_eq!(response.references.len(), 1);
        assert!(response.confidence > 0.0);
    }
}
