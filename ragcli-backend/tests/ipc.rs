//! End-to-end tests: real backend, real Unix socket, real client.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use ragcli_backend::catalog::{CatalogQueryPort, InMemoryCatalog};
use ragcli_backend::ports::IngestionPort;
use ragcli_backend::router::Router;
use ragcli_backend::{Backend, BackendConfig};
use ragcli_client::{
    Client, ClientConfig, HealthRequest, QueryRequest, ReindexRequest, SourceCreateRequest,
    SourceListRequest, SourceRemoveRequest, SourceStatus, SourceUpdateRequest,
};
use ragcli_protocol::JobStatus;
use ragcli_utils::RagCliError;

struct TestBackend {
    _dir: TempDir,
    socket: std::path::PathBuf,
    catalog: Arc<InMemoryCatalog>,
    task: JoinHandle<()>,
}

impl TestBackend {
    fn start() -> Self {
        let dir = TempDir::new().unwrap();
        let socket = dir.path().join("backend.sock");

        let catalog = Arc::new(InMemoryCatalog::new(8));
        let query = Arc::new(CatalogQueryPort::new(Arc::clone(&catalog)));
        let router = Arc::new(Router::new(
            query,
            Arc::clone(&catalog) as Arc<dyn IngestionPort>,
        ));

        let config = BackendConfig::with_socket_path(&socket);
        let backend = Backend::bind(&config, router).unwrap();
        let task = tokio::spawn(async move {
            let _ = backend.run().await;
        });

        Self {
            _dir: dir,
            socket,
            catalog,
            task,
        }
    }

    async fn client(&self) -> Client {
        Client::connect(ClientConfig::with_socket_path(&self.socket).client_id("ragman-test"))
            .await
            .unwrap()
    }
}

impl Drop for TestBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn create_request(alias: &str) -> SourceCreateRequest {
    SourceCreateRequest {
        trace_id: String::new(),
        alias: Some(alias.into()),
        source_type: "directory".into(),
        location: format!("/srv/{}", alias),
        language: Some("en".into()),
        notes: None,
        checksum: None,
    }
}

#[tokio::test]
async fn source_lifecycle_over_the_socket() {
    let backend = TestBackend::start();
    let client = backend.client().await;

    let created = client.create_source(create_request("docs")).await.unwrap();
    assert_eq!(created.source.alias, "docs");
    assert_eq!(created.source.status, SourceStatus::Pending);

    let listed = client
        .list_sources(SourceListRequest {
            trace_id: "trace-list".into(),
        })
        .await
        .unwrap();
    assert_eq!(listed.sources.len(), 1);
    assert_eq!(listed.trace_id.as_deref(), Some("trace-list"));

    let updated = client
        .update_source(
            "docs",
            SourceUpdateRequest {
                notes: Some("documentation tree".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.source.notes.as_deref(), Some("documentation tree"));

    let removed = client
        .remove_source(
            "docs",
            SourceRemoveRequest {
                trace_id: String::new(),
                reason: "superseded".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(removed.source.status, SourceStatus::Quarantined);
    assert_eq!(removed.quarantine.unwrap().reason, "superseded");
}

#[tokio::test]
async fn query_fails_until_an_index_exists_then_succeeds() {
    let backend = TestBackend::start();
    let client = backend.client().await;

    client.create_source(create_request("man")).await.unwrap();

    // No index yet: typed application error, connection stays usable
    let err = client
        .query(QueryRequest {
            question: "How do I change file permissions?".into(),
            conversation_id: None,
            max_context_tokens: 4096,
            trace_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagCliError::UnexpectedStatus { status: 503, .. }
    ));

    // Stream a reindex to completion on the same connection
    let mut stages = Vec::new();
    let final_job = client
        .start_reindex_stream(ReindexRequest::default(), |snapshot| {
            stages.push(snapshot.stage.clone());
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(final_job.status, JobStatus::Succeeded);
    assert_eq!(
        stages,
        vec!["discovering", "chunking", "embedding", "committing", "completed"]
    );

    // Index committed: the query now answers
    let response = client
        .query(QueryRequest {
            question: "How do I change file permissions?".into(),
            conversation_id: None,
            max_context_tokens: 4096,
            trace_id: Some("trace-q".into()),
        })
        .await
        .unwrap();
    assert!(response.confidence > 0.0);
    assert_eq!(response.trace_id, "trace-q");
    assert_eq!(response.references.len(), 1);
}

#[tokio::test]
async fn failed_reindex_streams_a_terminal_failed_snapshot() {
    let backend = TestBackend::start();
    let client = backend.client().await;

    client.create_source(create_request("wiki")).await.unwrap();
    backend.catalog.fail_next_reindex("embedding store offline");

    let mut snapshots = Vec::new();
    let final_job = client
        .start_reindex_stream(ReindexRequest::default(), |snapshot| {
            snapshots.push(snapshot.clone());
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(final_job.status, JobStatus::Failed);
    assert_eq!(
        final_job.error_message.as_deref(),
        Some("embedding store offline")
    );
    // Partial progress from before the failure stays visible
    assert!(final_job.documents_processed > 0);
    assert!(snapshots.len() >= 2);
}

#[tokio::test]
async fn health_endpoint_without_port_is_a_typed_error() {
    let backend = TestBackend::start();
    let client = backend.client().await;

    let err = client
        .health_check(HealthRequest {
            trace_id: "trace-h".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagCliError::UnexpectedStatus { status: 503, .. }
    ));
}

#[tokio::test]
async fn admin_init_reports_catalog_version() {
    let backend = TestBackend::start();
    let client = backend.client().await;

    let response = client
        .init_system(ragcli_client::InitRequest {
            trace_id: "trace-init".into(),
        })
        .await
        .unwrap();
    assert_eq!(response.catalog_version, 0);
    assert_eq!(response.trace_id.as_deref(), Some("trace-init"));
    assert_eq!(response.created_directories.len(), 3);
}

#[tokio::test]
async fn concurrent_clients_each_get_their_own_connection() {
    let backend = TestBackend::start();

    // Start a streaming job on one connection
    let streaming_client = backend.client().await;
    streaming_client
        .create_source(create_request("books"))
        .await
        .unwrap();

    let stream_task = tokio::spawn(async move {
        streaming_client
            .start_reindex_stream(ReindexRequest::default(), |_| Ok(()))
            .await
    });

    // A second connection is serviced while the first one streams
    let other_client = backend.client().await;
    let listed = other_client
        .list_sources(SourceListRequest {
            trace_id: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(listed.sources.len(), 1);

    let final_job = stream_task.await.unwrap().unwrap();
    assert_eq!(final_job.status, JobStatus::Succeeded);
}
