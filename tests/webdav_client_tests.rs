use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use davstore::{StorageDriver, StorageError, TimelineStore, WebDAVClient, WebDAVConfig};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("davstore=debug")
        .try_init();
}

fn authed_client(entry: &str) -> WebDAVClient {
    let mut client = WebDAVClient::new(WebDAVConfig::new(entry)).expect("valid config");
    client.auth("testuser", "testpass");
    client
}

/// Timeline collaborator that records every upload it is told about.
#[derive(Default)]
struct RecordingStore {
    recorded: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl TimelineStore for RecordingStore {
    async fn last_timeline(&self, _backend: &str, _name: &str) -> String {
        String::new()
    }

    async fn last_timeline_map(&self, _backend: &str) -> HashMap<String, i64> {
        HashMap::new()
    }

    async fn set_last_timeline(&self, backend: &str, name: &str) {
        self.recorded
            .lock()
            .unwrap()
            .push((backend.to_string(), name.to_string()));
    }
}

#[tokio::test]
async fn test_get_data_returns_body_on_200() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/policies/policy.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"[1,2,3]".to_vec()))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    let body = client.get_data("policies/policy.json").await.unwrap();
    assert_eq!(body, b"[1,2,3]");
}

#[tokio::test]
async fn test_get_data_reports_unexpected_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    let err = client.get_data("missing.json").await.unwrap_err();
    match err {
        StorageError::UnexpectedStatus { method, status, .. } => {
            assert_eq!(method, "GET");
            assert!(status.contains("404"));
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_data_operations_require_auth_and_send_nothing() {
    let server = MockServer::start().await;
    let client = WebDAVClient::new(WebDAVConfig::new(server.uri())).unwrap();

    assert!(matches!(
        client.get_data("a.txt").await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        client.get_stat("a.txt").await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        client.list("").await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        client.update_data(b"x".to_vec(), "a.txt").await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        client.delete("a.txt").await,
        Err(StorageError::Unauthenticated)
    ));
    assert!(matches!(
        client.update(Path::new("a.txt"), "a.txt").await,
        Err(StorageError::Unauthenticated)
    ));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_stat_prefers_response_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notes.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"hello".to_vec(), "text/plain"))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    let (body, content_type) = client.get_stat("notes.txt").await.unwrap();
    assert_eq!(body, b"hello");
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_list_sends_depth_one_and_parses_entries() {
    let server = MockServer::start().await;

    let multistatus = r#"<?xml version="1.0"?>
    <d:multistatus xmlns:d="DAV:">
        <d:response>
            <d:href>/dav/notes/</d:href>
            <d:propstat>
                <d:prop>
                    <d:displayname>notes</d:displayname>
                    <d:resourcetype><d:collection/></d:resourcetype>
                </d:prop>
                <d:status>HTTP/1.1 200 OK</d:status>
            </d:propstat>
        </d:response>
        <d:response>
            <d:href>/dav/notes/a.md</d:href>
            <d:propstat>
                <d:prop>
                    <d:displayname>a.md</d:displayname>
                    <d:getcontentlength>42</d:getcontentlength>
                    <d:getcontenttype>text/markdown</d:getcontenttype>
                    <d:resourcetype/>
                </d:prop>
                <d:status>HTTP/1.1 200 OK</d:status>
            </d:propstat>
        </d:response>
    </d:multistatus>"#;

    Mock::given(method("PROPFIND"))
        .and(path("/notes"))
        .and(header("Depth", "1"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(multistatus.as_bytes().to_vec(), "application/xml"))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    let entries = client.list("notes").await.unwrap();

    assert_eq!(entries.len(), 2);
    assert!(entries[0].is_collection);
    assert_eq!(entries[1].name, "a.md");
    assert_eq!(entries[1].content_length, 42);
}

#[tokio::test]
async fn test_list_empty_multistatus_is_not_an_error() {
    let server = MockServer::start().await;

    let empty = r#"<?xml version="1.0"?><d:multistatus xmlns:d="DAV:"></d:multistatus>"#;
    Mock::given(method("PROPFIND"))
        .respond_with(ResponseTemplate::new(207).set_body_raw(empty.as_bytes().to_vec(), "application/xml"))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    let entries = client.list("").await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_delete_rejects_empty_path_before_send() {
    let server = MockServer::start().await;
    let client = authed_client(&server.uri());

    assert!(matches!(
        client.delete("").await,
        Err(StorageError::InvalidPath)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_accepts_200_and_204() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/old.json"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/older.json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/locked.json"))
        .respond_with(ResponseTemplate::new(423))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    client.delete("old.json").await.unwrap();
    client.delete("older.json").await.unwrap();

    let err = client.delete("locked.json").await.unwrap_err();
    match err {
        StorageError::UnexpectedStatus { method, status, .. } => {
            assert_eq!(method, "DELETE");
            assert!(status.contains("423"));
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_data_provisions_ancestors_root_to_leaf() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    client
        .update_data(b"content".to_vec(), "a/b/c/file.txt")
        .await
        .unwrap();

    let calls: Vec<(String, String)> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| (request.method.to_string(), request.url.path().to_string()))
        .collect();

    assert_eq!(
        calls,
        vec![
            ("MKCOL".to_string(), "/a".to_string()),
            ("MKCOL".to_string(), "/a/b".to_string()),
            ("MKCOL".to_string(), "/a/b/c".to_string()),
            ("PUT".to_string(), "/a/b/c/file.txt".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_update_data_fails_fast_on_mkcol_rejection() {
    let server = MockServer::start().await;

    Mock::given(method("MKCOL"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = authed_client(&server.uri());
    let err = client
        .update_data(b"content".to_vec(), "a/b/file.txt")
        .await
        .unwrap_err();

    match err {
        StorageError::UnexpectedStatus { method, path, .. } => {
            assert_eq!(method, "MKCOL");
            assert_eq!(path, "a");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }

    // The PUT never goes out once an ancestor fails.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_skips_ignored_paths_without_network() {
    let server = MockServer::start().await;

    let mut client = authed_client(&server.uri());
    client.set_ignore(&["local/skip.md".to_string()]);

    client
        .update(Path::new("local/skip.md"), "remote/skip.md")
        .await
        .unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_uploads_file_and_records_timeline() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/report.txt"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let local = dir.path().join("report.txt");
    std::fs::write(&local, b"quarterly numbers")?;

    let store = Arc::new(RecordingStore::default());
    let client = authed_client(&server.uri())
        .with_timelines("webdav", Arc::clone(&store) as Arc<dyn TimelineStore>);

    client.update(&local, "report.txt").await?;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, b"quarterly numbers");

    let recorded = store.recorded.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].0, "webdav");
    assert_eq!(recorded[0].1, local.to_string_lossy());
    Ok(())
}

#[tokio::test]
async fn test_update_rejects_empty_remote_path() {
    let server = MockServer::start().await;
    let client = authed_client(&server.uri());

    assert!(matches!(
        client.update(Path::new("a.txt"), "").await,
        Err(StorageError::InvalidPath)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_timeline_reads_without_collaborator_are_empty() {
    let server = MockServer::start().await;
    let client = authed_client(&server.uri());

    assert_eq!(client.last_timeline("anything").await, "");
    assert!(client.last_timeline_map().await.is_empty());
}
