use fpr_sync::client::SscHttpClient;
use fpr_sync_core::config::{Credential, ServiceConfig};
use fpr_sync_core::contract::{CommitState, SscClient};
use fpr_sync_core::SyncError;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH: &str = "FortifyToken tok-123";

fn service(server: &MockServer) -> ServiceConfig {
    ServiceConfig {
        base_url: format!("{}/", server.uri()),
        timeout_secs: 5,
        connect_timeout_secs: 5,
        page_size: 200,
        auth_scheme: "FortifyToken".to_string(),
    }
}

async fn connected(server: &MockServer) -> SscHttpClient {
    SscHttpClient::connect(&service(server), &Credential::Token("tok-123".into()))
        .await
        .expect("token credential needs no network")
}

#[tokio::test]
async fn find_applications_keeps_exact_name_matches_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .and(query_param("q", "name:\"AppX\""))
        .and(header("Authorization", AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1, "name": "AppX"}, {"id": 2, "name": "AppX-legacy"}],
            "count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let found = client.find_applications("AppX").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, 1);
}

#[tokio::test]
async fn create_application_posts_name_and_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projects"))
        .and(body_json(json!({"name": "AppX", "description": "made by test"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"id": 9, "name": "AppX"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let app = client
        .create_application("AppX", "made by test")
        .await
        .unwrap();

    assert_eq!(app.id, 9);
    assert_eq!(app.name, "AppX");
}

#[tokio::test]
async fn listing_follows_pages_until_count_is_reached() {
    let server = MockServer::start().await;
    let mut config = service(&server);
    config.page_size = 2;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .and(query_param("start", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}],
            "count": 3
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .and(query_param("start", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 3, "name": "C"}],
            "count": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SscHttpClient::connect(&config, &Credential::Token("tok-123".into()))
        .await
        .unwrap();
    let all = client.list_applications().await.unwrap();

    let names: Vec<_> = all.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn versions_inherit_the_requested_application_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects/4/versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 40, "name": "1.0", "committed": true}],
            "count": 1
        })))
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let versions = client.list_versions(4).await.unwrap();

    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].application_id, 4);
    assert_eq!(versions[0].commit_state, CommitState::Committed);
}

#[tokio::test]
async fn success_body_missing_fields_is_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"name": "no id"}]})))
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let err = client.list_applications().await.unwrap_err();

    assert!(
        matches!(err, SyncError::MalformedResponse { .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn error_status_is_reported_with_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projectVersions/5"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let err = client.commit_version(5).await.unwrap_err();

    assert!(matches!(err, SyncError::Status { status: 409, .. }), "got {err:?}");
}

#[tokio::test]
async fn commit_sends_committed_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projectVersions/5"))
        .and(body_json(json!({"committed": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = connected(&server).await;
    client.commit_version(5).await.unwrap();
}

#[tokio::test]
async fn pending_versions_carry_parent_application() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projectVersions"))
        .and(query_param("q", "committed:false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 11, "name": "2.0", "committed": false, "project": {"id": 3, "name": "AppZ"}}],
            "count": 1
        })))
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let pending = client.list_pending_versions().await.unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].application_id, 3);
    assert_eq!(pending[0].application_name.as_deref(), Some("AppZ"));
    assert_eq!(pending[0].commit_state, CommitState::FinishLater);
}

#[tokio::test]
async fn password_credential_is_exchanged_for_a_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tokens"))
        .and(header("Authorization", "Basic c3ZjOnB3"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"data": {"token": "tok-123"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .and(header("Authorization", AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "count": 0})))
        .expect(2)
        .mount(&server)
        .await;

    let credential = Credential::Password {
        username: "svc".into(),
        password: "pw".into(),
    };
    let client = SscHttpClient::connect(&service(&server), &credential)
        .await
        .unwrap();
    assert!(client.list_applications().await.unwrap().is_empty());
    assert!(client.list_applications().await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_password_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tokens"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let credential = Credential::Password {
        username: "svc".into(),
        password: "wrong".into(),
    };
    let err = SscHttpClient::connect(&service(&server), &credential)
        .await
        .err()
        .expect("connect must fail");

    assert!(matches!(err, SyncError::Auth(_)), "got {err:?}");
    assert!(err.is_fatal());
}

#[tokio::test]
async fn download_streams_the_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/download/currentStateFprDownload.html"))
        .and(query_param("id", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"FPR-CONTENT".to_vec()))
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let mut stream = client.download_artifact(40).await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend(chunk.unwrap());
    }

    assert_eq!(body, b"FPR-CONTENT");
}

#[tokio::test]
async fn upload_sends_file_as_multipart_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projectVersions/7/artifacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("AppX;1.0.fpr");
    std::fs::write(&file, b"SCAN-RESULTS").unwrap();

    let client = connected(&server).await;
    client.upload_artifact(7, &file).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("SCAN-RESULTS"));
}

#[tokio::test]
async fn large_upload_is_sent_with_exact_length() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/projectVersions/8/artifacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("AppX;2.0.fpr");
    let contents: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    std::fs::write(&file, &contents).unwrap();

    let client = connected(&server).await;
    client.upload_artifact(8, &file).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let declared: usize = request
        .headers
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("multipart body with known length");
    assert_eq!(declared, request.body.len());
    assert!(request
        .body
        .windows(contents.len())
        .any(|window| window == contents.as_slice()));
}

#[tokio::test]
async fn upload_of_missing_file_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = connected(&server).await;
    let err = client
        .upload_artifact(8, std::path::Path::new("/nonexistent/AppX;1.0.fpr"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Io { .. }), "got {err:?}");
}

#[tokio::test]
async fn stalled_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/projects"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": [], "count": 0}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let mut config = service(&server);
    config.timeout_secs = 1;

    let client = SscHttpClient::connect(&config, &Credential::Token("tok-123".into()))
        .await
        .unwrap();
    let err = client.list_applications().await.unwrap_err();

    assert!(matches!(err, SyncError::Transport { .. }), "got {err:?}");
}
