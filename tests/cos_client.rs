use ibmcloud_ops::cos::{CosClient, CosConfig, CosError, TkeWorkspace, transfer};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GUID: &str = "11111111-2222-3333-4444-555555555555";

fn config(server: &MockServer) -> CosConfig {
    CosConfig {
        api_key: "test_api_key".to_string(),
        service_instance: "crn:v1:bluemix:public:cloud-object-storage:global:a/1::".to_string(),
        endpoint: server.uri(),
        bucket: "tke-files".to_string(),
        iam_endpoint: server.uri(),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey",
        ))
        .and(body_string_contains("apikey=test_api_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "iam_token_abc",
            "refresh_token": "not_supported",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_object_sends_bearer_token() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/tke-files/ceremony.json"))
        .and(header("authorization", "Bearer iam_token_abc"))
        .and(header(
            "ibm-service-instance-id",
            "crn:v1:bluemix:public:cloud-object-storage:global:a/1::",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"admin_name\":\"a\"}".to_vec()))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let body = client.get_object("ceremony.json").await.unwrap();
    assert_eq!(body, b"{\"admin_name\":\"a\"}");
}

#[tokio::test]
async fn test_token_is_requested_once() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/tke-files/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("a"))
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/tke-files/b.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    client.get_object("a.txt").await.unwrap();
    client.put_object("b.txt", b"b".to_vec()).await.unwrap();
}

#[tokio::test]
async fn test_get_missing_object_is_not_found() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/tke-files/missing.zip"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message></Error>",
        ))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let result = client.get_object("missing.zip").await;
    match result {
        Err(CosError::NotFound { key }) => assert_eq!(key, "missing.zip"),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_download_missing_object_returns_none() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/tke-files/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let result = transfer::download(&client, "missing.zip", dir.path()).await;

    assert!(result.is_none());
    assert!(!dir.path().join("missing.zip").exists());
}

#[tokio::test]
async fn test_put_object_error_surfaces_code() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path("/tke-files/x.zip"))
        .respond_with(ResponseTemplate::new(403).set_body_string(
            "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
        ))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let err = client.put_object("x.zip", b"x".to_vec()).await.unwrap_err();
    assert_eq!(err.to_string(), "API error (403): AccessDenied: Access Denied");
}

#[tokio::test]
async fn test_invalid_api_key_is_auth_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errorCode": "BXNIM0415E",
            "errorMessage": "Provided API key could not be found."
        })))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let err = client.get_object("x.zip").await.unwrap_err();

    assert!(matches!(err, CosError::Auth { .. }));
    assert!(err.to_string().contains("Provided API key could not be found."));
    assert!(!err.to_string().contains("test_api_key"));
}

#[tokio::test]
async fn test_upload_removes_local_file_after_success() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path("/tke-files/report.txt"))
        .and(header("authorization", "Bearer iam_token_abc"))
        .and(body_string_contains("ceremony complete"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("report.txt");
    std::fs::write(&local, "ceremony complete").unwrap();

    assert!(transfer::upload(&client, &local, "report.txt").await);
    assert!(!local.exists());
}

#[tokio::test]
async fn test_upload_keeps_local_file_after_failure() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path("/tke-files/report.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("report.txt");
    std::fs::write(&local, "ceremony complete").unwrap();

    assert!(!transfer::upload(&client, &local, "report.txt").await);
    assert!(local.exists());
}

#[tokio::test]
async fn test_workspace_restore_without_archive() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("GET"))
        .and(path(format!("/tke-files/{}_tkefiles.zip", GUID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let root = tempfile::tempdir().unwrap();
    let workspace = TkeWorkspace::new(root.path(), GUID);

    assert!(!workspace.restore(&client).await.unwrap());
    assert!(workspace.dir().is_dir());
}

#[tokio::test]
async fn test_workspace_publish_uploads_archive() {
    let mock_server = MockServer::start().await;
    mount_token(&mock_server).await;

    Mock::given(method("PUT"))
        .and(path(format!("/tke-files/{}_tkefiles.zip", GUID)))
        .and(header("content-type", "application/octet-stream"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CosClient::new(&config(&mock_server)).unwrap();
    let root = tempfile::tempdir().unwrap();
    let workspace = TkeWorkspace::new(root.path(), GUID);
    std::fs::create_dir_all(workspace.dir()).unwrap();
    std::fs::write(workspace.dir().join("1.sigkey"), b"sig").unwrap();

    assert!(workspace.publish(&client).await.unwrap());
    assert!(!workspace.archive_path().exists());
}
