//! Blob 저장소 통합 테스트.
//!
//! ## 테스트 검증 항목
//!
//! - Azure: 컨테이너 생성 (201) 및 이미 존재 (409) 처리
//! - Azure: BlockBlob 업로드 요청 헤더와 SharedKey 인증
//! - Azure: 덮어쓰기 금지 시 If-None-Match 전송 및 충돌 에러
//! - 로컬: 컨테이너 디렉터리 생성, 파일 저장, 덮어쓰기 금지

use market_data::{connect_blob_store, AzureBlobStore, BlobStore, DataError, LocalBlobStore};
use mockito::Matcher;

// =============================================================================
// 테스트 헬퍼 함수
// =============================================================================

// base64("secret-key")
const TEST_KEY: &str = "c2VjcmV0LWtleQ==";

fn azure_store(server: &mockito::Server) -> AzureBlobStore {
    AzureBlobStore::from_connection_string(&format!(
        "AccountName=testacct;AccountKey={};BlobEndpoint={}",
        TEST_KEY,
        server.url()
    ))
    .unwrap()
}

// =============================================================================
// Azure
// =============================================================================

#[tokio::test]
async fn test_azure_create_container() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/market-data")
        .match_query(Matcher::UrlEncoded("restype".into(), "container".into()))
        .match_header("x-ms-version", "2021-08-06")
        .match_header("x-ms-date", Matcher::Regex(r"GMT$".into()))
        .match_header(
            "authorization",
            Matcher::Regex(r"^SharedKey testacct:[A-Za-z0-9+/]+=*$".into()),
        )
        .with_status(201)
        .create_async()
        .await;

    azure_store(&server)
        .ensure_container("market-data")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_azure_existing_container_is_ok() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/market-data")
        .match_query(Matcher::UrlEncoded("restype".into(), "container".into()))
        .with_status(409)
        .with_body("ContainerAlreadyExists")
        .create_async()
        .await;

    azure_store(&server)
        .ensure_container("market-data")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_azure_container_failure_propagates() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("PUT", "/market-data")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body("AuthenticationFailed")
        .create_async()
        .await;

    let err = azure_store(&server)
        .ensure_container("market-data")
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::BlobError { status: 403, .. }));
}

#[tokio::test]
async fn test_azure_upload_blob() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/market-data/market_data_20240105_093000.parquet")
        .match_header("x-ms-blob-type", "BlockBlob")
        .match_header("content-type", "application/octet-stream")
        .match_header("if-none-match", Matcher::Missing)
        .match_header("authorization", Matcher::Regex(r"^SharedKey testacct:".into()))
        .match_body(b"PAR1-bytes".to_vec())
        .with_status(201)
        .create_async()
        .await;

    azure_store(&server)
        .write_blob(
            "market-data",
            "market_data_20240105_093000.parquet",
            b"PAR1-bytes".to_vec(),
            true,
        )
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_azure_upload_without_overwrite() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/market-data/existing.parquet")
        .match_header("if-none-match", "*")
        .with_status(409)
        .with_body("BlobAlreadyExists")
        .create_async()
        .await;

    let err = azure_store(&server)
        .write_blob("market-data", "existing.parquet", vec![1, 2, 3], false)
        .await
        .unwrap_err();

    mock.assert_async().await;
    match err {
        DataError::BlobError { status, message } => {
            assert_eq!(status, 409);
            assert!(message.contains("BlobAlreadyExists"));
        }
        other => panic!("예상하지 못한 에러: {other}"),
    }
}

// =============================================================================
// 로컬 디렉터리
// =============================================================================

#[tokio::test]
async fn test_local_store_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());

    store.ensure_container("market-data").await.unwrap();
    // 두 번 호출해도 성공
    store.ensure_container("market-data").await.unwrap();
    store
        .write_blob("market-data", "a.parquet", b"hello".to_vec(), true)
        .await
        .unwrap();

    let written = std::fs::read(dir.path().join("market-data").join("a.parquet")).unwrap();
    assert_eq!(written, b"hello");

    // 덮어쓰기 허용
    store
        .write_blob("market-data", "a.parquet", b"world".to_vec(), true)
        .await
        .unwrap();
    let written = std::fs::read(store.blob_path("market-data", "a.parquet")).unwrap();
    assert_eq!(written, b"world");
}

#[tokio::test]
async fn test_local_store_refuses_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalBlobStore::new(dir.path());
    store.ensure_container("c").await.unwrap();
    store
        .write_blob("c", "x.parquet", vec![1], false)
        .await
        .unwrap();

    let err = store
        .write_blob("c", "x.parquet", vec![2], false)
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::BlobError { status: 409, .. }));
}

#[tokio::test]
async fn test_connect_file_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = connect_blob_store(&format!("file://{}", dir.path().display()))
        .unwrap()
        .unwrap();

    store.ensure_container("mirror").await.unwrap();
    store
        .write_blob("mirror", "b.parquet", vec![9], true)
        .await
        .unwrap();

    assert!(dir.path().join("mirror").join("b.parquet").exists());
}
