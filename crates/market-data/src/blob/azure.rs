//! Azure Blob Storage 클라이언트.
//!
//! REST API를 SharedKey 인증으로 직접 호출합니다.
//!
//! # 연결 문자열
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=<계정>;AccountKey=<base64 키>;EndpointSuffix=core.windows.net
//! AccountName=<계정>;AccountKey=<키>;BlobEndpoint=http://127.0.0.1:10000/<계정>
//! UseDevelopmentStorage=true
//! ```

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode, Url};
use sha2::Sha256;
use tracing::{debug, info};

use super::BlobStore;
use crate::error::{DataError, Result};

type HmacSha256 = Hmac<Sha256>;

/// REST API 버전.
const API_VERSION: &str = "2021-08-06";

/// 로컬 에뮬레이터(Azurite) 기본 계정.
const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

// =============================================================================
// 연결 문자열
// =============================================================================

/// 파싱된 연결 정보.
#[derive(Clone, PartialEq, Eq)]
struct StorageAccount {
    name: String,
    key: Vec<u8>,
    blob_endpoint: String,
}

impl fmt::Debug for StorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageAccount")
            .field("name", &self.name)
            .field("key", &"***")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

fn parse_connection_string(connection_string: &str) -> Result<StorageAccount> {
    // 키 값에 '='가 포함되므로 첫 '='에서만 분리
    let fields: BTreeMap<String, String> = connection_string
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    if fields
        .get("UseDevelopmentStorage")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return Ok(StorageAccount {
            name: DEV_ACCOUNT_NAME.to_string(),
            key: decode_key(DEV_ACCOUNT_KEY)?,
            blob_endpoint: DEV_BLOB_ENDPOINT.to_string(),
        });
    }

    let name = fields
        .get("AccountName")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DataError::ConfigError("연결 문자열에 AccountName 없음".to_string()))?
        .clone();
    let key = fields
        .get("AccountKey")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DataError::ConfigError("연결 문자열에 AccountKey 없음".to_string()))
        .and_then(|k| decode_key(k))?;

    let blob_endpoint = match fields.get("BlobEndpoint") {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => {
            let protocol = fields
                .get("DefaultEndpointsProtocol")
                .map(String::as_str)
                .unwrap_or("https");
            let suffix = fields
                .get("EndpointSuffix")
                .map(String::as_str)
                .unwrap_or("core.windows.net");
            format!("{}://{}.blob.{}", protocol, name, suffix)
        }
    };

    Ok(StorageAccount {
        name,
        key,
        blob_endpoint,
    })
}

fn decode_key(key: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(key)
        .map_err(|e| DataError::ConfigError(format!("AccountKey base64 디코딩 실패: {}", e)))
}

// =============================================================================
// SharedKey 서명
// =============================================================================

/// 서명 대상 요청 정보.
struct SignedRequest<'a> {
    method: &'a Method,
    url: &'a Url,
    content_length: usize,
    content_type: Option<&'a str>,
    if_none_match: Option<&'a str>,
    /// x-ms-* 헤더 (소문자 이름)
    ms_headers: &'a BTreeMap<&'static str, String>,
}

/// SharedKey 서명 문자열.
fn string_to_sign(account: &str, request: &SignedRequest<'_>) -> String {
    let content_length = if request.content_length == 0 {
        String::new()
    } else {
        request.content_length.to_string()
    };

    let canonical_headers: String = request
        .ms_headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let mut canonical_resource = format!("/{}{}", account, request.url.path());
    let query: BTreeMap<String, String> = request
        .url
        .query_pairs()
        .map(|(k, v)| (k.to_lowercase(), v.into_owned()))
        .collect();
    for (name, value) in &query {
        canonical_resource.push_str(&format!("\n{}:{}", name, value));
    }

    [
        request.method.as_str(),
        "",                                        // Content-Encoding
        "",                                        // Content-Language
        content_length.as_str(),                   // Content-Length
        "",                                        // Content-MD5
        request.content_type.unwrap_or_default(),  // Content-Type
        "",                                        // Date
        "",                                        // If-Modified-Since
        "",                                        // If-Match
        request.if_none_match.unwrap_or_default(), // If-None-Match
        "",                                        // If-Unmodified-Since
        "",                                        // Range
    ]
    .join("\n")
        + "\n"
        + &canonical_headers
        + &canonical_resource
}

fn sign(key: &[u8], payload: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DataError::ConfigError(format!("HMAC 키 오류: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

// =============================================================================
// 클라이언트
// =============================================================================

/// Azure Blob Storage 저장소.
pub struct AzureBlobStore {
    client: Client,
    account: StorageAccount,
}

impl fmt::Debug for AzureBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobStore")
            .field("account", &self.account)
            .finish()
    }
}

impl AzureBlobStore {
    /// 연결 문자열로 생성.
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let account = parse_connection_string(connection_string)?;
        Ok(Self {
            client: Client::new(),
            account,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account.name
    }

    pub fn blob_endpoint(&self) -> &str {
        &self.account.blob_endpoint
    }

    fn resource_url(&self, path: &str, query: Option<&str>) -> Result<Url> {
        let mut raw = format!("{}/{}", self.account.blob_endpoint, path);
        if let Some(q) = query {
            raw.push('?');
            raw.push_str(q);
        }
        Url::parse(&raw).map_err(|e| DataError::ConfigError(format!("잘못된 Blob URL: {}", e)))
    }

    /// 서명된 PUT 요청 전송.
    async fn put(
        &self,
        url: Url,
        body: Vec<u8>,
        content_type: Option<&str>,
        mut ms_headers: BTreeMap<&'static str, String>,
        if_none_match: Option<&str>,
    ) -> Result<StatusCode> {
        let method = Method::PUT;
        ms_headers.insert(
            "x-ms-date",
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
        ms_headers.insert("x-ms-version", API_VERSION.to_string());

        let payload = string_to_sign(
            &self.account.name,
            &SignedRequest {
                method: &method,
                url: &url,
                content_length: body.len(),
                content_type,
                if_none_match,
                ms_headers: &ms_headers,
            },
        );
        let signature = sign(&self.account.key, &payload)?;

        let mut builder = self
            .client
            .request(method, url)
            .header(
                "Authorization",
                format!("SharedKey {}:{}", self.account.name, signature),
            );
        for (name, value) in &ms_headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(ct) = content_type {
            builder = builder.header("Content-Type", ct);
        }
        if let Some(etag) = if_none_match {
            builder = builder.header("If-None-Match", etag);
        }

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| DataError::ConnectionError(format!("Blob Storage 요청 실패: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(status);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(DataError::BlobError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn describe(&self) -> String {
        format!("azure://{}", self.account.blob_endpoint)
    }

    async fn ensure_container(&self, container: &str) -> Result<()> {
        let url = self.resource_url(container, Some("restype=container"))?;

        match self.put(url, Vec::new(), None, BTreeMap::new(), None).await {
            Ok(_) => {
                info!(container = container, "Blob 컨테이너 생성");
                Ok(())
            }
            // ContainerAlreadyExists
            Err(DataError::BlobError { status: 409, .. }) => {
                debug!(container = container, "Blob 컨테이너 이미 존재");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn write_blob(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<()> {
        let url = self.resource_url(&format!("{}/{}", container, name), None)?;
        let mut ms_headers = BTreeMap::new();
        ms_headers.insert("x-ms-blob-type", "BlockBlob".to_string());

        let size = bytes.len();
        let if_none_match = if overwrite { None } else { Some("*") };
        self.put(
            url,
            bytes,
            Some("application/octet-stream"),
            ms_headers,
            if_none_match,
        )
        .await?;

        debug!(container = container, blob = name, bytes = size, "Blob 업로드");
        Ok(())
    }
}
