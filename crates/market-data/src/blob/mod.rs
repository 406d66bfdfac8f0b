//! 오브젝트 스토리지.
//!
//! 연결 문자열 형식에 따라 저장소를 선택합니다.
//!
//! - 빈 문자열: 미구성 (미러링 비활성)
//! - `file://<디렉터리>`: 로컬 디렉터리 ([`LocalBlobStore`])
//! - 그 외: Azure Storage 연결 문자열 ([`AzureBlobStore`])

pub mod azure;
pub mod local;

use async_trait::async_trait;

pub use azure::AzureBlobStore;
pub use local::LocalBlobStore;

use crate::error::Result;

/// Blob 저장소 trait.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 로그용 설명 (비밀 정보 제외).
    fn describe(&self) -> String;

    /// 컨테이너가 없으면 생성. 이미 있으면 성공으로 처리합니다.
    async fn ensure_container(&self, container: &str) -> Result<()>;

    /// Blob 쓰기.
    ///
    /// `overwrite`가 false이고 같은 이름이 이미 있으면 에러를 반환합니다.
    async fn write_blob(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        overwrite: bool,
    ) -> Result<()>;
}

/// 연결 문자열로 저장소 생성.
///
/// 빈 문자열(공백 포함)은 `None`을 반환합니다.
pub fn connect_blob_store(connection_string: &str) -> Result<Option<Box<dyn BlobStore>>> {
    let connection_string = connection_string.trim();
    if connection_string.is_empty() {
        return Ok(None);
    }

    if let Some(root) = connection_string.strip_prefix("file://") {
        return Ok(Some(Box::new(LocalBlobStore::new(root))));
    }

    Ok(Some(Box::new(AzureBlobStore::from_connection_string(
        connection_string,
    )?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_blob_store_selection() {
        assert!(connect_blob_store("").unwrap().is_none());
        assert!(connect_blob_store("   ").unwrap().is_none());

        let local = connect_blob_store("file:///tmp/mirror").unwrap().unwrap();
        assert!(local.describe().starts_with("file://"));

        let azure = connect_blob_store("UseDevelopmentStorage=true")
            .unwrap()
            .unwrap();
        assert!(azure.describe().contains("devstoreaccount1"));

        assert!(connect_blob_store("AccountName=onlyname").is_err());
    }
}
