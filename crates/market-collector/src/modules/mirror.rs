//! 오브젝트 스토리지 미러링.
//!
//! 지표 계산된 데이터셋 전체를 Parquet 하나로 내보냅니다.
//! 미러링은 부가 기능이므로 모든 실패는 로그만 남기고 파이프라인은 계속됩니다.

use chrono::NaiveDateTime;
use market_core::EnrichedBar;
use market_data::{connect_blob_store, write_parquet_bytes, BlobStore};
use tracing::{error, info};

/// 미러 Blob 이름 (`market_data_YYYYMMDD_HHMMSS.parquet`).
pub fn blob_name(timestamp: NaiveDateTime) -> String {
    format!("market_data_{}.parquet", timestamp.format("%Y%m%d_%H%M%S"))
}

/// 데이터셋을 Blob으로 미러링.
///
/// 저장소가 없거나 실패하면 `None`, 성공하면 Blob 이름을 반환합니다.
pub async fn mirror_dataset(
    store: Option<&dyn BlobStore>,
    container: &str,
    bars: &[EnrichedBar],
    timestamp: NaiveDateTime,
) -> Option<String> {
    let Some(store) = store else {
        info!("오브젝트 스토리지 미구성 - 미러링 건너뜀");
        return None;
    };

    let name = blob_name(timestamp);
    match upload(store, container, &name, bars).await {
        Ok(size) => {
            info!(
                destination = %store.describe(),
                container = container,
                blob = %name,
                rows = bars.len(),
                bytes = size,
                "Parquet 미러링 완료"
            );
            Some(name)
        }
        Err(e) => {
            error!(
                destination = %store.describe(),
                container = container,
                error = %e,
                "Parquet 미러링 실패"
            );
            None
        }
    }
}

/// 연결 문자열로 저장소에 연결한 뒤 미러링.
///
/// 연결 문자열이 잘못되어도 에러를 남기고 `None`을 반환합니다.
pub async fn mirror_to_connection(
    connection_string: &str,
    container: &str,
    bars: &[EnrichedBar],
    timestamp: NaiveDateTime,
) -> Option<String> {
    let store = match connect_blob_store(connection_string) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "오브젝트 스토리지 연결 실패 - 미러링 건너뜀");
            return None;
        }
    };
    mirror_dataset(store.as_deref(), container, bars, timestamp).await
}

async fn upload(
    store: &dyn BlobStore,
    container: &str,
    name: &str,
    bars: &[EnrichedBar],
) -> market_data::Result<usize> {
    store.ensure_container(container).await?;
    let bytes = write_parquet_bytes(bars)?;
    let size = bytes.len();
    store.write_blob(container, name, bytes, true).await?;
    Ok(size)
}
