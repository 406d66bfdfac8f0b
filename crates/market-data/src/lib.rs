//! 시장 데이터 입출력 계층.
//!
//! - [`provider`]: 일봉 히스토리 데이터 소스 (Yahoo Finance)
//! - [`storage`]: 웨어하우스 스키마, 세션, 스테이징 → 병합 upsert, 분석 뷰
//! - [`blob`]: 오브젝트 스토리지 (Azure Blob Storage, 로컬 디렉터리)
//! - [`export`]: Parquet 직렬화

pub mod blob;
pub mod error;
pub mod export;
pub mod provider;
pub mod storage;

pub use blob::{connect_blob_store, AzureBlobStore, BlobStore, LocalBlobStore};
pub use error::{DataError, Result};
pub use export::{bars_to_dataframe, write_parquet_bytes};
pub use provider::YahooHistoryProvider;
pub use storage::{
    refresh_views, Dialect, SqlValue, TableSchema, UpsertOutcome, WarehouseSession,
    WarehouseTarget, WarehouseUpserter, MARKET_DATA_SCHEMA,
};
