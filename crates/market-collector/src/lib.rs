//! 일봉 시장 데이터 ETL 수집기.
//!
//! 설정된 종목의 일봉 히스토리를 수집하고 기술 지표를 계산한 뒤
//! 웨어하우스에 (종목, 거래일) 기준으로 upsert 합니다.
//! 오브젝트 스토리지가 구성되어 있으면 결과를 Parquet으로 미러링합니다.

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::{
    DaemonConfig, ExtractConfig, LoadConfig, MirrorConfig, PipelineConfig, SchedulingConfig,
    WarehouseConfig, DEFAULT_SYMBOLS,
};
pub use error::{CollectorError, Result};
pub use modules::{Pipeline, Scheduler};
pub use stats::{ExtractStats, PipelineReport, RunStatus};
