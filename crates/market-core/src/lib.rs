//! 시장 데이터 ETL 공통 도메인 타입.
//!
//! 수집(Extract), 지표 계산(Transform), 적재(Load) 단계가 공유하는
//! 일봉 타입과 데이터 소스 trait를 정의합니다.

pub mod bar;
pub mod period;
pub mod source;

pub use bar::{EnrichedBar, PriceHistory, RawBar};
pub use period::{HistoryPeriod, ParsePeriodError};
pub use source::{HistorySource, SourceError};
