//! 일봉 기술 지표 계산.
//!
//! 종목별 날짜순 시계열에서 수익률, 변동성, 이동평균, 변동폭을 계산합니다.
//!
//! # 사용 예시
//!
//! ```ignore
//! use market_analytics::{IndicatorConfig, IndicatorEngine};
//!
//! let engine = IndicatorEngine::with_config(IndicatorConfig::default())?;
//! let output = engine.enrich(&history);
//! println!("{}행 변환, {}행 제거", output.bars.len(), output.dropped);
//! ```

pub mod enrich;
pub mod indicators;

pub use enrich::{EnrichOutput, IndicatorConfig};
pub use indicators::{IndicatorEngine, IndicatorError, IndicatorResult, SmaParams, StdDevParams};
