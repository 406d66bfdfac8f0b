//! 시장 데이터 소스 trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::bar::RawBar;
use crate::period::HistoryPeriod;

// =============================================================================
// 에러 타입
// =============================================================================

/// 데이터 소스 에러.
///
/// 종목 단위로 발생하며, 호출 측은 해당 종목만 제외하고 계속 진행합니다.
#[derive(Debug, Error)]
pub enum SourceError {
    /// 데이터 소스 연결 실패
    #[error("데이터 소스 연결 실패: {0}")]
    Connection(String),

    /// 조회 요청 실패
    #[error("시세 조회 실패 ({symbol}): {message}")]
    Fetch { symbol: String, message: String },

    /// 응답 파싱 실패
    #[error("응답 파싱 실패 ({symbol}): {message}")]
    Parse { symbol: String, message: String },
}

// =============================================================================
// HistorySource Trait
// =============================================================================

/// 일봉 히스토리 제공자 trait.
///
/// # 구현 예시
///
/// ```ignore
/// pub struct YahooHistoryProvider {
///     connector: YahooConnector,
/// }
///
/// #[async_trait]
/// impl HistorySource for YahooHistoryProvider {
///     async fn fetch_history(&self, symbol: &str, period: HistoryPeriod)
///         -> Result<Vec<RawBar>, SourceError> {
///         // Yahoo Finance 호출 및 변환
///     }
///
///     fn source_name(&self) -> &str { "Yahoo Finance" }
/// }
/// ```
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// 종목의 일봉 히스토리 조회.
    ///
    /// 데이터가 없으면 빈 Vec을 반환합니다 (에러 아님).
    ///
    /// # Errors
    ///
    /// - `SourceError::Connection`: 소스 연결 실패
    /// - `SourceError::Fetch`: 요청 실패 (존재하지 않는 심볼 포함)
    /// - `SourceError::Parse`: 응답 파싱 실패
    async fn fetch_history(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<RawBar>, SourceError>;

    /// 데이터 소스 이름 (로깅용).
    fn source_name(&self) -> &str;
}
