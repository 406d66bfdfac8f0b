//! 에러 타입 정의.

use std::fmt;

use market_analytics::IndicatorError;
use market_core::ParsePeriodError;
use market_data::DataError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 설정 에러
    Config(String),
    /// 데이터 소스 에러 (Yahoo 등)
    DataSource(String),
    /// 웨어하우스 에러 (연결, 적재, 뷰)
    Warehouse(DataError),
    /// 지표 계산 에러
    Indicator(IndicatorError),
    /// 스케줄링 에러
    Scheduling(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::DataSource(msg) => write!(f, "Data source error: {}", msg),
            Self::Warehouse(e) => write!(f, "Warehouse error: {}", e),
            Self::Indicator(e) => write!(f, "Indicator error: {}", e),
            Self::Scheduling(msg) => write!(f, "Scheduling error: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Warehouse(e) => Some(e),
            Self::Indicator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Warehouse(err)
    }
}

impl From<IndicatorError> for CollectorError {
    fn from(err: IndicatorError) -> Self {
        Self::Indicator(err)
    }
}

impl From<ParsePeriodError> for CollectorError {
    fn from(err: ParsePeriodError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
