//! 데이터 계층 에러 타입.

use thiserror::Error;

/// 데이터 계층 에러.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스/스토리지 연결 실패
    #[error("연결 실패: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 실패
    #[error("쿼리 실행 실패: {0}")]
    QueryError(String),

    /// 트랜잭션 처리 실패
    #[error("트랜잭션 실패: {0}")]
    TransactionError(String),

    /// 외부 API 조회 실패
    #[error("데이터 조회 실패: {0}")]
    FetchError(String),

    /// 응답/데이터 파싱 실패
    #[error("파싱 실패: {0}")]
    ParseError(String),

    /// 잘못된 설정 (연결 문자열 등)
    #[error("설정 오류: {0}")]
    ConfigError(String),

    /// Blob Storage 요청 실패
    #[error("Blob Storage 오류 ({status}): {message}")]
    BlobError { status: u16, message: String },

    /// Parquet 직렬화 실패
    #[error("Parquet 오류: {0}")]
    ParquetError(String),

    /// 파일 입출력 실패
    #[error("I/O 오류: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        Self::QueryError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
