//! 일봉 히스토리 데이터 소스.

pub mod yahoo;

pub use yahoo::YahooHistoryProvider;
