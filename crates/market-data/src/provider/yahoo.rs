//! Yahoo Finance 일봉 히스토리 제공자.
//!
//! `range` 파라미터로 조회 기간을 지정하고 `1d` 간격 시세를 받아
//! 배당/분할 이벤트를 거래일 기준으로 합칩니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use market_core::{HistoryPeriod, HistorySource, RawBar, SourceError};
use tracing::debug;
use yahoo_finance_api as yahoo;

use crate::error::{DataError, Result};

/// 일봉 간격.
const DAILY_INTERVAL: &str = "1d";

/// 응답에서 추출한 시세 한 행.
#[derive(Debug, Clone, Copy)]
struct QuoteRow {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// Yahoo Finance 히스토리 제공자.
pub struct YahooHistoryProvider {
    connector: yahoo::YahooConnector,
}

impl YahooHistoryProvider {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl HistorySource for YahooHistoryProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> std::result::Result<Vec<RawBar>, SourceError> {
        debug!(
            symbol = symbol,
            range = period.as_str(),
            "Yahoo Finance API 호출"
        );

        let response = self
            .connector
            .get_quote_range(symbol, DAILY_INTERVAL, period.as_str())
            .await
            .map_err(|e| SourceError::Fetch {
                symbol: symbol.to_string(),
                message: e.to_string(),
            })?;

        let quotes = response.quotes().map_err(|e| SourceError::Parse {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })?;

        let rows: Vec<QuoteRow> = quotes
            .iter()
            .map(|q| QuoteRow {
                timestamp: q.timestamp as i64,
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                volume: q.volume,
            })
            .collect();

        // 이벤트가 없는 종목은 응답에 events 필드가 없음
        let dividends: Vec<(i64, f64)> = response
            .dividends()
            .unwrap_or_default()
            .iter()
            .map(|d| (d.date as i64, d.amount))
            .collect();
        let splits: Vec<(i64, f64)> = response
            .splits()
            .unwrap_or_default()
            .iter()
            .filter(|s| s.denominator as f64 != 0.0)
            .map(|s| (s.date as i64, s.numerator as f64 / s.denominator as f64))
            .collect();

        Ok(build_bars(symbol, &rows, &dividends, &splits))
    }

    fn source_name(&self) -> &str {
        "Yahoo Finance"
    }
}

fn trading_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

fn finite(value: f64) -> Option<f64> {
    Some(value).filter(|v| v.is_finite())
}

/// 시세 행과 이벤트를 일봉으로 변환.
///
/// 이벤트가 없는 거래일의 배당/분할은 0입니다.
fn build_bars(
    symbol: &str,
    rows: &[QuoteRow],
    dividends: &[(i64, f64)],
    splits: &[(i64, f64)],
) -> Vec<RawBar> {
    let by_date = |events: &[(i64, f64)]| -> HashMap<NaiveDate, f64> {
        events
            .iter()
            .filter_map(|(ts, value)| trading_date(*ts).map(|d| (d, *value)))
            .collect()
    };
    let dividend_by_date = by_date(dividends);
    let split_by_date = by_date(splits);

    rows.iter()
        .filter_map(|row| {
            let date = trading_date(row.timestamp)?;
            let mut bar = RawBar::daily(symbol, date, 0.0, 0.0, 0.0, 0.0, 0);
            bar.open = finite(row.open);
            bar.high = finite(row.high);
            bar.low = finite(row.low);
            bar.close = finite(row.close);
            bar.volume = i64::try_from(row.volume).ok();
            bar.dividends = Some(dividend_by_date.get(&date).copied().unwrap_or(0.0));
            bar.stock_splits = Some(split_by_date.get(&date).copied().unwrap_or(0.0));
            Some(bar)
        })
        .collect()
}
