//! 일봉 도메인 타입.
//!
//! - [`RawBar`]: 데이터 소스에서 받은 원본 일봉
//! - [`EnrichedBar`]: 기술 지표가 추가된 일봉
//! - [`PriceHistory`]: 종목별 시계열 묶음 (1회 수집 결과)

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

// =============================================================================
// RawBar
// =============================================================================

/// 데이터 소스에서 받은 원본 일봉.
///
/// 가격/거래량은 소스 응답에 따라 비어 있을 수 있습니다.
/// 종가나 거래량이 없는 행은 적재 전에 제거됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    /// 종목 심볼 (예: "AAPL")
    pub symbol: String,
    /// 거래일
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
    /// 배당금 (이벤트 없는 날은 0)
    pub dividends: Option<f64>,
    /// 주식 분할 비율 (이벤트 없는 날은 0)
    pub stock_splits: Option<f64>,
    /// 수집 시각 (1회 실행 내 모든 행이 동일)
    pub extracted_at: NaiveDateTime,
}

impl RawBar {
    /// 가격과 거래량이 모두 있는 일봉 생성.
    ///
    /// 수집 시각은 거래일 자정으로 초기화되며,
    /// [`PriceHistory::insert`] 시 실행 단위 수집 시각으로 덮어씁니다.
    pub fn daily(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
            dividends: Some(0.0),
            stock_splits: Some(0.0),
            extracted_at: date.and_time(NaiveTime::MIN),
        }
    }

    /// 거래일 자정 타임스탬프 (적재 키로 사용).
    pub fn date_time(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN)
    }

    /// 품질 필터 통과 여부 (종가, 거래량 필수).
    pub fn is_complete(&self) -> bool {
        self.close.is_some() && self.volume.is_some()
    }
}

// =============================================================================
// EnrichedBar
// =============================================================================

/// 기술 지표가 추가된 일봉.
///
/// 모든 지표는 같은 종목의 날짜순 시계열 안에서만 계산됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedBar {
    pub raw: RawBar,
    /// 전일 대비 수익률 (종목 첫 행은 None)
    pub daily_return: Option<f64>,
    /// 수익률 이동 표본표준편차
    pub volatility: Option<f64>,
    /// 고가 - 저가
    pub price_range: Option<f64>,
    /// 변동폭 / 시가 × 100 (시가가 0 또는 없음이면 None)
    pub price_range_pct: Option<f64>,
    /// 단기 이동평균 (기본 5일)
    pub ma_5: Option<f64>,
    /// 장기 이동평균 (기본 10일)
    pub ma_10: Option<f64>,
}

impl EnrichedBar {
    pub fn symbol(&self) -> &str {
        &self.raw.symbol
    }

    pub fn date(&self) -> NaiveDate {
        self.raw.date
    }
}

// =============================================================================
// PriceHistory
// =============================================================================

/// 종목 심볼 → 날짜순 일봉 시계열 매핑.
///
/// Extractor가 한 번 구성하고 Indicator Engine이 그대로 소비합니다.
/// 종목은 심볼 순으로 순회되므로 결과 순서가 실행마다 동일합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    extracted_at: NaiveDateTime,
    series: BTreeMap<String, Vec<RawBar>>,
}

impl PriceHistory {
    pub fn new(extracted_at: NaiveDateTime) -> Self {
        Self {
            extracted_at,
            series: BTreeMap::new(),
        }
    }

    /// 실행 단위 수집 시각.
    pub fn extracted_at(&self) -> NaiveDateTime {
        self.extracted_at
    }

    /// 종목 시계열 추가.
    ///
    /// 빈 시계열은 무시합니다. 각 행의 심볼과 수집 시각은 이 히스토리 기준으로
    /// 통일되고, 시계열은 거래일 오름차순으로 정렬됩니다.
    /// 추가된 행 수를 반환합니다.
    pub fn insert(&mut self, symbol: impl Into<String>, bars: Vec<RawBar>) -> usize {
        if bars.is_empty() {
            return 0;
        }

        let symbol = symbol.into();
        let count = bars.len();
        let extracted_at = self.extracted_at;

        let entry = self.series.entry(symbol.clone()).or_default();
        entry.extend(bars.into_iter().map(|mut bar| {
            bar.symbol.clone_from(&symbol);
            bar.extracted_at = extracted_at;
            bar
        }));
        entry.sort_by_key(|bar| bar.date);

        count
    }

    /// 특정 종목의 시계열.
    pub fn series(&self, symbol: &str) -> Option<&[RawBar]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    /// 수집된 종목 심볼 목록 (정렬됨).
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// (심볼, 시계열) 순회.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RawBar])> {
        self.series
            .iter()
            .map(|(symbol, bars)| (symbol.as_str(), bars.as_slice()))
    }

    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    /// 전체 행 수.
    pub fn total_rows(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }
}
