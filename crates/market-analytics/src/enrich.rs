//! 종목별 시계열 지표 계산 (Transform 단계).
//!
//! # 처리 순서
//!
//! 1. 거래일 오름차순 정렬, 같은 거래일 중복은 마지막 행만 유지
//! 2. 수익률 → 변동성 → 이동평균 → 변동폭 계산
//! 3. 품질 필터: 종가 또는 거래량이 없는 행 제거
//!
//! 품질 필터는 지표 계산 뒤에 적용하므로 윈도우 경계는 실제 시계열을 따릅니다.

use serde::{Deserialize, Serialize};
use tracing::debug;

use market_core::{EnrichedBar, PriceHistory, RawBar};

use crate::indicators::{
    rolling_mean, rolling_sample_std, IndicatorEngine, IndicatorError, IndicatorResult,
};

/// 지표 윈도우 설정.
///
/// 적재 컬럼 이름은 `ma_5`, `ma_10`으로 고정이며 윈도우 값만 바뀝니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// 변동성 윈도우 (기본 5)
    pub volatility_window: usize,
    /// 단기 이동평균 윈도우 (기본 5)
    pub ma_short_window: usize,
    /// 장기 이동평균 윈도우 (기본 10)
    pub ma_long_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            volatility_window: 5,
            ma_short_window: 5,
            ma_long_window: 10,
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> IndicatorResult<()> {
        let windows = [
            ("volatility_window", self.volatility_window),
            ("ma_short_window", self.ma_short_window),
            ("ma_long_window", self.ma_long_window),
        ];
        for (name, window) in windows {
            if window == 0 {
                return Err(IndicatorError::InvalidParameter(format!(
                    "{}는 1 이상이어야 합니다",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Transform 결과.
#[derive(Debug, Clone, Default)]
pub struct EnrichOutput {
    /// 지표가 추가된 일봉 (심볼, 거래일 순)
    pub bars: Vec<EnrichedBar>,
    /// 품질 필터로 제거된 행 수
    pub dropped: usize,
    /// 같은 (심볼, 거래일) 중복으로 합쳐진 행 수
    pub duplicates: usize,
}

impl IndicatorEngine {
    /// 전체 히스토리 지표 계산.
    ///
    /// 종목 간 값이 섞이지 않도록 종목별로 독립 계산합니다.
    /// 유효한 행이 없는 종목은 결과에 포함되지 않습니다.
    pub fn enrich(&self, history: &PriceHistory) -> EnrichOutput {
        let mut output = EnrichOutput::default();

        for (symbol, series) in history.iter() {
            let enriched = self.enrich_series(series);
            let duplicates = series.len() - enriched.len();

            let (kept, dropped): (Vec<EnrichedBar>, Vec<EnrichedBar>) = enriched
                .into_iter()
                .partition(|bar| bar.raw.is_complete());

            debug!(
                symbol = symbol,
                rows = kept.len(),
                dropped = dropped.len(),
                duplicates = duplicates,
                "종목 지표 계산 완료"
            );

            output.dropped += dropped.len();
            output.duplicates += duplicates;
            output.bars.extend(kept);
        }

        output
    }

    /// 단일 종목 시계열 지표 계산 (품질 필터 적용 전).
    ///
    /// 입력은 한 종목의 일봉이어야 하며 정렬되어 있지 않아도 됩니다.
    pub fn enrich_series(&self, series: &[RawBar]) -> Vec<EnrichedBar> {
        let bars = dedup_by_date(series);
        if bars.is_empty() {
            return Vec::new();
        }

        let closes: Vec<Option<f64>> = bars.iter().map(|b| b.close).collect();

        let returns = self.pct_change(&closes);
        let volatility = rolling_sample_std(&returns, self.config.volatility_window);
        let ma_short = rolling_mean(&closes, self.config.ma_short_window);
        let ma_long = rolling_mean(&closes, self.config.ma_long_window);

        bars.into_iter()
            .enumerate()
            .map(|(i, raw)| {
                let price_range = match (raw.high, raw.low) {
                    (Some(high), Some(low)) => Some(high - low),
                    _ => None,
                };
                let price_range_pct = match (price_range, raw.open) {
                    (Some(range), Some(open)) if open != 0.0 => Some(range / open * 100.0),
                    _ => None,
                };

                EnrichedBar {
                    raw,
                    daily_return: returns[i],
                    volatility: volatility[i],
                    price_range,
                    price_range_pct,
                    ma_5: ma_short[i],
                    ma_10: ma_long[i],
                }
            })
            .collect()
    }
}

/// 거래일순 정렬 후 같은 거래일은 마지막 행만 유지.
///
/// 한 번의 병합에서 같은 키를 두 번 갱신할 수 없으므로 여기서 합칩니다.
fn dedup_by_date(series: &[RawBar]) -> Vec<RawBar> {
    let mut sorted: Vec<RawBar> = series.to_vec();
    // 안정 정렬: 같은 거래일은 입력 순서 유지
    sorted.sort_by_key(|bar| bar.date);

    let mut result: Vec<RawBar> = Vec::with_capacity(sorted.len());
    for bar in sorted {
        match result.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => result.push(bar),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    const EPS: f64 = 1e-9;

    // ========================================================================
    // 테스트 헬퍼 함수
    // ========================================================================

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn run_time() -> NaiveDateTime {
        day(31).and_hms_opt(12, 0, 0).unwrap()
    }

    fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<RawBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                RawBar::daily(
                    symbol,
                    day(i as u32 + 1),
                    close - 1.0,
                    close + 2.0,
                    close - 2.0,
                    close,
                    1_000,
                )
            })
            .collect()
    }

    fn history_with(series: &[(&str, Vec<RawBar>)]) -> PriceHistory {
        let mut history = PriceHistory::new(run_time());
        for (symbol, bars) in series {
            history.insert(*symbol, bars.clone());
        }
        history
    }

    // ========================================================================
    // 지표 계산 테스트
    // ========================================================================

    #[test]
    fn test_reference_scenario() {
        let engine = IndicatorEngine::new();
        let history = history_with(&[(
            "X",
            bars_from_closes("X", &[100.0, 102.0, 101.0, 105.0, 103.0, 107.0]),
        )]);

        let output = engine.enrich(&history);
        assert_eq!(output.bars.len(), 6);
        assert_eq!(output.dropped, 0);

        let day2 = &output.bars[1];
        assert!((day2.daily_return.unwrap() - 0.02).abs() < EPS);

        let day6 = &output.bars[5];
        assert!((day6.ma_5.unwrap() - 103.6).abs() < EPS);
        // 10일 윈도우지만 6개 관측치 전부 사용
        let mean6 = (100.0 + 102.0 + 101.0 + 105.0 + 103.0 + 107.0) / 6.0;
        assert!((day6.ma_10.unwrap() - mean6).abs() < EPS);
    }

    #[test]
    fn test_first_row_return_is_null_per_symbol() {
        let engine = IndicatorEngine::new();
        let history = history_with(&[
            ("A", bars_from_closes("A", &[10.0, 11.0])),
            ("B", bars_from_closes("B", &[50.0, 55.0])),
        ]);

        let output = engine.enrich(&history);
        let first_b = output.bars.iter().find(|b| b.symbol() == "B").unwrap();

        // B 첫 행은 A 마지막 종가와 연결되지 않음
        assert_eq!(first_b.daily_return, None);
        assert_eq!(first_b.volatility, None);
        assert!((first_b.ma_5.unwrap() - 50.0).abs() < EPS);
    }

    #[test]
    fn test_windows_use_available_periods() {
        let engine = IndicatorEngine::new();
        let series = bars_from_closes("X", &[100.0, 110.0, 99.0]);
        let enriched = engine.enrich_series(&series);

        // 수익률 2개 (0.1, -0.1)의 표본표준편차
        let r2: f64 = 0.1;
        let r3: f64 = (99.0 - 110.0) / 110.0;
        let mean = (r2 + r3) / 2.0;
        let expected: f64 = ((r2 - mean).powi(2) + (r3 - mean).powi(2)).sqrt();

        assert!((enriched[2].volatility.unwrap() - expected).abs() < EPS);
        assert!((enriched[2].ma_5.unwrap() - 103.0).abs() < EPS);
        // 수익률 1개면 변동성 0
        assert_eq!(enriched[1].volatility, Some(0.0));
    }

    #[test]
    fn test_volatility_window_excludes_old_returns() {
        let engine = IndicatorEngine::new();
        // 큰 변동 이후 동일 종가 6일 → 마지막 윈도우 수익률은 모두 0
        let series = bars_from_closes("X", &[100.0, 200.0, 200.0, 200.0, 200.0, 200.0, 200.0]);
        let enriched = engine.enrich_series(&series);

        assert!(enriched[2].volatility.unwrap() > 0.0);
        assert!(enriched[6].volatility.unwrap().abs() < EPS);
    }

    #[test]
    fn test_price_range() {
        let engine = IndicatorEngine::new();
        let mut series = vec![RawBar::daily("X", day(2), 50.0, 55.0, 45.0, 52.0, 100)];
        series.push(RawBar::daily("X", day(3), 0.0, 10.0, 5.0, 7.0, 100));

        let enriched = engine.enrich_series(&series);

        assert_eq!(enriched[0].price_range, Some(10.0));
        assert!((enriched[0].price_range_pct.unwrap() - 20.0).abs() < EPS);
        // 시가 0 → 비율 없음
        assert_eq!(enriched[1].price_range, Some(5.0));
        assert_eq!(enriched[1].price_range_pct, None);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let engine = IndicatorEngine::new();
        let mut series = bars_from_closes("X", &[100.0, 102.0, 104.0]);
        series.reverse();

        let enriched = engine.enrich_series(&series);

        assert_eq!(enriched[0].date(), day(1));
        assert_eq!(enriched[0].daily_return, None);
        assert!((enriched[1].daily_return.unwrap() - 0.02).abs() < EPS);
    }

    // ========================================================================
    // 품질 필터 / 중복 테스트
    // ========================================================================

    #[test]
    fn test_null_close_dropped_after_computation() {
        let engine = IndicatorEngine::new();
        let mut series = bars_from_closes("X", &[100.0, 101.0, 102.0, 103.0]);
        series[1].close = None;

        let history = history_with(&[("X", series)]);
        let output = engine.enrich(&history);

        assert_eq!(output.dropped, 1);
        assert_eq!(output.bars.len(), 3);
        assert!(output.bars.iter().all(|b| b.date() != day(2)));

        // day 4의 ma_5는 결측 종가를 건너뛴 실제 윈도우 기준: (100 + 102 + 103) / 3
        let day4 = output.bars.iter().find(|b| b.date() == day(4)).unwrap();
        assert!((day4.ma_5.unwrap() - 305.0 / 3.0).abs() < EPS);
        // day 3의 수익률은 전일 종가가 없으므로 None
        let day3 = output.bars.iter().find(|b| b.date() == day(3)).unwrap();
        assert_eq!(day3.daily_return, None);
    }

    #[test]
    fn test_null_volume_dropped() {
        let engine = IndicatorEngine::new();
        let mut series = bars_from_closes("X", &[100.0, 101.0]);
        series[0].volume = None;

        let output = engine.enrich(&history_with(&[("X", series)]));

        assert_eq!(output.dropped, 1);
        assert_eq!(output.bars.len(), 1);
        assert!((output.bars[0].daily_return.unwrap() - 0.01).abs() < EPS);
    }

    #[test]
    fn test_symbol_without_valid_rows_contributes_nothing() {
        let engine = IndicatorEngine::new();
        let mut series = bars_from_closes("B", &[10.0]);
        series[0].close = None;

        let output = engine.enrich(&history_with(&[
            ("A", bars_from_closes("A", &[1.0, 2.0])),
            ("B", series),
        ]));

        assert!(output.bars.iter().all(|b| b.symbol() == "A"));
        assert_eq!(output.dropped, 1);
    }

    #[test]
    fn test_duplicate_dates_keep_last() {
        let engine = IndicatorEngine::new();
        let series = vec![
            RawBar::daily("X", day(2), 1.0, 1.0, 1.0, 100.0, 10),
            RawBar::daily("X", day(3), 1.0, 1.0, 1.0, 103.0, 10),
            RawBar::daily("X", day(3), 1.0, 1.0, 1.0, 110.0, 10),
        ];

        let output = engine.enrich(&history_with(&[("X", series)]));

        assert_eq!(output.duplicates, 1);
        assert_eq!(output.bars.len(), 2);
        assert_eq!(output.bars[1].raw.close, Some(110.0));
        assert!((output.bars[1].daily_return.unwrap() - 0.1).abs() < EPS);
    }

    #[test]
    fn test_custom_windows() {
        let config = IndicatorConfig {
            volatility_window: 2,
            ma_short_window: 2,
            ma_long_window: 3,
        };
        let engine = IndicatorEngine::with_config(config).unwrap();
        let enriched = engine.enrich_series(&bars_from_closes("X", &[1.0, 2.0, 3.0, 4.0]));

        assert!((enriched[3].ma_5.unwrap() - 3.5).abs() < EPS);
        assert!((enriched[3].ma_10.unwrap() - 3.0).abs() < EPS);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = IndicatorConfig {
            volatility_window: 0,
            ..Default::default()
        };
        assert!(IndicatorEngine::with_config(config).is_err());
    }
}
