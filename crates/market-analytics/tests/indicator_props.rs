//! 지표 엔진 속성 기반 테스트
//!
//! ## 테스트 검증 항목
//! 1. 이동평균은 윈도우 안 종가의 최솟값과 최댓값 사이
//! 2. 변동성은 수익률이 하나라도 있으면 항상 값이 있고 음수가 아님
//! 3. 종목 첫 행의 수익률은 항상 None
//! 4. 출력 행 수 + 제거 행 수 + 중복 행 수 = 입력 행 수

use chrono::{Duration, NaiveDate};
use market_analytics::IndicatorEngine;
use market_core::{PriceHistory, RawBar};
use proptest::prelude::*;

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn series(symbol: &str, closes: &[f64]) -> Vec<RawBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            RawBar::daily(
                symbol,
                base_date() + Duration::days(i as i64),
                close,
                close * 1.01,
                close * 0.99,
                close,
                1_000,
            )
        })
        .collect()
}

fn history(entries: &[(&str, Vec<RawBar>)]) -> PriceHistory {
    let mut history = PriceHistory::new(base_date().and_hms_opt(0, 0, 0).unwrap());
    for (symbol, bars) in entries {
        history.insert(*symbol, bars.clone());
    }
    history
}

// ============================================================================
// 속성 테스트
// ============================================================================

proptest! {
    #[test]
    fn moving_average_within_window_bounds(closes in prop::collection::vec(1.0f64..1_000.0, 1..40)) {
        let engine = IndicatorEngine::new();
        let enriched = engine.enrich_series(&series("X", &closes));

        for (i, bar) in enriched.iter().enumerate() {
            let start = (i + 1).saturating_sub(5);
            let window = &closes[start..=i];
            let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let ma = bar.ma_5.unwrap();

            prop_assert!(ma >= min - 1e-9 && ma <= max + 1e-9);
        }
    }

    #[test]
    fn volatility_present_once_returns_exist(closes in prop::collection::vec(1.0f64..1_000.0, 2..40)) {
        let engine = IndicatorEngine::new();
        let enriched = engine.enrich_series(&series("X", &closes));

        prop_assert!(enriched[0].daily_return.is_none());
        prop_assert!(enriched[0].volatility.is_none());
        for bar in &enriched[1..] {
            let vol = bar.volatility;
            prop_assert!(vol.is_some());
            prop_assert!(vol.unwrap() >= 0.0);
        }
    }

    #[test]
    fn first_row_of_each_symbol_has_no_return(
        a in prop::collection::vec(1.0f64..1_000.0, 1..20),
        b in prop::collection::vec(1.0f64..1_000.0, 1..20),
    ) {
        let engine = IndicatorEngine::new();
        let output = engine.enrich(&history(&[("A", series("A", &a)), ("B", series("B", &b))]));

        for symbol in ["A", "B"] {
            let first = output.bars.iter().find(|bar| bar.symbol() == symbol).unwrap();
            prop_assert!(first.daily_return.is_none());
        }
    }

    #[test]
    fn rows_are_accounted_for(
        closes in prop::collection::vec(prop::option::of(1.0f64..1_000.0), 1..40),
    ) {
        let engine = IndicatorEngine::new();
        let bars: Vec<RawBar> = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let mut bar = RawBar::daily("X", base_date() + Duration::days(i as i64), 1.0, 1.0, 1.0, 1.0, 1);
                bar.close = *close;
                bar
            })
            .collect();
        let input_rows = bars.len();

        let output = engine.enrich(&history(&[("X", bars)]));

        prop_assert_eq!(output.bars.len() + output.dropped + output.duplicates, input_rows);
        prop_assert!(output.bars.iter().all(|bar| bar.raw.close.is_some()));
    }
}
