//! 지표 계산 (Transform 단계).

use std::time::Instant;

use market_analytics::{EnrichOutput, IndicatorEngine};
use market_core::PriceHistory;
use tracing::info;

/// 수집된 히스토리에 기술 지표를 추가하고 품질 필터를 적용.
pub fn transform_history(engine: &IndicatorEngine, history: &PriceHistory) -> EnrichOutput {
    let start = Instant::now();
    info!(
        symbols = history.symbol_count(),
        rows = history.total_rows(),
        "지표 계산 시작"
    );

    let output = engine.enrich(history);

    info!(
        rows = output.bars.len(),
        dropped = output.dropped,
        duplicates = output.duplicates,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "지표 계산 완료"
    );
    output
}
