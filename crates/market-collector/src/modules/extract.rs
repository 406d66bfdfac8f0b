//! 일봉 히스토리 수집 (Extract 단계).
//!
//! 종목별로 데이터 소스를 동시에 호출하고 결과를 하나의 [`PriceHistory`]로 합칩니다.
//! 한 종목의 실패는 해당 종목만 제외하며 나머지 수집은 계속됩니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use futures::future::join_all;
use market_core::{HistorySource, PriceHistory, RawBar, SourceError};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::ExtractConfig;
use crate::stats::ExtractStats;

/// 설정된 종목 전체의 히스토리 수집.
///
/// 모든 행의 `extracted_at`은 `extracted_at`으로 통일됩니다.
pub async fn extract_history(
    source: Arc<dyn HistorySource>,
    config: &ExtractConfig,
    extracted_at: NaiveDateTime,
) -> (PriceHistory, ExtractStats) {
    let start = Instant::now();
    let mut stats = ExtractStats::new();
    let mut history = PriceHistory::new(extracted_at);

    stats.requested = config.symbols.len();

    // 동시 조회를 위한 Semaphore 기반 동시성 제한
    let semaphore = Arc::new(Semaphore::new(config.concurrent_limit.max(1)));

    info!(
        source = source.source_name(),
        symbols = config.symbols.len(),
        period = %config.period,
        concurrent_limit = config.concurrent_limit,
        "히스토리 수집 시작"
    );

    let handles: Vec<_> = config
        .symbols
        .iter()
        .map(|symbol| {
            let source = Arc::clone(&source);
            let semaphore = Arc::clone(&semaphore);
            let symbol = symbol.clone();
            let period = config.period;

            tokio::spawn(async move {
                // permit 획득까지 대기 (세마포어는 닫히지 않음)
                let _permit = semaphore.acquire_owned().await.ok();
                source.fetch_history(&symbol, period).await
            })
        })
        .collect();

    let results = join_all(handles).await;

    for (symbol, joined) in config.symbols.iter().zip(results) {
        let result: Result<Vec<RawBar>, SourceError> = match joined {
            Ok(result) => result,
            Err(e) => {
                error!(symbol = %symbol, error = %e, "종목 수집 태스크 비정상 종료");
                stats.failed += 1;
                continue;
            }
        };

        match result {
            Ok(bars) if bars.is_empty() => {
                warn!(symbol = %symbol, "조회 결과 없음");
                stats.empty += 1;
            }
            Ok(bars) => {
                let rows = history.insert(symbol.as_str(), bars);
                debug!(symbol = %symbol, rows = rows, "종목 수집 완료");
                stats.succeeded += 1;
                stats.rows += rows;
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "종목 수집 실패 - 건너뜀");
                stats.failed += 1;
            }
        }
    }

    stats.elapsed = start.elapsed();
    stats.log_summary("히스토리 수집");

    (history, stats)
}
