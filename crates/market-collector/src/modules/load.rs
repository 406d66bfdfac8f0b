//! 웨어하우스 적재 (Load 단계).

use std::time::Instant;

use market_core::EnrichedBar;
use market_data::{refresh_views, UpsertOutcome, WarehouseTarget, WarehouseUpserter};
use tracing::{error, info, warn};

use crate::config::LoadConfig;
use crate::Result;

/// 지표 계산된 일봉을 웨어하우스에 upsert.
///
/// 연결 실패와 트랜잭션 실패는 에러로 반환합니다 (롤백은 upserter가 처리).
pub async fn load_warehouse(
    target: &WarehouseTarget,
    config: &LoadConfig,
    bars: &[EnrichedBar],
) -> Result<UpsertOutcome> {
    let start = Instant::now();
    info!(
        warehouse = %target.describe(),
        rows = bars.len(),
        page_size = config.page_size,
        "웨어하우스 적재 시작"
    );

    let mut session = target.connect().await?;
    let result = WarehouseUpserter::new(config.page_size)
        .upsert(session.as_mut(), bars)
        .await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "웨어하우스 세션 종료 실패");
    }

    let outcome = result?;
    info!(
        staged = outcome.staged,
        merged = outcome.merged,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "웨어하우스 적재 완료"
    );
    Ok(outcome)
}

/// 분석 뷰 갱신 (별도 세션).
///
/// 실패는 로그만 남기고 `false`를 반환합니다. 이미 커밋된 적재에는 영향이 없습니다.
pub async fn refresh_analytics_views(target: &WarehouseTarget) -> bool {
    let mut session = match target.connect().await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "분석 뷰 갱신용 연결 실패");
            return false;
        }
    };

    let refreshed = match refresh_views(session.as_mut()).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "분석 뷰 갱신 실패");
            false
        }
    };

    if let Err(e) = session.close().await {
        warn!(error = %e, "웨어하우스 세션 종료 실패");
    }
    refreshed
}
