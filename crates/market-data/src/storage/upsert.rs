//! 스테이징 → 병합 upsert.
//!
//! # 동작 방식
//!
//! 1. (Postgres) 트랜잭션 범위 advisory lock 획득
//! 2. 이전 실행이 남긴 스테이징 테이블 제거 후 재생성
//! 3. 스테이징에 배치 삽입
//! 4. 영구 테이블/인덱스가 없으면 생성
//! 5. `(symbol, date)` 기준 병합 후 스테이징 제거
//! 6. 한 번만 커밋
//!
//! 어느 단계에서든 실패하면 롤백 후 스테이징 정리를 시도하고 원래 에러를 반환합니다.
//! 영구 테이블은 부분 적용 상태로 남지 않습니다.

use market_core::EnrichedBar;
use tracing::{debug, info, instrument, warn};

use super::schema::{Dialect, SqlValue, TableSchema, MARKET_DATA_SCHEMA};
use super::session::WarehouseSession;
use crate::error::Result;

/// 기본 배치 크기 (스테이징 INSERT 당 행 수).
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// upsert 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// 스테이징에 삽입된 행 수
    pub staged: u64,
    /// 병합 문이 삽입/갱신한 행 수
    pub merged: u64,
}

/// 웨어하우스 upsert 실행기.
#[derive(Debug, Clone)]
pub struct WarehouseUpserter {
    schema: &'static TableSchema,
    page_size: usize,
}

impl Default for WarehouseUpserter {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl WarehouseUpserter {
    pub fn new(page_size: usize) -> Self {
        Self {
            schema: &MARKET_DATA_SCHEMA,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// 바인드 파라미터 상한을 반영한 실제 배치 크기.
    pub fn effective_page_size(&self, dialect: Dialect) -> usize {
        self.page_size.min(dialect.max_rows_per_insert(self.schema.columns.len()))
    }

    /// 일봉을 웨어하우스에 upsert.
    ///
    /// 빈 입력이면 웨어하우스를 건드리지 않고 즉시 반환합니다.
    #[instrument(skip(self, session, bars), fields(rows = bars.len(), dialect = session.dialect().name()))]
    pub async fn upsert(
        &self,
        session: &mut dyn WarehouseSession,
        bars: &[EnrichedBar],
    ) -> Result<UpsertOutcome> {
        if bars.is_empty() {
            debug!("적재할 행 없음 - upsert 스킵");
            return Ok(UpsertOutcome::default());
        }

        let rows: Vec<Vec<SqlValue>> = bars.iter().map(|b| self.schema.row_values(b)).collect();

        match self.merge_in_transaction(session, &rows).await {
            Ok(outcome) => {
                info!(
                    staged = outcome.staged,
                    merged = outcome.merged,
                    schema_version = self.schema.version,
                    "웨어하우스 upsert 완료"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "웨어하우스 upsert 실패 - 롤백");
                self.cleanup_after_failure(session).await;
                Err(e)
            }
        }
    }

    async fn merge_in_transaction(
        &self,
        session: &mut dyn WarehouseSession,
        rows: &[Vec<SqlValue>],
    ) -> Result<UpsertOutcome> {
        let dialect = session.dialect();

        if let Some(lock_sql) = dialect.run_lock_sql() {
            session.execute(&lock_sql).await?;
        }

        session.execute(&self.schema.drop_staging_sql()).await?;
        session
            .execute(&self.schema.create_staging_sql(dialect))
            .await?;

        let page_size = self.effective_page_size(dialect);
        if page_size < self.page_size {
            debug!(
                requested = self.page_size,
                page_size = page_size,
                "바인드 파라미터 상한으로 배치 크기 축소"
            );
        }
        let staged = session
            .insert_rows(&self.schema.staging_insert_prefix(), rows, page_size)
            .await?;
        debug!(staged = staged, "스테이징 삽입 완료");

        session
            .execute(&self.schema.create_table_sql(dialect))
            .await?;
        for index_sql in self.schema.create_index_sql() {
            session.execute(&index_sql).await?;
        }

        let merged = session.execute(&self.schema.merge_sql()).await?;

        session.execute(&self.schema.drop_staging_sql()).await?;
        session.commit().await?;

        Ok(UpsertOutcome { staged, merged })
    }

    /// 실패 후 정리 (best-effort).
    async fn cleanup_after_failure(&self, session: &mut dyn WarehouseSession) {
        if let Err(e) = session.rollback().await {
            warn!(error = %e, "롤백 실패");
        }

        let drop_result = async {
            session.execute(&self.schema.drop_staging_sql()).await?;
            session.commit().await
        }
        .await;

        if let Err(e) = drop_result {
            warn!(error = %e, "스테이징 테이블 정리 실패");
            let _ = session.rollback().await;
        }
    }
}
