//! 파이프라인 통합 테스트.
//!
//! 고정 응답 데이터 소스, SQLite 웨어하우스, 로컬 디렉터리 저장소로
//! Extract → Transform → Load → 뷰 → 미러링 전체 경로를 실행합니다.
//!
//! ## 테스트 검증 항목
//!
//! - 미러 미구성 시에도 적재 완료
//! - 저장소 연결 문자열이 잘못되어도 적재 완료 (미러링만 생략)
//! - 종가 없는 행은 웨어하우스와 Parquet 모두에서 제외
//! - 한 종목 조회 실패 시 나머지 종목은 적재
//! - 수집 결과가 없으면 웨어하우스를 건드리지 않고 종료
//! - 종가가 바뀐 재실행은 행 수를 유지하며 값을 갱신
//! - 지표 값 (5일 이동평균, 일간 수익률) 적재 확인

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use market_collector::{Pipeline, PipelineConfig, RunStatus};
use market_core::{HistoryPeriod, HistorySource, RawBar, SourceError};
use market_data::{BlobStore, LocalBlobStore, WarehouseTarget};
use polars::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tempfile::TempDir;

// =============================================================================
// 테스트 헬퍼 함수
// =============================================================================

const CLOSES: [f64; 6] = [100.0, 102.0, 101.0, 105.0, 103.0, 107.0];

/// 종목별 고정 응답 소스 (등록되지 않은 종목은 조회 실패)
struct FixtureSource {
    series: Mutex<HashMap<String, Vec<RawBar>>>,
}

impl FixtureSource {
    fn new() -> Self {
        Self {
            series: Mutex::new(HashMap::new()),
        }
    }

    fn set(&self, symbol: &str, bars: Vec<RawBar>) {
        self.series
            .lock()
            .unwrap()
            .insert(symbol.to_string(), bars);
    }
}

#[async_trait]
impl HistorySource for FixtureSource {
    async fn fetch_history(
        &self,
        symbol: &str,
        _period: HistoryPeriod,
    ) -> Result<Vec<RawBar>, SourceError> {
        self.series
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| SourceError::Fetch {
                symbol: symbol.to_string(),
                message: "No data found, symbol may be delisted".to_string(),
            })
    }

    fn source_name(&self) -> &str {
        "Fixture"
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

/// 1/2부터 연속된 거래일의 일봉
fn bars(symbol: &str, closes: &[f64]) -> Vec<RawBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            RawBar::daily(
                symbol,
                day(2 + i as u32),
                close - 1.0,
                close + 2.0,
                close - 2.0,
                *close,
                1_000 + i as i64,
            )
        })
        .collect()
}

fn config(symbols: &[&str]) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.extract.symbols = symbols.iter().map(|s| s.to_string()).collect();
    config.extract.concurrent_limit = 2;
    config
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("warehouse.db")
}

fn pipeline(
    dir: &TempDir,
    symbols: &[&str],
    source: Arc<FixtureSource>,
    blob_store: Option<Box<dyn BlobStore>>,
) -> Pipeline {
    Pipeline::new(
        config(symbols),
        source,
        WarehouseTarget::sqlite_file(db_path(dir)),
        blob_store,
    )
    .unwrap()
}

async fn reader(path: &Path) -> SqlitePool {
    SqlitePool::connect_with(SqliteConnectOptions::new().filename(path))
        .await
        .unwrap()
}

/// 종목별 (거래일, 종가) 목록
async fn stored_closes(path: &Path, symbol: &str) -> Vec<(String, f64)> {
    let pool = reader(path).await;
    let rows = sqlx::query_as(
        "SELECT date(date), close FROM market_data WHERE symbol = ? ORDER BY date",
    )
    .bind(symbol)
    .fetch_all(&pool)
    .await
    .unwrap();
    pool.close().await;
    rows
}

async fn count_rows(path: &Path) -> i64 {
    let pool = reader(path).await;
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM market_data")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;
    count
}

// =============================================================================
// 파이프라인 시나리오
// =============================================================================

#[tokio::test]
async fn test_unconfigured_mirror_still_loads() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    source.set("AAA", bars("AAA", &CLOSES));

    let report = pipeline(&dir, &["AAA"], source, None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.rows_loaded, 6);
    assert!(report.views_refreshed);
    assert_eq!(report.mirrored_blob, None);
    assert_eq!(count_rows(&db_path(&dir)).await, 6);
}

#[tokio::test]
async fn test_malformed_mirror_connection_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    source.set("AAA", bars("AAA", &CLOSES));

    let mut config = config(&["AAA"]);
    config.mirror.connection_string = "AccountName=onlyname".to_string();

    let pipeline =
        Pipeline::with_source(config, source, WarehouseTarget::sqlite_file(db_path(&dir)))
            .expect("잘못된 연결 문자열로도 생성 가능");
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.rows_loaded, 6);
    assert_eq!(report.mirrored_blob, None);
    assert_eq!(count_rows(&db_path(&dir)).await, 6);
}

#[tokio::test]
async fn test_local_mirror_connection_is_resolved_at_run() {
    let dir = tempfile::tempdir().unwrap();
    let mirror_root = dir.path().join("mirror");
    let source = Arc::new(FixtureSource::new());
    source.set("AAA", bars("AAA", &CLOSES));

    let mut config = config(&["AAA"]);
    config.mirror.connection_string = format!("file://{}", mirror_root.display());

    let warehouse = WarehouseTarget::sqlite_file(db_path(&dir));
    let report = Pipeline::with_source(config, source, warehouse)
        .unwrap()
        .run()
        .await
        .unwrap();

    let blob = report.mirrored_blob.expect("미러링 Blob 이름");
    let stored = LocalBlobStore::new(&mirror_root).blob_path("market-data", &blob);
    assert!(stored.exists());
}

#[tokio::test]
async fn test_indicators_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    source.set("AAA", bars("AAA", &CLOSES));

    pipeline(&dir, &["AAA"], source, None).run().await.unwrap();

    let pool = reader(&db_path(&dir)).await;
    let rows: Vec<(Option<f64>, Option<f64>)> = sqlx::query_as(
        "SELECT daily_return, ma_5 FROM market_data WHERE symbol = 'AAA' ORDER BY date",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    pool.close().await;

    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].0, None);
    assert!((rows[1].0.unwrap() - 0.02).abs() < 1e-9);
    // 윈도우 미만 구간은 가용 관측치 평균
    assert!((rows[3].1.unwrap() - 102.0).abs() < 1e-9);
    assert!((rows[5].1.unwrap() - 103.6).abs() < 1e-9);
}

#[tokio::test]
async fn test_null_close_row_is_absent_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    let mirror_root = dir.path().join("mirror");
    let store = LocalBlobStore::new(&mirror_root);

    let mut series = bars("AAA", &CLOSES);
    series[2].close = None;
    let source = Arc::new(FixtureSource::new());
    source.set("AAA", series);

    let report = pipeline(&dir, &["AAA"], source, Some(Box::new(store.clone())))
        .run()
        .await
        .unwrap();

    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.rows_loaded, 5);

    let stored = stored_closes(&db_path(&dir), "AAA").await;
    assert_eq!(stored.len(), 5);
    assert!(stored.iter().all(|(date, _)| date != "2024-01-04"));

    let blob = report.mirrored_blob.expect("미러링 Blob 이름");
    assert!(blob.starts_with("market_data_") && blob.ends_with(".parquet"));

    let file = std::fs::File::open(store.blob_path("market-data", &blob)).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), 5);

    let closes: Vec<f64> = df
        .column("close")
        .unwrap()
        .f64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(closes, vec![100.0, 102.0, 105.0, 103.0, 107.0]);
}

#[tokio::test]
async fn test_failing_symbol_does_not_block_others() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    source.set("A", bars("A", &CLOSES));

    let report = pipeline(&dir, &["A", "B"], source, None)
        .run()
        .await
        .unwrap();

    assert!(report.is_completed());
    assert_eq!(report.extract.succeeded, 1);
    assert_eq!(report.extract.failed, 1);
    assert_eq!(stored_closes(&db_path(&dir), "A").await.len(), 6);
    assert!(stored_closes(&db_path(&dir), "B").await.is_empty());
}

#[tokio::test]
async fn test_empty_extraction_ends_without_touching_warehouse() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    source.set("EMPTY", Vec::new());

    let report = pipeline(&dir, &["MISSING", "EMPTY"], source, None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::NoData);
    assert_eq!(report.rows_loaded, 0);
    assert_eq!(report.extract.failed, 1);
    assert_eq!(report.extract.empty, 1);
    assert!(!db_path(&dir).exists());
}

#[tokio::test]
async fn test_rerun_with_revised_close_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(FixtureSource::new());
    source.set("AAA", bars("AAA", &CLOSES));

    pipeline(&dir, &["AAA"], source.clone(), None)
        .run()
        .await
        .unwrap();

    let mut revised = CLOSES;
    revised[4] = 110.0;
    source.set("AAA", bars("AAA", &revised));

    let report = pipeline(&dir, &["AAA"], source, None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.rows_loaded, 6);
    assert_eq!(count_rows(&db_path(&dir)).await, 6);

    let stored = stored_closes(&db_path(&dir), "AAA").await;
    assert_eq!(stored[4], ("2024-01-06".to_string(), 110.0));
}
