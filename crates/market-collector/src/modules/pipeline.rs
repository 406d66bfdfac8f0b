//! 전체 ETL 파이프라인.
//!
//! Extract → Transform → Load → 분석 뷰 갱신 → 미러링 순으로 실행합니다.
//! 각 단계는 이전 단계의 메모리 결과 전체를 입력으로 받으며,
//! 행이 없는 단계에서 파이프라인을 조기 종료합니다.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use market_analytics::IndicatorEngine;
use market_core::HistorySource;
use market_data::{BlobStore, WarehouseTarget, YahooHistoryProvider};
use tracing::{info, warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::{CollectorError, Result};
use crate::modules::{extract, load, mirror, transform};
use crate::stats::{PipelineReport, RunStatus};

/// 미러링 대상
enum MirrorSink {
    /// 직접 지정된 저장소 (`None`이면 미러링 생략)
    Store(Option<Box<dyn BlobStore>>),
    /// 미러링 단계에서 연결 문자열로 연결
    Connection(String),
}

/// 파이프라인 구성 요소 묶음
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn HistorySource>,
    warehouse: WarehouseTarget,
    mirror: MirrorSink,
    engine: IndicatorEngine,
}

impl Pipeline {
    /// 구성 요소를 직접 지정해 생성 (테스트, 로컬 실행용)
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn HistorySource>,
        warehouse: WarehouseTarget,
        blob_store: Option<Box<dyn BlobStore>>,
    ) -> Result<Self> {
        Self::build(config, source, warehouse, MirrorSink::Store(blob_store))
    }

    /// 미러링 저장소는 설정의 연결 문자열로 실행 시점에 연결
    ///
    /// 연결 문자열이 잘못되어도 생성과 적재는 실패하지 않습니다.
    pub fn with_source(
        config: PipelineConfig,
        source: Arc<dyn HistorySource>,
        warehouse: WarehouseTarget,
    ) -> Result<Self> {
        let mirror = MirrorSink::Connection(config.mirror.connection_string.clone());
        Self::build(config, source, warehouse, mirror)
    }

    /// 설정으로 운영 구성 요소 생성 (Yahoo Finance, 설정된 웨어하우스/저장소)
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let source = YahooHistoryProvider::new()
            .map_err(|e| CollectorError::DataSource(e.to_string()))?;
        let warehouse = config.warehouse.target()?;

        Self::with_source(config, Arc::new(source), warehouse)
    }

    fn build(
        config: PipelineConfig,
        source: Arc<dyn HistorySource>,
        warehouse: WarehouseTarget,
        mirror: MirrorSink,
    ) -> Result<Self> {
        let engine = IndicatorEngine::with_config(config.indicators.clone())?;
        Ok(Self {
            config,
            source,
            warehouse,
            mirror,
            engine,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn warehouse(&self) -> &WarehouseTarget {
        &self.warehouse
    }

    fn mirror_configured(&self) -> bool {
        match &self.mirror {
            MirrorSink::Store(store) => store.is_some(),
            MirrorSink::Connection(connection) => !connection.trim().is_empty(),
        }
    }

    /// 파이프라인 1회 실행
    ///
    /// 수집 결과가 없으면 [`RunStatus::NoData`]로 정상 종료합니다.
    /// 웨어하우스 연결/트랜잭션 실패는 에러로 전파되고, 미러링 실패(잘못된 연결 문자열 포함)는 보고서에만 반영됩니다.
    pub async fn run(&self) -> Result<PipelineReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("pipeline", run_id = %run_id);
        self.run_stages(run_id).instrument(span).await
    }

    async fn run_stages(&self, run_id: String) -> Result<PipelineReport> {
        let start = Instant::now();
        let mut report = PipelineReport::new(run_id);
        let extracted_at = Utc::now().naive_utc();

        info!(
            symbols = self.config.extract.symbols.len(),
            period = %self.config.extract.period,
            warehouse = %self.warehouse.describe(),
            mirror = self.mirror_configured(),
            "파이프라인 시작"
        );

        // 1. Extract
        let (history, extract_stats) =
            extract::extract_history(Arc::clone(&self.source), &self.config.extract, extracted_at)
                .await;
        report.extract = extract_stats;

        if history.is_empty() {
            warn!("수집된 데이터 없음 - 파이프라인 종료");
            return Ok(Self::finish(report, start));
        }

        // 2. Transform
        let output = transform::transform_history(&self.engine, &history);
        report.rows_dropped = output.dropped;
        report.rows_deduplicated = output.duplicates;

        if output.bars.is_empty() {
            warn!("품질 필터 후 남은 행 없음 - 파이프라인 종료");
            return Ok(Self::finish(report, start));
        }

        // 3. Load
        let outcome = load::load_warehouse(&self.warehouse, &self.config.load, &output.bars).await?;
        report.rows_loaded = outcome.staged;
        report.rows_merged = outcome.merged;

        // 4. 분석 뷰 갱신
        if self.config.load.refresh_views {
            report.views_refreshed = load::refresh_analytics_views(&self.warehouse).await;
        } else {
            info!("분석 뷰 갱신 비활성화 - 건너뜀");
        }

        // 5. 미러링
        let container = &self.config.mirror.container;
        report.mirrored_blob = match &self.mirror {
            MirrorSink::Store(store) => {
                mirror::mirror_dataset(store.as_deref(), container, &output.bars, extracted_at)
                    .await
            }
            MirrorSink::Connection(connection) => {
                mirror::mirror_to_connection(connection, container, &output.bars, extracted_at)
                    .await
            }
        };

        report.status = RunStatus::Completed;
        Ok(Self::finish(report, start))
    }

    fn finish(mut report: PipelineReport, start: Instant) -> PipelineReport {
        report.elapsed = start.elapsed();
        report.log_summary();
        report
    }
}
