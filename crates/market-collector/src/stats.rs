//! 실행 통계 구조체.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 수집(Extract) 단계 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractStats {
    /// 요청 종목 수
    pub requested: usize,
    /// 데이터를 받은 종목 수
    pub succeeded: usize,
    /// 조회 실패 종목 수
    pub failed: usize,
    /// 빈 데이터 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 수집된 총 행 수
    pub rows: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ExtractStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.requested as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            requested = self.requested,
            succeeded = self.succeeded,
            failed = self.failed,
            empty = self.empty,
            rows = self.rows,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}

/// 파이프라인 종료 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// 전체 단계 완료
    Completed,
    /// 수집 데이터 없음 (이후 단계 생략)
    NoData,
}

/// 파이프라인 1회 실행 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// 실행 식별자
    pub run_id: String,
    pub status: RunStatus,
    pub extract: ExtractStats,
    /// 품질 필터로 제거된 행 수
    pub rows_dropped: usize,
    /// 중복 (종목, 거래일)으로 합쳐진 행 수
    pub rows_deduplicated: usize,
    /// 스테이징된 행 수
    pub rows_loaded: u64,
    /// 병합 문이 삽입/갱신한 행 수
    pub rows_merged: u64,
    /// 분석 뷰 갱신 성공 여부
    pub views_refreshed: bool,
    /// 미러링된 Blob 이름 (미구성 또는 실패 시 None)
    pub mirrored_blob: Option<String>,
    /// 총 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::NoData,
            extract: ExtractStats::new(),
            rows_dropped: 0,
            rows_deduplicated: 0,
            rows_loaded: 0,
            rows_merged: 0,
            views_refreshed: false,
            mirrored_blob: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// 실행 요약 로그 출력
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            status = ?self.status,
            symbols = self.extract.succeeded,
            extracted = self.extract.rows,
            dropped = self.rows_dropped,
            loaded = self.rows_loaded,
            merged = self.rows_merged,
            views_refreshed = self.views_refreshed,
            mirrored_blob = self.mirrored_blob.as_deref().unwrap_or("-"),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "파이프라인 실행 요약"
        );
    }
}
