//! 이동 통계 지표 엔진.
//!
//! 모든 이동 지표는 최소 1개 관측치 정책을 따릅니다.
//! 윈도우보다 관측치가 적으면 존재하는 관측치 전부로 계산하고,
//! 윈도우 안의 결측값(None)은 건너뜁니다.

use thiserror::Error;

use crate::enrich::IndicatorConfig;

/// 지표 계산 에러.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),
}

pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// 단순 이동평균 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmaParams {
    pub period: usize,
}

/// 이동 표본표준편차 파라미터.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdDevParams {
    pub period: usize,
}

/// 지표 계산 엔진.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    pub(crate) config: IndicatorConfig,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorEngine {
    /// 기본 윈도우(변동성 5, 이동평균 5/10)로 생성.
    pub fn new() -> Self {
        Self {
            config: IndicatorConfig::default(),
        }
    }

    /// 설정 검증 후 생성.
    pub fn with_config(config: IndicatorConfig) -> IndicatorResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// 전일 대비 변화율.
    ///
    /// 첫 행, 전일 값이 없거나 0인 행은 None입니다.
    pub fn pct_change(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut result = Vec::with_capacity(values.len());
        let mut prev: Option<f64> = None;

        for value in values {
            let change = match (prev, *value) {
                (Some(p), Some(v)) if p != 0.0 => Some((v - p) / p),
                _ => None,
            };
            result.push(change);
            prev = *value;
        }

        result
    }

    /// 단순 이동평균 (최소 1개 관측치).
    pub fn sma(
        &self,
        values: &[Option<f64>],
        params: SmaParams,
    ) -> IndicatorResult<Vec<Option<f64>>> {
        check_period("SMA", params.period)?;
        Ok(rolling_mean(values, params.period))
    }

    /// 이동 표본표준편차 (최소 1개 관측치).
    ///
    /// 관측치가 1개뿐인 윈도우는 편차가 없으므로 0을 반환합니다.
    pub fn rolling_std(
        &self,
        values: &[Option<f64>],
        params: StdDevParams,
    ) -> IndicatorResult<Vec<Option<f64>>> {
        check_period("StdDev", params.period)?;
        Ok(rolling_sample_std(values, params.period))
    }
}

pub(crate) fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| {
        if window.is_empty() {
            return None;
        }
        Some(window.iter().sum::<f64>() / window.len() as f64)
    })
}

pub(crate) fn rolling_sample_std(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, |window| match window.len() {
        0 => None,
        1 => Some(0.0),
        n => {
            let mean = window.iter().sum::<f64>() / n as f64;
            let sum_sq: f64 = window.iter().map(|x| (x - mean).powi(2)).sum();
            Some((sum_sq / (n - 1) as f64).sqrt())
        }
    })
}

fn check_period(name: &str, period: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter(format!(
            "{} 기간은 1 이상이어야 합니다",
            name
        )));
    }
    Ok(())
}

/// 후행 윈도우마다 결측값을 제외한 관측치로 `f`를 적용.
fn rolling<F>(values: &[Option<f64>], period: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let period = period.max(1);
    let mut window = Vec::with_capacity(period);

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(period);
            window.clear();
            window.extend(values[start..=i].iter().flatten().filter(|v| v.is_finite()));
            f(&window)
        })
        .collect()
}
