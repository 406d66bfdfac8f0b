//! 환경변수 기반 설정 모듈.
//!
//! 바이너리가 시작할 때 한 번 로드해 각 단계에 전달합니다.
//! 비즈니스 로직은 환경변수를 직접 읽지 않습니다.

use std::fmt;
use std::time::Duration;

use market_analytics::IndicatorConfig;
use market_core::HistoryPeriod;
use market_data::storage::DEFAULT_PAGE_SIZE;
use market_data::WarehouseTarget;

use crate::error::CollectorError;
use crate::Result;

/// 기본 수집 종목
pub const DEFAULT_SYMBOLS: [&str; 4] = ["AAPL", "GOOGL", "MSFT", "AMZN"];

/// 파이프라인 전체 설정
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// 웨어하우스 접속 설정
    pub warehouse: WarehouseConfig,
    /// 오브젝트 스토리지 미러 설정
    pub mirror: MirrorConfig,
    /// 수집 설정
    pub extract: ExtractConfig,
    /// 지표 윈도우 설정
    pub indicators: IndicatorConfig,
    /// 적재 설정
    pub load: LoadConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
    /// 스케줄링 설정
    pub scheduling: SchedulingConfig,
}

/// 웨어하우스 접속 설정
#[derive(Clone)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// 접속 URL (지정 시 host/port 등 개별 값보다 우선)
    /// 예: `postgres://user:pw@host/db`, `sqlite://warehouse.db`
    pub url: Option<String>,
}

/// 오브젝트 스토리지 미러 설정
#[derive(Clone)]
pub struct MirrorConfig {
    /// 연결 문자열 (빈 문자열이면 미러링 비활성)
    pub connection_string: String,
    /// 컨테이너 이름
    pub container: String,
}

/// 수집 설정
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// 대상 종목 (대문자)
    pub symbols: Vec<String>,
    /// 조회 기간
    pub period: HistoryPeriod,
    /// 동시 조회 종목 수
    pub concurrent_limit: usize,
}

/// 적재 설정
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// 스테이징 배치 크기
    pub page_size: usize,
    /// 적재 후 분석 뷰 갱신 여부
    pub refresh_views: bool,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 파이프라인 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

/// 스케줄링 설정 (미국 시장 운영 시간 기반)
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// 스케줄링 활성화 여부
    pub enabled: bool,
    /// 장 마감 후 대기 시간 (분)
    /// 기본: 60분 (16:00 마감 + 60분 = 17:00부터 수집)
    pub delay_after_close_minutes: u32,
    /// 주말 건너뛰기
    pub skip_weekends: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: "postgres".to_string(),
            port: 5432,
            database: "market_data".to_string(),
            user: "etl_user".to_string(),
            password: "etl_password".to_string(),
            url: None,
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            container: "market-data".to_string(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            period: HistoryPeriod::default(),
            concurrent_limit: 4,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_views: true,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_after_close_minutes: 60,
            skip_weekends: true,
        }
    }
}

impl PipelineConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 구성
    ///
    /// 형식이 잘못된 숫자/불리언 값은 기본값을 사용합니다.
    /// 조회 기간 문자열 오류와 0 크기 윈도우는 설정 에러입니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let defaults = Self::default();

        let period = match env.get("ETL_PERIOD") {
            Some(raw) => raw.parse::<HistoryPeriod>()?,
            None => defaults.extract.period,
        };

        let symbols = env.list("ETL_SYMBOLS");
        let symbols = if symbols.is_empty() {
            defaults.extract.symbols
        } else {
            symbols
        };

        let indicators = IndicatorConfig {
            volatility_window: env.parse(
                "ETL_VOLATILITY_WINDOW",
                defaults.indicators.volatility_window,
            ),
            ma_short_window: env.parse("ETL_MA_SHORT_WINDOW", defaults.indicators.ma_short_window),
            ma_long_window: env.parse("ETL_MA_LONG_WINDOW", defaults.indicators.ma_long_window),
        };
        indicators.validate()?;

        Ok(Self {
            warehouse: WarehouseConfig {
                host: env.string("POSTGRES_HOST", &defaults.warehouse.host),
                port: env.parse("POSTGRES_PORT", defaults.warehouse.port),
                database: env.string("POSTGRES_DB", &defaults.warehouse.database),
                user: env.string("POSTGRES_USER", &defaults.warehouse.user),
                password: env.string("POSTGRES_PASSWORD", &defaults.warehouse.password),
                url: env.get("WAREHOUSE_URL"),
            },
            mirror: MirrorConfig {
                connection_string: env.string("AZURE_STORAGE_CONNECTION_STRING", ""),
                container: env.string("AZURE_CONTAINER_NAME", &defaults.mirror.container),
            },
            extract: ExtractConfig {
                symbols,
                period,
                concurrent_limit: env
                    .parse("ETL_CONCURRENT_LIMIT", defaults.extract.concurrent_limit)
                    .max(1),
            },
            indicators,
            load: LoadConfig {
                page_size: env.parse("ETL_PAGE_SIZE", defaults.load.page_size).max(1),
                refresh_views: env.bool("ETL_REFRESH_VIEWS", defaults.load.refresh_views),
            },
            daemon: DaemonConfig {
                interval_minutes: env
                    .parse("DAEMON_INTERVAL_MINUTES", defaults.daemon.interval_minutes)
                    .max(1),
            },
            scheduling: SchedulingConfig {
                enabled: env.bool("SCHEDULING_ENABLED", defaults.scheduling.enabled),
                delay_after_close_minutes: env.parse(
                    "SCHEDULING_DELAY_AFTER_CLOSE_MINUTES",
                    defaults.scheduling.delay_after_close_minutes,
                ),
                skip_weekends: env.bool(
                    "SCHEDULING_SKIP_WEEKENDS",
                    defaults.scheduling.skip_weekends,
                ),
            },
        })
    }

    /// CLI 인자로 종목/기간 덮어쓰기
    pub fn with_overrides(mut self, symbols: Option<&str>, period: Option<&str>) -> Result<Self> {
        if let Some(raw) = symbols {
            let parsed = split_list(raw);
            if parsed.is_empty() {
                return Err(CollectorError::Config(
                    "--symbols 값이 비어 있습니다".to_string(),
                ));
            }
            self.extract.symbols = parsed;
        }
        if let Some(raw) = period {
            self.extract.period = raw.parse()?;
        }
        Ok(self)
    }
}

impl WarehouseConfig {
    /// 접속 대상 생성
    pub fn target(&self) -> Result<WarehouseTarget> {
        match &self.url {
            Some(url) => Ok(WarehouseTarget::from_url(url)?),
            None => Ok(WarehouseTarget::postgres(
                &self.host,
                self.port,
                &self.database,
                &self.user,
                &self.password,
            )),
        }
    }
}

impl MirrorConfig {
    /// 미러링 구성 여부
    pub fn is_configured(&self) -> bool {
        !self.connection_string.trim().is_empty()
    }
}

impl DaemonConfig {
    /// 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("url", &self.url.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Debug for MirrorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorConfig")
            .field("configured", &self.is_configured())
            .field("container", &self.container)
            .finish()
    }
}

// =============================================================================
// 환경변수 파싱 헬퍼
// =============================================================================

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// 값 조회 (빈 문자열은 미설정으로 취급)
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// 값 파싱 (실패 시 기본값 사용)
    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// bool 값 파싱
    fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(default)
    }

    /// 쉼표로 구분된 리스트 파싱
    fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(|v| split_list(&v)).unwrap_or_default()
    }
}

/// 쉼표 구분 종목 목록 (대문자, 중복 제거)
fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !item.is_empty() && !items.contains(&item) {
            items.push(item);
        }
    }
    items
}
