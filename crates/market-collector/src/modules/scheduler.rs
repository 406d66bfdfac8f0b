//! 미국 시장 운영 시간 기반 스케줄러.
//!
//! 데몬 모드에서 일일 파이프라인 실행 시점을 결정합니다.
//! 장 마감 후 설정된 대기 시간이 지나면 거래일마다 한 번 실행합니다.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::config::SchedulingConfig;

/// 다음 실행일 탐색 한도 (일)
const MAX_LOOKAHEAD_DAYS: i64 = 14;

/// 시장 운영 시간 정보
#[derive(Debug, Clone)]
pub struct MarketHours {
    /// 시장 코드
    pub market: String,
    /// 시장 타임존
    pub timezone: Tz,
    /// 장 시작 시간 (현지 시간)
    pub open_time: NaiveTime,
    /// 장 마감 시간 (현지 시간)
    pub close_time: NaiveTime,
}

impl MarketHours {
    /// US 시장 (뉴욕)
    pub fn us() -> Self {
        Self {
            market: "US".to_string(),
            timezone: chrono_tz::America::New_York,
            open_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// 시장 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    /// 장중 (거래 시간)
    Open,
    /// 장 마감 (데이터 수집 가능)
    Closed,
    /// 휴장 (주말 또는 공휴일)
    Holiday,
}

/// 시장 기반 스케줄러
pub struct Scheduler {
    market: MarketHours,
    /// 휴장일 (현지 날짜)
    holidays: HashSet<NaiveDate>,
    config: SchedulingConfig,
    /// 마지막 일일 실행 날짜 (현지 날짜)
    last_daily_run: Option<NaiveDate>,
}

impl Scheduler {
    /// 새 스케줄러 생성 (NYSE 휴장일 포함)
    pub fn new(config: &SchedulingConfig) -> Self {
        let mut scheduler = Self {
            market: MarketHours::us(),
            holidays: HashSet::new(),
            config: config.clone(),
            last_daily_run: None,
        };
        scheduler.load_us_holidays_2025();
        scheduler.load_us_holidays_2026();
        scheduler.load_us_holidays_2027();
        scheduler
    }

    /// 휴장일 추가
    pub fn add_holiday(&mut self, date: NaiveDate) {
        self.holidays.insert(date);
    }

    /// 2025년 NYSE 휴장일 로드
    pub fn load_us_holidays_2025(&mut self) {
        self.load_holidays(&[
            "2025-01-01", // New Year's Day
            "2025-01-09", // National Day of Mourning
            "2025-01-20", // Martin Luther King Jr. Day
            "2025-02-17", // Washington's Birthday
            "2025-04-18", // Good Friday
            "2025-05-26", // Memorial Day
            "2025-06-19", // Juneteenth
            "2025-07-04", // Independence Day
            "2025-09-01", // Labor Day
            "2025-11-27", // Thanksgiving
            "2025-12-25", // Christmas
        ]);
    }

    /// 2026년 NYSE 휴장일 로드
    pub fn load_us_holidays_2026(&mut self) {
        self.load_holidays(&[
            "2026-01-01", // New Year's Day
            "2026-01-19", // Martin Luther King Jr. Day
            "2026-02-16", // Washington's Birthday
            "2026-04-03", // Good Friday
            "2026-05-25", // Memorial Day
            "2026-06-19", // Juneteenth
            "2026-07-03", // Independence Day (대체)
            "2026-09-07", // Labor Day
            "2026-11-26", // Thanksgiving
            "2026-12-25", // Christmas
        ]);
    }

    /// 2027년 NYSE 휴장일 로드
    pub fn load_us_holidays_2027(&mut self) {
        self.load_holidays(&[
            "2027-01-01", // New Year's Day
            "2027-01-18", // Martin Luther King Jr. Day
            "2027-02-15", // Washington's Birthday
            "2027-03-26", // Good Friday
            "2027-05-31", // Memorial Day
            "2027-06-18", // Juneteenth (대체)
            "2027-07-05", // Independence Day (대체)
            "2027-09-06", // Labor Day
            "2027-11-25", // Thanksgiving
            "2027-12-24", // Christmas (대체)
        ]);
    }

    fn load_holidays(&mut self, dates: &[&str]) {
        for date_str in dates {
            if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                self.add_holiday(date);
            }
        }
    }

    pub fn market_hours(&self) -> &MarketHours {
        &self.market
    }

    /// 주말 여부 확인
    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// 해당 연도 휴장일 목록 보유 여부
    pub fn has_holiday_calendar(&self, year: i32) -> bool {
        self.holidays.iter().any(|date| date.year() == year)
    }

    /// 휴장일 여부 확인
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// 거래일 여부 (현지 날짜 기준)
    ///
    /// `skip_weekends`가 꺼져 있으면 주말도 거래일로 취급합니다.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if self.config.skip_weekends && Self::is_weekend(date) {
            return false;
        }
        !self.is_holiday(date)
    }

    /// 현지 날짜 변환
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.market.timezone).date_naive()
    }

    /// 시장 상태 조회
    pub fn market_status(&self, now: DateTime<Utc>) -> MarketStatus {
        let local_time = now.with_timezone(&self.market.timezone);

        if !self.is_trading_day(local_time.date_naive()) {
            return MarketStatus::Holiday;
        }

        let time = local_time.time();
        if time >= self.market.open_time && time < self.market.close_time {
            MarketStatus::Open
        } else {
            MarketStatus::Closed
        }
    }

    /// 마감 후 실행 가능 시각 (현지 시간)
    fn earliest_run_time(&self) -> NaiveTime {
        self.market.close_time + Duration::minutes(self.config.delay_after_close_minutes as i64)
    }

    /// 일일 파이프라인 실행 여부 판단
    ///
    /// 조건:
    /// 1. 거래일
    /// 2. 마감 후 설정된 시간이 경과
    /// 3. 오늘 아직 실행하지 않음
    pub fn should_run_daily(&mut self, now: DateTime<Utc>) -> bool {
        let local_time = now.with_timezone(&self.market.timezone);
        let local_date = local_time.date_naive();

        if !self.is_trading_day(local_date) {
            return false;
        }

        if local_time.time() < self.earliest_run_time() {
            return false;
        }

        if self.last_daily_run == Some(local_date) {
            debug!(market = %self.market.market, "오늘 이미 일일 파이프라인 실행함");
            return false;
        }

        if !self.has_holiday_calendar(local_date.year()) {
            warn!(
                market = %self.market.market,
                year = local_date.year(),
                "휴장일 목록 없음 - 주말만 제외하고 실행"
            );
        }

        self.last_daily_run = Some(local_date);
        info!(
            market = %self.market.market,
            local_time = %local_time.format("%Y-%m-%d %H:%M:%S"),
            "일일 파이프라인 실행 조건 충족"
        );
        true
    }

    /// 다음 실행 시각 (UTC)
    ///
    /// 오늘 실행 시각이 지났거나 거래일이 아니면 다음 거래일을 찾습니다.
    pub fn next_run_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let run_time = self.earliest_run_time();
        let today = self.local_date(now);

        (0..=MAX_LOOKAHEAD_DAYS)
            .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
            .filter(|date| self.is_trading_day(*date))
            .filter_map(|date| {
                self.market
                    .timezone
                    .from_local_datetime(&date.and_time(run_time))
                    .earliest()
            })
            .map(|local| local.with_timezone(&Utc))
            .find(|candidate| *candidate > now)
    }

    /// 다음 실행까지 남은 시간 (초)
    pub fn seconds_until_next_run(&self, now: DateTime<Utc>) -> Option<i64> {
        self.next_run_at(now)
            .map(|next| next.signed_duration_since(now).num_seconds())
    }

    /// 스케줄러 상태 요약
    pub fn status_summary(&self, now: DateTime<Utc>) -> String {
        let local_time = now.with_timezone(&self.market.timezone);
        let mut lines = vec![
            "=== 스케줄러 상태 ===".to_string(),
            format!(
                "{}: {:?} (현지시간: {})",
                self.market.market,
                self.market_status(now),
                local_time.format("%Y-%m-%d %H:%M:%S")
            ),
            format!(
                "스케줄링: {} (마감 후 {}분, 주말 건너뜀: {})",
                if self.config.enabled { "활성" } else { "비활성" },
                self.config.delay_after_close_minutes,
                self.config.skip_weekends
            ),
        ];

        if let Some(next) = self.next_run_at(now) {
            lines.push(format!(
                "다음 실행: {} (현지시간)",
                next.with_timezone(&self.market.timezone)
                    .format("%Y-%m-%d %H:%M")
            ));
        }

        lines.join("\n")
    }
}
