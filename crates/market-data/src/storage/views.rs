//! 분석 뷰.
//!
//! 저장 상태가 없는 쿼리 정의로, 조회 시점의 `market_data` 내용을 기준으로 계산됩니다.
//!
//! - `daily_summary`: 최근 30일 종목별 일봉 요약 + 추세 라벨
//! - `top_performers`: 최근 30일 종목별 집계 (평균 수익률 내림차순)

use tracing::{info, instrument, warn};

use super::schema::{Dialect, MARKET_DATA_SCHEMA};
use super::session::WarehouseSession;
use crate::error::Result;

/// 분석 뷰 이름.
pub const VIEW_NAMES: [&str; 2] = ["daily_summary", "top_performers"];

/// 조회 구간 (일).
const TRAILING_DAYS: u32 = 30;

fn trading_date_expr(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "date::date",
        Dialect::Sqlite => "date(date)",
    }
}

fn window_predicate(dialect: Dialect) -> String {
    match dialect {
        Dialect::Postgres => format!("date >= CURRENT_DATE - INTERVAL '{} days'", TRAILING_DAYS),
        Dialect::Sqlite => format!("date >= date('now', '-{} days')", TRAILING_DAYS),
    }
}

/// 뷰 정의 SQL (이름, SELECT 본문).
fn view_bodies(dialect: Dialect) -> [(&'static str, String); 2] {
    let table = MARKET_DATA_SCHEMA.table;
    let window = window_predicate(dialect);

    let daily_summary = format!(
        "SELECT
    {trading_date} AS trading_date,
    symbol,
    close,
    volume,
    daily_return,
    volatility,
    ma_5,
    ma_10,
    CASE WHEN ma_5 > ma_10 THEN 'Bullish' ELSE 'Bearish' END AS trend
FROM {table}
WHERE {window}
ORDER BY date DESC, symbol",
        trading_date = trading_date_expr(dialect),
    );

    let top_performers = format!(
        "SELECT
    symbol,
    AVG(daily_return) AS avg_return,
    AVG(volatility) AS avg_volatility,
    MAX(close) AS max_price,
    MIN(close) AS min_price,
    SUM(volume) AS total_volume
FROM {table}
WHERE {window}
GROUP BY symbol
ORDER BY avg_return DESC"
    );

    [
        (VIEW_NAMES[0], daily_summary),
        (VIEW_NAMES[1], top_performers),
    ]
}

/// 뷰 재정의 SQL 목록.
///
/// SQLite는 `CREATE OR REPLACE VIEW`가 없으므로 DROP 후 CREATE 합니다.
pub fn view_statements(dialect: Dialect) -> Vec<String> {
    let mut statements = Vec::new();
    for (name, body) in view_bodies(dialect) {
        match dialect {
            Dialect::Postgres => {
                statements.push(format!("CREATE OR REPLACE VIEW {name} AS\n{body}"));
            }
            Dialect::Sqlite => {
                statements.push(format!("DROP VIEW IF EXISTS {name}"));
                statements.push(format!("CREATE VIEW {name} AS\n{body}"));
            }
        }
    }
    statements
}

/// 분석 뷰 재정의.
///
/// 기본 테이블이 아직 없으면 먼저 생성합니다. 실패 시 롤백 후 에러를 반환합니다.
#[instrument(skip(session), fields(dialect = session.dialect().name()))]
pub async fn refresh_views(session: &mut dyn WarehouseSession) -> Result<()> {
    let dialect = session.dialect();

    let result = async {
        session
            .execute(&MARKET_DATA_SCHEMA.create_table_sql(dialect))
            .await?;
        for sql in view_statements(dialect) {
            session.execute(&sql).await?;
        }
        session.commit().await
    }
    .await;

    match result {
        Ok(()) => {
            info!(views = ?VIEW_NAMES, "분석 뷰 갱신 완료");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "분석 뷰 갱신 실패");
            if let Err(rollback_err) = session.rollback().await {
                warn!(error = %rollback_err, "롤백 실패");
            }
            Err(e)
        }
    }
}
