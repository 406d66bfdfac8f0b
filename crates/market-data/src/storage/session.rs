//! 웨어하우스 세션.
//!
//! 단일 연결 위에서 명시적 트랜잭션을 다루는 세션 추상화입니다.
//! 첫 문장 실행 시 트랜잭션이 시작되고 `commit`/`rollback`으로 끝납니다.
//!
//! - [`PgSession`]: PostgreSQL (운영)
//! - [`SqliteSession`]: SQLite 파일 DB (로컬 실행, 테스트)

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgQueryResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteQueryResult};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use super::schema::{Dialect, SqlValue};
use crate::error::{DataError, Result};

/// 웨어하우스 세션.
#[async_trait]
pub trait WarehouseSession: Send {
    fn dialect(&self) -> Dialect;

    /// SQL 문 실행 (영향받은 행 수 반환).
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// 행 배치 삽입.
    ///
    /// `insert_prefix`는 `INSERT INTO t (cols) ` 형태이며
    /// `page_size` 행 단위로 다중 VALUES 문을 실행합니다.
    async fn insert_rows(
        &mut self,
        insert_prefix: &str,
        rows: &[Vec<SqlValue>],
        page_size: usize,
    ) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// 연결 종료. 진행 중인 트랜잭션은 롤백됩니다.
    async fn close(&mut self) -> Result<()>;
}

fn closed() -> DataError {
    DataError::ConnectionError("세션이 이미 종료됨".to_string())
}

// sqlx 실행 future는 구체 수명에서 박싱 (async_trait의 Send 검사에 제네릭 Executor가 남지 않도록)

fn pg_raw<'c>(
    conn: &'c mut PgConnection,
    sql: &'c str,
) -> BoxFuture<'c, sqlx::Result<PgQueryResult>> {
    sqlx::Executor::execute(conn, sqlx::raw_sql(sql))
}

fn pg_insert<'c, 'args: 'c>(
    conn: &'c mut PgConnection,
    qb: &'c mut QueryBuilder<'args, Postgres>,
) -> BoxFuture<'c, sqlx::Result<PgQueryResult>> {
    qb.build().execute(conn).boxed()
}

fn sqlite_raw<'c>(
    conn: &'c mut SqliteConnection,
    sql: &'c str,
) -> BoxFuture<'c, sqlx::Result<SqliteQueryResult>> {
    sqlx::Executor::execute(conn, sqlx::raw_sql(sql))
}

fn sqlite_insert<'c, 'args: 'c>(
    conn: &'c mut SqliteConnection,
    qb: &'c mut QueryBuilder<'args, Sqlite>,
) -> BoxFuture<'c, sqlx::Result<SqliteQueryResult>> {
    qb.build().execute(conn).boxed()
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// PostgreSQL 세션.
pub struct PgSession {
    conn: Option<PgConnection>,
    in_tx: bool,
}

impl PgSession {
    pub async fn connect(options: &PgConnectOptions) -> Result<Self> {
        let conn = PgConnection::connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            in_tx: false,
        })
    }

    async fn begin_if_needed(&mut self) -> Result<&mut PgConnection> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        if !self.in_tx {
            pg_raw(&mut *conn, "BEGIN")
                .await
                .map_err(|e| DataError::TransactionError(e.to_string()))?;
            self.in_tx = true;
        }
        Ok(conn)
    }
}

#[async_trait]
impl WarehouseSession for PgSession {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let conn = self.begin_if_needed().await?;
        let result = pg_raw(conn, sql).await?;
        Ok(result.rows_affected())
    }

    async fn insert_rows(
        &mut self,
        insert_prefix: &str,
        rows: &[Vec<SqlValue>],
        page_size: usize,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let page_size = page_size.clamp(1, self.dialect().max_rows_per_insert(rows[0].len()));
        let conn = self.begin_if_needed().await?;
        let mut inserted = 0;

        for chunk in rows.chunks(page_size) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix);
            qb.push_values(chunk, |mut b, row| {
                for value in row {
                    match value {
                        SqlValue::Timestamp(v) => {
                            b.push_bind(*v);
                        }
                        // NUMERIC 컬럼은 Decimal로 바인딩 (NaN/무한대는 NULL)
                        SqlValue::Numeric(v) => {
                            b.push_bind(v.and_then(Decimal::from_f64));
                        }
                        SqlValue::BigInt(v) => {
                            b.push_bind(*v);
                        }
                        SqlValue::Text(v) => {
                            b.push_bind(v.clone());
                        }
                    }
                }
            });
            let result = pg_insert(&mut *conn, &mut qb).await?;
            inserted += result.rows_affected();
        }

        debug!(rows = rows.len(), inserted = inserted, "배치 삽입 완료");
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        if self.in_tx {
            pg_raw(&mut *conn, "COMMIT")
                .await
                .map_err(|e| DataError::TransactionError(e.to_string()))?;
            self.in_tx = false;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        if self.in_tx {
            // 실패해도 트랜잭션 상태는 해제 (연결 단위로 정리됨)
            self.in_tx = false;
            pg_raw(&mut *conn, "ROLLBACK")
                .await
                .map_err(|e| DataError::TransactionError(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.in_tx {
            self.rollback().await?;
        }
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        }
        Ok(())
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// SQLite 세션.
pub struct SqliteSession {
    conn: Option<SqliteConnection>,
    in_tx: bool,
}

impl SqliteSession {
    pub async fn connect(options: &SqliteConnectOptions) -> Result<Self> {
        let conn = SqliteConnection::connect_with(options)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Some(conn),
            in_tx: false,
        })
    }

    async fn begin_if_needed(&mut self) -> Result<&mut SqliteConnection> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        if !self.in_tx {
            sqlite_raw(&mut *conn, "BEGIN")
                .await
                .map_err(|e| DataError::TransactionError(e.to_string()))?;
            self.in_tx = true;
        }
        Ok(conn)
    }
}

#[async_trait]
impl WarehouseSession for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let conn = self.begin_if_needed().await?;
        let result = sqlite_raw(conn, sql).await?;
        Ok(result.rows_affected())
    }

    async fn insert_rows(
        &mut self,
        insert_prefix: &str,
        rows: &[Vec<SqlValue>],
        page_size: usize,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let page_size = page_size.clamp(1, self.dialect().max_rows_per_insert(rows[0].len()));
        let conn = self.begin_if_needed().await?;
        let mut inserted = 0;

        for chunk in rows.chunks(page_size) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(insert_prefix);
            qb.push_values(chunk, |mut b, row| {
                for value in row {
                    match value {
                        SqlValue::Timestamp(v) => {
                            b.push_bind(*v);
                        }
                        SqlValue::Numeric(v) => {
                            b.push_bind(v.filter(|x| x.is_finite()));
                        }
                        SqlValue::BigInt(v) => {
                            b.push_bind(*v);
                        }
                        SqlValue::Text(v) => {
                            b.push_bind(v.clone());
                        }
                    }
                }
            });
            let result = sqlite_insert(&mut *conn, &mut qb).await?;
            inserted += result.rows_affected();
        }

        debug!(rows = rows.len(), inserted = inserted, "배치 삽입 완료");
        Ok(inserted)
    }

    async fn commit(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        if self.in_tx {
            sqlite_raw(&mut *conn, "COMMIT")
                .await
                .map_err(|e| DataError::TransactionError(e.to_string()))?;
            self.in_tx = false;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().ok_or_else(closed)?;
        if self.in_tx {
            self.in_tx = false;
            sqlite_raw(&mut *conn, "ROLLBACK")
                .await
                .map_err(|e| DataError::TransactionError(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.in_tx {
            self.rollback().await?;
        }
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| DataError::ConnectionError(e.to_string()))?;
        }
        Ok(())
    }
}

// =============================================================================
// 연결 대상
// =============================================================================

/// 웨어하우스 연결 대상.
#[derive(Clone)]
pub enum WarehouseTarget {
    Postgres(PgConnectOptions),
    Sqlite(SqliteConnectOptions),
}

impl WarehouseTarget {
    /// PostgreSQL 접속 정보로 생성.
    pub fn postgres(host: &str, port: u16, database: &str, user: &str, password: &str) -> Self {
        Self::Postgres(
            PgConnectOptions::new()
                .host(host)
                .port(port)
                .database(database)
                .username(user)
                .password(password),
        )
    }

    /// SQLite 파일 DB (없으면 생성).
    pub fn sqlite_file(path: impl AsRef<Path>) -> Self {
        Self::Sqlite(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
    }

    /// 연결 URL 파싱 (`postgres://`, `postgresql://`, `sqlite:`).
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let options = PgConnectOptions::from_str(url)
                .map_err(|e| DataError::ConfigError(e.to_string()))?;
            Ok(Self::Postgres(options))
        } else if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)
                .map_err(|e| DataError::ConfigError(e.to_string()))?
                .create_if_missing(true);
            Ok(Self::Sqlite(options))
        } else {
            Err(DataError::ConfigError(format!(
                "지원하지 않는 웨어하우스 URL: {}",
                url.split("://").next().unwrap_or_default()
            )))
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// 로그용 설명 (비밀번호 제외).
    pub fn describe(&self) -> String {
        match self {
            Self::Postgres(options) => format!(
                "postgres://{}:{}/{}",
                options.get_host(),
                options.get_port(),
                options.get_database().unwrap_or_default()
            ),
            Self::Sqlite(options) => format!("sqlite://{}", options.get_filename().display()),
        }
    }

    /// 새 세션 연결.
    pub async fn connect(&self) -> Result<Box<dyn WarehouseSession>> {
        match self {
            Self::Postgres(options) => Ok(Box::new(PgSession::connect(options).await?)),
            Self::Sqlite(options) => Ok(Box::new(SqliteSession::connect(options).await?)),
        }
    }
}

impl fmt::Debug for WarehouseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WarehouseTarget")
            .field(&self.describe())
            .finish()
    }
}
