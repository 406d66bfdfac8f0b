//! 웨어하우스 저장소.

pub mod schema;
pub mod session;
pub mod upsert;
pub mod views;

pub use schema::{
    ColumnSpec, ColumnType, Dialect, MergeRule, SqlValue, TableSchema, MARKET_DATA_SCHEMA,
    SCHEMA_VERSION,
};
pub use session::{PgSession, SqliteSession, WarehouseSession, WarehouseTarget};
pub use upsert::{UpsertOutcome, WarehouseUpserter, DEFAULT_PAGE_SIZE};
pub use views::{refresh_views, view_statements, VIEW_NAMES};
