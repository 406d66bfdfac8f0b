//! 웨어하우스 테이블 스키마 정의.
//!
//! 컬럼 순서, 의미 타입, 병합 규칙, 행 직렬화를 한 곳에 정의합니다.
//! 테이블 생성 DDL, 스테이징 INSERT, 병합 SQL, Parquet 내보내기가 모두
//! [`MARKET_DATA_SCHEMA`]에서 파생되므로 서로 어긋날 수 없습니다.

use chrono::NaiveDateTime;
use market_core::EnrichedBar;

/// 스키마 버전. 컬럼 구성이 바뀌면 올립니다.
pub const SCHEMA_VERSION: u32 = 1;

/// Postgres advisory lock 키 (실행 단위 잠금).
const RUN_LOCK_KEY: i64 = 0x6d6b_7464_6174_6131;

// =============================================================================
// 타입
// =============================================================================

/// 컬럼 의미 타입.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// 시간대 없는 타임스탬프
    Timestamp,
    /// 가격/지표 값
    Numeric,
    /// 정수 (거래량)
    BigInt,
    /// 종목 심볼
    Symbol,
}

/// 바인딩용 값. 컬럼 타입별로 NULL을 표현합니다.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Timestamp(Option<NaiveDateTime>),
    Numeric(Option<f64>),
    BigInt(Option<i64>),
    Text(Option<String>),
}

impl SqlValue {
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Timestamp(_) => ColumnType::Timestamp,
            Self::Numeric(_) => ColumnType::Numeric,
            Self::BigInt(_) => ColumnType::BigInt,
            Self::Text(_) => ColumnType::Symbol,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Self::Timestamp(v) => v.is_none(),
            Self::Numeric(v) => v.is_none(),
            Self::BigInt(v) => v.is_none(),
            Self::Text(v) => v.is_none(),
        }
    }
}

/// 기존 키와 충돌했을 때 컬럼 처리 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// 자연키 구성 컬럼
    Key,
    /// 새 값으로 덮어씀
    Overwrite,
    /// 최초 적재 값 유지
    Preserve,
}

/// 컬럼 정의.
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub merge: MergeRule,
    /// 일봉에서 컬럼 값 추출
    pub value: fn(&EnrichedBar) -> SqlValue,
}

impl std::fmt::Debug for ColumnSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("column_type", &self.column_type)
            .field("merge", &self.merge)
            .finish()
    }
}

/// 인덱스 정의.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: &'static str,
    pub columns: &'static str,
}

/// 버전이 있는 테이블 스키마.
#[derive(Debug)]
pub struct TableSchema {
    pub version: u32,
    /// 영구 테이블
    pub table: &'static str,
    /// 스테이징 테이블
    pub staging_table: &'static str,
    /// 적재 시각 컬럼 (영구 테이블 전용)
    pub loaded_at_column: &'static str,
    pub columns: &'static [ColumnSpec],
    pub indexes: &'static [IndexSpec],
}

// =============================================================================
// market_data 스키마
// =============================================================================

static MARKET_DATA_COLUMNS: [ColumnSpec; 16] = [
    ColumnSpec {
        name: "date",
        column_type: ColumnType::Timestamp,
        merge: MergeRule::Key,
        value: |bar: &EnrichedBar| SqlValue::Timestamp(Some(bar.raw.date_time())),
    },
    ColumnSpec {
        name: "open",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.raw.open),
    },
    ColumnSpec {
        name: "high",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.raw.high),
    },
    ColumnSpec {
        name: "low",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.raw.low),
    },
    ColumnSpec {
        name: "close",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.raw.close),
    },
    ColumnSpec {
        name: "volume",
        column_type: ColumnType::BigInt,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::BigInt(bar.raw.volume),
    },
    ColumnSpec {
        name: "dividends",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Preserve,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.raw.dividends),
    },
    ColumnSpec {
        name: "stock_splits",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Preserve,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.raw.stock_splits),
    },
    ColumnSpec {
        name: "symbol",
        column_type: ColumnType::Symbol,
        merge: MergeRule::Key,
        value: |bar: &EnrichedBar| SqlValue::Text(Some(bar.raw.symbol.clone())),
    },
    ColumnSpec {
        name: "extracted_at",
        column_type: ColumnType::Timestamp,
        merge: MergeRule::Preserve,
        value: |bar: &EnrichedBar| SqlValue::Timestamp(Some(bar.raw.extracted_at)),
    },
    ColumnSpec {
        name: "daily_return",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.daily_return),
    },
    ColumnSpec {
        name: "volatility",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.volatility),
    },
    ColumnSpec {
        name: "price_range",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.price_range),
    },
    ColumnSpec {
        name: "price_range_pct",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.price_range_pct),
    },
    ColumnSpec {
        name: "ma_5",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.ma_5),
    },
    ColumnSpec {
        name: "ma_10",
        column_type: ColumnType::Numeric,
        merge: MergeRule::Overwrite,
        value: |bar: &EnrichedBar| SqlValue::Numeric(bar.ma_10),
    },
];

static MARKET_DATA_INDEXES: [IndexSpec; 3] = [
    IndexSpec {
        name: "idx_market_data_symbol",
        columns: "symbol",
    },
    IndexSpec {
        name: "idx_market_data_date",
        columns: "date",
    },
    IndexSpec {
        name: "idx_market_data_symbol_date",
        columns: "symbol, date DESC",
    },
];

/// `market_data` 테이블 스키마 (v1).
pub static MARKET_DATA_SCHEMA: TableSchema = TableSchema {
    version: SCHEMA_VERSION,
    table: "market_data",
    staging_table: "market_data_staging",
    loaded_at_column: "loaded_at",
    columns: &MARKET_DATA_COLUMNS,
    indexes: &MARKET_DATA_INDEXES,
};

// =============================================================================
// SQL 방언
// =============================================================================

/// 웨어하우스 SQL 방언.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// 의미 타입 → DDL 타입.
    pub fn sql_type(&self, column_type: ColumnType) -> &'static str {
        match (self, column_type) {
            (_, ColumnType::Timestamp) => "TIMESTAMP",
            (Self::Postgres, ColumnType::Numeric) => "NUMERIC",
            (Self::Postgres, ColumnType::BigInt) => "BIGINT",
            (Self::Postgres, ColumnType::Symbol) => "VARCHAR(10)",
            (Self::Sqlite, ColumnType::Numeric) => "REAL",
            (Self::Sqlite, ColumnType::BigInt) => "INTEGER",
            (Self::Sqlite, ColumnType::Symbol) => "TEXT",
        }
    }

    /// 자동 증가 기본키 컬럼.
    pub fn identity_column(&self) -> &'static str {
        match self {
            Self::Postgres => "id SERIAL PRIMARY KEY",
            Self::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// 트랜잭션 범위 실행 잠금.
    ///
    /// SQLite는 쓰기 트랜잭션이 DB 단위로 직렬화되므로 별도 잠금이 없습니다.
    pub fn run_lock_sql(&self) -> Option<String> {
        match self {
            Self::Postgres => Some(format!("SELECT pg_advisory_xact_lock({})", RUN_LOCK_KEY)),
            Self::Sqlite => None,
        }
    }

    /// 문장당 바인드 파라미터 상한 (Postgres 프로토콜 u16, SQLite 기본 컴파일 옵션).
    pub fn max_bind_params(&self) -> usize {
        match self {
            Self::Postgres => 65_535,
            Self::Sqlite => 32_766,
        }
    }

    /// 행 폭 기준 다중 행 INSERT 한 문장의 최대 행 수.
    pub fn max_rows_per_insert(&self, columns: usize) -> usize {
        (self.max_bind_params() / columns.max(1)).max(1)
    }
}

// =============================================================================
// SQL 생성
// =============================================================================

impl TableSchema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// 쉼표로 구분된 컬럼 목록.
    pub fn column_list(&self) -> String {
        self.column_names().join(", ")
    }

    pub fn key_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.merge == MergeRule::Key)
            .map(|c| c.name)
            .collect()
    }

    /// 병합 시 덮어쓰는 컬럼.
    pub fn overwrite_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.merge == MergeRule::Overwrite)
            .map(|c| c.name)
            .collect()
    }

    fn column_definitions(&self, dialect: Dialect) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{} {}", c.name, dialect.sql_type(c.column_type)))
            .collect()
    }

    pub fn drop_staging_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.staging_table)
    }

    pub fn create_staging_sql(&self, dialect: Dialect) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.staging_table,
            self.column_definitions(dialect).join(",\n    ")
        )
    }

    /// 영구 테이블 DDL (자연키 UNIQUE 제약 포함).
    pub fn create_table_sql(&self, dialect: Dialect) -> String {
        let mut definitions = vec![dialect.identity_column().to_string()];
        definitions.extend(self.column_definitions(dialect));
        definitions.push(format!(
            "{} TIMESTAMP DEFAULT CURRENT_TIMESTAMP",
            self.loaded_at_column
        ));
        definitions.push(format!("UNIQUE({})", self.conflict_target()));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.table,
            definitions.join(",\n    ")
        )
    }

    pub fn create_index_sql(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|idx| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}({})",
                    idx.name, self.table, idx.columns
                )
            })
            .collect()
    }

    /// 스테이징 배치 INSERT 접두부 (VALUES는 세션이 채움).
    pub fn staging_insert_prefix(&self) -> String {
        format!(
            "INSERT INTO {} ({}) ",
            self.staging_table,
            self.column_list()
        )
    }

    /// 자연키 충돌 대상 (예: "symbol, date").
    fn conflict_target(&self) -> String {
        // 심볼이 선두인 인덱스 순서와 맞춤
        let mut keys = self.key_columns();
        keys.sort_by_key(|name| if *name == "symbol" { 0 } else { 1 });
        keys.join(", ")
    }

    /// 스테이징 → 영구 테이블 병합 SQL.
    ///
    /// 새 키는 삽입하고 기존 키는 관측/파생 컬럼을 덮어쓰며 적재 시각을 갱신합니다.
    /// `WHERE true`는 SQLite의 INSERT ... SELECT ... ON CONFLICT 구문 모호성을 피합니다.
    pub fn merge_sql(&self) -> String {
        let columns = self.column_list();
        let mut assignments: Vec<String> = self
            .overwrite_columns()
            .into_iter()
            .map(|name| format!("{name} = EXCLUDED.{name}"))
            .collect();
        assignments.push(format!("{} = CURRENT_TIMESTAMP", self.loaded_at_column));

        format!(
            "INSERT INTO {table} ({columns})\nSELECT {columns} FROM {staging} WHERE true\n\
             ON CONFLICT ({target}) DO UPDATE SET\n    {assignments}",
            table = self.table,
            columns = columns,
            staging = self.staging_table,
            target = self.conflict_target(),
            assignments = assignments.join(",\n    "),
        )
    }

    /// 일봉 → 스키마 순서의 바인딩 값.
    pub fn row_values(&self, bar: &EnrichedBar) -> Vec<SqlValue> {
        self.columns.iter().map(|c| (c.value)(bar)).collect()
    }
}
