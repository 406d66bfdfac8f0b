//! Parquet 내보내기.
//!
//! 적재 테이블과 같은 스키마/컬럼 순서로 DataFrame을 만들고
//! 메모리 버퍼에 Parquet으로 직렬화합니다.

use polars::prelude::{Column, DataFrame, DataType, ParquetWriter, TimeUnit};

use market_core::EnrichedBar;

use crate::error::{DataError, Result};
use crate::storage::schema::{ColumnSpec, ColumnType, SqlValue, MARKET_DATA_SCHEMA};

fn build_column(def: &ColumnSpec, bars: &[EnrichedBar]) -> Result<Column> {
    let values = bars.iter().map(|bar| (def.value)(bar));
    let name = def.name.into();

    let column = match def.column_type {
        ColumnType::Timestamp => {
            let millis: Vec<Option<i64>> = values
                .map(|v| match v {
                    SqlValue::Timestamp(ts) => ts.map(|t| t.and_utc().timestamp_millis()),
                    _ => None,
                })
                .collect();
            Column::new(name, millis)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .map_err(|e| DataError::ParquetError(format!("{} cast: {e}", def.name)))?
        }
        ColumnType::Numeric => {
            let numbers: Vec<Option<f64>> = values
                .map(|v| match v {
                    SqlValue::Numeric(n) => n,
                    _ => None,
                })
                .collect();
            Column::new(name, numbers)
        }
        ColumnType::BigInt => {
            let integers: Vec<Option<i64>> = values
                .map(|v| match v {
                    SqlValue::BigInt(n) => n,
                    _ => None,
                })
                .collect();
            Column::new(name, integers)
        }
        ColumnType::Symbol => {
            let texts: Vec<Option<String>> = values
                .map(|v| match v {
                    SqlValue::Text(s) => s,
                    _ => None,
                })
                .collect();
            Column::new(name, texts)
        }
    };

    Ok(column)
}

/// 일봉 → DataFrame (적재 스키마 컬럼 순서).
pub fn bars_to_dataframe(bars: &[EnrichedBar]) -> Result<DataFrame> {
    let columns = MARKET_DATA_SCHEMA
        .columns
        .iter()
        .map(|def| build_column(def, bars))
        .collect::<Result<Vec<_>>>()?;

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

/// 일봉 → Parquet 바이트.
pub fn write_parquet_bytes(bars: &[EnrichedBar]) -> Result<Vec<u8>> {
    let mut df = bars_to_dataframe(bars)?;
    let mut buffer = Vec::new();

    ParquetWriter::new(&mut buffer)
        .finish(&mut df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;

    Ok(buffer)
}
