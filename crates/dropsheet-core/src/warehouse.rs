// crates/dropsheet-core/src/warehouse.rs

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column as _, Pool, Postgres, Row, TypeInfo};
use tracing::info;

use crate::collaborators::QueryExecutor;
use crate::date_window::DATE_FORMAT;
use crate::error::{PipelineError, Result};

pub type DbPool = Pool<Postgres>;

const WAREHOUSE: &str = "warehouse";

/// Establish a Postgres connection pool for the nightly run.
pub async fn connect(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|err| PipelineError::connectivity(WAREHOUSE, err))?;
    info!("Warehouse connection pool established");
    Ok(pool)
}

#[derive(Debug, Clone)]
pub struct PgQueryExecutor {
    pool: DbPool,
}

impl PgQueryExecutor {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgQueryExecutor {
    async fn run(&self, sql: &str) -> Result<DataFrame> {
        info!("Executing query");
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|err| PipelineError::connectivity(WAREHOUSE, err))?;
        rows_to_frame(&rows)
    }
}

enum ColumnValues {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

/// Converts result rows into a DataFrame, one column per selected expression.
fn rows_to_frame(rows: &[PgRow]) -> Result<DataFrame> {
    let Some(first) = rows.first() else {
        return Ok(DataFrame::default());
    };

    let mut columns: Vec<Column> = Vec::with_capacity(first.columns().len());
    for (ordinal, column) in first.columns().iter().enumerate() {
        let name = column.name();
        let values = match column.type_info().name() {
            "INT2" => ColumnValues::Int(decode(rows, ordinal, |v: Option<i16>| v.map(i64::from))?),
            "INT4" => ColumnValues::Int(decode(rows, ordinal, |v: Option<i32>| v.map(i64::from))?),
            "INT8" => ColumnValues::Int(decode(rows, ordinal, |v: Option<i64>| v)?),
            "FLOAT4" => {
                ColumnValues::Float(decode(rows, ordinal, |v: Option<f32>| v.map(f64::from))?)
            }
            "FLOAT8" => ColumnValues::Float(decode(rows, ordinal, |v: Option<f64>| v)?),
            "BOOL" => ColumnValues::Bool(decode(rows, ordinal, |v: Option<bool>| v)?),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                ColumnValues::Text(decode(rows, ordinal, |v: Option<String>| v)?)
            }
            "DATE" => ColumnValues::Text(decode(rows, ordinal, |v: Option<NaiveDate>| {
                v.map(|date| date.format(DATE_FORMAT).to_string())
            })?),
            "TIMESTAMP" => ColumnValues::Text(decode(rows, ordinal, |v: Option<NaiveDateTime>| {
                v.map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            })?),
            "TIMESTAMPTZ" => {
                ColumnValues::Text(decode(rows, ordinal, |v: Option<DateTime<Utc>>| {
                    v.map(|ts| ts.to_rfc3339())
                })?)
            }
            other => {
                return Err(PipelineError::schema(
                    WAREHOUSE,
                    format!("column `{name}` has unsupported type {other}; cast it in the query"),
                ))
            }
        };

        let series = match values {
            ColumnValues::Int(values) => Series::new(name.into(), values),
            ColumnValues::Float(values) => Series::new(name.into(), values),
            ColumnValues::Bool(values) => Series::new(name.into(), values),
            ColumnValues::Text(values) => Series::new(name.into(), values),
        };
        columns.push(series.into());
    }

    DataFrame::new(columns).map_err(PipelineError::from)
}

fn decode<'r, T, U, F>(rows: &'r [PgRow], ordinal: usize, convert: F) -> Result<Vec<Option<U>>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: Fn(T) -> Option<U>,
{
    rows.iter()
        .map(|row| {
            row.try_get::<T, _>(ordinal)
                .map(&convert)
                .map_err(|err| PipelineError::schema(WAREHOUSE, err.to_string()))
        })
        .collect()
}
