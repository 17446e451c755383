//! Typed access to query results and conversion of report tables into sheet rows.

use chrono::NaiveDate;
use polars::prelude::*;
use serde_json::Value;

use crate::date_window::DATE_FORMAT;
use crate::error::{PipelineError, Result};

fn column<'a>(df: &'a DataFrame, table: &'static str, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| {
        PipelineError::schema(table, format!("missing required column `{name}`"))
    })
}

pub fn string_column(
    df: &DataFrame,
    table: &'static str,
    name: &str,
) -> Result<Vec<Option<String>>> {
    let casted = column(df, table, name)?.cast(&DataType::String)?;
    Ok(casted
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

/// Reads an integer column. Float columns are accepted only when every value is whole.
pub fn int_column(df: &DataFrame, table: &'static str, name: &str) -> Result<Vec<Option<i64>>> {
    let col = column(df, table, name)?;
    if col.dtype().is_float() {
        let floats = col.cast(&DataType::Float64)?;
        return floats
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(idx, value)| match value {
                None => Ok(None),
                Some(v) if is_whole(v) => Ok(Some(v as i64)),
                Some(v) => Err(PipelineError::schema(
                    table,
                    format!("row {idx}: column `{name}` holds {v}, expected a whole number"),
                )),
            })
            .collect();
    }

    let casted = col.strict_cast(&DataType::Int64).map_err(|err| {
        PipelineError::schema(table, format!("column `{name}` is not an integer column: {err}"))
    })?;
    Ok(casted.i64()?.into_iter().collect())
}

fn is_whole(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64
}

/// Reads Date, Datetime or `YYYY-MM-DD...` string columns as calendar dates.
pub fn date_column(
    df: &DataFrame,
    table: &'static str,
    name: &str,
) -> Result<Vec<Option<NaiveDate>>> {
    string_column(df, table, name)?
        .into_iter()
        .enumerate()
        .map(|(idx, value)| match value {
            None => Ok(None),
            Some(raw) => parse_leading_date(&raw).map(Some).ok_or_else(|| {
                PipelineError::schema(
                    table,
                    format!("row {idx}: column `{name}` holds `{raw}`, expected YYYY-MM-DD"),
                )
            }),
        })
        .collect()
}

fn parse_leading_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

pub fn header(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn rows(df: &DataFrame) -> Result<Vec<Vec<Value>>> {
    (0..df.height()).map(|idx| row(df, idx)).collect()
}

/// The only row of a daily summary table.
pub fn first_row(df: &DataFrame, table: &'static str) -> Result<Vec<Value>> {
    if df.height() == 0 {
        return Err(PipelineError::EmptyResult { table });
    }
    row(df, 0)
}

fn row(df: &DataFrame, idx: usize) -> Result<Vec<Value>> {
    df.get_columns()
        .iter()
        .map(|col| Ok(cell_value(col.get(idx)?)))
        .collect()
}

fn cell_value(value: AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::String(String::new()),
        AnyValue::Boolean(v) => Value::Bool(v),
        AnyValue::String(v) => Value::String(v.to_string()),
        AnyValue::StringOwned(v) => Value::String(v.to_string()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => float_value(f64::from(v)),
        AnyValue::Float64(v) => float_value(v),
        other => Value::String(other.to_string()),
    }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(String::new()))
}

/// Plain-text rendering used by file-based publishers.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
