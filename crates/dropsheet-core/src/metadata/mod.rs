pub mod collectibles;
pub mod comics;
pub mod drops;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use polars::prelude::*;
use serde_json::Value;

use crate::date_window::format_date;
use crate::error::{PipelineError, Result};

pub use collectibles::transform_collectibles;
pub use comics::transform_comics;
pub use drops::build_drop_metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Collectible,
    Comic,
}

impl DropKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropKind::Collectible => "Collectible",
            DropKind::Comic => "Comic",
        }
    }
}

/// One row of the drop metadata table before the union-level season fill.
#[derive(Debug, Clone, PartialEq)]
pub struct DropRecord {
    pub drop_date: DateTime<Utc>,
    pub brand: String,
    pub series: String,
    pub season: Option<i64>,
    pub editions: i64,
    pub kind: DropKind,
}

impl DropRecord {
    pub fn drop_day(&self) -> NaiveDate {
        self.drop_date.date_naive()
    }
}

/// Materialises drop records in the published column order:
/// `dropDate, brand, series, type, season, editions`.
pub fn drop_frame(records: &[DropRecord]) -> Result<DataFrame> {
    let drop_dates: Vec<String> = records
        .iter()
        .map(|record| format_date(record.drop_day()))
        .collect();
    let brands: Vec<&str> = records.iter().map(|record| record.brand.as_str()).collect();
    let series: Vec<&str> = records.iter().map(|record| record.series.as_str()).collect();
    let kinds: Vec<&str> = records.iter().map(|record| record.kind.as_str()).collect();
    let seasons: Vec<Option<i64>> = records.iter().map(|record| record.season).collect();
    let editions: Vec<i64> = records.iter().map(|record| record.editions).collect();

    DataFrame::new(vec![
        Series::new("dropDate".into(), drop_dates).into(),
        Series::new("brand".into(), brands).into(),
        Series::new("series".into(), series).into(),
        Series::new("type".into(), kinds).into(),
        Series::new("season".into(), seasons).into(),
        Series::new("editions".into(), editions).into(),
    ])
    .map_err(PipelineError::from)
}

/// Splits a payload into its item objects: a bare object counts as a single item.
fn payload_items<'a>(source_name: &'static str, payload: &'a Value) -> Result<Vec<&'a Value>> {
    match payload {
        Value::Array(items) => Ok(items.iter().collect()),
        Value::Object(_) => Ok(vec![payload]),
        other => Err(PipelineError::schema(
            source_name,
            format!("expected a JSON array or object, found {}", json_kind(other)),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Interprets a `dropDate` value as a UTC instant.
///
/// RFC 3339 timestamps are shifted to UTC; naive timestamps and bare dates are taken as UTC.
pub fn parse_drop_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn require_drop_date(source_name: &'static str, idx: usize, raw: &str) -> Result<DateTime<Utc>> {
    parse_drop_date(raw).ok_or_else(|| {
        PipelineError::schema(source_name, format!("item {idx}: unparseable dropDate `{raw}`"))
    })
}
