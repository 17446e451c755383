use serde::Deserialize;
use serde_json::Value;

use super::{payload_items, require_drop_date, DropKind, DropRecord};
use crate::error::{PipelineError, Result};

const SOURCE: &str = "comics";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComicItem {
    drop_date: String,
    publisher: String,
    series: String,
    issue: Value,
    editions: i64,
}

/// One row per comic issue: the publisher becomes the brand and the issue number is folded
/// into the series name (`Saga #3`). Comics carry no season.
pub fn transform_comics(payload: &Value) -> Result<Vec<DropRecord>> {
    payload_items(SOURCE, payload)?
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let comic: ComicItem = serde_json::from_value(item.clone())
                .map_err(|err| PipelineError::schema(SOURCE, format!("item {idx}: {err}")))?;
            let drop_date = require_drop_date(SOURCE, idx, &comic.drop_date)?;
            let issue = issue_label(&comic.issue).ok_or_else(|| {
                PipelineError::schema(
                    SOURCE,
                    format!("item {idx}: issue must be a number or string, found {}", comic.issue),
                )
            })?;

            Ok(DropRecord {
                drop_date,
                brand: comic.publisher,
                series: format!("{} #{}", comic.series, issue),
                season: None,
                editions: comic.editions,
                kind: DropKind::Comic,
            })
        })
        .collect()
}

fn issue_label(issue: &Value) -> Option<String> {
    match issue {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) => Some(text.clone()),
        _ => None,
    }
}
