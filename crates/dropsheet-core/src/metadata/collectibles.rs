use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::{payload_items, require_drop_date, DropKind, DropRecord};
use crate::error::{PipelineError, Result};

const SOURCE: &str = "collectibles";

/// A drop as served by the collectibles metadata API. The drop-level fields apply to
/// every item listed under `collectibles`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectibleDrop {
    brand: String,
    series: String,
    drop_date: String,
    #[serde(default)]
    season: Option<i64>,
    collectibles: Vec<CollectibleItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectibleItem {
    total_issued: i64,
}

type GroupKey = (DateTime<Utc>, String, String);

#[derive(Default)]
struct GroupTotals {
    seasons: BTreeSet<i64>,
    editions: i64,
}

/// Flattens collectible drops into one row per `(dropDate, brand, series)`:
/// `editions` sums `totalIssued` over every item of the group and `season` is the largest
/// declared season (null when no drop in the group declares one).
pub fn transform_collectibles(payload: &Value) -> Result<Vec<DropRecord>> {
    let mut groups: BTreeMap<GroupKey, GroupTotals> = BTreeMap::new();

    for (idx, item) in payload_items(SOURCE, payload)?.into_iter().enumerate() {
        let parsed: CollectibleDrop = serde_json::from_value(item.clone())
            .map_err(|err| PipelineError::schema(SOURCE, format!("drop {idx}: {err}")))?;
        let drop_date = require_drop_date(SOURCE, idx, &parsed.drop_date)?;
        // Drops without items produce no rows.
        if parsed.collectibles.is_empty() {
            continue;
        }

        let totals = groups
            .entry((drop_date, parsed.brand, parsed.series))
            .or_default();
        if let Some(season) = parsed.season {
            totals.seasons.insert(season);
        }
        totals.editions += parsed
            .collectibles
            .iter()
            .map(|collectible| collectible.total_issued)
            .sum::<i64>();
    }

    let records = groups
        .into_iter()
        .map(|((drop_date, brand, series), totals)| {
            if totals.seasons.len() > 1 {
                warn!(
                    brand = %brand,
                    series = %series,
                    drop_date = %drop_date,
                    seasons = ?totals.seasons,
                    "conflicting seasons in one drop group; keeping the largest"
                );
            }
            DropRecord {
                drop_date,
                brand,
                series,
                season: totals.seasons.last().copied(),
                editions: totals.editions,
                kind: DropKind::Collectible,
            }
        })
        .collect();

    Ok(records)
}
