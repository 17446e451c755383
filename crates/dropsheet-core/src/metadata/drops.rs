use polars::prelude::DataFrame;
use tracing::info;

use super::{drop_frame, DropRecord};
use crate::error::{PipelineError, Result};

/// Unions collectible and comic rows into the published drop table.
///
/// Rows are ordered by drop instant (collectibles before comics on ties, input order
/// otherwise) and every missing season is taken from the closest earlier row that has one.
pub fn build_drop_metadata(
    collectibles: Vec<DropRecord>,
    comics: Vec<DropRecord>,
) -> Result<DataFrame> {
    let mut records = collectibles;
    records.extend(comics);
    records.sort_by_key(|record| record.drop_date);

    let filled = forward_fill_seasons(records)?;
    info!(rows = filled.len(), "Built drop metadata table");
    drop_frame(&filled)
}

/// Carries the last seen season down the sequence. The first row must declare one.
pub fn forward_fill_seasons(records: Vec<DropRecord>) -> Result<Vec<DropRecord>> {
    let mut last_season: Option<i64> = None;
    records
        .into_iter()
        .map(|mut record| {
            match record.season {
                Some(season) => last_season = Some(season),
                None => {
                    let season = last_season.ok_or_else(|| {
                        PipelineError::Consistency(format!(
                            "no earlier season to fill {} drop `{}` / `{}` on {}",
                            record.kind.as_str(),
                            record.brand,
                            record.series,
                            record.drop_day()
                        ))
                    })?;
                    record.season = Some(season);
                }
            }
            Ok(record)
        })
        .collect()
}
