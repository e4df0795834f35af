use std::collections::HashMap;

use super::stores::MetadataStore;
use crate::{
    error::{AppError, AppResult},
    models::{ItemId, RecommendationRecord},
};

/// Joins final item ids against metadata in one batched lookup
///
/// Output order follows `items`. Items without metadata get a bare record
/// rather than an error. With `detailed` set each record carries the item's
/// score from `scores`, when it has one.
pub async fn format(
    items: &[ItemId],
    scores: &HashMap<ItemId, f64>,
    store: &dyn MetadataStore,
    detailed: bool,
) -> AppResult<Vec<RecommendationRecord>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let metadata = store.lookup_batch(items).await?;

    let missing = items.iter().filter(|id| !metadata.contains_key(id)).count();
    if missing > 0 {
        tracing::debug!(missing, total = items.len(), "Formatting items without metadata");
    }

    let records = items
        .iter()
        .map(|item_id| {
            let mut record = metadata
                .get(item_id)
                .map(RecommendationRecord::from)
                .unwrap_or_else(|| RecommendationRecord::bare(*item_id));
            if detailed {
                record.score = scores.get(item_id).copied();
            }
            record
        })
        .collect();

    Ok(records)
}

/// Enriched record for a single item, `NotFound` when it has no metadata
pub async fn format_one(
    item_id: ItemId,
    store: &dyn MetadataStore,
) -> AppResult<RecommendationRecord> {
    let metadata = store.lookup_batch(&[item_id]).await?;

    metadata
        .get(&item_id)
        .map(RecommendationRecord::from)
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))
}
