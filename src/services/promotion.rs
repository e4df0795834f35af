use std::collections::HashSet;

use crate::models::ItemId;

/// Applies caller overrides to a ranked list and truncates it to `k`
///
/// Excluded items are dropped, including excluded items that were also
/// promoted. Surviving promoted items go first in caller order, whether or
/// not any provider ranked them; the ranked items follow without duplicates.
pub fn apply(
    ranked: &[ItemId],
    promoted: &[ItemId],
    excluded: &[ItemId],
    k: usize,
) -> Vec<ItemId> {
    let excluded: HashSet<&ItemId> = excluded.iter().collect();
    let mut seen: HashSet<ItemId> = HashSet::with_capacity(k);
    let mut result = Vec::with_capacity(k.min(promoted.len() + ranked.len()));

    let candidates = promoted.iter().chain(ranked.iter());

    for item_id in candidates {
        if result.len() == k {
            break;
        }
        if excluded.contains(item_id) || !seen.insert(*item_id) {
            continue;
        }
        result.push(*item_id);
    }

    tracing::debug!(
        ranked = ranked.len(),
        promoted = promoted.len(),
        excluded = excluded.len(),
        returned = result.len(),
        "Applied promotions and exclusions"
    );

    result
}
