use rand::{seq::SliceRandom, Rng};

/// Number of trailing items that get shuffled for a list of `len` items
pub fn explore_count(len: usize, exploration_factor: f64) -> usize {
    if exploration_factor <= 0.0 {
        return 0;
    }
    let count = (len as f64 * exploration_factor.min(1.0)).floor() as usize;
    count.min(len)
}

/// Shuffles the tail of a ranked list for exploration
///
/// The last `floor(len * exploration_factor)` entries are permuted with the
/// caller's random source; the head keeps its order. With nothing to shuffle
/// the list is returned untouched and `rng` is not consumed.
pub fn adjust<T, R>(mut ranked: Vec<T>, exploration_factor: f64, rng: &mut R) -> Vec<T>
where
    R: Rng + ?Sized,
{
    let count = explore_count(ranked.len(), exploration_factor);
    if count == 0 {
        return ranked;
    }

    let head = ranked.len() - count;
    ranked[head..].shuffle(rng);

    tracing::debug!(
        head,
        shuffled = count,
        exploration_factor,
        "Applied exploration shuffle"
    );

    ranked
}
