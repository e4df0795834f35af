/// Read-through caching for score computations.
///
/// Returns the cached value for `$key` when present. Otherwise awaits
/// `$block`, queues the result for a background write with `$ttl` seconds to
/// live and returns it. A failed cache read is logged and treated as a miss,
/// so an unavailable Redis only costs the recomputation.
///
/// ```rust,ignore
/// let scores: ScoreMap = cached!(cache, key, 300, self.query_scores(user_id))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache.get_from_cache(&$key).await {
            Ok(Some(cached)) => Ok(cached),
            outcome => {
                if let Err(e) = outcome {
                    tracing::warn!(error = %e, key = %$key, "Cache read failed, recomputing");
                }
                match $block.await {
                    Ok(value) => {
                        $cache.set_in_background(&$key, &value, $ttl);
                        Ok(value)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }};
}
