//! Backward as-of matching by date.
//!
//! Both inputs must be ascending. A single merge scan walks the two slices
//! together, so matching n targets against m sources is O(n + m).

use chrono::NaiveDate;

/// For each target, the index of the last source dated on or before it.
///
/// If several sources share a date the last of them is chosen, which is the
/// keep-latest rule applied at the join.
pub fn asof_indices(targets: &[NaiveDate], sources: &[NaiveDate]) -> Vec<Option<usize>> {
    debug_assert!(targets.windows(2).all(|w| w[0] <= w[1]), "targets not ascending");
    debug_assert!(sources.windows(2).all(|w| w[0] <= w[1]), "sources not ascending");

    let mut out = Vec::with_capacity(targets.len());
    // Number of sources dated on or before the current target.
    let mut seen = 0;
    for &target in targets {
        while seen < sources.len() && sources[seen] <= target {
            seen += 1;
        }
        out.push(seen.checked_sub(1));
    }
    out
}

/// For each target, the index of the source dated exactly on it, if any.
pub fn exact_indices(targets: &[NaiveDate], sources: &[NaiveDate]) -> Vec<Option<usize>> {
    asof_indices(targets, sources)
        .into_iter()
        .zip(targets)
        .map(|(hit, target)| hit.filter(|&i| sources[i] == *target))
        .collect()
}
