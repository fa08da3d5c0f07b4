use std::collections::HashMap;
use std::hash::Hash;

/// Returns the most frequent value in `predictions`.
///
/// Ties go to the value whose first occurrence comes earliest, so the result
/// is deterministic for a given input order. Returns `None` for empty input.
pub fn majority_vote<T>(predictions: &[T]) -> Option<T>
where
    T: Eq + Hash + Clone,
{
    let mut counts: HashMap<&T, usize> = HashMap::new();
    for p in predictions {
        *counts.entry(p).or_default() += 1;
    }

    // Scanning in input order visits each value's first occurrence before any
    // later-seen value; a strict `>` keeps the earliest among equal counts.
    let mut best: Option<(usize, &T)> = None;
    for p in predictions {
        let count = counts[p];
        if best.is_none_or(|(best_count, _)| count > best_count) {
            best = Some((count, p));
        }
    }

    best.map(|(_, value)| value.clone())
}
