//! Edges-first reordering of ranked retrieval results.
//!
//! Models attend best to the start and end of a long context. Given items
//! sorted best-first, the best item opens the list, the runner-up closes it,
//! and relevance falls off toward the middle from both sides:
//!
//! ```text
//! [best, 2nd, 3rd, 4th, 5th]  ->  [best, 3rd, 5th, 4th, 2nd]
//! ```

/// Reorder best-first `items` so the strongest sit at the edges.
///
/// Even-indexed items fill from the front, odd-indexed items fill from the
/// back. Lists of two or fewer are returned unchanged.
pub fn reorder_for_edges<T>(items: Vec<T>) -> Vec<T> {
    let len = items.len();
    if len <= 2 {
        return items;
    }

    let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
    let mut left = 0;
    let mut right = len - 1;

    for (i, item) in items.into_iter().enumerate() {
        if i % 2 == 0 {
            slots[left] = Some(item);
            left += 1;
        } else {
            slots[right] = Some(item);
            right = right.saturating_sub(1);
        }
    }

    slots.into_iter().flatten().collect()
}
