//! Shared helpers: sparse merge walk and work partitioning

use std::{collections::btree_map, iter::Peekable, ops::Range};

/// Fold `f(a_i, b_i)` over the union of non-zero indices of two coordinate maps
///
/// Both maps are walked once in ascending key order, an index present in only
/// one map is paired with `0.0`. Cost is linear in the number of non-zeros.
pub fn merge_fold<F>(
    left: btree_map::Iter<'_, usize, f64>,
    right: btree_map::Iter<'_, usize, f64>,
    mut f: F
) -> f64
where
    F: FnMut(f64, f64) -> f64
{
    let mut left: Peekable<_> = left.peekable();
    let mut right: Peekable<_> = right.peekable();
    let mut acc = 0.0;
    loop {
        match (left.peek(), right.peek()) {
            (Some((li, lv)), Some((ri, rv))) => {
                if li < ri {
                    acc += f(**lv, 0.0);
                    left.next();
                } else if ri < li {
                    acc += f(0.0, **rv);
                    right.next();
                } else {
                    acc += f(**lv, **rv);
                    left.next();
                    right.next();
                }
            },
            (Some((_, lv)), None) => {
                acc += f(**lv, 0.0);
                left.next();
            },
            (None, Some((_, rv))) => {
                acc += f(0.0, **rv);
                right.next();
            },
            (None, None) => break
        }
    }
    acc
}

/// Split `[0, len)` into `parts` contiguous ranges of `len / parts` items
///
/// The last range absorbs the remainder. Ranges may be empty when `len < parts`.
pub fn chunk_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    let size = len / parts;
    (0..parts)
        .map(|p| {
            let start = p * size;
            let end = if p + 1 == parts { len } else { start + size };
            start..end
        })
        .collect()
}

/// Split a mutable slice along `ranges` (which must tile the slice in order)
pub fn split_by_ranges<'a, T>(mut slice: &'a mut [T], ranges: &[Range<usize>]) -> Vec<&'a mut [T]> {
    let mut parts = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = slice.split_at_mut(range.len());
        parts.push(head);
        slice = tail;
    }
    parts
}
