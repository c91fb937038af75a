//! Fixed-size partitioning of an eligible set.
//!
//! Two shapes are supported:
//! - primary-key ranges (`id_ranges`) when workers re-read their slice from storage
//! - offset chunks (`chunk`) when the selected records are already in hand

use serde::{Deserialize, Serialize};

/// Half-open primary-key range `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchRange {
    pub start: i64,
    pub end: i64,
}

impl BatchRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.start <= id && id < self.end
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).max(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Display for BatchRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Number of batches needed for `total` items: `ceil(total / batch_size)`.
///
/// A batch size of zero is treated as one.
pub fn batch_count(total: u64, batch_size: usize) -> u64 {
    let size = (batch_size.max(1)) as u64;
    if total == 0 { 0 } else { (total - 1) / size + 1 }
}

/// Partition the 1-based ids `1..=upper_id` into contiguous ranges.
///
/// The final range may be shorter than `batch_size`.
pub fn id_ranges(upper_id: i64, batch_size: usize) -> Vec<BatchRange> {
    if upper_id <= 0 {
        return Vec::new();
    }
    let size = i64::try_from(batch_size.max(1)).unwrap_or(i64::MAX);
    let count = batch_count(upper_id as u64, batch_size);

    (0..count as i64)
        .map(|n| {
            // ids are 1-based
            let start = n * size + 1;
            let end = start.saturating_add(size).min(upper_id + 1);
            BatchRange::new(start, end)
        })
        .collect()
}

/// An offset batch of already-selected items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub index: usize,
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split `items` into batches of at most `batch_size`, preserving order.
pub fn chunk<T>(items: Vec<T>, batch_size: usize) -> Vec<Batch<T>> {
    let size = batch_size.max(1);
    let mut batches = Vec::with_capacity(batch_count(items.len() as u64, size) as usize);
    let mut current = Vec::with_capacity(size.min(items.len()));

    for item in items {
        current.push(item);
        if current.len() == size {
            let index = batches.len();
            batches.push(Batch {
                index,
                items: std::mem::take(&mut current),
            });
        }
    }

    if !current.is_empty() {
        let index = batches.len();
        batches.push(Batch { index, items: current });
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_total_yields_no_batches() {
        assert_eq!(batch_count(0, 10), 0);
        assert!(id_ranges(0, 10).is_empty());
        assert!(chunk(Vec::<u8>::new(), 10).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_batch() {
        assert_eq!(batch_count(20, 10), 2);
        assert_eq!(
            id_ranges(20, 10),
            vec![BatchRange::new(1, 11), BatchRange::new(11, 21)]
        );
    }

    #[test]
    fn remainder_goes_into_a_short_final_batch() {
        assert_eq!(batch_count(21, 10), 3);
        let ranges = id_ranges(21, 10);
        assert_eq!(ranges.last(), Some(&BatchRange::new(21, 22)));
        assert_eq!(ranges.last().map(BatchRange::len), Some(1));
    }

    #[test]
    fn zero_batch_size_is_clamped_to_one() {
        assert_eq!(batch_count(3, 0), 3);
        assert_eq!(id_ranges(3, 0).len(), 3);
    }

    #[test]
    fn batch_size_one_with_three_records() {
        let batches = chunk(vec!['a', 'b', 'c'], 1);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 1));
        assert_eq!(batches[2].index, 2);
    }

    proptest! {
        #[test]
        fn ranges_cover_every_id_exactly_once(upper in 0i64..5_000, size in 0usize..700) {
            let ranges = id_ranges(upper, size);
            prop_assert_eq!(ranges.len() as u64, batch_count(upper.max(0) as u64, size));

            let mut expected_start = 1;
            for range in &ranges {
                prop_assert_eq!(range.start, expected_start);
                prop_assert!(!range.is_empty());
                prop_assert!(range.len() <= size.max(1) as u64);
                expected_start = range.end;
            }
            if upper > 0 {
                prop_assert_eq!(expected_start, upper + 1);
            }
        }

        #[test]
        fn chunks_preserve_order_and_bound(len in 0usize..400, size in 0usize..50) {
            let items: Vec<usize> = (0..len).collect();
            let batches = chunk(items.clone(), size);
            prop_assert_eq!(batches.len() as u64, batch_count(len as u64, size));
            prop_assert!(batches.iter().all(|b| b.len() <= size.max(1) && !b.is_empty()));
            let flattened: Vec<usize> = batches.into_iter().flat_map(|b| b.items).collect();
            prop_assert_eq!(flattened, items);
        }
    }
}
