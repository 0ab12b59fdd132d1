//! Splitting a file into per-worker byte ranges.

use crate::model::ByteRange;

/// Divide `total_size` bytes into `worker_count` contiguous ranges.
///
/// Every range but the last is `total_size / worker_count` bytes long; the
/// last one absorbs the remainder. Ranges never overlap and their union is
/// exactly `[0, total_size)`. When there are more workers than bytes the
/// leading ranges are empty. A `worker_count` of zero yields no ranges.
pub fn partition(total_size: u64, worker_count: usize) -> Vec<ByteRange> {
    if worker_count == 0 {
        return Vec::new();
    }

    let n = worker_count as u64;
    let block_size = total_size / n;

    (0..n)
        .map(|i| {
            let start = i * block_size;
            let end = if i == n - 1 {
                total_size
            } else {
                (i + 1) * block_size
            };
            ByteRange::new(start, end)
        })
        .collect()
}
