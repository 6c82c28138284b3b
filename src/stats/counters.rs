use std::sync::atomic::{AtomicU64, Ordering};

use super::code::ErrorCode;
use super::severity::{MessageType, MESSAGE_TYPE_COUNT};

/// Window counters for one error code.
///
/// Per message type there is one open bucket that ingest increments, a ring
/// of completed buckets, and the running sum of that ring. Only rotation and
/// reset write the ring and the sum; both run under the store's ring guard.
pub struct CategoryCounters {
    code: ErrorCode,
    name: &'static str,
    current: [AtomicU64; MESSAGE_TYPE_COUNT],
    history: [Box<[AtomicU64]>; MESSAGE_TYPE_COUNT],
    rolling_sum: [AtomicU64; MESSAGE_TYPE_COUNT],
}

impl CategoryCounters {
    /// Create zeroed counters with a ring of `ring_len` buckets per type.
    pub fn new(code: ErrorCode, name: &'static str, ring_len: usize) -> Self {
        Self {
            code,
            name,
            current: std::array::from_fn(|_| AtomicU64::new(0)),
            history: std::array::from_fn(|_| (0..ring_len).map(|_| AtomicU64::new(0)).collect()),
            rolling_sum: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Count one event in the open bucket.
    #[inline]
    pub fn increment(&self, t: MessageType) {
        self.current[t.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Close the open bucket for `t` into ring slot `idx`.
    ///
    /// Taking the open bucket with a swap means an increment racing the
    /// rotation lands in exactly one of the two buckets.
    pub(super) fn fold(&self, t: MessageType, idx: usize) {
        let i = t.index();
        let fresh = self.current[i].swap(0, Ordering::AcqRel);
        let slot = &self.history[i][idx];
        let evicted = slot.load(Ordering::Relaxed);
        let sum = self.rolling_sum[i].load(Ordering::Relaxed);
        self.rolling_sum[i].store(
            sum.saturating_sub(evicted).saturating_add(fresh),
            Ordering::Relaxed,
        );
        slot.store(fresh, Ordering::Relaxed);
    }

    /// Zero every bucket and the rolling sums.
    pub(super) fn clear(&self) {
        for i in 0..MESSAGE_TYPE_COUNT {
            self.current[i].store(0, Ordering::Relaxed);
            for slot in self.history[i].iter() {
                slot.store(0, Ordering::Relaxed);
            }
            self.rolling_sum[i].store(0, Ordering::Relaxed);
        }
    }

    /// Events in the still-open bucket.
    pub fn current(&self, t: MessageType) -> u64 {
        self.current[t.index()].load(Ordering::Relaxed)
    }

    /// Completed bucket stored at ring slot `idx`.
    pub fn bucket(&self, t: MessageType, idx: usize) -> u64 {
        self.history[t.index()]
            .get(idx)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    /// Sum of all completed buckets in the ring.
    pub fn rolling_sum(&self, t: MessageType) -> u64 {
        self.rolling_sum[t.index()].load(Ordering::Relaxed)
    }

    /// Copy of the whole ring for `t`, slot order.
    pub fn history(&self, t: MessageType) -> Vec<u64> {
        self.history[t.index()]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(ring_len: usize) -> CategoryCounters {
        CategoryCounters::new(ErrorCode::pack(b"42P01"), "undefined_table", ring_len)
    }

    #[test]
    fn test_fold_moves_open_bucket_into_ring() {
        let c = counters(4);
        c.increment(MessageType::Error);
        c.increment(MessageType::Error);
        c.increment(MessageType::Warning);

        c.fold(MessageType::Error, 0);

        assert_eq!(c.current(MessageType::Error), 0);
        assert_eq!(c.bucket(MessageType::Error, 0), 2);
        assert_eq!(c.rolling_sum(MessageType::Error), 2);
        // Other types are untouched until folded themselves.
        assert_eq!(c.current(MessageType::Warning), 1);
        assert_eq!(c.rolling_sum(MessageType::Warning), 0);
    }

    #[test]
    fn test_fold_evicts_previous_slot_value() {
        let c = counters(2);
        c.increment(MessageType::Fatal);
        c.fold(MessageType::Fatal, 0);
        c.increment(MessageType::Fatal);
        c.increment(MessageType::Fatal);
        c.increment(MessageType::Fatal);
        c.fold(MessageType::Fatal, 1);
        assert_eq!(c.rolling_sum(MessageType::Fatal), 4);

        // Slot 0 (value 1) is overwritten by an empty bucket.
        c.fold(MessageType::Fatal, 0);
        assert_eq!(c.rolling_sum(MessageType::Fatal), 3);
        assert_eq!(c.history(MessageType::Fatal), vec![0, 3]);
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let c = counters(3);
        for t in MessageType::all() {
            c.increment(*t);
            c.fold(*t, 1);
            c.increment(*t);
        }

        c.clear();

        for t in MessageType::all() {
            assert_eq!(c.current(*t), 0);
            assert_eq!(c.rolling_sum(*t), 0);
            assert!(c.history(*t).iter().all(|v| *v == 0));
        }
    }

    #[test]
    fn test_bucket_out_of_range_reads_zero() {
        let c = counters(2);
        assert_eq!(c.bucket(MessageType::Error, 7), 0);
    }
}
