pub mod code;
pub mod counters;
pub mod registry;
pub mod row;
pub mod severity;
pub mod slow;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use self::code::{ErrorCode, ERROR_CODES};
use self::counters::CategoryCounters;
use self::registry::CategoryRegistry;
use self::row::{StatRow, TOTAL_LABEL};
use self::severity::{MessageType, MESSAGE_TYPE_COUNT};
use self::slow::{SlowLogCounter, SlowLogStats};

/// Errors surfaced by the statistics service.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsError {
    #[error("error statistics are not initialized yet")]
    NotInitialized,

    #[error("error statistics are already initialized")]
    AlreadyInitialized,
}

/// Window geometry fixed at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsConfig {
    /// Length of one bucket.
    pub interval: Duration,
    /// Number of completed buckets kept in each ring.
    pub intervals_count: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            intervals_count: 120,
        }
    }
}

/// How an ingested event was attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Counted against its own error code.
    Known,
    /// Code not in the catalogue; counted against the fallback entry.
    Fallback,
    /// Statistics not initialized; nothing counted.
    Dropped,
}

/// Read-only view of one category, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryState {
    pub name: &'static str,
    pub current: u64,
    pub history: Vec<u64>,
    pub rolling_sum: u64,
}

struct Store {
    registry: CategoryRegistry,
    interval_ms: u64,
    ring_len: usize,
    /// Ring slot the next rotation writes into.
    current_index: AtomicUsize,
    totals: [AtomicU64; MESSAGE_TYPE_COUNT],
    slow: SlowLogCounter,
    /// Held by rotation and reset only.
    ring_guard: parking_lot::Mutex<()>,
}

impl Store {
    fn new(cfg: &StatsConfig, codes: &[(ErrorCode, &'static str)]) -> Self {
        let ring_len = cfg.intervals_count.max(1);
        Self {
            registry: CategoryRegistry::new(codes, ring_len),
            interval_ms: u64::try_from(cfg.interval.as_millis()).unwrap_or(u64::MAX),
            ring_len,
            current_index: AtomicUsize::new(0),
            totals: std::array::from_fn(|_| AtomicU64::new(0)),
            slow: SlowLogCounter::new(),
            ring_guard: parking_lot::Mutex::new(()),
        }
    }

    fn rotate(&self) {
        let _guard = self.ring_guard.lock();
        let idx = self.current_index.load(Ordering::Acquire);

        for entry in self.registry.entries() {
            for t in MessageType::all() {
                entry.fold(*t, idx);
            }
        }

        self.current_index
            .store((idx + 1) % self.ring_len, Ordering::Release);
    }

    fn clear(&self) {
        let _guard = self.ring_guard.lock();

        for entry in self.registry.entries() {
            entry.clear();
        }
        self.current_index.store(0, Ordering::Release);
        for total in &self.totals {
            total.store(0, Ordering::Relaxed);
        }
        self.slow.reset();
    }

    /// Ring slot holding the most recently completed bucket.
    fn previous_index(&self) -> usize {
        let idx = self.current_index.load(Ordering::Acquire);
        (idx + self.ring_len - 1) % self.ring_len
    }

    fn short_window_secs(&self) -> u32 {
        u32::try_from(self.interval_ms / 1000).unwrap_or(u32::MAX)
    }

    fn long_window_secs(&self) -> u32 {
        let ring_len = u32::try_from(self.ring_len).unwrap_or(u32::MAX);
        self.short_window_secs().saturating_mul(ring_len)
    }

    fn push_category_rows(
        &self,
        rows: &mut Vec<StatRow>,
        entry: &CategoryCounters,
        t: MessageType,
        prev_idx: usize,
    ) {
        let long_count = entry.rolling_sum(t);
        let short_count = entry.bucket(t, prev_idx);

        if long_count > 0 {
            rows.push(StatRow {
                time_interval: Some(self.long_window_secs()),
                message_type: t.as_str(),
                message: entry.name(),
                count: long_count,
            });
        }
        if short_count > 0 {
            rows.push(StatRow {
                time_interval: Some(self.short_window_secs()),
                message_type: t.as_str(),
                message: entry.name(),
                count: short_count,
            });
        }
    }
}

/// Process-wide error statistics service.
///
/// Starts uninitialized. After [`initialize`](Self::initialize) any number of
/// threads may [`record`](Self::record) events while a single driver calls
/// [`tick`](Self::tick) every bucket interval. Ingest and snapshot are
/// lock-free; tick and reset share a short guard.
pub struct ErrorStats {
    store: OnceLock<Store>,
}

impl ErrorStats {
    /// Create an uninitialized service.
    pub const fn new() -> Self {
        Self {
            store: OnceLock::new(),
        }
    }

    /// Allocate and zero the counter store using the built-in catalogue.
    pub fn initialize(&self, cfg: &StatsConfig) -> Result<(), StatsError> {
        self.initialize_with_codes(cfg, ERROR_CODES)
    }

    /// Allocate and zero the counter store for a custom code catalogue.
    pub fn initialize_with_codes(
        &self,
        cfg: &StatsConfig,
        codes: &[(ErrorCode, &'static str)],
    ) -> Result<(), StatsError> {
        let mut fresh = false;
        let store = self.store.get_or_init(|| {
            fresh = true;
            Store::new(cfg, codes)
        });

        if !fresh {
            return Err(StatsError::AlreadyInitialized);
        }

        info!(
            categories = store.registry.len(),
            interval_ms = store.interval_ms,
            intervals_count = store.ring_len,
            "error statistics initialized",
        );

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.store.get().is_some()
    }

    fn store(&self) -> Result<&Store, StatsError> {
        self.store.get().ok_or(StatsError::NotInitialized)
    }

    /// Count one event of type `t` classified as `code`.
    ///
    /// Unknown codes are counted against the fallback entry. Before
    /// initialization the event is dropped.
    #[inline]
    pub fn record(&self, t: MessageType, code: ErrorCode) -> Recorded {
        let Some(store) = self.store.get() else {
            return Recorded::Dropped;
        };

        let lookup = store.registry.lookup(code);
        if !lookup.known {
            info!(code = %code, message_type = %t, "not known error code");
        }

        lookup.entry.increment(t);
        store.totals[t.index()].fetch_add(1, Ordering::Relaxed);

        if lookup.known {
            Recorded::Known
        } else {
            Recorded::Fallback
        }
    }

    /// Count one slow-statement log line. Dropped before initialization.
    #[inline]
    pub fn record_slow_event(&self) {
        if let Some(store) = self.store.get() {
            store.slow.increment();
        }
    }

    /// Close the current bucket of every category and advance the ring.
    ///
    /// Must be driven by a single periodic caller.
    pub fn tick(&self) -> Result<(), StatsError> {
        let store = self.store()?;
        store.rotate();
        debug!(
            index = store.current_index.load(Ordering::Relaxed),
            "rotated error statistics"
        );
        Ok(())
    }

    /// Totals per type, then long/short window rows for every non-zero
    /// category, in registration order.
    pub fn snapshot(&self) -> Result<Vec<StatRow>, StatsError> {
        let store = self.store()?;
        let prev_idx = store.previous_index();
        let mut rows = Vec::with_capacity(MESSAGE_TYPE_COUNT * 4);

        for t in MessageType::all() {
            rows.push(StatRow {
                time_interval: None,
                message_type: t.as_str(),
                message: TOTAL_LABEL,
                count: store.totals[t.index()].load(Ordering::Relaxed),
            });

            for entry in store.registry.entries() {
                store.push_category_rows(&mut rows, entry, *t, prev_idx);
            }
        }

        Ok(rows)
    }

    /// Zero every counter, sum and total, and restart the slow tally.
    pub fn reset(&self) -> Result<(), StatsError> {
        let store = self.store()?;
        store.clear();
        info!("error statistics reset");
        Ok(())
    }

    /// Slow-statement tally, or `None` before initialization.
    pub fn slow_stats(&self) -> Option<SlowLogStats> {
        self.store.get().map(|store| store.slow.get())
    }

    /// Lifetime total for one type since the last reset.
    pub fn total(&self, t: MessageType) -> Result<u64, StatsError> {
        let store = self.store()?;
        Ok(store.totals[t.index()].load(Ordering::Relaxed))
    }

    /// Number of registered categories, fallback included.
    pub fn category_count(&self) -> Result<usize, StatsError> {
        Ok(self.store()?.registry.len())
    }

    /// Ring slot the next rotation will write into.
    pub fn current_index(&self) -> Result<usize, StatsError> {
        let store = self.store()?;
        Ok(store.current_index.load(Ordering::Acquire))
    }

    /// Counters of the category `code` resolves to.
    pub fn category(&self, t: MessageType, code: ErrorCode) -> Result<CategoryState, StatsError> {
        let store = self.store()?;
        let entry = store.registry.lookup(code).entry;
        Ok(CategoryState {
            name: entry.name(),
            current: entry.current(t),
            history: entry.history(t),
            rolling_sum: entry.rolling_sum(t),
        })
    }
}

impl Default for ErrorStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn initialized(interval_ms: u64, intervals_count: usize) -> ErrorStats {
        let stats = ErrorStats::new();
        stats
            .initialize(&StatsConfig {
                interval: Duration::from_millis(interval_ms),
                intervals_count,
            })
            .expect("first initialization");
        stats
    }

    fn rows_for<'a>(rows: &'a [StatRow], message: &str) -> Vec<&'a StatRow> {
        rows.iter().filter(|r| r.message == message).collect()
    }

    #[test]
    fn test_uninitialized_service() {
        let stats = ErrorStats::new();
        assert!(!stats.is_initialized());
        assert_eq!(stats.snapshot(), Err(StatsError::NotInitialized));
        assert_eq!(stats.reset(), Err(StatsError::NotInitialized));
        assert_eq!(stats.tick(), Err(StatsError::NotInitialized));
        assert!(stats.slow_stats().is_none());
        assert_eq!(
            stats.record(MessageType::Error, ErrorCode::pack(b"42P01")),
            Recorded::Dropped
        );
        stats.record_slow_event();
    }

    #[test]
    fn test_initialize_twice_is_rejected() {
        let stats = initialized(1000, 3);
        let err = stats.initialize(&StatsConfig::default()).unwrap_err();
        assert_eq!(err, StatsError::AlreadyInitialized);
        // Original geometry is kept.
        assert_eq!(stats.current_index(), Ok(0));
        let state = stats
            .category(MessageType::Error, ErrorCode::pack(b"42P01"))
            .expect("initialized");
        assert_eq!(state.history.len(), 3);
    }

    #[test]
    fn test_record_known_and_fallback() {
        let stats = initialized(1000, 3);
        assert_eq!(
            stats.record(MessageType::Warning, ErrorCode::pack(b"01000")),
            Recorded::Known
        );
        assert_eq!(
            stats.record(MessageType::Warning, ErrorCode::from_raw(12345)),
            Recorded::Fallback
        );
        assert_eq!(stats.total(MessageType::Warning), Ok(2));
        let fallback = stats
            .category(MessageType::Warning, ErrorCode::NOT_KNOWN)
            .expect("initialized");
        assert_eq!(fallback.current, 1);
    }

    #[test]
    fn test_every_unknown_code_is_logged() {
        let stats = initialized(1000, 3);
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            stats.record(MessageType::Error, ErrorCode::pack(b"ZZ001"));
            stats.record(MessageType::Error, ErrorCode::pack(b"23505"));
            stats.record(MessageType::Error, ErrorCode::pack(b"ZZ001"));
        });

        let out = logs.contents();
        assert_eq!(out.matches("not known error code").count(), 2, "{out}");
        assert_eq!(out.matches("code=ZZ001").count(), 2, "{out}");
    }

    #[test]
    fn test_snapshot_rows_and_windows() {
        let stats = initialized(5000, 120);
        let code = ErrorCode::pack(b"23505");
        stats.record(MessageType::Error, code);
        stats.tick().expect("tick");

        let rows = stats.snapshot().expect("snapshot");
        let unique = rows_for(&rows, "unique_violation");
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].time_interval, Some(600));
        assert_eq!(unique[1].time_interval, Some(5));
        assert!(unique.iter().all(|r| r.count == 1));
    }

    #[test]
    fn test_snapshot_totals_come_first_per_type() {
        let stats = initialized(1000, 2);
        stats.record(MessageType::Fatal, ErrorCode::pack(b"57P01"));
        stats.tick().expect("tick");

        let rows = stats.snapshot().expect("snapshot");
        let labels: Vec<_> = rows.iter().map(|r| (r.message_type, r.message)).collect();
        assert_eq!(
            labels,
            vec![
                ("WARNING", TOTAL_LABEL),
                ("ERROR", TOTAL_LABEL),
                ("FATAL", TOTAL_LABEL),
                ("FATAL", "admin_shutdown"),
                ("FATAL", "admin_shutdown"),
            ]
        );
    }

    #[test]
    fn test_index_wraps_around_ring() {
        let stats = initialized(1000, 3);
        for expected in [1, 2, 0, 1] {
            stats.tick().expect("tick");
            assert_eq!(stats.current_index(), Ok(expected));
        }
    }

    #[test]
    fn test_reset_rewinds_index_and_zeroes() {
        let stats = initialized(1000, 4);
        let code = ErrorCode::pack(b"40P01");
        stats.record(MessageType::Error, code);
        stats.tick().expect("tick");
        stats.record(MessageType::Error, code);
        stats.record_slow_event();

        stats.reset().expect("reset");

        assert_eq!(stats.current_index(), Ok(0));
        assert_eq!(stats.total(MessageType::Error), Ok(0));
        let state = stats.category(MessageType::Error, code).expect("state");
        assert_eq!(state.current, 0);
        assert_eq!(state.rolling_sum, 0);
        assert!(state.history.iter().all(|v| *v == 0));
        assert_eq!(stats.slow_stats().map(|s| s.count), Some(0));
    }

    #[test]
    fn test_custom_catalogue() {
        let stats = ErrorStats::new();
        let codes = [(ErrorCode::pack(b"P0001"), "raise_exception")];
        stats
            .initialize_with_codes(&StatsConfig::default(), &codes)
            .expect("init");
        assert_eq!(stats.category_count(), Ok(2));
        assert_eq!(
            stats.record(MessageType::Error, ErrorCode::pack(b"42P01")),
            Recorded::Fallback
        );
        assert_eq!(
            stats.record(MessageType::Error, ErrorCode::pack(b"P0001")),
            Recorded::Known
        );
    }
}
