//! Transport Throughput Metrics
//!
//! Lock-free counters for everything a device connection sends, plus a
//! windowed bytes-per-second meter that restarts after a quiet period so a
//! device that was idle for a while does not report a diluted rate.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counter set shared by a connection and anything reporting on it
#[derive(Clone, Default)]
pub struct MetricsTracker {
    bytes_sent: Arc<AtomicU64>,
    batches_sent: Arc<AtomicU64>,
    telemetry_records: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl MetricsTracker {
    /// Create new metrics tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one combined batch write
    #[inline]
    pub fn record_send(&self, bytes: usize) {
        self.batches_sent.fetch_add(1, Ordering::Release);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Release);
    }

    #[inline]
    pub fn record_telemetry(&self) {
        self.telemetry_records.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Release);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Acquire),
            batches_sent: self.batches_sent.load(Ordering::Acquire),
            telemetry_records: self.telemetry_records.load(Ordering::Acquire),
            errors: self.errors.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time counter values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub bytes_sent: u64,
    pub batches_sent: u64,
    pub telemetry_records: u64,
    pub errors: u64,
}

/// Bytes-per-second over a window that restarts once it grows too old
#[derive(Debug)]
pub struct ThroughputMeter {
    window: Duration,
    state: Mutex<MeterState>,
}

#[derive(Debug, Clone, Copy)]
struct MeterState {
    started: Instant,
    bytes: u64,
}

impl ThroughputMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(MeterState {
                started: Instant::now(),
                bytes: 0,
            }),
        }
    }

    /// Begin a fresh window at `now`
    pub fn restart(&self, now: Instant) {
        *self.state.lock() = MeterState {
            started: now,
            bytes: 0,
        };
    }

    /// Add `bytes` sent at `now`, restarting the window if it has expired
    pub fn record(&self, bytes: usize, now: Instant) {
        let mut state = self.state.lock();
        if now.saturating_duration_since(state.started) > self.window {
            *state = MeterState {
                started: now,
                bytes: 0,
            };
        }
        state.bytes += bytes as u64;
    }

    /// Average rate since the window started
    pub fn bytes_per_second(&self, now: Instant) -> u64 {
        let state = *self.state.lock();
        let elapsed = now.saturating_duration_since(state.started).as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (state.bytes as f64 / elapsed) as u64
    }
}
