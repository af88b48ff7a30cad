//! Performance spans and standard performance events
//!
//! ```rust
//! use polyacc_tracing::performance::{record_transfer, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("copy_h2d", Some(100));
//! // ... copy ...
//! drop(span); // reports only if the copy took at least 100μs
//!
//! record_transfer(4096, "H2D", 250);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::Level;

static ENABLED: AtomicBool = AtomicBool::new(true);

// u64::MAX means "no global threshold"
static GLOBAL_THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// Apply process-wide performance span settings.
///
/// Called by [`crate::init_global_tracing`]; spans created with an explicit
/// threshold keep their own.
pub fn configure(enabled: bool, threshold_us: Option<u64>) {
    ENABLED.store(enabled, Ordering::Relaxed);
    GLOBAL_THRESHOLD_US.store(threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

/// Whether performance spans report at all
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn global_threshold_us() -> Option<u64> {
    match GLOBAL_THRESHOLD_US.load(Ordering::Relaxed) {
        u64::MAX => None,
        t => Some(t),
    }
}

/// RAII timer that reports its duration when dropped.
///
/// A span reports only if performance tracing is enabled and its duration
/// reaches the threshold (its own, or the global one set by [`configure`]).
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a debug-level span with an optional threshold in microseconds.
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    /// Create a span at the given level.
    pub fn with_level(level: Level, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %name),
            Level::DEBUG => tracing::debug_span!("perf", name = %name),
            Level::INFO => tracing::info_span!("perf", name = %name),
            Level::WARN => tracing::warn_span!("perf", name = %name),
            Level::ERROR => tracing::error_span!("perf", name = %name),
        };

        Self {
            name,
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Name of the measured operation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Microseconds since the span was created
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    fn should_report(&self, elapsed_us: u64) -> bool {
        is_enabled() && self.threshold_us.or_else(global_threshold_us).is_none_or(|t| elapsed_us >= t)
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();
        if self.should_report(elapsed_us) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record a device memory allocation.
pub fn record_allocation(size_bytes: usize, device: &str, pitch_bytes: usize, duration_us: u64) {
    tracing::debug!(
        event = "allocation",
        size_bytes,
        size_kb = size_bytes as f64 / 1024.0,
        device,
        pitch_bytes,
        duration_us,
        "memory_allocation"
    );
}

/// Record a copy between memories, with bandwidth in MiB/s.
///
/// `direction` is `"H2D"`, `"D2H"`, `"D2D"` or `"H2H"`.
pub fn record_transfer(bytes: usize, direction: &str, duration_us: u64) {
    let bandwidth_mbps = if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    };

    tracing::debug!(
        event = "transfer",
        bytes,
        direction,
        duration_us,
        bandwidth_mbps,
        "memory_transfer"
    );
}

/// Record a completed kernel launch, with lanes per second.
pub fn record_launch(backend: &str, blocks: usize, threads_per_block: usize, duration_us: u64) {
    let lanes = blocks * threads_per_block;
    let lanes_per_sec = if duration_us > 0 {
        (lanes as f64 / duration_us as f64) * 1_000_000.0
    } else {
        0.0
    };

    tracing::debug!(
        event = "launch",
        backend,
        blocks,
        threads_per_block,
        duration_us,
        lanes_per_sec,
        "kernel_launch"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_performance_span_creation() {
        let span = PerformanceSpan::new("launch", Some(1000));
        assert_eq!(span.name(), "launch");
        assert_eq!(span.threshold_us, Some(1000));
    }

    #[test]
    fn test_performance_span_elapsed() {
        let span = PerformanceSpan::new("sleep", None);
        thread::sleep(Duration::from_millis(5));
        assert!(span.elapsed_us() >= 5_000);
    }

    #[test]
    fn test_threshold_filtering() {
        let span = PerformanceSpan::with_level(Level::INFO, "filtered", Some(100));
        if is_enabled() {
            assert!(!span.should_report(99));
            assert!(span.should_report(100));
        }
    }

    #[test]
    fn test_record_events_do_not_panic() {
        record_allocation(1024, "cpu0", 64, 10);
        record_transfer(4096, "H2D", 250);
        record_transfer(4096, "D2H", 0);
        record_launch("cpu-threads", 4, 64, 500);
    }

    #[test]
    fn test_bandwidth_calculation() {
        // 1 MiB in 1ms = 1000 MiB/s
        let bytes = 1024 * 1024;
        let duration_us = 1000;
        let bandwidth_mbps = (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0);
        assert!((bandwidth_mbps - 1000.0).abs() < 0.01);
    }
}
