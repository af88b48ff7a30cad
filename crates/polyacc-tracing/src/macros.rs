//! Instrumentation macros
//!
//! Thin wrappers that attach fields to a [`crate::performance::PerformanceSpan`]
//! or emit a standard event in one line.

/// Create a performance span, optionally with fields.
///
/// ```rust
/// use polyacc_tracing::perf_span;
///
/// {
///     let _span = perf_span!("launch", blocks = 16, threads = 64);
///     // ... operation ...
/// } // duration reported here
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name, None)
    }};
}

/// Create a performance span that reports only above `threshold_us`.
///
/// ```rust
/// use polyacc_tracing::perf_span_threshold;
///
/// let _span = perf_span_threshold!("copy", 1000, bytes = 4096);
/// ```
#[macro_export]
macro_rules! perf_span_threshold {
    ($name:expr, $threshold_us:expr) => {{
        $crate::performance::PerformanceSpan::new($name, Some($threshold_us))
    }};
    ($name:expr, $threshold_us:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let _span = tracing::debug_span!(
            "perf",
            name = $name,
            $($field = $value),+
        ).entered();
        $crate::performance::PerformanceSpan::new($name, Some($threshold_us))
    }};
}

/// Emit a debug-level performance event.
///
/// ```rust
/// use polyacc_tracing::perf_event;
///
/// perf_event!("shared_alloc", bytes = 64, lane = 0);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        tracing::debug!(
            event = $name,
            $($field = $value),+
        );
    };
}

/// Run a block and return `(result, duration_us)`.
///
/// ```rust
/// use polyacc_tracing::timed_block;
///
/// let (sum, duration_us) = timed_block!("sum", { (1..=100).sum::<i32>() });
/// assert_eq!(sum, 5050);
/// # let _ = duration_us;
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        tracing::debug!(operation = $name, duration_us = duration_us, "timed_block_complete");
        (result, duration_us)
    }};
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_perf_span_forms() {
        let _a = perf_span!("plain");
        let _b = perf_span!("fields", blocks = 4, threads = 8);
        let _c = perf_span_threshold!("threshold", 1000);
        let _d = perf_span_threshold!("threshold_fields", 1000, bytes = 2048);
    }

    #[test]
    fn test_perf_event() {
        perf_event!("barrier_released", generation = 3u64, group = 4usize);
    }

    #[test]
    fn test_timed_block() {
        let (result, duration_us) = timed_block!("sleep", {
            thread::sleep(Duration::from_millis(5));
            7
        });
        assert_eq!(result, 7);
        assert!(duration_us >= 5_000);
    }
}
