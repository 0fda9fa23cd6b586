use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static REDUCTION_COUNT: AtomicU64 = AtomicU64::new(0);

/// 记录一次区域规约请求
pub fn record_reduction() {
    REDUCTION_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// 进程内累计规约请求数
pub fn reduction_count() -> u64 {
    REDUCTION_COUNT.load(Ordering::Relaxed)
}

/// 性能统计 Guard：记录 elapsed_ms + 期间发出的规约请求数
///
/// 使用方式：
/// ```ignore
/// let _perf = wsf_flood_exposure::perf::PerfGuard::new("process_region");
/// // do work...
/// ```
///
/// 规约计数为进程级计数，多个 Guard 并发时数值会互相包含
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    reductions_start: u64,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            reductions_start: reduction_count(),
        }
    }

    /// 自创建以来的规约请求数
    pub fn reductions(&self) -> u64 {
        reduction_count().saturating_sub(self.reductions_start)
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        let reductions = self.reductions();

        tracing::info!(
            target: "perf",
            op = self.op,
            elapsed_ms,
            reductions,
            "done"
        );
    }
}
