// src/bidding/metrics.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// 驱动级延迟与结果计数指标
///
/// 全部为进程内原子量，可被任意数量的并发调用方更新；
/// 指标导出（Prometheus 等）由外部采集器基于快照完成。
#[derive(Debug, Default)]
pub struct LatencyMetrics {
    queries: AtomicU64,
    skips: AtomicU64,
    nobids: AtomicU64,
    successes: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    latency_sum_ns: AtomicU64,
    latency_count: AtomicU64,
    /// 错误按 HTTP 状态文本细分
    error_statuses: Mutex<HashMap<String, u64>>,
}

impl LatencyMetrics {
    pub fn begin_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_query_latency(&self, latency: Duration) {
        self.latency_sum_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_skip(&self) {
        self.skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_nobid(&self) {
        self.nobids.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// status_text 为空表示没有拿到响应
    pub fn inc_error(&self, status_text: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut statuses) = self.error_statuses.lock() {
            *statuses.entry(status_text.to_string()).or_insert(0) += 1;
        }
    }

    pub fn skips(&self) -> u64 {
        self.skips.load(Ordering::Relaxed)
    }

    /// 将当前计数写入快照
    pub fn fill_metrics(&self, info: &mut MetricsInfo) {
        info.queries = self.queries.load(Ordering::Relaxed);
        info.skips = self.skips.load(Ordering::Relaxed);
        info.nobids = self.nobids.load(Ordering::Relaxed);
        info.successes = self.successes.load(Ordering::Relaxed);
        info.errors = self.errors.load(Ordering::Relaxed);
        info.timeouts = self.timeouts.load(Ordering::Relaxed);
        let count = self.latency_count.load(Ordering::Relaxed);
        info.avg_latency_ms = if count > 0 {
            self.latency_sum_ns.load(Ordering::Relaxed) as f64 / count as f64 / 1_000_000.0
        } else {
            0.0
        };
        if let Ok(statuses) = self.error_statuses.lock() {
            info.error_statuses = statuses.clone();
        }
    }
}

/// 指标快照，叠加来源标识后交给上层采集
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsInfo {
    pub id: u64,
    pub protocol: String,
    pub qps_limit: i32,
    pub queries: u64,
    pub skips: u64,
    pub nobids: u64,
    pub successes: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub avg_latency_ms: f64,
    pub error_statuses: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = LatencyMetrics::default();
        metrics.begin_query();
        metrics.begin_query();
        metrics.inc_success();
        metrics.inc_error("Bad Gateway");
        metrics.update_query_latency(Duration::from_millis(10));
        metrics.update_query_latency(Duration::from_millis(30));

        let mut info = MetricsInfo::default();
        metrics.fill_metrics(&mut info);
        assert_eq!(info.queries, 2);
        assert_eq!(info.successes, 1);
        assert_eq!(info.errors, 1);
        assert_eq!(info.error_statuses.get("Bad Gateway"), Some(&1));
        assert!((info.avg_latency_ms - 20.0).abs() < 1e-6);
    }
}
