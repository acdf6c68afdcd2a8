// src/bidding/counters.rs

use std::sync::atomic::{AtomicI64, Ordering};

/// 原子计数器（RPS 窗口内请求计数）
///
/// 秒边界上的重置允许竞态，窗口是近似的，不加栅栏。
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn inc(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }
}

/// 错误水位上限
const ERROR_LEVEL_CEILING: i64 = 1000;
/// 超过该水位即判定来源不健康，拒绝准入
const ERROR_LEVEL_THRESHOLD: i64 = 100;

/// 自适应错误计数器
///
/// 错误抬升水位、成功压低水位，水位被钳制在 [0, 上限]。
/// `next` 给出准入判定：水位越过阈值后拒绝，直到成功把它拉回。
#[derive(Debug, Default)]
pub struct ErrorCounter {
    level: AtomicI64,
}

impl ErrorCounter {
    pub fn inc(&self) {
        let _ = self
            .level
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some((v + 1).min(ERROR_LEVEL_CEILING))
            });
    }

    pub fn dec(&self) {
        let _ = self
            .level
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some((v - 1).max(0))
            });
    }

    /// 准入判定：true = 允许下一次请求
    pub fn next(&self) -> bool {
        self.level.load(Ordering::Relaxed) < ERROR_LEVEL_THRESHOLD
    }

    pub fn level(&self) -> i64 {
        self.level.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_counter_opens_after_threshold() {
        let counter = ErrorCounter::default();
        assert!(counter.next());
        for _ in 0..ERROR_LEVEL_THRESHOLD {
            counter.inc();
        }
        assert!(!counter.next());
    }

    #[test]
    fn error_counter_recovers_on_success() {
        let counter = ErrorCounter::default();
        for _ in 0..ERROR_LEVEL_THRESHOLD {
            counter.inc();
        }
        assert!(!counter.next());
        counter.dec();
        assert!(counter.next());
    }

    #[test]
    fn error_counter_level_is_clamped() {
        let counter = ErrorCounter::default();
        counter.dec();
        assert_eq!(counter.level(), 0);
        for _ in 0..(ERROR_LEVEL_CEILING + 10) {
            counter.inc();
        }
        assert_eq!(counter.level(), ERROR_LEVEL_CEILING);
    }
}
