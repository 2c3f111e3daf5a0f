//! 时间源模块
//!
//! 所有过期判断都相对于一个显式注入的时间源，而不是直接调用 `Utc::now()`。
//! 生产环境使用 [`SystemClock`]；测试中使用 [`FixedClock`] 来精确推进时间，
//! 验证过期边界而无需真实等待。

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

/// 时间源接口
pub trait Clock: Send + Sync {
    /// 返回当前时刻
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
///
/// 直接读取操作系统时间，生产环境的默认实现。
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 固定时钟
///
/// 返回手动设置的时刻，可通过 [`set`](FixedClock::set) 和
/// [`advance`](FixedClock::advance) 调整。用于测试过期与时效逻辑。
///
/// # Example
///
/// ```rust
/// use passless::clock::{Clock, FixedClock};
/// use chrono::Duration;
///
/// let clock = FixedClock::at_timestamp(1000);
/// assert_eq!(clock.now().timestamp(), 1000);
///
/// clock.advance(Duration::seconds(86_401));
/// assert_eq!(clock.now().timestamp(), 87_401);
/// ```
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    /// 创建固定在指定时刻的时钟
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// 创建固定在指定 Unix 时间戳（秒）的时钟
    pub fn at_timestamp(secs: i64) -> Self {
        Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }

    /// 设置当前时刻
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }

    /// 向前推进指定时长
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write().unwrap();
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_fixed_clock_set_and_advance() {
        let clock = FixedClock::at_timestamp(1000);
        assert_eq!(clock.now().timestamp(), 1000);

        clock.advance(Duration::seconds(60));
        assert_eq!(clock.now().timestamp(), 1060);

        clock.set(DateTime::from_timestamp(5000, 0).unwrap());
        assert_eq!(clock.now().timestamp(), 5000);
    }

    #[test]
    fn test_fixed_clock_clones_share_state() {
        let clock = FixedClock::at_timestamp(0);
        let other = clock.clone();

        clock.advance(Duration::seconds(10));
        assert_eq!(other.now().timestamp(), 10);
    }
}
