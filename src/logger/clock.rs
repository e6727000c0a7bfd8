//! 时间戳时钟源

/// 毫秒时钟
pub trait Clock {
    /// 单调递增的毫秒计数
    fn now_ms(&self) -> u64;
}

/// 空时钟，始终为 0 (未启用时间戳时使用)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    fn now_ms(&self) -> u64 {
        0
    }
}

/// 闭包时钟
pub struct FnClock<F>(pub F);

impl<F: Fn() -> u64> Clock for FnClock<F> {
    fn now_ms(&self) -> u64 {
        (self.0)()
    }
}

/// Embassy 时间驱动
#[cfg(feature = "esp")]
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

#[cfg(feature = "esp")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }
}
