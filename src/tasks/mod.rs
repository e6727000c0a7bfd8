//! 固件任务模块
//!
//! - `session`: 会话切换与样本行格式 (与硬件无关)
//! - `sampler`: 周期性 ADC 采样与按键控制 (feature `esp`)
//! - `logging`: 持有记录器，按会话把样本写入 CSV (feature `esp`)

#[cfg(feature = "esp")]
pub mod logging;
#[cfg(feature = "esp")]
pub mod sampler;
pub mod session;
