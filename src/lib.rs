//! CsvLogger - 可移动存储介质上的 CSV 测量数据记录库
//!
//! 本库提供以下核心功能:
//! - 上电时扫描 `SET####` 目录并创建新的记录目录
//! - 以会话为单位创建 `#######.CSV` 记录文件
//! - 数值 / 文本字段追加，自动处理分隔符与换行
//! - 可注入的存储介质接口 (SD 卡 FAT / 内存模拟)
//! - 条件编译日志系统 (诊断输出)
//! - ESP32-S3 固件任务 (feature `esp`)

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod fs;
pub mod logger;
pub mod util;

#[cfg(feature = "esp")]
pub mod sync;
pub mod tasks;

// ===== 重导出常用类型 =====
pub use config::{LineEnding, LoggerConfig, MissingMediumPolicy};
pub use fs::{CardType, FsError, MemStorage, Storage};
pub use logger::{Clock, CsvLogger, FnClock, LoggerError, LoggerState, NoClock};

#[cfg(feature = "esp")]
pub use logger::clock::EmbassyClock;
#[cfg(feature = "sdcard")]
pub use fs::SdStorage;

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
