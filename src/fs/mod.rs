//! 存储介质模块
//!
//! - `storage`: 驱动接口 [`Storage`] 与公共类型
//! - `memory`: 无硬件的内存实现 (测试 / 主机模拟)
//! - `sdcard`: 基于 embedded-sdmmc 的 SD 卡 FAT 实现 (feature = "sdcard")

pub mod memory;
#[cfg(feature = "sdcard")]
pub mod sdcard;
pub mod storage;

pub use memory::{MemHandle, MemStorage};
#[cfg(feature = "sdcard")]
pub use sdcard::{FixedTimeSource, SdStorage};
pub use storage::{CardType, FileType, FsError, Metadata, OpenOptions, Storage};
