//! 同步原语模块
//!
//! 基于 embassy-sync 封装的任务间通信原语:
//! - `CriticalSignal`: 单值信号量
//! - `CriticalChannel`: MPMC 消息队列

pub mod primitives;

pub use primitives::{CriticalChannel, CriticalSignal};
