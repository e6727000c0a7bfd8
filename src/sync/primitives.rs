//! 同步原语封装
//!
//! 基于 embassy-sync 提供的同步原语，统一使用 CriticalSectionRawMutex
//! 以确保在 ESP32-S3 单核/双核环境下的正确性

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::Channel,
    signal::Signal,
};

// ===== 类型别名: 简化使用 =====

/// 临界区信号量 - 用于任务间单值通知
///
/// 多次发送只保留最后一个值
///
/// # Example
/// ```ignore
/// static TOGGLE: CriticalSignal<()> = CriticalSignal::new();
///
/// // 发送方
/// TOGGLE.signal(());
///
/// // 接收方 (异步)
/// TOGGLE.wait().await;
/// ```
pub type CriticalSignal<T> = Signal<CriticalSectionRawMutex, T>;

/// 临界区通道 - MPMC 消息队列
///
/// # Type Parameters
/// * `T` - 消息类型
/// * `N` - 队列容量
pub type CriticalChannel<T, const N: usize> = Channel<CriticalSectionRawMutex, T, N>;
