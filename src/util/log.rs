//! 条件编译日志系统
//!
//! 根据 feature 选择不同的日志后端:
//! - `log-defmt`: 使用 defmt (高效二进制日志)
//! - `dev` / `log-println`: 使用 esp-println (文本日志)
//! - 默认 (release / 主机测试): 完全禁用日志 (零开销)
//!
//! 记录器的诊断输出 (串口控制台) 也走这一层。
//!
//! # 日志级别
//! - `log_error!`: 错误信息
//! - `log_warn!`: 警告信息
//! - `log_info!`: 一般信息
//! - `log_debug!`: 调试信息
//! - `log_trace!`: 详细跟踪

// ===================================================================
// defmt 后端 (feature = "log-defmt")
// ===================================================================
#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { defmt::info!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}

#[cfg(feature = "log-defmt")]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}

// ===================================================================
// esp-println 后端 (feature = "dev" 或 "log-println")
// ===================================================================
#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { esp_println::println!("INFO: {}", format_args!($($arg)*)) };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { esp_println::println!("DEBUG: {}", format_args!($($arg)*)) };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { esp_println::println!("WARNING: {}", format_args!($($arg)*)) };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { esp_println::println!("ERROR: {}", format_args!($($arg)*)) };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { esp_println::println!("TRACE: {}", format_args!($($arg)*)) };
}

// ===================================================================
// 空实现 (无日志 feature)
// ===================================================================
// 参数仍然经过 format_args! 类型检查，避免未使用变量告警
#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}
