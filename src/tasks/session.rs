//! 会话控制与行格式
//!
//! 与硬件无关的部分: 按键切换会话、写表头、写样本行。
//! 记录任务只负责把信号和样本送到这里。

use crate::config::LoggerConfig;
use crate::fs::Storage;
use crate::logger::{Clock, CsvLogger, LoggerError};

/// 12 位 ADC 满量程
const ADC_FULL_SCALE: f32 = 4095.0;

/// 11dB 衰减下的满量程电压 (V)
const ADC_FULL_SCALE_VOLTS: f32 = 3.1;

/// CSV 表头
pub const HEADER: [&str; 3] = ["uptime_ms", "raw", "volts"];

/// 电压列的小数位数
const VOLTS_DECIMALS: u8 = 3;

/// 固件记录器配置
///
/// 每行自带 `uptime_ms` 列，不启用时间戳前缀，表头因此保持纯文本。
pub const FIRMWARE_CONFIG: LoggerConfig = LoggerConfig::new();

/// 一次采样
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    /// 启动以来的毫秒数
    pub uptime_ms: u64,
    /// ADC 原始值
    pub raw: u16,
}

impl Sample {
    /// 换算为电压
    pub fn volts(&self) -> f32 {
        self.raw as f32 * ADC_FULL_SCALE_VOLTS / ADC_FULL_SCALE
    }
}

/// 按当前状态开始或结束会话
///
/// 以记录器自身的状态为准，开始失败后下一次按键仍然是开始。
pub fn toggle_session<S: Storage, C: Clock>(logger: &mut CsvLogger<S, C>) -> Result<(), LoggerError> {
    if logger.is_logging_enabled() {
        logger.end_logging()
    } else {
        start_session(logger)
    }
}

/// 打开新文件并写入表头
pub fn start_session<S: Storage, C: Clock>(logger: &mut CsvLogger<S, C>) -> Result<(), LoggerError> {
    logger.start_logging()?;
    for column in HEADER {
        logger.add_text(column)?;
    }
    logger.add_line_break()
}

/// 写入一行样本 (未在记录时忽略)
pub fn record_sample<S: Storage, C: Clock>(logger: &mut CsvLogger<S, C>, sample: &Sample) -> Result<(), LoggerError> {
    if !logger.is_logging_enabled() {
        return Ok(());
    }
    logger.add_display(sample.uptime_ms)?;
    logger.add_display(sample.raw)?;
    logger.add_value_with_precision(sample.volts(), VOLTS_DECIMALS)?;
    logger.add_line_break()
}
