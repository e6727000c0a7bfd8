//! 数值字段格式化
//!
//! 先格式化到定长缓冲区，成功后才写入文件，保证失败时没有半截输出。

use core::fmt::Write;

use heapless::String;

use crate::config::{DEFAULT_DECIMAL_PLACES, FIXED_WIDTH_BASE};

/// 数值字段缓冲区容量
pub const FIELD_CAP: usize = 64;

/// 格式化后的数值字段
pub type Field = String<FIELD_CAP>;

/// 缓冲区不足
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOverflow;

/// 默认格式: 固定 2 位小数，不填充
pub fn format_default(value: f32) -> Result<Field, FieldOverflow> {
    let mut field = Field::new();
    write!(field, "{:.prec$}", value, prec = DEFAULT_DECIMAL_PLACES as usize)
        .map_err(|_| FieldOverflow)?;
    Ok(field)
}

/// 定点格式: 右对齐、空格填充，最小宽度 `4 + decimal_places`
pub fn format_fixed(value: f32, decimal_places: u8) -> Result<Field, FieldOverflow> {
    let prec = decimal_places as usize;
    let width = FIXED_WIDTH_BASE + prec;

    let mut field = Field::new();
    write!(field, "{:>width$.prec$}", value, width = width, prec = prec)
        .map_err(|_| FieldOverflow)?;
    Ok(field)
}
