//! 目录与文件命名
//!
//! - 目录: `/SET{序号}`，4 位零填充
//! - 文件: `{目录}/{序号}.CSV`，7 位零填充
//!
//! 序号超出位数时名称变长，但始终在定长缓冲区内做越界检查。

use core::fmt::Write;

use heapless::String;

use crate::config::{
    DIR_PREFIX, DIR_SEQUENCE_DIGITS, FILE_EXTENSION, FILE_SEQUENCE_DIGITS,
};
use crate::fs::{FsError, Storage};

/// 目录路径缓冲区容量
pub const DIR_PATH_CAP: usize = 16;
/// 文件路径缓冲区容量
pub const FILE_PATH_CAP: usize = 32;

/// 目录路径
pub type DirPath = String<DIR_PATH_CAP>;
/// 文件路径
pub type FilePath = String<FILE_PATH_CAP>;

/// 解析记录目录名，返回其序号
///
/// 接受可选的前导 `/`、`SET` 前缀和一串十进制数字；数字之后的字符被忽略。
/// 没有数字或数值溢出 `u32` 时返回 `None`。
pub fn parse_dir_sequence(name: &str) -> Option<u32> {
    let name = name.strip_prefix('/').unwrap_or(name);
    let rest = name.strip_prefix(DIR_PREFIX)?;
    let digits = rest
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(rest, |(i, _)| &rest[..i]);

    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// 扫描介质根目录，计算下一个目录序号
///
/// 只统计目录类型的条目。最大序号已经是 `u32::MAX` 时返回 `Ok(None)`。
pub fn scan_next_dir_sequence<S: Storage>(storage: &mut S) -> Result<Option<u32>, FsError> {
    let mut highest: Option<u32> = None;

    storage.read_root(&mut |entry| {
        if !entry.is_dir() {
            return;
        }
        if let Some(n) = parse_dir_sequence(entry.name.as_str()) {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    })?;

    Ok(successor(highest))
}

/// 最大序号加一；没有匹配项时为 0，溢出时为 `None`
fn successor(highest: Option<u32>) -> Option<u32> {
    match highest {
        Some(n) => n.checked_add(1),
        None => Some(0),
    }
}

/// 目录路径，如 `/SET0007`
pub fn dir_path(sequence: u32) -> Result<DirPath, FsError> {
    let mut path = DirPath::new();
    write!(path, "/{}{:0width$}", DIR_PREFIX, sequence, width = DIR_SEQUENCE_DIGITS)
        .map_err(|_| FsError::PathTooLong)?;
    Ok(path)
}

/// 文件路径，如 `/SET0007/0000001.CSV`
pub fn file_path(dir: &str, sequence: u32) -> Result<FilePath, FsError> {
    let mut path = FilePath::new();
    write!(
        path,
        "{}/{:0width$}.{}",
        dir,
        sequence,
        FILE_EXTENSION,
        width = FILE_SEQUENCE_DIGITS
    )
    .map_err(|_| FsError::PathTooLong)?;
    Ok(path)
}
