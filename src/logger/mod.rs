//! CSV 会话记录器
//!
//! 生命周期:
//! `Uninitialized` --begin--> `Mounted` --start_logging--> `Logging` --end_logging--> `Mounted`
//!
//! - `begin`: 挂载介质，扫描根目录得到下一个 `SET####` 序号并创建目录
//! - `start_logging`: 在目标目录中打开 `#######.CSV`
//! - `add_*`: 追加字段，同一行的字段之间用 `", "` 分隔
//! - `end_logging`: 关闭文件，文件序号加一
//!
//! 诊断开启、检测不到介质且策略为 [`MissingMediumPolicy::Halt`] 时，
//! `begin` 返回 [`LoggerError::Halted`]，之后所有操作都返回该错误。

pub mod clock;
pub mod format;
pub mod naming;

use core::fmt::{self, Write};

use crate::config::{LoggerConfig, MissingMediumPolicy, FIELD_SEPARATOR, FIRST_FILE_SEQUENCE};
use crate::fs::{FsError, OpenOptions, Storage};
use crate::{log_error, log_info, log_warn};

pub use clock::{Clock, FnClock, NoClock};
pub use naming::{DirPath, FilePath};

const BYTES_PER_MB: u64 = 1024 * 1024;
const DIAG_RULE: &str = "-----------------------------------------";

/// 单个字段 (含分隔符和时间戳前缀) 的合成缓冲区容量
pub const RECORD_CAP: usize = 128;

/// 前缀 + 字段
type Record = heapless::Vec<u8, RECORD_CAP>;

/// 记录器错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoggerError {
    /// 介质挂载失败或根目录不可读
    Mount,
    /// 目标目录创建失败
    DirectoryCreate,
    /// 记录文件打开失败
    FileOpen,
    /// 当前状态不允许该操作 (例如未打开文件时追加)
    InvalidState,
    /// 字段超出格式化缓冲区
    Format,
    /// 写入介质失败
    Write(FsError),
    /// 终止状态: 诊断检测到介质缺失
    Halted,
}

impl From<FsError> for LoggerError {
    fn from(e: FsError) -> Self {
        Self::Write(e)
    }
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount => write!(f, "Card mount failed"),
            Self::DirectoryCreate => write!(f, "Creating the target directory failed"),
            Self::FileOpen => write!(f, "Opening file for logging failed"),
            Self::InvalidState => write!(f, "Invalid logger state"),
            Self::Format => write!(f, "Field does not fit the format buffer"),
            Self::Write(e) => write!(f, "Write error: {}", e),
            Self::Halted => write!(f, "Halted: no storage medium attached"),
        }
    }
}

/// 记录器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoggerState {
    /// 尚未成功调用 `begin`
    Uninitialized,
    /// 介质已挂载，目标目录已创建
    Mounted,
    /// 会话进行中，文件已打开
    Logging,
    /// 终止
    Halted,
}

/// CSV 会话记录器
///
/// 单一执行上下文独占使用，不做任何并发保护。
pub struct CsvLogger<S: Storage, C: Clock = NoClock> {
    storage: S,
    clock: C,
    config: LoggerConfig,
    state: LoggerState,
    /// 本实例生命周期内固定的目标目录
    target_dir: DirPath,
    /// `state == Logging` 时为 `Some`
    file: Option<S::File>,
    file_sequence: u32,
    /// 下一个字段前不需要分隔符
    new_line: bool,
    session_start_ms: u64,
}

impl<S: Storage> CsvLogger<S, NoClock> {
    /// 创建记录器 (无时间戳时钟)
    pub fn new(storage: S, config: LoggerConfig) -> Self {
        Self::with_clock(storage, NoClock, config)
    }
}

impl<S: Storage, C: Clock> CsvLogger<S, C> {
    /// 使用指定时钟创建记录器
    pub fn with_clock(storage: S, clock: C, config: LoggerConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            state: LoggerState::Uninitialized,
            target_dir: DirPath::new(),
            file: None,
            file_sequence: FIRST_FILE_SEQUENCE,
            new_line: true,
            session_start_ms: 0,
        }
    }

    // ==================== 状态查询 ====================

    /// 当前状态
    pub fn state(&self) -> LoggerState {
        self.state
    }

    /// 是否有打开的记录文件
    pub fn is_logging_enabled(&self) -> bool {
        self.file.is_some()
    }

    /// 目标目录 (`begin` 成功之前为 `None`)
    pub fn target_dir(&self) -> Option<&str> {
        match self.state {
            LoggerState::Mounted | LoggerState::Logging => Some(self.target_dir.as_str()),
            _ => None,
        }
    }

    /// 下一个 (或当前) 会话使用的文件序号
    pub fn file_sequence(&self) -> u32 {
        self.file_sequence
    }

    /// 当前记录文件路径
    pub fn current_file_path(&self) -> Option<FilePath> {
        if self.state != LoggerState::Logging {
            return None;
        }
        naming::file_path(&self.target_dir, self.file_sequence).ok()
    }

    /// 配置
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// 底层存储
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 底层存储 (可变)
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    // ==================== 初始化 ====================

    /// 挂载介质并创建本次运行的目标目录
    ///
    /// 已挂载时再次调用会创建下一个目录；会话进行中调用返回 `InvalidState`。
    pub fn begin(&mut self, chip_select: u8) -> Result<(), LoggerError> {
        match self.state {
            LoggerState::Halted => return Err(LoggerError::Halted),
            LoggerState::Logging => return Err(LoggerError::InvalidState),
            LoggerState::Uninitialized | LoggerState::Mounted => {}
        }
        self.state = LoggerState::Uninitialized;
        self.target_dir.clear();

        if let Err(e) = self.storage.mount(chip_select) {
            if self.config.diagnostics {
                log_error!("Card Mount Failed ({})", e);
            }
            return Err(LoggerError::Mount);
        }

        let sequence = match naming::scan_next_dir_sequence(&mut self.storage) {
            Ok(Some(sequence)) => sequence,
            Ok(None) => {
                if self.config.diagnostics {
                    log_error!("No free target directory number left!");
                }
                return Err(LoggerError::DirectoryCreate);
            }
            Err(e) => {
                if self.config.diagnostics {
                    log_error!("Can not read from SD-Card! ({})", e);
                }
                return Err(LoggerError::Mount);
            }
        };

        let dir = naming::dir_path(sequence).map_err(|_| LoggerError::DirectoryCreate)?;
        match self.storage.create_dir(&dir) {
            Ok(()) | Err(FsError::AlreadyExists) => {}
            Err(e) => {
                if self.config.diagnostics {
                    log_warn!("mkdir {} reported: {}", dir.as_str(), e);
                }
            }
        }
        if !self.storage.exists(&dir) {
            if self.config.diagnostics {
                log_error!("Creating the target directory {} failed!", dir.as_str());
            }
            return Err(LoggerError::DirectoryCreate);
        }

        self.target_dir = dir;
        self.state = LoggerState::Mounted;

        if self.config.diagnostics {
            self.report_medium()?;
        }
        Ok(())
    }

    /// 诊断输出介质信息；缺卡且策略为停机时进入终止状态
    fn report_medium(&mut self) -> Result<(), LoggerError> {
        let card_type = self.storage.card_type();
        log_info!("{}", DIAG_RULE);
        log_info!("SD Card Type: {}", card_type.as_str());

        if !card_type.is_present() {
            match self.config.missing_medium {
                MissingMediumPolicy::Halt => {
                    log_error!("No storage medium attached, logger halted");
                    self.state = LoggerState::Halted;
                    return Err(LoggerError::Halted);
                }
                MissingMediumPolicy::Continue => {
                    log_warn!("No storage medium attached, continuing");
                }
            }
        }

        log_info!("SD - Total space: {} MB", self.storage.total_bytes() / BYTES_PER_MB);
        match self.storage.used_bytes() {
            Some(used) => log_info!("SD - Used space: {} MB", used / BYTES_PER_MB),
            None => log_info!("SD - Used space: unknown"),
        }
        log_info!(
            "time stamped data sets: {}",
            if self.config.timestamps { "true!" } else { "false!" }
        );
        log_info!("target logging directory: {}", self.target_dir.as_str());
        log_info!("{}", DIAG_RULE);
        Ok(())
    }

    // ==================== 会话控制 ====================

    /// 开始会话: 打开下一个记录文件
    ///
    /// 已在记录时为空操作。
    pub fn start_logging(&mut self) -> Result<(), LoggerError> {
        match self.state {
            LoggerState::Halted => return Err(LoggerError::Halted),
            LoggerState::Uninitialized => return Err(LoggerError::InvalidState),
            LoggerState::Logging => {
                if self.config.diagnostics {
                    log_warn!("logging already enabled!");
                }
                return Ok(());
            }
            LoggerState::Mounted => {}
        }

        let path = naming::file_path(&self.target_dir, self.file_sequence)
            .map_err(|_| LoggerError::FileOpen)?;

        let file = match self.storage.open(&path, OpenOptions::append_mode()) {
            Ok(file) => file,
            Err(e) => {
                if self.config.diagnostics {
                    log_error!("Opening file {} for logging failed! ({})", path.as_str(), e);
                }
                return Err(LoggerError::FileOpen);
            }
        };

        self.file = Some(file);
        self.state = LoggerState::Logging;
        self.new_line = true;
        self.session_start_ms = self.clock.now_ms();

        if self.config.diagnostics {
            log_info!("Logging to file {} has started.", path.as_str());
        }
        Ok(())
    }

    /// 结束会话: 关闭文件，文件序号加一
    ///
    /// 关闭失败时会话同样结束，错误以 `Write` 返回。
    pub fn end_logging(&mut self) -> Result<(), LoggerError> {
        if self.state == LoggerState::Halted {
            return Err(LoggerError::Halted);
        }
        let file = self.file.take().ok_or(LoggerError::InvalidState)?;
        let path = naming::file_path(&self.target_dir, self.file_sequence);

        let closed = self.storage.close(file);
        self.state = LoggerState::Mounted;
        self.file_sequence = self.file_sequence.wrapping_add(1);

        if self.config.diagnostics {
            if let Ok(path) = &path {
                log_info!("Logging data to file {} ended.", path.as_str());
            }
        }
        closed.map_err(LoggerError::Write)
    }

    // ==================== 追加字段 ====================

    /// 换行
    pub fn add_line_break(&mut self) -> Result<(), LoggerError> {
        self.ensure_logging()?;
        self.write_bytes(self.config.line_ending.as_bytes())?;
        self.new_line = true;
        Ok(())
    }

    /// 追加数值 (2 位小数，无填充)
    pub fn add_value(&mut self, value: f32) -> Result<(), LoggerError> {
        self.ensure_logging()?;
        let field = format::format_default(value).map_err(|_| LoggerError::Format)?;
        self.append_field(field.as_bytes())
    }

    /// 追加数值 (指定小数位数，右对齐，最小宽度 `4 + decimal_places`)
    pub fn add_value_with_precision(&mut self, value: f32, decimal_places: u8) -> Result<(), LoggerError> {
        self.ensure_logging()?;
        let field = format::format_fixed(value, decimal_places).map_err(|_| LoggerError::Format)?;
        self.append_field(field.as_bytes())
    }

    /// 追加文本 (原样写入，不做 CSV 转义)
    pub fn add_text(&mut self, text: &str) -> Result<(), LoggerError> {
        self.append_field(text.as_bytes())
    }

    /// 追加缓冲区中的前 `len` 个字节 (超出缓冲区的部分被截断)
    pub fn add_text_bytes(&mut self, text: &[u8], len: usize) -> Result<(), LoggerError> {
        let len = len.min(text.len());
        self.append_field(&text[..len])
    }

    /// 追加任意可显示的值
    ///
    /// 能放进记录缓冲区的值与前缀一起一次写入；更长的值直接流式写入文件。
    pub fn add_display<T: fmt::Display>(&mut self, value: T) -> Result<(), LoggerError> {
        self.ensure_logging()?;
        let mut record = Record::new();
        let prefix_len = self.field_prefix(&mut record)?;

        let mut buffer = RecordWriter { record: &mut record, overflow: false };
        match (write!(buffer, "{}", value), buffer.overflow) {
            (Ok(()), _) => {
                self.write_bytes(&record)?;
                self.new_line = false;
                return Ok(());
            }
            (Err(_), false) => return Err(LoggerError::Format),
            (Err(_), true) => {}
        }

        self.write_bytes(&record[..prefix_len])?;
        self.new_line = false;

        let file = self.file.as_mut().ok_or(LoggerError::InvalidState)?;
        let mut writer = FieldWriter {
            storage: &mut self.storage,
            file,
            error: None,
        };
        match (write!(writer, "{}", value), writer.error) {
            (Ok(()), _) => Ok(()),
            (Err(_), Some(e)) => Err(LoggerError::Write(e)),
            (Err(_), None) => Err(LoggerError::Format),
        }
    }

    // ==================== 内部方法 ====================

    fn ensure_logging(&self) -> Result<(), LoggerError> {
        match self.state {
            LoggerState::Logging => Ok(()),
            LoggerState::Halted => Err(LoggerError::Halted),
            LoggerState::Uninitialized | LoggerState::Mounted => Err(LoggerError::InvalidState),
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<(), LoggerError> {
        let file = self.file.as_mut().ok_or(LoggerError::InvalidState)?;
        self.storage.write_all(file, data)?;
        Ok(())
    }

    /// 字段前缀: 行首写时间戳 (若启用)，否则写分隔符。返回前缀长度
    fn field_prefix(&self, record: &mut Record) -> Result<usize, LoggerError> {
        if self.new_line {
            if self.config.timestamps {
                let elapsed = self.clock.now_ms().saturating_sub(self.session_start_ms);
                let mut buffer = RecordWriter { record: &mut *record, overflow: false };
                write!(buffer, "{}{}", elapsed, FIELD_SEPARATOR).map_err(|_| LoggerError::Format)?;
            }
        } else {
            record
                .extend_from_slice(FIELD_SEPARATOR.as_bytes())
                .map_err(|_| LoggerError::Format)?;
        }
        Ok(record.len())
    }

    /// 前缀与字段合成一条记录写入；写入成功后才离开行首
    fn append_field(&mut self, data: &[u8]) -> Result<(), LoggerError> {
        self.ensure_logging()?;
        let mut record = Record::new();
        let prefix_len = self.field_prefix(&mut record)?;

        if record.extend_from_slice(data).is_ok() {
            self.write_bytes(&record)?;
        } else {
            self.write_bytes(&record[..prefix_len])?;
            self.new_line = false;
            self.write_bytes(data)?;
        }
        self.new_line = false;
        Ok(())
    }
}

impl<S: Storage, C: Clock> Drop for CsvLogger<S, C> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if self.storage.close(file).is_err() && self.config.diagnostics {
                log_error!("closing the log file on drop failed");
            }
        }
    }
}

/// 把 `fmt::Write` 接到记录缓冲区上，记录是否因容量不足失败
struct RecordWriter<'a> {
    record: &'a mut Record,
    overflow: bool,
}

impl fmt::Write for RecordWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.record.extend_from_slice(s.as_bytes()).map_err(|_| {
            self.overflow = true;
            fmt::Error
        })
    }
}

/// 把 `fmt::Write` 接到存储文件上
struct FieldWriter<'a, S: Storage> {
    storage: &'a mut S,
    file: &'a mut S::File,
    error: Option<FsError>,
}

impl<S: Storage> fmt::Write for FieldWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.storage.write_all(self.file, s.as_bytes()) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.error = Some(e);
                Err(fmt::Error)
            }
        }
    }
}

#[cfg(test)]
mod tests;
