//! 记录器配置
//!
//! 所有配置在构造时确定，运行期间不可修改。

// ===== 常量 =====

/// 默认 SD 卡片选引脚
pub const DEFAULT_CHIP_SELECT: u8 = 5;

/// 字段分隔符
pub const FIELD_SEPARATOR: &str = ", ";

/// 无精度参数时数值的小数位数
pub const DEFAULT_DECIMAL_PLACES: u8 = 2;

/// 定点格式的最小字段宽度基数 (宽度 = 基数 + 小数位数)
pub const FIXED_WIDTH_BASE: usize = 4;

/// 记录目录名前缀
pub const DIR_PREFIX: &str = "SET";

/// 目录序号的零填充位数
pub const DIR_SEQUENCE_DIGITS: usize = 4;

/// 文件序号的零填充位数
pub const FILE_SEQUENCE_DIGITS: usize = 7;

/// 记录文件扩展名
pub const FILE_EXTENSION: &str = "CSV";

/// 第一个会话的文件序号
pub const FIRST_FILE_SEQUENCE: u32 = 1;

// ===== 换行约定 =====

/// 行结束符约定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineEnding {
    /// `\n`
    #[default]
    Unix,
    /// `\r\n`
    Windows,
}

impl LineEnding {
    /// 行结束符字节
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Unix => b"\n",
            Self::Windows => b"\r\n",
        }
    }
}

// ===== 缺卡策略 =====

/// 诊断输出开启且检测不到存储介质时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MissingMediumPolicy {
    /// 进入终止状态 (`LoggerError::Halted`)，用于无人值守调试
    #[default]
    Halt,
    /// 仅报告，继续运行 (无头部署 / 测试环境)
    Continue,
}

// ===== 记录器配置 =====

/// 记录器配置结构
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoggerConfig {
    /// 诊断输出 (串口控制台)
    pub diagnostics: bool,
    /// 行结束符
    pub line_ending: LineEnding,
    /// 每行首字段前写入会话开始以来的毫秒数
    pub timestamps: bool,
    /// 缺卡策略
    pub missing_medium: MissingMediumPolicy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerConfig {
    /// 创建默认配置: 开启诊断、Unix 换行、无时间戳、缺卡停机
    pub const fn new() -> Self {
        Self {
            diagnostics: true,
            line_ending: LineEnding::Unix,
            timestamps: false,
            missing_medium: MissingMediumPolicy::Halt,
        }
    }

    /// 设置诊断输出
    pub const fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }

    /// 设置行结束符
    pub const fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// 设置时间戳
    pub const fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// 设置缺卡策略
    pub const fn with_missing_medium(mut self, policy: MissingMediumPolicy) -> Self {
        self.missing_medium = policy;
        self
    }

    /// 无头部署配置: 关闭诊断，缺卡不停机
    pub const fn headless() -> Self {
        Self::new()
            .with_diagnostics(false)
            .with_missing_medium(MissingMediumPolicy::Continue)
    }
}
