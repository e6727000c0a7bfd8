//! 存储介质抽象层
//!
//! 记录器通过 [`Storage`] trait 访问可移动存储介质，
//! 底层驱动 (SD 卡 FAT、内存模拟) 各自实现该接口。

use core::fmt;

/// 文件系统错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// 文件系统未挂载
    NotMounted,
    /// 挂载失败 (介质缺失或不可读)
    MountFailed,
    /// 文件/目录不存在
    NotFound,
    /// 文件/目录已存在
    AlreadyExists,
    /// 不是目录
    NotADirectory,
    /// 路径过长或层级不受支持
    PathTooLong,
    /// 文件名过长
    NameTooLong,
    /// 空间不足
    NoSpace,
    /// 打开的文件过多
    TooManyOpenFiles,
    /// 无效的文件句柄
    InvalidHandle,
    /// IO 错误
    IoError,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotMounted => write!(f, "Not mounted"),
            Self::MountFailed => write!(f, "Mount failed"),
            Self::NotFound => write!(f, "Not found"),
            Self::AlreadyExists => write!(f, "Already exists"),
            Self::NotADirectory => write!(f, "Not a directory"),
            Self::PathTooLong => write!(f, "Path too long"),
            Self::NameTooLong => write!(f, "Name too long"),
            Self::NoSpace => write!(f, "No space"),
            Self::TooManyOpenFiles => write!(f, "Too many open files"),
            Self::InvalidHandle => write!(f, "Invalid handle"),
            Self::IoError => write!(f, "IO error"),
        }
    }
}

/// 存储介质类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardType {
    /// 未插卡
    None,
    /// MMC
    Mmc,
    /// 标准容量 SD 卡
    Sdsc,
    /// 高容量 SD 卡
    Sdhc,
    /// 无法识别
    Unknown,
}

impl CardType {
    /// 诊断输出使用的名称
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "No SD card attached!",
            Self::Mmc => "MMC",
            Self::Sdsc => "SDSC",
            Self::Sdhc => "SDHC",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// 是否检测到介质
    pub const fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// 文件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FileType {
    /// 普通文件
    File,
    /// 目录
    Directory,
}

/// 目录项名称的最大长度
pub const MAX_NAME_LEN: usize = 64;

/// 目录项元数据
#[derive(Debug, Clone)]
pub struct Metadata {
    /// 文件类型
    pub file_type: FileType,
    /// 文件大小 (目录为 0)
    pub size: u32,
    /// 名称 (不含父路径)
    pub name: heapless::String<MAX_NAME_LEN>,
}

impl Metadata {
    /// 是否为文件
    pub fn is_file(&self) -> bool {
        matches!(self.file_type, FileType::File)
    }

    /// 是否为目录
    pub fn is_dir(&self) -> bool {
        matches!(self.file_type, FileType::Directory)
    }
}

/// 文件打开选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// 读取权限
    pub read: bool,
    /// 写入权限
    pub write: bool,
    /// 如果不存在则创建
    pub create: bool,
    /// 追加模式
    pub append: bool,
    /// 截断文件
    pub truncate: bool,
}

impl OpenOptions {
    /// 创建新的打开选项
    pub const fn new() -> Self {
        Self {
            read: false,
            write: false,
            create: false,
            append: false,
            truncate: false,
        }
    }

    /// 设置读取权限
    pub const fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    /// 设置写入权限
    pub const fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// 设置创建标志
    pub const fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// 设置追加模式
    pub const fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// 设置截断标志
    pub const fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    /// 只读打开
    pub const fn read_only() -> Self {
        Self::new().read(true)
    }

    /// 追加模式打开 (不存在则创建)
    pub const fn append_mode() -> Self {
        Self::new().write(true).create(true).append(true)
    }
}

/// 存储介质驱动接口
///
/// 路径使用 `/` 分隔的绝对路径 (`/SET0000/0000001.CSV`)。
/// 文件以句柄形式由调用方持有，读写都经过驱动本身。
pub trait Storage {
    /// 打开文件的句柄
    type File;

    /// 初始化并挂载介质
    fn mount(&mut self, chip_select: u8) -> Result<(), FsError>;

    /// 介质类型
    fn card_type(&mut self) -> CardType;

    /// 总容量 (字节)
    fn total_bytes(&mut self) -> u64;

    /// 已用空间 (字节)，驱动无法统计时返回 `None`
    fn used_bytes(&mut self) -> Option<u64>;

    /// 遍历根目录的直接子项
    fn read_root(&mut self, visit: &mut dyn FnMut(&Metadata)) -> Result<(), FsError>;

    /// 创建目录
    fn create_dir(&mut self, path: &str) -> Result<(), FsError>;

    /// 路径是否存在
    fn exists(&mut self, path: &str) -> bool;

    /// 打开文件
    fn open(&mut self, path: &str, options: OpenOptions) -> Result<Self::File, FsError>;

    /// 写入数据，返回实际写入的字节数
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, FsError>;

    /// 关闭文件
    fn close(&mut self, file: Self::File) -> Result<(), FsError>;

    /// 写入全部数据
    fn write_all(&mut self, file: &mut Self::File, data: &[u8]) -> Result<(), FsError> {
        let mut offset = 0;
        while offset < data.len() {
            let written = self.write(file, &data[offset..])?;
            if written == 0 {
                return Err(FsError::NoSpace);
            }
            offset += written;
        }
        Ok(())
    }
}

/// 借用的驱动同样可以作为存储介质使用，调用方保留所有权
impl<T: Storage + ?Sized> Storage for &mut T {
    type File = T::File;

    fn mount(&mut self, chip_select: u8) -> Result<(), FsError> {
        (**self).mount(chip_select)
    }

    fn card_type(&mut self) -> CardType {
        (**self).card_type()
    }

    fn total_bytes(&mut self) -> u64 {
        (**self).total_bytes()
    }

    fn used_bytes(&mut self) -> Option<u64> {
        (**self).used_bytes()
    }

    fn read_root(&mut self, visit: &mut dyn FnMut(&Metadata)) -> Result<(), FsError> {
        (**self).read_root(visit)
    }

    fn create_dir(&mut self, path: &str) -> Result<(), FsError> {
        (**self).create_dir(path)
    }

    fn exists(&mut self, path: &str) -> bool {
        (**self).exists(path)
    }

    fn open(&mut self, path: &str, options: OpenOptions) -> Result<Self::File, FsError> {
        (**self).open(path, options)
    }

    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, FsError> {
        (**self).write(file, data)
    }

    fn close(&mut self, file: Self::File) -> Result<(), FsError> {
        (**self).close(file)
    }
}
