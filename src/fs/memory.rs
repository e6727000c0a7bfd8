//! 内存存储介质
//!
//! 无需硬件的 [`Storage`] 实现，全部使用 heapless 定长容器，不依赖堆分配。
//! 支持故障注入 (缺卡、介质类型、建目录失败、打开失败、容量上限)，
//! 用于单元测试和主机端模拟。

use heapless::{String, Vec};

use super::storage::{CardType, FileType, FsError, Metadata, OpenOptions, Storage};

/// 最大目录数
pub const MAX_DIRS: usize = 32;
/// 最大文件数
pub const MAX_FILES: usize = 16;
/// 单个文件的最大字节数
pub const MAX_FILE_BYTES: usize = 2048;
/// 路径最大长度
pub const MAX_PATH_LEN: usize = 64;

/// 默认模拟容量 (4GB SDHC)
const DEFAULT_CAPACITY: u64 = 4 * 1024 * 1024 * 1024;

type Path = String<MAX_PATH_LEN>;

struct MemFile {
    path: Path,
    data: Vec<u8, MAX_FILE_BYTES>,
    open: bool,
}

/// 内存文件句柄
#[derive(Debug, PartialEq, Eq)]
pub struct MemHandle {
    index: usize,
}

/// 内存存储介质
pub struct MemStorage {
    card_type: CardType,
    inserted: bool,
    mounted: bool,
    capacity: u64,
    dirs: Vec<Path, MAX_DIRS>,
    files: Vec<MemFile, MAX_FILES>,
    fail_create_dir: bool,
    fail_open: bool,
    fail_read_root: bool,
    mount_count: u32,
    last_chip_select: Option<u8>,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStorage {
    /// 已插入的空白 SDHC 卡
    pub const fn new() -> Self {
        Self {
            card_type: CardType::Sdhc,
            inserted: true,
            mounted: false,
            capacity: DEFAULT_CAPACITY,
            dirs: Vec::new(),
            files: Vec::new(),
            fail_create_dir: false,
            fail_open: false,
            fail_read_root: false,
            mount_count: 0,
            last_chip_select: None,
        }
    }

    /// 未插卡，挂载必然失败
    pub fn absent() -> Self {
        let mut storage = Self::new();
        storage.inserted = false;
        storage.card_type = CardType::None;
        storage
    }

    /// 设置介质类型
    pub fn with_card_type(mut self, card_type: CardType) -> Self {
        self.card_type = card_type;
        self
    }

    /// 设置模拟容量 (字节)
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// 预置目录 (无需挂载)
    pub fn add_dir(&mut self, path: &str) -> Result<(), FsError> {
        let path = to_path(path)?;
        if self.find_dir(&path).is_some() {
            return Err(FsError::AlreadyExists);
        }
        self.dirs.push(path).map_err(|_| FsError::NoSpace)
    }

    /// 预置文件 (无需挂载)
    pub fn add_file(&mut self, path: &str, contents: &[u8]) -> Result<(), FsError> {
        let path = to_path(path)?;
        if self.find_file(&path).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let mut data = Vec::new();
        data.extend_from_slice(contents).map_err(|_| FsError::NoSpace)?;
        self.files
            .push(MemFile { path, data, open: false })
            .map_err(|_| FsError::NoSpace)
    }

    /// 让后续的建目录操作失败
    pub fn set_fail_create_dir(&mut self, fail: bool) {
        self.fail_create_dir = fail;
    }

    /// 让后续的打开文件操作失败
    pub fn set_fail_open(&mut self, fail: bool) {
        self.fail_open = fail;
    }

    /// 让根目录遍历失败
    pub fn set_fail_read_root(&mut self, fail: bool) {
        self.fail_read_root = fail;
    }

    /// 拔卡
    pub fn eject(&mut self) {
        self.inserted = false;
        self.mounted = false;
    }

    /// 文件内容
    pub fn file_contents(&self, path: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|f| f.path.as_str() == path)
            .map(|f| f.data.as_slice())
    }

    /// 目录是否存在
    pub fn is_dir(&self, path: &str) -> bool {
        self.dirs.iter().any(|d| d.as_str() == path)
    }

    /// 当前打开的文件数
    pub fn open_file_count(&self) -> usize {
        self.files.iter().filter(|f| f.open).count()
    }

    /// 文件总数
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// 挂载次数
    pub fn mount_count(&self) -> u32 {
        self.mount_count
    }

    /// 最近一次挂载使用的片选
    pub fn last_chip_select(&self) -> Option<u8> {
        self.last_chip_select
    }

    fn find_dir(&self, path: &str) -> Option<usize> {
        self.dirs.iter().position(|d| d.as_str() == path)
    }

    fn find_file(&self, path: &str) -> Option<usize> {
        self.files.iter().position(|f| f.path.as_str() == path)
    }

    fn parent_exists(&self, path: &str) -> bool {
        match parent(path) {
            Some("") => true,
            Some(dir) => self.find_dir(dir).is_some(),
            None => false,
        }
    }

    fn ensure_mounted(&self) -> Result<(), FsError> {
        if self.mounted {
            Ok(())
        } else {
            Err(FsError::NotMounted)
        }
    }
}

impl Storage for MemStorage {
    type File = MemHandle;

    fn mount(&mut self, chip_select: u8) -> Result<(), FsError> {
        self.last_chip_select = Some(chip_select);
        if !self.inserted {
            return Err(FsError::MountFailed);
        }
        self.mounted = true;
        self.mount_count += 1;
        Ok(())
    }

    fn card_type(&mut self) -> CardType {
        self.card_type
    }

    fn total_bytes(&mut self) -> u64 {
        self.capacity
    }

    fn used_bytes(&mut self) -> Option<u64> {
        Some(self.files.iter().map(|f| f.data.len() as u64).sum())
    }

    fn read_root(&mut self, visit: &mut dyn FnMut(&Metadata)) -> Result<(), FsError> {
        self.ensure_mounted()?;
        if self.fail_read_root {
            return Err(FsError::IoError);
        }

        for dir in self.dirs.iter().filter(|d| parent(d) == Some("")) {
            visit(&metadata(dir, FileType::Directory, 0)?);
        }
        for file in self.files.iter().filter(|f| parent(&f.path) == Some("")) {
            visit(&metadata(&file.path, FileType::File, file.data.len() as u32)?);
        }
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> Result<(), FsError> {
        self.ensure_mounted()?;
        if self.fail_create_dir {
            return Err(FsError::IoError);
        }
        if self.find_dir(path).is_some() || self.find_file(path).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if !self.parent_exists(path) {
            return Err(FsError::NotFound);
        }
        let path = to_path(path)?;
        self.dirs.push(path).map_err(|_| FsError::NoSpace)
    }

    fn exists(&mut self, path: &str) -> bool {
        self.mounted && (self.find_dir(path).is_some() || self.find_file(path).is_some())
    }

    fn open(&mut self, path: &str, options: OpenOptions) -> Result<MemHandle, FsError> {
        self.ensure_mounted()?;
        if self.fail_open {
            return Err(FsError::IoError);
        }
        if self.find_dir(path).is_some() {
            return Err(FsError::InvalidHandle);
        }

        let index = match self.find_file(path) {
            Some(index) => index,
            None if options.create => {
                if !self.parent_exists(path) {
                    return Err(FsError::NotFound);
                }
                let file = MemFile { path: to_path(path)?, data: Vec::new(), open: false };
                self.files.push(file).map_err(|_| FsError::NoSpace)?;
                self.files.len() - 1
            }
            None => return Err(FsError::NotFound),
        };

        let file = &mut self.files[index];
        if file.open {
            return Err(FsError::TooManyOpenFiles);
        }
        if options.truncate {
            file.data.clear();
        }
        file.open = true;
        Ok(MemHandle { index })
    }

    fn write(&mut self, file: &mut MemHandle, data: &[u8]) -> Result<usize, FsError> {
        let used = self.used_bytes().unwrap_or(0);
        let entry = self
            .files
            .get_mut(file.index)
            .filter(|f| f.open)
            .ok_or(FsError::InvalidHandle)?;

        let card_left = self.capacity.saturating_sub(used);
        let room = (MAX_FILE_BYTES - entry.data.len()).min(card_left.min(usize::MAX as u64) as usize);
        // 与 SD 卡后端一致: 放不下时整块拒绝，不留半截数据
        if data.len() > room {
            return Err(FsError::NoSpace);
        }
        entry
            .data
            .extend_from_slice(data)
            .map_err(|_| FsError::NoSpace)?;
        Ok(data.len())
    }

    fn close(&mut self, file: MemHandle) -> Result<(), FsError> {
        let entry = self
            .files
            .get_mut(file.index)
            .filter(|f| f.open)
            .ok_or(FsError::InvalidHandle)?;
        entry.open = false;
        Ok(())
    }
}

fn to_path(path: &str) -> Result<Path, FsError> {
    if !path.starts_with('/') {
        return Err(FsError::NotFound);
    }
    Path::try_from(path).map_err(|_| FsError::PathTooLong)
}

/// `/A/B` -> `/A`，`/A` -> ``
fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

fn metadata(path: &str, file_type: FileType, size: u32) -> Result<Metadata, FsError> {
    let name = path.trim_start_matches('/');
    Ok(Metadata {
        file_type,
        size,
        name: String::try_from(name).map_err(|_| FsError::NameTooLong)?,
    })
}
