//! SD 卡 FAT 存储介质
//!
//! 基于 embedded-sdmmc 的 [`Storage`] 实现:
//! - SPI 模式 SD 卡 (`SdCard`)
//! - FAT16/FAT32 第一个分区
//! - 路径最多两级 (`/DIR` 与 `/DIR/FILE`)，符合 8.3 短文件名

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    Error as SdmmcError, Mode, RawDirectory, RawFile, SdCard, SdCardError, TimeSource, Timestamp,
    VolumeIdx, VolumeManager,
};

use super::storage::{CardType, FileType, FsError, Metadata, OpenOptions, Storage};
use crate::{log_debug, log_error};

/// 固定时间源 (无 RTC 时使用)
///
/// 所有文件的修改时间都记为同一时刻。
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

/// SD 卡存储介质
pub struct SdStorage<SPI, DELAY, T = FixedTimeSource>
where
    SPI: SpiDevice<u8>,
    DELAY: DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<SPI, DELAY>, T>,
    root: Option<RawDirectory>,
}

impl<SPI, DELAY, T> SdStorage<SPI, DELAY, T>
where
    SPI: SpiDevice<u8>,
    DELAY: DelayNs,
    T: TimeSource,
{
    /// 从 SPI 设备创建
    ///
    /// 片选引脚已经绑定在 `spi` 中，挂载时传入的片选号只用于诊断。
    pub fn new(spi: SPI, delay: DELAY, time_source: T) -> Self {
        let card = SdCard::new(spi, delay);
        Self {
            volume_mgr: VolumeManager::new(card, time_source),
            root: None,
        }
    }

    fn root(&self) -> Result<RawDirectory, FsError> {
        self.root.ok_or(FsError::NotMounted)
    }

    /// 在 `dir` (None 为根目录) 中执行操作
    fn in_dir<R>(
        &mut self,
        dir: Option<&str>,
        op: impl FnOnce(
            &mut VolumeManager<SdCard<SPI, DELAY>, T>,
            RawDirectory,
        ) -> Result<R, SdmmcError<SdCardError>>,
    ) -> Result<R, FsError> {
        let root = self.root()?;
        let Some(dir) = dir else {
            return op(&mut self.volume_mgr, root).map_err(map_error);
        };

        let sub = self.volume_mgr.open_dir(root, dir).map_err(map_error)?;
        let result = op(&mut self.volume_mgr, sub).map_err(map_error);
        if self.volume_mgr.close_dir(sub).is_err() {
            log_error!("sdcard: closing directory {} failed", dir);
        }
        result
    }
}

impl<SPI, DELAY, T> Storage for SdStorage<SPI, DELAY, T>
where
    SPI: SpiDevice<u8>,
    DELAY: DelayNs,
    T: TimeSource,
{
    type File = RawFile;

    fn mount(&mut self, chip_select: u8) -> Result<(), FsError> {
        if self.root.is_some() {
            return Ok(());
        }

        log_debug!("sdcard: mounting (cs={})", chip_select);

        // 读取容量会触发卡初始化
        self.volume_mgr
            .device()
            .num_bytes()
            .map_err(|_| FsError::MountFailed)?;

        let volume = self
            .volume_mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(|_| FsError::MountFailed)?;
        let root = self
            .volume_mgr
            .open_root_dir(volume)
            .map_err(|_| FsError::MountFailed)?;

        self.root = Some(root);
        Ok(())
    }

    fn card_type(&mut self) -> CardType {
        match self.volume_mgr.device().get_card_type() {
            Some(embedded_sdmmc::sdcard::CardType::SDHC) => CardType::Sdhc,
            Some(_) => CardType::Sdsc,
            None => CardType::None,
        }
    }

    fn total_bytes(&mut self) -> u64 {
        self.volume_mgr.device().num_bytes().unwrap_or(0)
    }

    fn used_bytes(&mut self) -> Option<u64> {
        // FAT 的空闲簇统计需要扫描整张表
        None
    }

    fn read_root(&mut self, visit: &mut dyn FnMut(&Metadata)) -> Result<(), FsError> {
        let root = self.root()?;
        let mut name_error = false;

        self.volume_mgr
            .iterate_dir(root, |entry| {
                if entry.attributes.is_volume() {
                    return;
                }
                let mut name = heapless::String::new();
                if core::fmt::write(&mut name, format_args!("{}", entry.name)).is_err() {
                    name_error = true;
                    return;
                }
                let file_type = if entry.attributes.is_directory() {
                    FileType::Directory
                } else {
                    FileType::File
                };
                visit(&Metadata { file_type, size: entry.size, name });
            })
            .map_err(map_error)?;

        if name_error {
            return Err(FsError::NameTooLong);
        }
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> Result<(), FsError> {
        let (dir, name) = split_path(path)?;
        self.in_dir(dir, |mgr, parent| mgr.make_dir_in_dir(parent, name))
    }

    fn exists(&mut self, path: &str) -> bool {
        let Ok((dir, name)) = split_path(path) else {
            return false;
        };
        self.in_dir(dir, |mgr, parent| mgr.find_directory_entry(parent, name))
            .is_ok()
    }

    fn open(&mut self, path: &str, options: OpenOptions) -> Result<RawFile, FsError> {
        let (dir, name) = split_path(path)?;
        let mode = open_mode(options);
        self.in_dir(dir, |mgr, parent| mgr.open_file_in_dir(parent, name, mode))
    }

    fn write(&mut self, file: &mut RawFile, data: &[u8]) -> Result<usize, FsError> {
        self.volume_mgr.write(*file, data).map_err(map_error)?;
        Ok(data.len())
    }

    fn close(&mut self, file: RawFile) -> Result<(), FsError> {
        self.volume_mgr.close_file(file).map_err(map_error)
    }
}

/// `/A` -> (None, "A")，`/A/B` -> (Some("A"), "B")
fn split_path(path: &str) -> Result<(Option<&str>, &str), FsError> {
    let relative = path.strip_prefix('/').ok_or(FsError::NotFound)?;
    match relative.split_once('/') {
        None if !relative.is_empty() => Ok((None, relative)),
        Some((dir, name)) if !dir.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((Some(dir), name))
        }
        _ => Err(FsError::PathTooLong),
    }
}

fn open_mode(options: OpenOptions) -> Mode {
    match (options.write, options.create, options.append, options.truncate) {
        (false, _, _, _) => Mode::ReadOnly,
        (true, true, _, true) => Mode::ReadWriteCreateOrTruncate,
        (true, true, _, false) => Mode::ReadWriteCreateOrAppend,
        (true, false, _, true) => Mode::ReadWriteTruncate,
        (true, false, _, false) => Mode::ReadWriteAppend,
    }
}

fn map_error(error: SdmmcError<SdCardError>) -> FsError {
    match error {
        SdmmcError::DeviceError(_) => FsError::IoError,
        SdmmcError::NotFound => FsError::NotFound,
        SdmmcError::DirAlreadyExists | SdmmcError::FileAlreadyExists => FsError::AlreadyExists,
        SdmmcError::TooManyOpenFiles | SdmmcError::TooManyOpenDirs => FsError::TooManyOpenFiles,
        SdmmcError::FilenameError(_) => FsError::NameTooLong,
        SdmmcError::NotEnoughSpace => FsError::NoSpace,
        SdmmcError::OpenedDirAsFile => FsError::InvalidHandle,
        SdmmcError::OpenedFileAsDir => FsError::NotADirectory,
        _ => FsError::IoError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/SET0000"), Ok((None, "SET0000")));
        assert_eq!(split_path("/SET0000/0000001.CSV"), Ok((Some("SET0000"), "0000001.CSV")));
        assert_eq!(split_path("SET0000"), Err(FsError::NotFound));
        assert_eq!(split_path("/A/B/C"), Err(FsError::PathTooLong));
        assert_eq!(split_path("/"), Err(FsError::PathTooLong));
    }

    /// 不应答的 SPI 总线: 读回全是 0xFF
    struct SilentBus;

    impl embedded_hal::spi::ErrorType for SilentBus {
        type Error = core::convert::Infallible;
    }

    impl SpiDevice<u8> for SilentBus {
        fn transaction(
            &mut self,
            operations: &mut [embedded_hal::spi::Operation<'_, u8>],
        ) -> Result<(), Self::Error> {
            use embedded_hal::spi::Operation;
            for op in operations {
                match op {
                    Operation::Read(buf) | Operation::TransferInPlace(buf) => buf.fill(0xFF),
                    Operation::Transfer(read, _) => read.fill(0xFF),
                    Operation::Write(_) | Operation::DelayNs(_) => {}
                }
            }
            Ok(())
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[test]
    fn test_unresponsive_card_does_not_mount() {
        let mut storage = SdStorage::new(SilentBus, NoDelay, FixedTimeSource);

        assert_eq!(storage.mount(5), Err(FsError::MountFailed));
        assert_eq!(storage.card_type(), CardType::None);
        assert_eq!(storage.create_dir("/SET0000"), Err(FsError::NotMounted));
        assert!(!storage.exists("/SET0000"));
        assert_eq!(storage.open("/SET0000/0000001.CSV", OpenOptions::append_mode()).err(), Some(FsError::NotMounted));
    }

    #[test]
    fn test_open_mode() {
        assert!(matches!(open_mode(OpenOptions::append_mode()), Mode::ReadWriteCreateOrAppend));
        assert!(matches!(open_mode(OpenOptions::read_only()), Mode::ReadOnly));
    }
}
