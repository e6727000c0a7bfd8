//! 记录任务
//!
//! 记录器在整个生命周期内只由本任务持有，会话开关和样本
//! 都通过同步原语送到这里，不需要对记录器加锁。

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::delay::Delay;
use esp_hal::gpio::Output;
use esp_hal::spi::master::Spi;
use esp_hal::Blocking;

use crate::fs::sdcard::{FixedTimeSource, SdStorage};
use crate::logger::{CsvLogger, LoggerError};
use crate::tasks::sampler::{SAMPLES, SESSION_TOGGLE};
use crate::tasks::session;
use crate::{log_error, log_info, log_warn};

/// SD 卡 SPI 设备 (独占总线 + CS 引脚)
pub type SdSpiDevice = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, Delay>;

/// 固件使用的记录器 (配置见 [`session::FIRMWARE_CONFIG`])
pub type FirmwareLogger = CsvLogger<SdStorage<SdSpiDevice, Delay, FixedTimeSource>>;

/// 会话记录任务
#[embassy_executor::task]
pub async fn logging_task(logger: &'static mut FirmwareLogger) {
    log_info!("Logging task started, target directory: {}", logger.target_dir().unwrap_or("-"));

    loop {
        let result = match select(SESSION_TOGGLE.wait(), SAMPLES.receive()).await {
            Either::First(()) => session::toggle_session(logger),
            Either::Second(sample) => session::record_sample(logger, &sample),
        };

        match result {
            Ok(()) => {}
            Err(LoggerError::Halted) => break,
            Err(LoggerError::InvalidState) => {
                log_warn!("Ignoring request in state {:?}", logger.state());
            }
            Err(e) => log_error!("Logging failed: {}", e),
        }
    }

    log_error!("Logger halted, logging task parked");
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
