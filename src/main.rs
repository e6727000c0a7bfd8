//! CsvLogger 固件 - ESP32-S3 SD 卡 CSV 记录器
//!
//! 硬件连接:
//! - SD 卡 SPI2: SCK=GPIO12, MOSI=GPIO11, MISO=GPIO13, CS=GPIO5
//! - 测量输入: GPIO1 (ADC1_CH0)
//! - 会话按键: GPIO0 (BOOT 键，低有效)
//!
//! 上电后挂载 SD 卡并创建新的 `SET####` 目录，
//! 每按一次按键开始或结束一个记录会话。

#![no_std]
#![no_main]

esp_bootloader_esp_idf::esp_app_desc!();

use csvlogger::config::DEFAULT_CHIP_SELECT;
use csvlogger::fs::sdcard::{FixedTimeSource, SdStorage};
use csvlogger::tasks::{logging, sampler, session};
use csvlogger::{log_error, log_info, CsvLogger, LoggerError};
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

// ===== Panic Handler =====
#[cfg(any(feature = "dev", feature = "log-println"))]
use esp_backtrace as _;

#[cfg(feature = "log-defmt")]
use defmt_rtt as _;

#[cfg(not(any(feature = "dev", feature = "log-println")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop { core::hint::spin_loop(); }
}

/// SD 卡初始化时钟 (初始化阶段必须 ≤ 400kHz)
const SD_SPI_FREQ_KHZ: u32 = 400;

/// 挂载失败后的重试间隔
const MOUNT_RETRY: Duration = Duration::from_secs(2);

// ===== 静态分配 =====
/// 记录器 - 交给记录任务独占
static LOGGER: StaticCell<logging::FirmwareLogger> = StaticCell::new();

// ===== 主入口点 =====
#[esp_rtos::main]
async fn main(spawner: Spawner) {
    // ========================================
    // 1. 硬件初始化
    // ========================================
    let peripherals = esp_hal::init(esp_hal::Config::default());

    log_info!("{} v{} starting on ESP32-S3", csvlogger::NAME, csvlogger::VERSION);

    // ========================================
    // 2. 定时器初始化 (Embassy 时间驱动)
    // ========================================
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // ========================================
    // 3. SD 卡 SPI 总线
    // ========================================
    let spi_config = SpiConfig::default()
        .with_frequency(Rate::from_khz(SD_SPI_FREQ_KHZ))
        .with_mode(Mode::_0);
    let spi = match Spi::new(peripherals.SPI2, spi_config) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO12)
            .with_mosi(peripherals.GPIO11)
            .with_miso(peripherals.GPIO13),
        Err(_) => {
            log_error!("SPI2 configuration rejected");
            halt();
        }
    };

    // CS 引脚编号与 DEFAULT_CHIP_SELECT 一致
    let cs = Output::new(peripherals.GPIO5, Level::High, OutputConfig::default());
    let spi_device = match ExclusiveDevice::new(spi, cs, Delay::new()) {
        Ok(device) => device,
        Err(_) => {
            log_error!("SD card chip select unavailable");
            halt();
        }
    };

    let storage = SdStorage::new(spi_device, Delay::new(), FixedTimeSource);

    // ========================================
    // 4. 记录器初始化
    // ========================================
    let logger = LOGGER.init(CsvLogger::new(storage, session::FIRMWARE_CONFIG));

    loop {
        match logger.begin(DEFAULT_CHIP_SELECT) {
            Ok(()) => break,
            Err(LoggerError::Halted) => halt(),
            Err(e) => {
                log_error!("Logger init failed: {}, retrying", e);
                Timer::after(MOUNT_RETRY).await;
            }
        }
    }

    // ========================================
    // 5. 测量输入与按键
    // ========================================
    let mut adc_config = AdcConfig::new();
    let measure_pin = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    let button = Input::new(peripherals.GPIO0, InputConfig::default().with_pull(Pull::Up));

    // ========================================
    // 6. 生成任务
    // ========================================
    spawner.must_spawn(logging::logging_task(logger));
    spawner.must_spawn(sampler::sampler_task(adc, measure_pin));
    spawner.must_spawn(sampler::button_task(button));

    log_info!("All tasks spawned, press BOOT to start/stop a session");

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}

/// 终止: 停在原地，等待人工复位
fn halt() -> ! {
    log_error!("System halted");
    loop { core::hint::spin_loop(); }
}
