//! 采样任务
//!
//! 采样与写卡解耦: ADC 读数通过通道交给记录任务，
//! SD 卡写入变慢时丢弃新样本而不是拖慢采样节拍。

use embassy_time::{Duration, Ticker, Timer};
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::gpio::Input;
use esp_hal::peripherals::{ADC1, GPIO1};
use esp_hal::Blocking;

use crate::logger::clock::{Clock, EmbassyClock};
use crate::sync::primitives::{CriticalChannel, CriticalSignal};
use crate::tasks::session::Sample;
use crate::{log_info, log_warn};

/// 采样周期
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(1000);

/// 按键消抖时间
const DEBOUNCE: Duration = Duration::from_millis(50);

/// 通道深度
pub const SAMPLE_QUEUE_DEPTH: usize = 16;

/// 采样通道
pub static SAMPLES: CriticalChannel<Sample, SAMPLE_QUEUE_DEPTH> = CriticalChannel::new();

/// 会话切换信号: 由记录任务根据当前是否在记录决定开始或结束
pub static SESSION_TOGGLE: CriticalSignal<()> = CriticalSignal::new();

/// 测量引脚 (GPIO1 / ADC1_CH0)
pub type MeasurePin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// ADC 采样任务
#[embassy_executor::task]
pub async fn sampler_task(mut adc: Adc<'static, ADC1<'static>, Blocking>, mut pin: MeasurePin) {
    log_info!("Sampler task started ({} ms period)", SAMPLE_PERIOD.as_millis());

    let mut ticker = Ticker::every(SAMPLE_PERIOD);
    let mut dropped: u32 = 0;

    loop {
        ticker.next().await;

        let sample = Sample {
            uptime_ms: EmbassyClock.now_ms(),
            raw: adc.read_blocking(&mut pin),
        };

        if SAMPLES.try_send(sample).is_err() {
            dropped = dropped.wrapping_add(1);
            log_warn!("Sample queue full, dropped {} samples", dropped);
        }
    }
}

/// 按键任务: 每次按下切换会话
#[embassy_executor::task]
pub async fn button_task(mut button: Input<'static>) {
    log_info!("Button task started");

    loop {
        button.wait_for_falling_edge().await;
        Timer::after(DEBOUNCE).await;
        if button.is_high() {
            continue;
        }

        SESSION_TOGGLE.signal(());

        button.wait_for_high().await;
    }
}
