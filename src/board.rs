//! Watchy implementations of the capability traits.

use embedded_hal::delay::DelayNs;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcConfig, AdcPin, Attenuation};
use esp_hal::delay::Delay;
use esp_hal::gpio::{AnalogPin, AnyPin, Input, RtcPin, RtcPinWithResistors};
use esp_hal::peripherals::ADC1;
use esp_hal::rtc_cntl::sleep::{Ext0WakeupSource, Ext1WakeupSource, WakeupLevel};
use esp_hal::rtc_cntl::{wakeup_cause, Rtc};
use esp_hal::system::SleepSource;
use esp_hal::time::Instant;
use esp_hal::Blocking;

use crate::battery::{voltage_from_divider_mv, BatterySampler};
use crate::input::{gpio_mask_from_rtc_status, Button, InputSource, TimeSource, WakeCause};
use crate::power::{PowerControl, WakeSources};
use crate::wiring::{ButtonInputs, BUTTON_PINS, RTC_INT_GPIO};

// EXT1 takes at most this many lines here; the Watchy uses four
const MAX_WAKE_BUTTONS: usize = 8;

// ESP32 TRM, RTC_CNTL_EXT_WAKEUP1_STATUS_REG
const EXT1_STATUS_REG: u32 = 0x3FF4_80D0;
const EXT1_STATUS_CLR: u32 = 1 << 18;

// GPIO_ENABLE_W1TC_REG / GPIO_ENABLE1_W1TC_REG
const GPIO_ENABLE_W1TC_REG: u32 = 0x3FF4_4028;
const GPIO_ENABLE1_W1TC_REG: u32 = 0x3FF4_4034;

// Full-scale input at 11 dB attenuation; the ESP32 has no calibration curve to apply
const ADC_FULL_SCALE_MV: u32 = 3900;
const ADC_MAX_RAW: u32 = 4095;

/// What woke the chip, captured once at boot.
pub struct BoardInput<'a> {
    cause: WakeCause,
    edge_mask: u64,
    buttons: ButtonInputs<'a>,
}

impl<'a> BoardInput<'a> {
    /// Reads and clears the EXT1 status; call before anything reconfigures the RTC IO.
    pub fn capture(buttons: ButtonInputs<'a>) -> Self {
        let cause = match wakeup_cause() {
            SleepSource::Ext0 => WakeCause::TimerAlarm,
            SleepSource::Ext1 => WakeCause::ButtonEdge,
            SleepSource::Undefined => WakeCause::ColdBoot,
            other => {
                log::warn!("wake: unexpected source {:?}, treating as cold boot", other);
                WakeCause::ColdBoot
            }
        };

        let status = unsafe {
            let reg = EXT1_STATUS_REG as *mut u32;
            let status = core::ptr::read_volatile(reg);
            core::ptr::write_volatile(reg, status | EXT1_STATUS_CLR);
            status
        };

        Self {
            cause,
            edge_mask: gpio_mask_from_rtc_status(status),
            buttons,
        }
    }
}

impl InputSource for BoardInput<'_> {
    fn wake_cause(&mut self) -> WakeCause {
        self.cause
    }

    fn button_edge_mask(&mut self) -> u64 {
        self.edge_mask
    }

    fn is_pressed(&mut self, button: Button) -> bool {
        let pin: &Input<'_> = match button {
            Button::Select => &self.buttons.menu,
            Button::Back => &self.buttons.back,
            Button::Increase => &self.buttons.up,
            Button::Decrease => &self.buttons.down,
        };
        pin.is_high()
    }
}

/// Milliseconds since boot plus the busy-wait delay.
pub struct BoardTime {
    delay: Delay,
}

impl BoardTime {
    pub fn new() -> Self {
        Self {
            delay: Delay::new(),
        }
    }
}

impl Default for BoardTime {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for BoardTime {
    fn delay_ns(&mut self, ns: u32) {
        DelayNs::delay_ns(&mut self.delay, ns);
    }
}

impl TimeSource for BoardTime {
    fn now_ms(&mut self) -> u64 {
        Instant::now().duration_since_epoch().as_millis()
    }
}

/// Battery voltage through the divider on an ADC1 pin.
pub struct AdcBattery<'a, PIN> {
    adc: Adc<'a, ADC1<'a>, Blocking>,
    pin: AdcPin<PIN, ADC1<'a>>,
}

impl<'a, PIN> AdcBattery<'a, PIN>
where
    PIN: AdcChannel + AnalogPin,
{
    pub fn new(adc1: ADC1<'a>, pin: PIN) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(pin, Attenuation::_11dB);
        Self {
            adc: Adc::new(adc1, config),
            pin,
        }
    }
}

impl<PIN> BatterySampler for AdcBattery<'_, PIN>
where
    PIN: AdcChannel,
{
    fn voltage(&mut self) -> Option<f32> {
        match nb::block!(self.adc.read_oneshot(&mut self.pin)) {
            Ok(raw) => {
                let mv = (raw as u32).min(ADC_MAX_RAW) * ADC_FULL_SCALE_MV / ADC_MAX_RAW;
                Some(voltage_from_divider_mv(mv as u16))
            }
            Err(_) => None,
        }
    }
}

/// Sleep control over the RTC peripheral.
pub struct BoardPower<'a> {
    rtc: Rtc<'a>,
    armed: Option<WakeSources>,
}

impl<'a> BoardPower<'a> {
    pub fn new(rtc: Rtc<'a>) -> Self {
        Self { rtc, armed: None }
    }
}

impl PowerControl for BoardPower<'_> {
    fn float_all_pins(&mut self, mask: u64) {
        unsafe {
            core::ptr::write_volatile(GPIO_ENABLE_W1TC_REG as *mut u32, mask as u32);
            core::ptr::write_volatile(GPIO_ENABLE1_W1TC_REG as *mut u32, (mask >> 32) as u32);
        }
    }

    fn arm_wake_sources(&mut self, sources: &WakeSources) {
        let sources = if sources.is_valid() {
            *sources
        } else {
            log::error!(
                "sleep: {:?} cannot wake the chip, using the board wiring",
                sources
            );
            WakeSources {
                alarm_pin: RTC_INT_GPIO,
                button_mask: BUTTON_PINS.wake_mask(),
            }
        };

        // the clock's INT line is open drain
        // uses unsafe steal since the pin is not owned by anything after boot
        let alarm = unsafe { AnyPin::steal(sources.alarm_pin) };
        alarm.rtcio_pullup(true);
        alarm.rtcio_pulldown(false);

        self.armed = Some(sources);
    }

    fn deep_sleep(&mut self) -> ! {
        let Some(sources) = self.armed else {
            log::error!("sleep: no wake sources armed, only a reset will wake the chip");
            self.rtc.sleep_deep(&[]);
        };

        let alarm = unsafe { AnyPin::steal(sources.alarm_pin) };
        let ext0 = Ext0WakeupSource::new(alarm, WakeupLevel::Low);

        let mut pins: heapless::Vec<AnyPin<'static>, MAX_WAKE_BUTTONS> = heapless::Vec::new();
        for gpio in sources.button_pins() {
            if pins.push(unsafe { AnyPin::steal(gpio) }).is_err() {
                log::warn!(
                    "sleep: more than {} wake buttons, gpio {} ignored",
                    MAX_WAKE_BUTTONS,
                    gpio
                );
            }
        }
        let mut lines: heapless::Vec<&mut dyn RtcPin, MAX_WAKE_BUTTONS> =
            pins.iter_mut().map(|p| p as &mut dyn RtcPin).collect();
        let ext1 = Ext1WakeupSource::new(&mut lines, WakeupLevel::High);

        self.rtc.sleep_deep(&[&ext0, &ext1]);
    }
}
