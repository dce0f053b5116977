//! Power lifecycle: everything between the end of a wake and deep sleep.

use crate::battery::BatterySampler;
use crate::bma423::MotionSensor;
use crate::clock::Clock;
use crate::display::Surface;
use crate::haptic::Haptic;
use crate::input::{InputSource, TimeSource};
use crate::state::RetainedStore;
use crate::ui::WatchFace;
use crate::watch::Watch;

/// Internal flash lines; floating them would take the chip down.
pub const RESERVED_PINS: [u8; 6] = [6, 7, 8, 11, 16, 17];
pub const GPIO_COUNT: u8 = 40;

/// Every GPIO except the flash pins.
pub fn float_mask() -> u64 {
    let all = (1u64 << GPIO_COUNT) - 1;
    RESERVED_PINS.iter().fold(all, |m, p| m & !(1u64 << p))
}

/// GPIOs routed through the RTC IO mux; only these can wake the chip from deep sleep.
pub const RTC_GPIOS: [u8; 18] = [0, 2, 4, 12, 13, 14, 15, 25, 26, 27, 32, 33, 34, 35, 36, 37, 38, 39];

pub fn is_rtc_gpio(pin: u8) -> bool {
    RTC_GPIOS.contains(&pin)
}

/// The two wake sources armed before every sleep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WakeSources {
    /// Clock interrupt line, wakes on low level.
    pub alarm_pin: u8,
    /// Button lines (bit n = GPIO n), wakes when any goes high.
    pub button_mask: u64,
}

impl WakeSources {
    /// GPIO numbers of the button lines, lowest first.
    pub fn button_pins(&self) -> impl Iterator<Item = u8> + '_ {
        (0..GPIO_COUNT).filter(move |p| self.button_mask & (1u64 << p) != 0)
    }

    /// Every line can wake the chip.
    pub fn is_valid(&self) -> bool {
        is_rtc_gpio(self.alarm_pin) && self.button_pins().all(is_rtc_gpio)
    }
}

pub trait PowerControl {
    /// Disable the output drivers of every pin in `mask`.
    fn float_all_pins(&mut self, mask: u64);

    fn arm_wake_sources(&mut self, sources: &WakeSources);

    fn deep_sleep(&mut self) -> !;
}

/// Steps 1-4 of going to sleep. Split from [`shutdown`] so the sequence can be observed.
pub fn prepare_for_sleep<C, S, I, H, B, M, T, F, P>(
    watch: &mut Watch<C, S, I, H, B, M, T, F>,
    power: &mut P,
    store: &mut RetainedStore<'_>,
    sources: &WakeSources,
) where
    C: Clock,
    S: Surface,
    I: InputSource,
    H: Haptic,
    B: BatterySampler,
    M: MotionSensor,
    T: TimeSource,
    F: WatchFace,
    P: PowerControl,
{
    if watch.hibernate_display() {
        watch.state.display_full_init = false;
    }

    // clearing the flag also disables the alarm interrupt, so leave an armed one alone
    if watch.state.alarm_armed {
        log::debug!("sleep: countdown alarm armed, leaving it set");
    } else if let Err(e) = watch.clock.clear_alarm_flag() {
        log::warn!("sleep: could not clear alarm flag: {:?}", e);
    }

    if let Err(e) = store.store(&watch.state) {
        log::warn!("sleep: state not retained: {:?}", e);
    }

    power.float_all_pins(float_mask());
    power.arm_wake_sources(sources);
    log::info!("sleep: {:?}", watch.state.mode);
}

pub fn shutdown<C, S, I, H, B, M, T, F, P>(
    watch: &mut Watch<C, S, I, H, B, M, T, F>,
    power: &mut P,
    store: &mut RetainedStore<'_>,
    sources: &WakeSources,
) -> !
where
    C: Clock,
    S: Surface,
    I: InputSource,
    H: Haptic,
    B: BatterySampler,
    M: MotionSensor,
    T: TimeSource,
    F: WatchFace,
    P: PowerControl,
{
    prepare_for_sleep(watch, power, store, sources);
    power.deep_sleep()
}
