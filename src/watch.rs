//! The watch: persisted state plus every capability the control logic drives.
//!
//! Screen helpers here both draw and move the UI mode, so the mode always names what is on
//! the glass. Peripheral failures are logged and skipped; nothing in here returns an error.

use crate::battery::{sample_level, BatterySampler};
use crate::bma423::MotionSensor;
use crate::clock::{Clock, DateTime};
use crate::config::{COLD_BOOT_DATETIME, COMPLETION_PULSE_COUNT, COMPLETION_PULSE_INTERVAL_MS};
use crate::display::Surface;
use crate::haptic::Haptic;
use crate::input::{ButtonPins, InputSource, TimeSource};
use crate::scheduler::{Countdown, Progress, Tick};
use crate::state::{PersistedState, UiMode};
use crate::ui::{self, DigitalFace, WatchFace};

/// The board's peripherals, as capabilities.
pub struct Peripherals<C, S, I, H, B, M, T> {
    pub clock: C,
    pub display: S,
    pub input: I,
    pub haptic: H,
    pub battery: B,
    pub motion: M,
    pub time: T,
    pub buttons: ButtonPins,
}

pub struct Watch<C, S, I, H, B, M, T, F = DigitalFace> {
    pub clock: C,
    pub display: S,
    pub input: I,
    pub haptic: H,
    pub battery: B,
    pub motion: M,
    pub time: T,
    pub face: F,
    pub buttons: ButtonPins,
    pub state: PersistedState,
    /// Clock seed applied on cold boot.
    pub boot_datetime: Option<&'static str>,
    display_ready: bool,
}

impl<C, S, I, H, B, M, T> Watch<C, S, I, H, B, M, T, DigitalFace> {
    pub fn new(p: Peripherals<C, S, I, H, B, M, T>, state: PersistedState) -> Self {
        Self {
            clock: p.clock,
            display: p.display,
            input: p.input,
            haptic: p.haptic,
            battery: p.battery,
            motion: p.motion,
            time: p.time,
            face: DigitalFace,
            buttons: p.buttons,
            state,
            boot_datetime: COLD_BOOT_DATETIME,
            display_ready: false,
        }
    }
}

impl<C, S, I, H, B, M, T, F> Watch<C, S, I, H, B, M, T, F> {
    /// Swap in a different watch face.
    pub fn with_face<F2: WatchFace>(self, face: F2) -> Watch<C, S, I, H, B, M, T, F2> {
        Watch {
            clock: self.clock,
            display: self.display,
            input: self.input,
            haptic: self.haptic,
            battery: self.battery,
            motion: self.motion,
            time: self.time,
            face,
            buttons: self.buttons,
            state: self.state,
            boot_datetime: self.boot_datetime,
            display_ready: self.display_ready,
        }
    }
}

impl<C, S, I, H, B, M, T, F> Watch<C, S, I, H, B, M, T, F>
where
    C: Clock,
    S: Surface,
    I: InputSource,
    H: Haptic,
    B: BatterySampler,
    M: MotionSensor,
    T: TimeSource,
    F: WatchFace,
{
    // ---- peripherals ----

    /// Bring the panel up for this wake. A panel that fails here is left alone until sleep.
    pub fn init_display(&mut self) {
        match self.display.init(self.state.display_full_init) {
            Ok(()) => self.display_ready = true,
            Err(e) => {
                log::warn!("display: init failed, running blind this wake: {:?}", e);
                self.display_ready = false;
            }
        }
    }

    pub fn display_ready(&self) -> bool {
        self.display_ready
    }

    pub fn render(&mut self, partial: bool) {
        if !self.display_ready {
            return;
        }
        if let Err(e) = self.display.render(partial) {
            log::warn!("display: refresh failed: {:?}", e);
        }
    }

    /// Put the panel to sleep. Returns whether it was up, i.e. whether it is now initialised.
    pub fn hibernate_display(&mut self) -> bool {
        if !self.display_ready {
            return false;
        }
        self.display_ready = false;
        match self.display.hibernate() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("display: hibernate failed: {:?}", e);
                false
            }
        }
    }

    pub fn now(&mut self) -> Option<DateTime> {
        self.clock
            .read_time()
            .map_err(|e| log::warn!("clock: read failed: {:?}", e))
            .ok()
    }

    pub fn current_minute(&mut self) -> Option<u8> {
        self.clock
            .minute()
            .map_err(|e| log::warn!("clock: read failed: {:?}", e))
            .ok()
    }

    /// Cold-boot bring-up: seed the clock and configure the accelerometer.
    pub fn cold_boot(&mut self) {
        match self.boot_datetime {
            Some(s) => match self.clock.init_from_str(s) {
                Ok(true) => log::info!("clock: set to {}", s),
                Ok(false) => log::warn!("clock: ignoring unparsable boot time {:?}", s),
                Err(e) => log::warn!("clock: could not set boot time: {:?}", e),
            },
            None => log::debug!("clock: no boot time configured, keeping chip time"),
        }
        if let Err(e) = self.motion.configure(&mut self.time) {
            log::warn!("accelerometer: disabled this boot: {:?}", e);
        }
    }

    // ---- screens ----

    /// Show the time. Entering the watch face ends any countdown; its pending alarm is
    /// cancelled before sleep.
    pub fn show_watch_face(&mut self, partial: bool) {
        let now = self.now();
        let level = sample_level(&mut self.battery);
        self.face.draw(&mut self.display, now.as_ref(), level);
        self.render(partial);

        if self.state.target_minute.is_some() || self.state.alarm_armed {
            log::info!("countdown: abandoned");
        }
        self.state.target_minute = None;
        self.state.alarm_armed = false;
        self.set_mode(UiMode::WatchFace);
    }

    pub fn show_menu(&mut self, partial: bool) {
        ui::draw_menu(&mut self.display, self.state.menu_index);
        self.render(partial);
        self.set_mode(UiMode::MainMenu);
    }

    pub fn set_mode(&mut self, mode: UiMode) {
        if self.state.mode != mode {
            log::debug!("ui: {:?} -> {:?}", self.state.mode, mode);
            self.state.mode = mode;
        }
    }

    // ---- countdown ----

    /// Start a countdown of the configured length from the current minute.
    pub fn start_countdown(&mut self) {
        let Some(minute) = self.current_minute() else {
            log::warn!("countdown: clock unavailable, not starting");
            return;
        };
        let cd = Countdown::start(self.state.countdown_minutes, minute);
        log::info!(
            "countdown: {} min from :{:02}, done at :{:02}",
            cd.total_minutes,
            minute,
            cd.target_minute
        );
        self.state.target_minute = Some(cd.target_minute);
        self.set_mode(UiMode::Countdown);
        self.advance_countdown(minute);
    }

    /// Alarm wake during a countdown.
    pub fn tick_countdown(&mut self) {
        match self.current_minute() {
            Some(minute) => self.advance_countdown(minute),
            None => {
                log::warn!("countdown: clock unavailable, giving up");
                self.show_watch_face(false);
            }
        }
    }

    fn advance_countdown(&mut self, minute: u8) {
        let Some(target_minute) = self.state.target_minute else {
            log::warn!("countdown: no target set");
            self.show_watch_face(false);
            return;
        };
        let cd = Countdown {
            total_minutes: self.state.countdown_minutes,
            target_minute,
        };

        match cd.tick(minute) {
            Tick::Complete => {
                log::info!("countdown: complete");
                self.haptic
                    .pulse(COMPLETION_PULSE_INTERVAL_MS, COMPLETION_PULSE_COUNT);
                self.show_watch_face(false);
            }
            Tick::Pending(p) => {
                self.arm_next(&p);
                ui::draw_hourglass(&mut self.display, p.minutes_remaining, p.filled);
                self.render(false);
                self.set_mode(UiMode::Countdown);
            }
        }
    }

    /// Alarm wake while the menu is up and a countdown is still running underneath it.
    /// The countdown moves on without touching the screen: the next alarm is armed, or the
    /// completion pulse is given and the countdown ends.
    pub fn tick_countdown_behind_menu(&mut self) {
        let Some(target_minute) = self.state.target_minute else {
            return;
        };
        let Some(minute) = self.current_minute() else {
            log::warn!("countdown: clock unavailable, giving up");
            self.state.target_minute = None;
            return;
        };
        let cd = Countdown {
            total_minutes: self.state.countdown_minutes,
            target_minute,
        };
        match cd.tick(minute) {
            Tick::Complete => {
                log::info!("countdown: complete while in the menu");
                self.haptic
                    .pulse(COMPLETION_PULSE_INTERVAL_MS, COMPLETION_PULSE_COUNT);
                self.state.target_minute = None;
            }
            Tick::Pending(p) => self.arm_next(&p),
        }
    }

    fn arm_next(&mut self, p: &Progress) {
        match self.clock.arm_alarm_in_minutes(p.delta) {
            Ok(()) => {
                log::info!(
                    "countdown: {} min left, segment {}, next wake in {} min",
                    p.minutes_remaining,
                    p.filled,
                    p.delta
                );
                self.state.alarm_armed = true;
            }
            Err(e) => {
                log::warn!("countdown: could not arm alarm: {:?}", e);
                self.state.alarm_armed = false;
            }
        }
    }
}
