//! Fake peripherals for driving whole wakes on the host.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_graphics::prelude::*;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_hal::delay::DelayNs;

use hourglass_watch::battery::BatterySampler;
use hourglass_watch::bma423::MotionSensor;
use hourglass_watch::clock::{Clock, DateTime};
use hourglass_watch::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use hourglass_watch::display::{OptionalSurface, Surface};
use hourglass_watch::haptic::Haptic;
use hourglass_watch::input::{Button, ButtonPins, InputSource, TimeSource, WakeCause};
use hourglass_watch::power::{PowerControl, WakeSources};
use hourglass_watch::state::PersistedState;
use hourglass_watch::watch::{Peripherals, Watch};

pub const PINS: ButtonPins = ButtonPins {
    select: 26,
    back: 25,
    increase: 32,
    decrease: 4,
};

/// Peripheral calls in the order they happened, shared across fakes.
pub type EventLog = Rc<RefCell<Vec<&'static str>>>;

// ---- clock ----

pub struct FakeClock {
    pub now: DateTime,
    pub alarm_minute: Option<u8>,
    pub alarm_enabled: bool,
    pub arms: Vec<u8>,
    pub set_calls: Vec<DateTime>,
    pub fail: bool,
    log: EventLog,
}

impl FakeClock {
    pub fn at_minute(&mut self, minute: u8) {
        self.now.minute = minute;
    }
}

impl Clock for FakeClock {
    type Error = &'static str;

    fn read_time(&mut self) -> Result<DateTime, Self::Error> {
        if self.fail {
            return Err("i2c nack");
        }
        Ok(self.now)
    }

    fn set_time(&mut self, dt: &DateTime) -> Result<(), Self::Error> {
        if self.fail {
            return Err("i2c nack");
        }
        self.now = *dt;
        self.set_calls.push(*dt);
        Ok(())
    }

    fn arm_alarm_in_minutes(&mut self, delta: u8) -> Result<(), Self::Error> {
        if self.fail {
            return Err("i2c nack");
        }
        self.arms.push(delta);
        self.alarm_minute = Some((self.now.minute + delta) % 60);
        self.alarm_enabled = true;
        self.log.borrow_mut().push("arm_alarm");
        Ok(())
    }

    fn clear_alarm_flag(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push("clear_alarm");
        self.alarm_enabled = false;
        Ok(())
    }
}

// ---- display ----

pub struct FakeSurface {
    pub ink: Vec<bool>,
    pub inits: Vec<bool>,
    pub renders: Vec<bool>,
    pub hibernated: u32,
    pub fail_init: bool,
    log: EventLog,
}

impl FakeSurface {
    pub fn at(&self, x: i32, y: i32) -> bool {
        self.ink[(y as u32 * DISPLAY_WIDTH + x as u32) as usize]
    }

    pub fn inked(&self) -> usize {
        self.ink.iter().filter(|p| **p).count()
    }
}

impl OriginDimensions for FakeSurface {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl DrawTarget for FakeSurface {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<BinaryColor>>,
    {
        for Pixel(p, c) in pixels {
            if p.x >= 0 && p.y >= 0 && p.x < DISPLAY_WIDTH as i32 && p.y < DISPLAY_HEIGHT as i32 {
                self.ink[(p.y as u32 * DISPLAY_WIDTH + p.x as u32) as usize] = c.is_on();
            }
        }
        Ok(())
    }
}

impl Surface for FakeSurface {
    type PanelError = &'static str;

    fn init(&mut self, initial_refresh: bool) -> Result<(), Self::PanelError> {
        if self.fail_init {
            return Err("busy timeout");
        }
        self.inits.push(initial_refresh);
        Ok(())
    }

    fn render(&mut self, partial: bool) -> Result<(), Self::PanelError> {
        self.renders.push(partial);
        Ok(())
    }

    fn hibernate(&mut self) -> Result<(), Self::PanelError> {
        self.hibernated += 1;
        self.log.borrow_mut().push("hibernate");
        Ok(())
    }
}

// ---- input + time ----

/// Button presses scheduled on the virtual clock: `(pressed_at_ms, button, held_for_ms)`.
pub struct ScriptedInput {
    pub cause: WakeCause,
    pub edge_mask: u64,
    pub script: Vec<(u64, Button, u64)>,
    clock_ms: Rc<Cell<u64>>,
}

impl InputSource for ScriptedInput {
    fn wake_cause(&mut self) -> WakeCause {
        self.cause
    }

    fn button_edge_mask(&mut self) -> u64 {
        self.edge_mask
    }

    fn is_pressed(&mut self, button: Button) -> bool {
        let now = self.clock_ms.get();
        self.script
            .iter()
            .any(|(at, b, held)| *b == button && now >= *at && now < at + held)
    }
}

pub struct VirtualTime {
    clock_ms: Rc<Cell<u64>>,
}

impl DelayNs for VirtualTime {
    fn delay_ns(&mut self, ns: u32) {
        self.clock_ms.set(self.clock_ms.get() + ns as u64 / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock_ms.set(self.clock_ms.get() + ms as u64);
    }
}

impl TimeSource for VirtualTime {
    fn now_ms(&mut self) -> u64 {
        self.clock_ms.get()
    }
}

// ---- the rest ----

#[derive(Default)]
pub struct HapticRecorder {
    pub pulses: Vec<(u32, u8)>,
}

impl Haptic for HapticRecorder {
    fn pulse(&mut self, interval_ms: u32, count: u8) {
        self.pulses.push((interval_ms, count));
    }
}

pub struct FakeBattery(pub Option<f32>);

impl BatterySampler for FakeBattery {
    fn voltage(&mut self) -> Option<f32> {
        self.0
    }
}

#[derive(Default)]
pub struct FakeMotion {
    pub configured: u32,
    pub fail: bool,
}

impl MotionSensor for FakeMotion {
    type Error = &'static str;

    fn configure<D: DelayNs>(&mut self, _delay: &mut D) -> Result<(), Self::Error> {
        if self.fail {
            return Err("chip id 0x00");
        }
        self.configured += 1;
        Ok(())
    }
}

/// GPIO output-enable bits, as the float step leaves them.
pub struct FakePower {
    pub output_enable: u64,
    pub armed: Option<WakeSources>,
    log: EventLog,
}

impl PowerControl for FakePower {
    fn float_all_pins(&mut self, mask: u64) {
        self.output_enable &= !mask;
        self.log.borrow_mut().push("float");
    }

    fn arm_wake_sources(&mut self, sources: &WakeSources) {
        self.armed = Some(*sources);
        self.log.borrow_mut().push("arm_wake");
    }

    fn deep_sleep(&mut self) -> ! {
        panic!("deep sleep is not reachable on the host");
    }
}

// ---- rig ----

pub type TestWatch = Watch<
    FakeClock,
    FakeSurface,
    ScriptedInput,
    HapticRecorder,
    FakeBattery,
    FakeMotion,
    VirtualTime,
>;

pub struct Rig {
    pub watch: TestWatch,
    pub power: FakePower,
    pub log: EventLog,
    pub clock_ms: Rc<Cell<u64>>,
}

impl Rig {
    pub fn new(cause: WakeCause, state: PersistedState) -> Self {
        let log: EventLog = Rc::new(RefCell::new(Vec::new()));
        let clock_ms = Rc::new(Cell::new(0));
        let watch = Watch::new(
            Peripherals {
                clock: FakeClock {
                    now: DateTime {
                        year: 2025,
                        month: 3,
                        day: 14,
                        hour: 9,
                        minute: 0,
                        second: 0,
                    },
                    alarm_minute: None,
                    alarm_enabled: false,
                    arms: Vec::new(),
                    set_calls: Vec::new(),
                    fail: false,
                    log: log.clone(),
                },
                display: FakeSurface {
                    ink: vec![false; (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize],
                    inits: Vec::new(),
                    renders: Vec::new(),
                    hibernated: 0,
                    fail_init: false,
                    log: log.clone(),
                },
                input: ScriptedInput {
                    cause,
                    edge_mask: 0,
                    script: Vec::new(),
                    clock_ms: clock_ms.clone(),
                },
                haptic: HapticRecorder::default(),
                battery: FakeBattery(Some(3.9)),
                motion: FakeMotion::default(),
                time: VirtualTime {
                    clock_ms: clock_ms.clone(),
                },
                buttons: PINS,
            },
            state,
        );
        let power = FakePower {
            output_enable: u64::MAX,
            armed: None,
            log: log.clone(),
        };
        Self {
            watch,
            power,
            log,
            clock_ms,
        }
    }

    /// Next wake with the same peripherals and the state carried over.
    pub fn wake(&mut self, cause: WakeCause) {
        self.watch.input.cause = cause;
        self.watch.input.edge_mask = 0;
        self.watch.input.script.clear();
        self.log.borrow_mut().clear();
    }

    /// A button wake: `button` is the one that raised the EXT1 line.
    pub fn press_wake(&mut self, button: Button) {
        self.wake(WakeCause::ButtonEdge);
        self.watch.input.edge_mask = 1u64 << PINS.gpio(button);
        // still held for a moment after boot, like a real press
        let now = self.clock_ms.get();
        self.watch.input.script.push((now, button, 80));
    }

    /// Schedule a press `after_ms` from now, held for 80 ms.
    pub fn press_later(&mut self, after_ms: u64, button: Button) {
        let at = self.clock_ms.get() + after_ms;
        self.watch.input.script.push((at, button, 80));
    }
}

pub type HeadlessWatch = Watch<
    FakeClock,
    OptionalSurface<FakeSurface>,
    ScriptedInput,
    HapticRecorder,
    FakeBattery,
    FakeMotion,
    VirtualTime,
>;

/// The same rig with no panel at all, as when the display bus cannot be set up.
pub fn headless(cause: WakeCause, state: PersistedState) -> (HeadlessWatch, FakePower, EventLog) {
    let Rig {
        watch, power, log, ..
    } = Rig::new(cause, state);
    let headless = Watch::new(
        Peripherals {
            clock: watch.clock,
            display: OptionalSurface::missing(),
            input: watch.input,
            haptic: watch.haptic,
            battery: watch.battery,
            motion: watch.motion,
            time: watch.time,
            buttons: watch.buttons,
        },
        watch.state,
    );
    (headless, power, log)
}
