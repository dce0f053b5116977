//! Wake-cause and button input handling.
//!
//! This module provides:
//! - `WakeCause` and the `InputSource` capability (what woke us, which buttons, live levels)
//! - `ButtonMask` decoding of the EXT1 wake-status bitmask into logical buttons
//! - `ButtonTracker`, the edge detector + debounce used by the interactive polling loops
//! - `TimeSource`, the injected clock for those loops
//!
//! Buttons are active-high on the watch (the EXT1 wake is "any high").

use embedded_hal::delay::DelayNs;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WakeCause {
    ColdBoot,
    TimerAlarm,
    ButtonEdge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Button {
    Select,
    Back,
    Increase,
    Decrease,
}

impl Button {
    // Checked in this order when several lines are high at once
    pub const ALL: [Button; 4] = [
        Button::Select,
        Button::Back,
        Button::Increase,
        Button::Decrease,
    ];

    fn bit(self) -> u8 {
        match self {
            Button::Select => 0x01,
            Button::Back => 0x02,
            Button::Increase => 0x04,
            Button::Decrease => 0x08,
        }
    }
}

/// GPIO numbers of the four buttons, used to decode the wake-status bitmask.
#[derive(Copy, Clone, Debug)]
pub struct ButtonPins {
    pub select: u8,
    pub back: u8,
    pub increase: u8,
    pub decrease: u8,
}

impl ButtonPins {
    pub fn gpio(&self, button: Button) -> u8 {
        match button {
            Button::Select => self.select,
            Button::Back => self.back,
            Button::Increase => self.increase,
            Button::Decrease => self.decrease,
        }
    }

    /// Bitmask over GPIO numbers, as the EXT1 wake source wants it.
    pub fn wake_mask(&self) -> u64 {
        Button::ALL
            .iter()
            .fold(0u64, |m, b| m | (1u64 << self.gpio(*b)))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ButtonMask(u8);

impl ButtonMask {
    pub const NONE: ButtonMask = ButtonMask(0);

    pub fn from_wake_status(status: u64, pins: &ButtonPins) -> Self {
        let bits = Button::ALL.iter().fold(0u8, |m, b| {
            if status & (1u64 << pins.gpio(*b)) != 0 {
                m | b.bit()
            } else {
                m
            }
        });
        ButtonMask(bits)
    }

    pub fn with(self, button: Button) -> Self {
        ButtonMask(self.0 | button.bit())
    }

    pub fn contains(self, button: Button) -> bool {
        self.0 & button.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The button that wins when several edges arrive together.
    pub fn first(self) -> Option<Button> {
        Button::ALL.iter().copied().find(|b| self.contains(*b))
    }
}

// ESP32 EXT1 status bits are numbered by RTC GPIO
const RTC_TO_GPIO: [u8; 18] = [
    36, 37, 38, 39, 34, 35, 25, 26, 33, 32, 4, 0, 2, 15, 13, 12, 14, 27,
];

/// Convert an EXT1 wake-status word (bit n = RTC GPIO n) to a GPIO bitmask.
pub fn gpio_mask_from_rtc_status(status: u32) -> u64 {
    RTC_TO_GPIO
        .iter()
        .enumerate()
        .filter(|(bit, _)| status & (1 << bit) != 0)
        .fold(0u64, |m, (_, gpio)| m | (1u64 << gpio))
}

/// Where the control logic gets its inputs from.
pub trait InputSource {
    fn wake_cause(&mut self) -> WakeCause;

    /// Raw wake-status bitmask (bit n = GPIO n) of the button group.
    fn button_edge_mask(&mut self) -> u64;

    /// Live level of a button, for the interactive loops.
    fn is_pressed(&mut self, button: Button) -> bool;
}

/// Monotonic milliseconds plus blocking delay, for the polling loops.
pub trait TimeSource: DelayNs {
    fn now_ms(&mut self) -> u64;
}

// Per-button edge state
#[derive(Copy, Clone, Default)]
struct Line {
    last_level: bool,
    suppressed_until: u64,
}

/// Turns polled levels into press events: a press is a released-to-pressed transition, and a
/// button can be muted for a while (the Select that opened an editor is still held down).
pub struct ButtonTracker {
    lines: [Line; 4],
}

impl ButtonTracker {
    /// Start tracking with the current levels, so a button already held does not count as a
    /// press.
    pub fn new<I: InputSource>(input: &mut I) -> Self {
        let mut lines = [Line::default(); 4];
        for (line, b) in lines.iter_mut().zip(Button::ALL) {
            line.last_level = input.is_pressed(b);
        }
        Self { lines }
    }

    pub fn suppress(&mut self, button: Button, until_ms: u64) {
        self.lines[Self::index(button)].suppressed_until = until_ms;
    }

    /// Sample all four lines and return the highest-priority new press, if any.
    pub fn poll<I: InputSource>(&mut self, input: &mut I, now_ms: u64) -> Option<Button> {
        let mut pressed = None;
        for (line, b) in self.lines.iter_mut().zip(Button::ALL) {
            let level = input.is_pressed(b);
            let rising = level && !line.last_level;
            line.last_level = level;
            if rising && now_ms >= line.suppressed_until && pressed.is_none() {
                pressed = Some(b);
            }
        }
        pressed
    }

    fn index(button: Button) -> usize {
        match button {
            Button::Select => 0,
            Button::Back => 1,
            Button::Increase => 2,
            Button::Decrease => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PINS: ButtonPins = ButtonPins {
        select: 26,
        back: 25,
        increase: 32,
        decrease: 4,
    };

    struct Levels([bool; 4]);

    impl InputSource for Levels {
        fn wake_cause(&mut self) -> WakeCause {
            WakeCause::ButtonEdge
        }
        fn button_edge_mask(&mut self) -> u64 {
            0
        }
        fn is_pressed(&mut self, button: Button) -> bool {
            self.0[ButtonTracker::index(button)]
        }
    }

    #[test]
    fn decodes_wake_status_by_gpio() {
        let mask = ButtonMask::from_wake_status(1 << 32, &PINS);
        assert_eq!(mask.first(), Some(Button::Increase));
        let mask = ButtonMask::from_wake_status((1 << 4) | (1 << 25), &PINS);
        assert_eq!(mask.first(), Some(Button::Back));
        assert!(ButtonMask::from_wake_status(1 << 27, &PINS).is_empty());
        assert_eq!(PINS.wake_mask(), (1 << 26) | (1 << 25) | (1 << 32) | (1 << 4));
    }

    #[test]
    fn rtc_status_bits_map_to_gpio_numbers() {
        // RTC GPIO 7 = GPIO26 (MENU), 10 = GPIO4 (DOWN), 17 = GPIO27 (clock INT)
        let mask = gpio_mask_from_rtc_status((1 << 7) | (1 << 10) | (1 << 17));
        assert_eq!(mask, (1 << 26) | (1 << 4) | (1 << 27));
        let mask = ButtonMask::from_wake_status(gpio_mask_from_rtc_status(1 << 9), &PINS);
        assert_eq!(mask.first(), Some(Button::Increase));
    }

    #[test]
    fn held_button_is_not_a_press_until_released() {
        let mut input = Levels([true, false, false, false]);
        let mut tracker = ButtonTracker::new(&mut input);
        assert_eq!(tracker.poll(&mut input, 0), None);
        input.0[0] = false;
        assert_eq!(tracker.poll(&mut input, 10), None);
        input.0[0] = true;
        assert_eq!(tracker.poll(&mut input, 20), Some(Button::Select));
        assert_eq!(tracker.poll(&mut input, 30), None);
    }

    #[test]
    fn suppressed_button_is_ignored_inside_the_window() {
        let mut input = Levels([false; 4]);
        let mut tracker = ButtonTracker::new(&mut input);
        tracker.suppress(Button::Select, 1_000);
        input.0[0] = true;
        assert_eq!(tracker.poll(&mut input, 500), None);
        input.0[0] = false;
        tracker.poll(&mut input, 600);
        input.0[0] = true;
        assert_eq!(tracker.poll(&mut input, 1_200), Some(Button::Select));
    }
}
