//! Vibration motor.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

pub trait Haptic {
    /// Toggle the motor `count` times, `interval_ms` apart. An even count leaves it off.
    fn pulse(&mut self, interval_ms: u32, count: u8);
}

pub struct VibrationMotor<P, D> {
    pin: P,
    delay: D,
}

impl<P: OutputPin, D: DelayNs> VibrationMotor<P, D> {
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }
}

impl<P: OutputPin, D: DelayNs> Haptic for VibrationMotor<P, D> {
    fn pulse(&mut self, interval_ms: u32, count: u8) {
        let mut on = false;
        for _ in 0..count {
            on = !on;
            let res = if on {
                self.pin.set_high()
            } else {
                self.pin.set_low()
            };
            if res.is_err() {
                log::warn!("haptic: motor pin write failed");
                break;
            }
            self.delay.delay_ms(interval_ms);
        }
        // never leave the motor running into deep sleep
        if on {
            let _ = self.pin.set_low();
        }
    }
}
