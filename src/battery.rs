//! Battery gauge: voltage sampling and the 4-level bucket shown on the watch face.

use crate::config::{BATTERY_FULL_V, BATTERY_HIGH_V, BATTERY_LEVELS, BATTERY_LOW_V};

/// Source of the battery voltage, in volts at the cell (divider already undone).
pub trait BatterySampler {
    /// `None` when the ADC could not be read this wake.
    fn voltage(&mut self) -> Option<f32>;
}

/// Cell voltage from a millivolt reading taken behind the board's 1/2 divider.
pub fn voltage_from_divider_mv(mv: u16) -> f32 {
    mv as f32 / 1000.0 * 2.0
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    pub const EMPTY: BatteryLevel = BatteryLevel(0);

    pub fn from_voltage(v: f32) -> Self {
        let level = if v > BATTERY_FULL_V {
            3
        } else if v > BATTERY_HIGH_V {
            2
        } else if v > BATTERY_LOW_V {
            1
        } else {
            0
        };
        BatteryLevel(level)
    }

    /// Number of filled gauge segments, `0..=3`.
    pub fn segments(self) -> u8 {
        self.0
    }

    pub fn fraction(self) -> f32 {
        self.0 as f32 / BATTERY_LEVELS as f32
    }

    pub fn percent(self) -> u8 {
        libm::roundf(self.fraction() * 100.0) as u8
    }
}

/// Sample once and bucket it; a failed read shows as an empty gauge.
pub fn sample_level<B: BatterySampler>(battery: &mut B) -> BatteryLevel {
    match battery.voltage() {
        Some(v) => {
            let level = BatteryLevel::from_voltage(v);
            log::debug!("battery: {:.2} V, {}%", v, level.percent());
            level
        }
        None => {
            log::warn!("battery: ADC read failed");
            BatteryLevel::EMPTY
        }
    }
}
