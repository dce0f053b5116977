// This module handles board-specific pin mappings and initialization.
// The board revision is selected via Cargo features: `watchy` is the v1.5 / v2 layout,
// `watchy-v1` moves the battery sense line.
//! The following wiring is assumed:
//! - MENU button => GPIO26 (Select)
//! - BACK button => GPIO25 (Back)
//! - UP button   => GPIO32 (Increase)
//! - DOWN button => GPIO4  (Decrease)
//! - Buttons have external pull-downs and read high when pressed
//! - PCF8563 INT => GPIO27 (open drain, low when the alarm fires)
//! - I2C SDA => GPIO21, SCL => GPIO22 (PCF8563 @ 0x51, BMA423 @ 0x18)
//! - Vibration motor => GPIO13
//! - E-paper: CS GPIO5, DC GPIO10, RST GPIO9, BUSY GPIO19, SCK GPIO18, MOSI GPIO23
//! - Battery sense (1/2 divider) => GPIO35, or GPIO33 on v1.0 boards

use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::peripherals::{
    Peripherals, ADC1, GPIO18, GPIO21, GPIO22, GPIO23, I2C0, LPWR, SPI2,
};

use crate::input::ButtonPins;

pub const RTC_INT_GPIO: u8 = 27;

pub const BUTTON_PINS: ButtonPins = ButtonPins {
    select: 26,
    back: 25,
    increase: 32,
    decrease: 4,
};

cfg_if::cfg_if! {
    if #[cfg(feature = "watchy-v1")] {
        pub type BatteryPin<'a> = esp_hal::peripherals::GPIO33<'a>;
    } else {
        pub type BatteryPin<'a> = esp_hal::peripherals::GPIO35<'a>;
    }
}

pub struct DisplayPins<'a> {
    pub spi2: SPI2<'a>,
    pub sck: GPIO18<'a>,
    pub mosi: GPIO23<'a>,
    pub cs: Output<'a>,
    pub dc: Output<'a>,
    pub rst: Output<'a>,
    pub busy: Input<'a>,
}

pub struct I2cPins<'a> {
    pub i2c0: I2C0<'a>,
    pub sda: GPIO21<'a>,
    pub scl: GPIO22<'a>,
}

pub struct ButtonInputs<'a> {
    pub menu: Input<'a>,
    pub back: Input<'a>,
    pub up: Input<'a>,
    pub down: Input<'a>,
}

pub struct BoardPins<'a> {
    pub display_pins: DisplayPins<'a>,
    pub i2c: I2cPins<'a>,
    pub buttons: ButtonInputs<'a>,
    pub vib_motor: Output<'a>,
    pub battery: BatteryPin<'a>,
    pub adc1: ADC1<'a>,
    pub lpwr: LPWR<'a>,
}

pub fn init_board_pins(p: Peripherals) -> BoardPins<'static> {
    // buttons: external pull-downs, so no internal pulls
    let button = InputConfig::default().with_pull(Pull::None);
    let buttons = ButtonInputs {
        menu: Input::new(p.GPIO26, button),
        back: Input::new(p.GPIO25, button),
        up: Input::new(p.GPIO32, button),
        down: Input::new(p.GPIO4, button),
    };

    // motor off until asked
    let vib_motor = Output::new(p.GPIO13, Level::Low, OutputConfig::default());

    // e-paper control pins; SCK/MOSI are handed to the SPI driver as-is
    let display_pins = DisplayPins {
        spi2: p.SPI2,
        sck: p.GPIO18,
        mosi: p.GPIO23,
        cs: Output::new(p.GPIO5, Level::High, OutputConfig::default()),
        dc: Output::new(p.GPIO10, Level::Low, OutputConfig::default()),
        rst: Output::new(p.GPIO9, Level::High, OutputConfig::default()),
        busy: Input::new(p.GPIO19, InputConfig::default().with_pull(Pull::None)),
    };

    cfg_if::cfg_if! {
        if #[cfg(feature = "watchy-v1")] {
            let battery = p.GPIO33;
        } else {
            let battery = p.GPIO35;
        }
    }

    BoardPins {
        display_pins,
        i2c: I2cPins {
            i2c0: p.I2C0,
            sda: p.GPIO21,
            scl: p.GPIO22,
        },
        buttons,
        vib_motor,
        battery,
        adc1: p.ADC1,
        lpwr: p.LPWR,
    }
}
