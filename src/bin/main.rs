//! Hourglass watch firmware
//! ========================================
//! source ~/export-esp.sh
//! cargo run --release --features watchy
//! ========================================
//!
//! Every wake runs once: work out why we woke, do that one thing, go back to deep sleep.
//! A countdown advances on clock alarms; buttons open the menu or start the hourglass.

//% CHIPS: esp32
//% FEATURES: esp-hal/unstable

#![no_std]
#![no_main]

// Define the application description, which is placed in a special section of the binary.
// This is used by the bootloader to verify the application.
// The macro automatically fills in the fields.
esp_bootloader_esp_idf::esp_app_desc!();

use core::cell::RefCell;

use embedded_hal_bus::i2c::RefCellDevice;
use esp_backtrace as _;
use esp_hal::{
    delay::Delay,
    i2c::master::{Config as I2cConfig, I2c},
    main,
    rtc_cntl::Rtc,
    time::Rate,
    Config,
};

use hourglass_watch::{
    bma423::{Bma423, I2cRegisters, DEFAULT_I2C_ADDR as BMA423_ADDR},
    board::{AdcBattery, BoardInput, BoardPower, BoardTime},
    dispatcher::run_wake,
    display::{setup_display, OptionalSurface},
    gdeh0154d67::EPD_BUFFER_SIZE,
    haptic::VibrationMotor,
    power::{float_mask, shutdown, PowerControl, WakeSources},
    rtc_pcf8563::Pcf8563,
    state::{RetainedStore, RETAINED_LEN},
    watch::{Peripherals, Watch},
    wiring::{init_board_pins, BoardPins, BUTTON_PINS, RTC_INT_GPIO},
};

// Survives deep sleep; lost on power-up, which loads as the default state
#[esp_hal::ram(unstable(rtc_fast, persistent))]
static mut RETAINED: [u8; RETAINED_LEN] = [0; RETAINED_LEN];

static mut FRAMEBUFFER: [u8; EPD_BUFFER_SIZE] = [0xFF; EPD_BUFFER_SIZE];

#[main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();

    // Initialize peripherals
    let peripherals = esp_hal::init(Config::default());

    // one call gives you all the role pins from wiring.rs
    let BoardPins {
        display_pins,
        i2c: i2c_pins,
        buttons,
        vib_motor,
        battery,
        adc1,
        lpwr,
    } = init_board_pins(peripherals);

    // EXT1 status first, before anything else touches the RTC IO
    let input = BoardInput::capture(buttons);
    let mut power = BoardPower::new(Rtc::new(lpwr));
    let sources = WakeSources {
        alarm_pin: RTC_INT_GPIO,
        button_mask: BUTTON_PINS.wake_mask(),
    };

    // Safe because RETAINED and FRAMEBUFFER are only touched here, once per boot
    let retained = unsafe { &mut *core::ptr::addr_of_mut!(RETAINED) };
    let fb = unsafe { &mut *core::ptr::addr_of_mut!(FRAMEBUFFER) };
    let mut store = RetainedStore::new(retained);
    let state = store.load();

    // -------------------- I2C: clock + accelerometer --------------------
    let cfg = I2cConfig::default().with_frequency(Rate::from_khz(400));
    let i2c = match I2c::new(i2c_pins.i2c0, cfg) {
        Ok(i2c) => i2c.with_sda(i2c_pins.sda).with_scl(i2c_pins.scl),
        Err(e) => {
            log::error!("i2c: config rejected: {:?}", e);
            bare_sleep(&mut power, &sources)
        }
    };
    let bus = RefCell::new(i2c);
    let clock = Pcf8563::new(RefCellDevice::new(&bus));
    let motion = Bma423::new(I2cRegisters::new(RefCellDevice::new(&bus), BMA423_ADDR));

    // -------------------- Display --------------------
    // a missing panel only blanks the screen; the wake still runs
    let display = OptionalSurface::from(setup_display(display_pins, fb));

    let mut watch = Watch::new(
        Peripherals {
            clock,
            display,
            input,
            haptic: VibrationMotor::new(vib_motor, Delay::new()),
            battery: AdcBattery::new(adc1, battery),
            motion,
            time: BoardTime::new(),
            buttons: BUTTON_PINS,
        },
        state,
    );

    run_wake(&mut watch);
    shutdown(&mut watch, &mut power, &mut store, &sources)
}

// Without the I2C bus there is no clock to run a wake on; still sleep so the buttons can retry.
fn bare_sleep(power: &mut BoardPower<'_>, sources: &WakeSources) -> ! {
    power.float_all_pins(float_mask());
    power.arm_wake_sources(sources);
    power.deep_sleep()
}
