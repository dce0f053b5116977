#![cfg_attr(not(test), no_std)]

pub mod battery;
pub mod bma423;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod display;
pub mod gdeh0154d67;
pub mod haptic;
pub mod input;
pub mod menu;
pub mod power;
pub mod rtc_pcf8563;
pub mod scheduler;
pub mod state;
pub mod ui;
pub mod watch;

#[cfg(feature = "watchy")]
pub mod board;
#[cfg(feature = "watchy")]
pub mod wiring;
