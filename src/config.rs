//! Compile-time configuration for the watch.
//!
//! Everything that would otherwise be a magic number in the control logic lives here:
//! hourglass geometry, menu contents, interactive timeouts, haptic pattern and the battery
//! gauge thresholds. Board pin numbers live in `wiring.rs`.

/// Number of fill segments in the hourglass progress indicator.
pub const HOURGLASS_SEGMENTS: u8 = 8;

/// Countdown length used until the user edits it.
pub const DEFAULT_COUNTDOWN_MINUTES: u8 = 8;
pub const MIN_COUNTDOWN_MINUTES: u8 = 1;
pub const MAX_COUNTDOWN_MINUTES: u8 = 59;

// Main menu entries, top to bottom
pub const MENU_ITEMS: [&str; 2] = ["Set Time", "Set Hourglass"];
pub const MENU_LENGTH: u8 = MENU_ITEMS.len() as u8;

/// Idle time after which the fast menu loop gives up and the watch goes back to sleep.
pub const FAST_MENU_TIMEOUT_MS: u64 = 5_000;
/// Window after entering an editor during which Select is ignored.
pub const EDITOR_SELECT_DEBOUNCE_MS: u64 = 1_000;
/// Editors discard their edit and return to the watch face after this much idle time.
pub const EDITOR_IDLE_TIMEOUT_MS: u64 = 60_000;
/// Half-period of the blinking field in the editors.
pub const EDITOR_BLINK_MS: u64 = 500;
/// Sampling period of the interactive polling loops.
pub const POLL_INTERVAL_MS: u32 = 20;

// Completion buzz: 2 toggles, 20 ms apart
pub const COMPLETION_PULSE_INTERVAL_MS: u32 = 20;
pub const COMPLETION_PULSE_COUNT: u8 = 2;

// Battery gauge thresholds in volts (after the 1/2 divider is undone)
pub const BATTERY_FULL_V: f32 = 4.00;
pub const BATTERY_HIGH_V: f32 = 3.80;
pub const BATTERY_LOW_V: f32 = 3.55;
pub const BATTERY_LEVELS: u8 = 3;

// Panel geometry (GDEH0154D67)
pub const DISPLAY_WIDTH: u32 = 200;
pub const DISPLAY_HEIGHT: u32 = 200;

/// Base year for the two-digit year field of the clock chip.
pub const YEAR_BASE: u16 = 2000;

/// Optional compile-time seed for the clock on cold boot, `YYYY-MM-DD HH:MM:SS`.
pub const COLD_BOOT_DATETIME: Option<&str> = option_env!("WATCH_DATETIME");
