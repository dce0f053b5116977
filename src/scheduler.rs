//! Hourglass countdown scheduling.
//!
//! A countdown of `total` minutes is drawn as [`HOURGLASS_SEGMENTS`] fill bars. Instead of waking
//! every minute, the watch only wakes when the next bar boundary is crossed, so a countdown costs
//! at most one wake per segment plus the final one.
//!
//! All arithmetic is on minute-of-hour (mod 60). The proportions are evaluated in integer form:
//! `floor(fraction * segments)` becomes `elapsed * segments / total`, which is exact where the
//! floating-point form can land a hair under a boundary.
//!
//! Two margins matter and must stay:
//! - the next wake is one minute *after* the boundary minute (`+ 1`), so the bar count has
//!   definitely advanced when the alarm fires;
//! - once the next boundary is the last one (`>= 0.99` of the way), the wake goes to the
//!   target minute itself rather than a computed boundary.

use crate::config::HOURGLASS_SEGMENTS;

/// Threshold on the next boundary fraction above which the next wake is the target, in percent.
const FINAL_BOUNDARY_PERCENT: u32 = 99;

/// Minute-of-hour at which a countdown started at `current_minute` completes.
pub fn target_minute(total_minutes: u8, current_minute: u8) -> u8 {
    ((current_minute as u16 + total_minutes as u16) % 60) as u8
}

/// Minutes until `target`, across the top of the hour if needed. Zero means done.
pub fn minutes_remaining(current_minute: u8, target_minute: u8) -> u8 {
    if current_minute <= target_minute {
        target_minute - current_minute
    } else {
        60 - current_minute + target_minute
    }
}

/// Index of the segment the countdown is in, `0..HOURGLASS_SEGMENTS`.
pub fn filled_segments(total_minutes: u8, minutes_remaining: u8) -> u8 {
    let total = total_minutes.max(1) as u32;
    let elapsed = total.saturating_sub(minutes_remaining as u32);
    let filled = elapsed * HOURGLASS_SEGMENTS as u32 / total;
    filled.min(HOURGLASS_SEGMENTS as u32 - 1) as u8
}

/// Minute-of-hour of the next wake: one minute past the next segment boundary, or the target
/// when that boundary is the last one.
pub fn next_wake_minute(total_minutes: u8, target_minute: u8, filled: u8) -> u8 {
    let segments = HOURGLASS_SEGMENTS as u32;
    let next = filled as u32 + 1;
    if next * 100 >= FINAL_BOUNDARY_PERCENT * segments {
        return target_minute;
    }
    let total = total_minutes as u32;
    let start = (target_minute as u32 + 60 - total % 60) % 60;
    ((start + next * total / segments + 1) % 60) as u8
}

/// Minutes from `current_minute` until `next_minute`, across the top of the hour if needed.
pub fn alarm_delta(current_minute: u8, next_minute: u8) -> u8 {
    if next_minute >= current_minute {
        next_minute - current_minute
    } else {
        next_minute + 60 - current_minute
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub minutes_remaining: u8,
    pub filled: u8,
    pub next_minute: u8,
    /// Minutes until the alarm that should be armed next.
    pub delta: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The target minute has been reached.
    Complete,
    /// Still running; arm the alarm for `delta` minutes and draw `filled` bars.
    Pending(Progress),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Countdown {
    pub total_minutes: u8,
    pub target_minute: u8,
}

impl Countdown {
    pub fn start(total_minutes: u8, current_minute: u8) -> Self {
        Self {
            total_minutes,
            target_minute: target_minute(total_minutes, current_minute),
        }
    }

    pub fn tick(&self, current_minute: u8) -> Tick {
        if current_minute == self.target_minute {
            return Tick::Complete;
        }
        let remaining = minutes_remaining(current_minute, self.target_minute);
        let filled = filled_segments(self.total_minutes, remaining);
        let next_minute = next_wake_minute(self.total_minutes, self.target_minute, filled);
        Tick::Pending(Progress {
            minutes_remaining: remaining,
            filled,
            next_minute,
            delta: alarm_delta(current_minute, next_minute),
        })
    }
}
