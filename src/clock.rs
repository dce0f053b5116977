//! Wall-clock types and the clock capability the control logic needs.
//!
//! The clock chip owns the time; the watch only reads it fresh on every wake, writes it back
//! from the time editor, and uses its minute alarm to schedule the next wake.

use core::fmt;

use crate::config::YEAR_BASE;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,  // full year, e.g., 2024
    pub month: u8,  // 1-12
    pub day: u8,    // 1-31
    pub hour: u8,   // 0-23
    pub minute: u8, // 0-59
    pub second: u8, // 0-59
}

impl Default for DateTime {
    fn default() -> Self {
        Self {
            year: YEAR_BASE,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTime {
    /// Parse `YYYY-MM-DD HH:MM:SS` (a `T` separator is accepted as well).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (date, time) = s.split_once([' ', 'T'])?;

        let mut d = date.split('-');
        let year = d.next()?.parse::<u16>().ok()?;
        let month = d.next()?.parse::<u8>().ok()?;
        let day = d.next()?.parse::<u8>().ok()?;
        if d.next().is_some() {
            return None;
        }

        let mut t = time.split(':');
        let hour = t.next()?.parse::<u8>().ok()?;
        let minute = t.next()?.parse::<u8>().ok()?;
        let second = match t.next() {
            Some(v) => v.parse::<u8>().ok()?,
            None => 0,
        };
        if t.next().is_some() {
            return None;
        }

        let dt = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        };
        dt.is_valid().then_some(dt)
    }

    /// Range check on decoded fields. The clock chip stores a two-digit year, so only
    /// `YEAR_BASE..YEAR_BASE + 100` is representable.
    pub fn is_valid(&self) -> bool {
        (YEAR_BASE..YEAR_BASE + 100).contains(&self.year)
            && (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }

    /// Years since `YEAR_BASE`, as edited in the time editor (0-99).
    pub fn year_offset(&self) -> u8 {
        self.year.saturating_sub(YEAR_BASE).min(99) as u8
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// What the control logic needs from the clock peripheral.
pub trait Clock {
    type Error: fmt::Debug;

    fn read_time(&mut self) -> Result<DateTime, Self::Error>;

    fn set_time(&mut self, dt: &DateTime) -> Result<(), Self::Error>;

    fn minute(&mut self) -> Result<u8, Self::Error> {
        Ok(self.read_time()?.minute)
    }

    /// Program the alarm to fire `delta` minutes from now (1-59) and enable its interrupt.
    fn arm_alarm_in_minutes(&mut self, delta: u8) -> Result<(), Self::Error>;

    /// Acknowledge a fired alarm. This also disables the alarm interrupt, so a pending
    /// alarm is cancelled.
    fn clear_alarm_flag(&mut self) -> Result<(), Self::Error>;

    /// Seed the clock from a configuration string on cold boot.
    ///
    /// Returns `Ok(false)` when the string does not parse; the clock is left untouched.
    fn init_from_str(&mut self, s: &str) -> Result<bool, Self::Error> {
        match DateTime::parse(s) {
            Some(dt) => {
                self.set_time(&dt)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Increment within `lo..=hi`, wrapping to `lo`.
pub fn wrap_inc(v: u8, lo: u8, hi: u8) -> u8 {
    if v >= hi {
        lo
    } else {
        v + 1
    }
}

/// Decrement within `lo..=hi`, wrapping to `hi`.
pub fn wrap_dec(v: u8, lo: u8, hi: u8) -> u8 {
    if v <= lo {
        hi
    } else {
        v - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_string() {
        let dt = DateTime::parse("2024-03-09 17:05:42").unwrap();
        assert_eq!(
            dt,
            DateTime {
                year: 2024,
                month: 3,
                day: 9,
                hour: 17,
                minute: 5,
                second: 42
            }
        );
        assert_eq!(DateTime::parse("2024-03-09T17:05").unwrap().second, 0);
    }

    #[test]
    fn rejects_garbage_and_out_of_range() {
        assert!(DateTime::parse("").is_none());
        assert!(DateTime::parse("yesterday").is_none());
        assert!(DateTime::parse("2024-13-01 00:00:00").is_none());
        assert!(DateTime::parse("2024-01-01 24:00:00").is_none());
        assert!(DateTime::parse("1999-01-01 00:00:00").is_none());
        assert!(DateTime::parse("2024-01-01-02 00:00:00").is_none());
    }

    #[test]
    fn wraps_at_field_bounds() {
        assert_eq!(wrap_inc(23, 0, 23), 0);
        assert_eq!(wrap_dec(0, 0, 23), 23);
        assert_eq!(wrap_inc(12, 1, 12), 1);
        assert_eq!(wrap_dec(1, 1, 31), 31);
        assert_eq!(wrap_inc(5, 0, 59), 6);
    }
}
