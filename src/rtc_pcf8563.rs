// RTC driver for the PCF8563 real-time clock on the Watchy board.
// Datasheet: https://www.nxp.com/docs/en/data-sheet/PCF8563.pdf
//
// The chip's INT output is open-drain and goes low while AF (alarm flag) and AIE (alarm
// interrupt enable) are both set. That line is the level-triggered wake source.

use embedded_hal::i2c::I2c;

use crate::clock::{Clock, DateTime};
use crate::config::YEAR_BASE;

pub const DEFAULT_I2C_ADDR: u8 = 0x51;

const REG_CONTROL_2: u8 = 0x01;
const REG_SECONDS: u8 = 0x02; // sec, min, hour, day, weekday, century_month, year
const REG_MINUTE_ALARM: u8 = 0x09; // minute, hour, day, weekday alarms

const CTRL2_AIE: u8 = 0x02; // alarm interrupt enable
const CTRL2_AF: u8 = 0x08; // alarm flag
const ALARM_DISABLE: u8 = 0x80; // AE_x bit: 1 = this alarm field is ignored
const SECONDS_VL: u8 = 0x80; // voltage-low: time is unreliable

#[derive(Debug)]
pub enum RtcError<E> {
    Bus(E),
    InvalidTime,
}

impl<E> From<E> for RtcError<E> {
    fn from(e: E) -> Self {
        RtcError::Bus(e)
    }
}

pub struct Pcf8563<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> Pcf8563<I2C>
where
    I2C: I2c<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            address: DEFAULT_I2C_ADDR,
        }
    }

    pub fn into_inner(self) -> I2C {
        self.i2c
    }

    // Read datetime. Returns (dt, vl_flag) where vl_flag == true means time is unreliable (power loss).
    pub fn read_datetime(&mut self) -> Result<(DateTime, bool), E> {
        let mut buf = [0u8; 7];
        self.i2c.write_read(self.address, &[REG_SECONDS], &mut buf)?;
        let vl = (buf[0] & SECONDS_VL) != 0;
        let century_month = buf[5];
        // Century bit set means 19xx on this chip; the watch only ever writes 20xx.
        let year = if (century_month & 0x80) != 0 {
            1900u16 + bcd_decode(buf[6]) as u16
        } else {
            YEAR_BASE + bcd_decode(buf[6]) as u16
        };
        Ok((
            DateTime {
                year,
                month: bcd_decode(century_month & 0x1F),
                day: bcd_decode(buf[3] & 0x3F),
                hour: bcd_decode(buf[2] & 0x3F),
                minute: bcd_decode(buf[1] & 0x7F),
                second: bcd_decode(buf[0] & 0x7F),
            },
            vl,
        ))
    }

    // Set datetime. Weekday is derived from the date; VL is cleared by the seconds write.
    pub fn set_datetime(&mut self, dt: &DateTime) -> Result<(), E> {
        let yr = (dt.year % 100) as u8;
        let data = [
            REG_SECONDS,
            bcd_encode(dt.second),
            bcd_encode(dt.minute),
            bcd_encode(dt.hour),
            bcd_encode(dt.day),
            weekday(dt.year, dt.month, dt.day),
            bcd_encode(dt.month),
            bcd_encode(yr),
        ];
        self.i2c.write(self.address, &data)
    }

    // Minute-only alarm: fires when the minute register matches.
    pub fn set_alarm_minute(&mut self, minute: u8) -> Result<(), E> {
        let data = [
            REG_MINUTE_ALARM,
            bcd_encode(minute % 60),
            ALARM_DISABLE,
            ALARM_DISABLE,
            ALARM_DISABLE,
        ];
        self.i2c.write(self.address, &data)?;
        // Enable the interrupt and drop any stale flag so INT is released until the match.
        self.write_control_2(CTRL2_AIE)
    }

    // Clear AF and AIE: acknowledges a fired alarm and cancels a pending one.
    pub fn clear_alarm(&mut self) -> Result<(), E> {
        self.write_control_2(0)
    }

    pub fn alarm_flag(&mut self) -> Result<bool, E> {
        Ok(self.read_reg(REG_CONTROL_2)? & CTRL2_AF != 0)
    }

    fn write_control_2(&mut self, value: u8) -> Result<(), E> {
        self.i2c.write(self.address, &[REG_CONTROL_2, value])
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, E> {
        let mut out = [0u8];
        self.i2c.write_read(self.address, &[reg], &mut out)?;
        Ok(out[0])
    }
}

impl<I2C, E> Clock for Pcf8563<I2C>
where
    I2C: I2c<Error = E>,
    E: core::fmt::Debug,
{
    type Error = RtcError<E>;

    fn read_time(&mut self) -> Result<DateTime, Self::Error> {
        let (dt, vl) = self.read_datetime()?;
        if vl {
            log::warn!("rtc: voltage-low flag set, time may be stale");
        }
        Ok(dt)
    }

    fn set_time(&mut self, dt: &DateTime) -> Result<(), Self::Error> {
        if !dt.is_valid() {
            return Err(RtcError::InvalidTime);
        }
        self.set_datetime(dt)?;
        Ok(())
    }

    fn minute(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[REG_SECONDS + 1], &mut buf)?;
        Ok(bcd_decode(buf[0] & 0x7F))
    }

    fn arm_alarm_in_minutes(&mut self, delta: u8) -> Result<(), Self::Error> {
        let now = self.minute()?;
        self.set_alarm_minute((now + delta % 60) % 60)?;
        Ok(())
    }

    fn clear_alarm_flag(&mut self) -> Result<(), Self::Error> {
        self.clear_alarm()?;
        Ok(())
    }
}

// BCD encode/decode helpers
fn bcd_decode(v: u8) -> u8 {
    (v & 0x0F) + ((v >> 4) * 10)
}

fn bcd_encode(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

// Day of week, 0 = Sunday (Sakamoto).
fn weekday(year: u16, month: u8, day: u8) -> u8 {
    const T: [u16; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let y = if month < 3 { year - 1 } else { year };
    let m = month.clamp(1, 12) as usize;
    ((y + y / 4 - y / 100 + y / 400 + T[m - 1] + day as u16) % 7) as u8
}
