//! Minimal BMA423 accelerometer bring-up.
//! Runs once on cold boot: the sensor keeps its configuration through the MCU's deep sleep.
//! Register access goes through `RegisterBus`, so the sequence can be checked without hardware.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{I2c, Operation};

pub const DEFAULT_I2C_ADDR: u8 = 0x18; // SDO pulled low on the Watchy

const REG_CHIP_ID: u8 = 0x00;
const REG_ACC_CONF: u8 = 0x40;
const REG_ACC_RANGE: u8 = 0x41;
const REG_INT1_IO_CTRL: u8 = 0x53;
const REG_FEATURE_CONFIG: u8 = 0x5E;
const REG_PWR_CONF: u8 = 0x7C;
const REG_PWR_CTRL: u8 = 0x7D;
const REG_CMD: u8 = 0x7E;

const CHIP_ID: u8 = 0x13;
const CMD_SOFT_RESET: u8 = 0xB6;

// 100 Hz ODR (0x08) | normal avg4 bandwidth (0x20) | continuous filter mode (0x80)
const ACC_CONF_100HZ_AVG4_CONT: u8 = 0xA8;
const ACC_RANGE_2G: u8 = 0x00;
const PWR_CONF_ADV_POWER_SAVE: u8 = 0x01;
const PWR_CTRL_ACC_EN: u8 = 0x04;
// level triggered, active high, push-pull, output enabled, input disabled
const INT1_LEVEL_HIGH_PUSH_PULL: u8 = 0x0A;

const FEATURE_CONFIG_LEN: usize = 64;
const AXES_REMAP_OFFSET: usize = 0x3C;

/// How the sensor axes map onto the watch axes, as the feature engine expects them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AxesRemap {
    pub x_axis: u8,
    pub x_invert: bool,
    pub y_axis: u8,
    pub y_invert: bool,
    pub z_axis: u8,
    pub z_invert: bool,
}

impl AxesRemap {
    // Sensor mounting on the Watchy board: X and Y swapped, all three axes inverted
    pub const WATCHY: AxesRemap = AxesRemap {
        x_axis: 1,
        x_invert: true,
        y_axis: 0,
        y_invert: true,
        z_axis: 2,
        z_invert: true,
    };

    fn encode(&self) -> [u8; 2] {
        let b0 = (self.x_axis & 0x03)
            | ((self.x_invert as u8) << 2)
            | ((self.y_axis & 0x03) << 3)
            | ((self.y_invert as u8) << 5)
            | ((self.z_axis & 0x03) << 6);
        [b0, self.z_invert as u8]
    }
}

/// Register transport the sensor is reached through.
pub trait RegisterBus {
    type Error: fmt::Debug;

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

    fn write_registers(&mut self, reg: u8, data: &[u8]) -> Result<(), Self::Error>;
}

/// `RegisterBus` over an I2C device at a fixed address.
pub struct I2cRegisters<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> I2cRegisters<I2C> {
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }
}

impl<I2C: I2c> RegisterBus for I2cRegisters<I2C> {
    type Error = I2C::Error;

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c.write_read(self.address, &[reg], buf)
    }

    fn write_registers(&mut self, reg: u8, data: &[u8]) -> Result<(), Self::Error> {
        // adjacent writes in one transaction go out without a repeated start
        self.i2c.transaction(
            self.address,
            &mut [Operation::Write(&[reg]), Operation::Write(data)],
        )
    }
}

// Accelerometer error type
#[derive(Debug)]
pub enum Bma423Error<E> {
    Bus(E),
    BadChipId(u8),
}

// Allow automatic conversion from bus errors
impl<E> From<E> for Bma423Error<E> {
    fn from(e: E) -> Self {
        Bma423Error::Bus(e)
    }
}

/// Whatever motion sensor the board carries; configured once on cold boot.
pub trait MotionSensor {
    type Error: fmt::Debug;

    fn configure<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Self::Error>;
}

pub struct Bma423<R> {
    bus: R,
}

impl<R: RegisterBus> Bma423<R> {
    pub fn new(bus: R) -> Self {
        Self { bus }
    }

    pub fn chip_id(&mut self) -> Result<u8, Bma423Error<R::Error>> {
        self.read_reg(REG_CHIP_ID)
    }

    /// Soft reset, then the accelerometer set up for 100 Hz / ±2 g continuous sampling with
    /// INT1 as a level-triggered active-high output.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Bma423Error<R::Error>> {
        let id = self.chip_id()?;
        if id != CHIP_ID {
            return Err(Bma423Error::BadChipId(id));
        }

        self.write_reg(REG_CMD, CMD_SOFT_RESET)?;
        delay.delay_ms(2);

        // advanced power save blocks register writes; turn it off first
        let pwr_conf = self.read_reg(REG_PWR_CONF)?;
        self.write_reg(REG_PWR_CONF, pwr_conf & !PWR_CONF_ADV_POWER_SAVE)?;
        delay.delay_us(450);

        self.write_reg(REG_ACC_CONF, ACC_CONF_100HZ_AVG4_CONT)?;
        self.write_reg(REG_ACC_RANGE, ACC_RANGE_2G)?;

        let pwr_ctrl = self.read_reg(REG_PWR_CTRL)?;
        self.write_reg(REG_PWR_CTRL, pwr_ctrl | PWR_CTRL_ACC_EN)?;

        self.write_reg(REG_INT1_IO_CTRL, INT1_LEVEL_HIGH_PUSH_PULL)?;

        self.set_axes_remap(&AxesRemap::WATCHY)
    }

    // Read-modify-write of the feature configuration block. The remap lives in the feature
    // engine's config area, so it only takes effect on a chip whose feature config has been
    // loaded; plain accelerometer sampling ignores it.
    pub fn set_axes_remap(&mut self, remap: &AxesRemap) -> Result<(), Bma423Error<R::Error>> {
        let mut features = [0u8; FEATURE_CONFIG_LEN];
        self.bus.read_registers(REG_FEATURE_CONFIG, &mut features)?;
        features[AXES_REMAP_OFFSET..AXES_REMAP_OFFSET + 2].copy_from_slice(&remap.encode());
        self.bus.write_registers(REG_FEATURE_CONFIG, &features)?;
        Ok(())
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), Bma423Error<R::Error>> {
        self.bus.write_registers(reg, &[val])?;
        Ok(())
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Bma423Error<R::Error>> {
        let mut out = [0u8];
        self.bus.read_registers(reg, &mut out)?;
        Ok(out[0])
    }
}

impl<R: RegisterBus> MotionSensor for Bma423<R> {
    type Error = Bma423Error<R::Error>;

    fn configure<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Self::Error> {
        self.init(delay)
    }
}
