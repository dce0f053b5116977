// Minimal GDEH0154D67 e-paper driver (SSD1681 controller, 200x200, black/white).
// Works with esp-hal (no_std) and embedded-graphics.
//
// Wiring on the Watchy:
//   CS   = GPIO5
//   DC   = GPIO10
//   RST  = GPIO9
//   BUSY = GPIO19 (high while the controller is working)
//   SCK  = GPIO18, MOSI = GPIO23
//
// Protocol: DC low for the command byte, DC high for its parameters. The controller has two
// RAM planes: 0x24 holds the new image, 0x26 the previous one. A partial (differential)
// update only drives the pixels that differ between the two, so after every partial update
// the new image is copied into 0x26 as well.
//
// Framebuffer: 1 bit per pixel, row-major, MSB = leftmost pixel, 1 = white.
// `BinaryColor::On` is ink (black).

use core::convert::Infallible;
use core::fmt;

use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{DrawTarget, OriginDimensions, Size},
    Pixel,
};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::display::Surface;

pub const EPD_WIDTH: u16 = DISPLAY_WIDTH as u16;
pub const EPD_HEIGHT: u16 = DISPLAY_HEIGHT as u16;
pub const EPD_BUFFER_SIZE: usize = (EPD_WIDTH as usize / 8) * EPD_HEIGHT as usize;

// A full refresh takes ~2 s on this panel; anything past this is a stuck BUSY line
const BUSY_TIMEOUT_MS: u32 = 5_000;

const CMD_DRIVER_OUTPUT: u8 = 0x01;
const CMD_DEEP_SLEEP: u8 = 0x10;
const CMD_DATA_ENTRY: u8 = 0x11;
const CMD_SW_RESET: u8 = 0x12;
const CMD_TEMP_SENSOR: u8 = 0x18;
const CMD_MASTER_ACTIVATE: u8 = 0x20;
const CMD_UPDATE_CTRL2: u8 = 0x22;
const CMD_WRITE_RAM_NEW: u8 = 0x24;
const CMD_WRITE_RAM_OLD: u8 = 0x26;
const CMD_BORDER: u8 = 0x3C;
const CMD_RAM_X_RANGE: u8 = 0x44;
const CMD_RAM_Y_RANGE: u8 = 0x45;
const CMD_RAM_X_COUNTER: u8 = 0x4E;
const CMD_RAM_Y_COUNTER: u8 = 0x4F;

// Display Update Control 2 sequences
const UPDATE_FULL: u8 = 0xF7;
const UPDATE_PARTIAL: u8 = 0xFC;
const UPDATE_POWER_OFF: u8 = 0x83;

/// Error type that wraps SPI and GPIO errors.
#[derive(Debug)]
pub enum EpdError<SpiE, PinE> {
    Spi(SpiE),
    Pin(PinE),
    BusyTimeout,
}

pub struct Gdeh0154d67<'fb, SPI, OUT, BUSY, D> {
    spi: SPI,
    dc: OUT,
    rst: OUT,
    busy: BUSY,
    delay: D,
    fb: &'fb mut [u8; EPD_BUFFER_SIZE],
    // next render must be a full refresh
    needs_full: bool,
}

impl<'fb, SPI, OUT, BUSY, D, PinE> Gdeh0154d67<'fb, SPI, OUT, BUSY, D>
where
    SPI: SpiDevice<u8>,
    OUT: OutputPin<Error = PinE>,
    BUSY: InputPin<Error = PinE>,
    D: DelayNs,
{
    /// Wrap the bus and pins. Nothing is sent until `init`.
    pub fn new(
        spi: SPI,
        dc: OUT,
        rst: OUT,
        busy: BUSY,
        delay: D,
        fb: &'fb mut [u8; EPD_BUFFER_SIZE],
    ) -> Self {
        fb.fill(0xFF);
        Self {
            spi,
            dc,
            rst,
            busy,
            delay,
            fb,
            needs_full: true,
        }
    }

    pub fn framebuffer(&self) -> &[u8] {
        &self.fb[..]
    }

    /// Hard reset + controller setup. The controller comes out of deep sleep only through
    /// the reset line, so this runs on every wake.
    pub fn init_panel(&mut self, initial_refresh: bool) -> Result<(), EpdError<SPI::Error, PinE>> {
        self.rst.set_low().map_err(EpdError::Pin)?;
        self.delay.delay_ms(10);
        self.rst.set_high().map_err(EpdError::Pin)?;
        self.delay.delay_ms(10);
        self.wait_idle()?;

        self.cmd(CMD_SW_RESET, &[])?;
        self.delay.delay_ms(10);
        self.wait_idle()?;

        // 200 gate lines, scan G0 -> G199
        let last_gate = EPD_HEIGHT - 1;
        self.cmd(
            CMD_DRIVER_OUTPUT,
            &[(last_gate & 0xFF) as u8, (last_gate >> 8) as u8, 0x00],
        )?;
        self.cmd(CMD_BORDER, &[0x05])?;
        self.cmd(CMD_TEMP_SENSOR, &[0x80])?; // internal sensor
        self.set_full_window()?;

        self.needs_full = initial_refresh;
        Ok(())
    }

    /// Send the frame and run an update sequence.
    pub fn update(&mut self, partial: bool) -> Result<(), EpdError<SPI::Error, PinE>> {
        if self.needs_full || !partial {
            self.write_ram(CMD_WRITE_RAM_OLD)?;
            self.write_ram(CMD_WRITE_RAM_NEW)?;
            self.activate(UPDATE_FULL)?;
            self.needs_full = false;
        } else {
            self.write_ram(CMD_WRITE_RAM_NEW)?;
            self.activate(UPDATE_PARTIAL)?;
            // keep the "previous" plane in step for the next differential update
            self.write_ram(CMD_WRITE_RAM_OLD)?;
        }
        Ok(())
    }

    /// Analog power off, then controller deep sleep (mode 1, RAM retained).
    pub fn power_down(&mut self) -> Result<(), EpdError<SPI::Error, PinE>> {
        self.activate(UPDATE_POWER_OFF)?;
        self.cmd(CMD_DEEP_SLEEP, &[0x01])
    }

    // ---- Low-level helpers ----

    fn set_full_window(&mut self) -> Result<(), EpdError<SPI::Error, PinE>> {
        let x_end = (EPD_WIDTH / 8 - 1) as u8;
        let y_end = EPD_HEIGHT - 1;
        self.cmd(CMD_DATA_ENTRY, &[0x03])?; // x+, y+
        self.cmd(CMD_RAM_X_RANGE, &[0x00, x_end])?;
        self.cmd(
            CMD_RAM_Y_RANGE,
            &[0x00, 0x00, (y_end & 0xFF) as u8, (y_end >> 8) as u8],
        )
    }

    fn write_ram(&mut self, plane: u8) -> Result<(), EpdError<SPI::Error, PinE>> {
        self.cmd(CMD_RAM_X_COUNTER, &[0x00])?;
        self.cmd(CMD_RAM_Y_COUNTER, &[0x00, 0x00])?;
        self.dc.set_low().map_err(EpdError::Pin)?;
        self.spi.write(&[plane]).map_err(EpdError::Spi)?;
        self.dc.set_high().map_err(EpdError::Pin)?;
        self.spi.write(&self.fb[..]).map_err(EpdError::Spi)
    }

    fn activate(&mut self, sequence: u8) -> Result<(), EpdError<SPI::Error, PinE>> {
        self.cmd(CMD_UPDATE_CTRL2, &[sequence])?;
        self.cmd(CMD_MASTER_ACTIVATE, &[])?;
        self.wait_idle()
    }

    fn wait_idle(&mut self) -> Result<(), EpdError<SPI::Error, PinE>> {
        for _ in 0..BUSY_TIMEOUT_MS {
            if !self.busy.is_high().map_err(EpdError::Pin)? {
                return Ok(());
            }
            self.delay.delay_ms(1);
        }
        Err(EpdError::BusyTimeout)
    }

    fn cmd(&mut self, cmd: u8, data: &[u8]) -> Result<(), EpdError<SPI::Error, PinE>> {
        self.dc.set_low().map_err(EpdError::Pin)?;
        self.spi.write(&[cmd]).map_err(EpdError::Spi)?;
        if !data.is_empty() {
            self.dc.set_high().map_err(EpdError::Pin)?;
            self.spi.write(data).map_err(EpdError::Spi)?;
        }
        Ok(())
    }

    #[inline]
    fn set_pixel(&mut self, x: u32, y: u32, color: BinaryColor) {
        let idx = (y as usize * EPD_WIDTH as usize + x as usize) / 8;
        let mask = 0x80u8 >> (x % 8);
        match color {
            BinaryColor::On => self.fb[idx] &= !mask,
            BinaryColor::Off => self.fb[idx] |= mask,
        }
    }
}

// -------------------- embedded-graphics integration --------------------
impl<SPI, OUT, BUSY, D> OriginDimensions for Gdeh0154d67<'_, SPI, OUT, BUSY, D> {
    fn size(&self) -> Size {
        Size::new(EPD_WIDTH as u32, EPD_HEIGHT as u32)
    }
}

impl<SPI, OUT, BUSY, D, PinE> DrawTarget for Gdeh0154d67<'_, SPI, OUT, BUSY, D>
where
    SPI: SpiDevice<u8>,
    OUT: OutputPin<Error = PinE>,
    BUSY: InputPin<Error = PinE>,
    D: DelayNs,
{
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<BinaryColor>>,
    {
        for Pixel(p, c) in pixels {
            if p.x < 0 || p.y < 0 {
                continue;
            }
            let (x, y) = (p.x as u32, p.y as u32);
            if x >= EPD_WIDTH as u32 || y >= EPD_HEIGHT as u32 {
                continue;
            }
            self.set_pixel(x, y, c);
        }
        Ok(())
    }

    fn clear(&mut self, color: BinaryColor) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => 0x00,
            BinaryColor::Off => 0xFF,
        };
        self.fb.fill(fill);
        Ok(())
    }
}

impl<SPI, OUT, BUSY, D, PinE> Surface for Gdeh0154d67<'_, SPI, OUT, BUSY, D>
where
    SPI: SpiDevice<u8>,
    OUT: OutputPin<Error = PinE>,
    BUSY: InputPin<Error = PinE>,
    D: DelayNs,
    PinE: fmt::Debug,
{
    type PanelError = EpdError<SPI::Error, PinE>;

    fn init(&mut self, initial_refresh: bool) -> Result<(), Self::PanelError> {
        self.init_panel(initial_refresh)
    }

    fn render(&mut self, partial: bool) -> Result<(), Self::PanelError> {
        self.update(partial)
    }

    fn hibernate(&mut self) -> Result<(), Self::PanelError> {
        self.power_down()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use embedded_graphics::{
        prelude::{Point, Primitive},
        primitives::{PrimitiveStyle, Rectangle},
        Drawable,
    };
    use embedded_hal::digital::ErrorType as PinErrorType;
    use embedded_hal::spi::{ErrorKind, ErrorType as SpiErrorType, Operation};

    #[derive(Debug, PartialEq)]
    enum Event {
        Dc(bool),
        Rst(bool),
        Bytes(Vec<u8>),
    }

    struct Bus<'a> {
        log: &'a RefCell<Vec<Event>>,
    }

    impl SpiErrorType for Bus<'_> {
        type Error = ErrorKind;
    }

    impl SpiDevice<u8> for Bus<'_> {
        fn transaction(&mut self, ops: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
            for op in ops {
                if let Operation::Write(bytes) = op {
                    self.log.borrow_mut().push(Event::Bytes(bytes.to_vec()));
                }
            }
            Ok(())
        }
    }

    struct Out<'a> {
        log: &'a RefCell<Vec<Event>>,
        is_dc: bool,
    }

    impl PinErrorType for Out<'_> {
        type Error = Infallible;
    }

    impl OutputPin for Out<'_> {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.push(false);
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.push(true);
            Ok(())
        }
    }

    impl Out<'_> {
        fn push(&self, level: bool) {
            let ev = if self.is_dc {
                Event::Dc(level)
            } else {
                Event::Rst(level)
            };
            self.log.borrow_mut().push(ev);
        }
    }

    struct Busy(bool);

    impl PinErrorType for Busy {
        type Error = Infallible;
    }

    impl InputPin for Busy {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }
        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    struct NoWait;

    impl DelayNs for NoWait {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn panel<'a, 'fb>(
        log: &'a RefCell<Vec<Event>>,
        fb: &'fb mut [u8; EPD_BUFFER_SIZE],
        busy: bool,
    ) -> Gdeh0154d67<'fb, Bus<'a>, Out<'a>, Busy, NoWait> {
        Gdeh0154d67::new(
            Bus { log },
            Out { log, is_dc: true },
            Out { log, is_dc: false },
            Busy(busy),
            NoWait,
            fb,
        )
    }

    // Fold the event log into (command, parameters) pairs.
    fn commands(log: &RefCell<Vec<Event>>) -> Vec<(u8, Vec<u8>)> {
        let mut out: Vec<(u8, Vec<u8>)> = Vec::new();
        let mut dc = false;
        for ev in log.borrow().iter() {
            match ev {
                Event::Dc(level) => dc = *level,
                Event::Rst(_) => {}
                Event::Bytes(b) if !dc => out.push((b[0], Vec::new())),
                Event::Bytes(b) => {
                    if let Some(last) = out.last_mut() {
                        last.1.extend_from_slice(b);
                    }
                }
            }
        }
        out
    }

    fn update_sequences(log: &RefCell<Vec<Event>>) -> Vec<u8> {
        commands(log)
            .into_iter()
            .filter(|(c, _)| *c == CMD_UPDATE_CTRL2)
            .map(|(_, d)| d[0])
            .collect()
    }

    #[test]
    fn first_render_after_power_up_is_full_even_if_partial_requested() {
        let log = RefCell::new(Vec::new());
        let mut fb = [0u8; EPD_BUFFER_SIZE];
        let mut epd = panel(&log, &mut fb, false);
        epd.init(true).unwrap();
        epd.render(true).unwrap();
        epd.render(true).unwrap();
        assert_eq!(update_sequences(&log), vec![UPDATE_FULL, UPDATE_PARTIAL]);
    }

    #[test]
    fn warm_init_allows_partial_update() {
        let log = RefCell::new(Vec::new());
        let mut fb = [0u8; EPD_BUFFER_SIZE];
        let mut epd = panel(&log, &mut fb, false);
        // the panel was initialised on an earlier wake
        epd.init(false).unwrap();
        epd.render(true).unwrap();
        let cmds = commands(&log);
        assert_eq!(cmds[0], (CMD_SW_RESET, vec![]));
        assert_eq!(update_sequences(&log), vec![UPDATE_PARTIAL]);
        // new plane first, old plane synced after the update
        let planes: Vec<u8> = cmds
            .iter()
            .map(|(c, _)| *c)
            .filter(|c| *c == CMD_WRITE_RAM_NEW || *c == CMD_WRITE_RAM_OLD)
            .collect();
        assert_eq!(planes, vec![CMD_WRITE_RAM_NEW, CMD_WRITE_RAM_OLD]);
    }

    #[test]
    fn hibernate_ends_in_deep_sleep() {
        let log = RefCell::new(Vec::new());
        let mut fb = [0u8; EPD_BUFFER_SIZE];
        let mut epd = panel(&log, &mut fb, false);
        epd.hibernate().unwrap();
        let cmds = commands(&log);
        assert_eq!(cmds.last(), Some(&(CMD_DEEP_SLEEP, vec![0x01])));
        assert_eq!(update_sequences(&log), vec![UPDATE_POWER_OFF]);
    }

    #[test]
    fn stuck_busy_line_times_out() {
        let log = RefCell::new(Vec::new());
        let mut fb = [0u8; EPD_BUFFER_SIZE];
        let mut epd = panel(&log, &mut fb, true);
        assert!(matches!(epd.init(true), Err(EpdError::BusyTimeout)));
    }

    #[test]
    fn pixels_map_to_msb_first_bits() {
        let log = RefCell::new(Vec::new());
        let mut fb = [0u8; EPD_BUFFER_SIZE];
        let mut epd = panel(&log, &mut fb, false);
        assert!(epd.framebuffer().iter().all(|b| *b == 0xFF));

        Pixel(Point::new(0, 0), BinaryColor::On).draw(&mut epd).unwrap();
        Pixel(Point::new(199, 199), BinaryColor::On).draw(&mut epd).unwrap();
        Pixel(Point::new(250, 3), BinaryColor::On).draw(&mut epd).unwrap();
        assert_eq!(epd.framebuffer()[0], 0x7F);
        assert_eq!(epd.framebuffer()[EPD_BUFFER_SIZE - 1], 0xFE);

        Rectangle::new(Point::new(8, 1), Size::new(8, 1))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut epd)
            .unwrap();
        assert_eq!(epd.framebuffer()[25 + 1], 0x00);

        epd.clear(BinaryColor::On).unwrap();
        assert!(epd.framebuffer().iter().all(|b| *b == 0x00));
    }
}
