//! Display surface capability and panel setup.
//
// - `Surface` is what the screens draw on: an embedded-graphics target plus the refresh
//   lifecycle of an e-paper panel.
// - `OptionalSurface` stands in when the panel could not be set up, so the rest of the wake
//   still runs.
// - `setup_display` (watchy feature) builds the GDEH0154D67 driver from the board pins.

use core::fmt;

use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{Dimensions, Point, Size},
    pixelcolor::BinaryColor,
    primitives::Rectangle,
    Pixel,
};

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// A 1 bpp drawing surface with an explicit refresh step.
///
/// Drawing only touches the in-memory frame; nothing reaches the glass until `render`.
pub trait Surface: DrawTarget<Color = BinaryColor> {
    type PanelError: fmt::Debug;

    /// Bring the panel up. `initial_refresh` forces the next render to be a full refresh
    /// (first use after power-up, when the panel contents are unknown).
    fn init(&mut self, initial_refresh: bool) -> Result<(), Self::PanelError>;

    /// Push the frame to the panel, as a partial (fast, no flashing) or full update.
    fn render(&mut self, partial: bool) -> Result<(), Self::PanelError>;

    /// Put the panel controller into deep sleep. The image stays on the glass.
    fn hibernate(&mut self) -> Result<(), Self::PanelError>;
}

#[derive(Debug)]
pub enum OptionalPanelError<E> {
    /// No panel this wake.
    Missing,
    Panel(E),
}

/// A panel that may be absent. Without one, drawing is dropped and `init` fails, so the
/// watch runs blind for the wake instead of skipping it.
pub struct OptionalSurface<S>(Option<S>);

impl<S> OptionalSurface<S> {
    pub fn missing() -> Self {
        Self(None)
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> From<Option<S>> for OptionalSurface<S> {
    fn from(panel: Option<S>) -> Self {
        Self(panel)
    }
}

impl<S: Surface> Dimensions for OptionalSurface<S> {
    fn bounding_box(&self) -> Rectangle {
        match &self.0 {
            Some(panel) => panel.bounding_box(),
            None => Rectangle::new(Point::zero(), Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)),
        }
    }
}

impl<S: Surface> DrawTarget for OptionalSurface<S> {
    type Color = BinaryColor;
    type Error = S::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<BinaryColor>>,
    {
        match &mut self.0 {
            Some(panel) => panel.draw_iter(pixels),
            None => Ok(()),
        }
    }

    fn clear(&mut self, color: BinaryColor) -> Result<(), Self::Error> {
        match &mut self.0 {
            Some(panel) => panel.clear(color),
            None => Ok(()),
        }
    }
}

impl<S: Surface> Surface for OptionalSurface<S> {
    type PanelError = OptionalPanelError<S::PanelError>;

    fn init(&mut self, initial_refresh: bool) -> Result<(), Self::PanelError> {
        match &mut self.0 {
            Some(panel) => panel.init(initial_refresh).map_err(OptionalPanelError::Panel),
            None => Err(OptionalPanelError::Missing),
        }
    }

    fn render(&mut self, partial: bool) -> Result<(), Self::PanelError> {
        match &mut self.0 {
            Some(panel) => panel.render(partial).map_err(OptionalPanelError::Panel),
            None => Err(OptionalPanelError::Missing),
        }
    }

    fn hibernate(&mut self) -> Result<(), Self::PanelError> {
        match &mut self.0 {
            Some(panel) => panel.hibernate().map_err(OptionalPanelError::Panel),
            None => Err(OptionalPanelError::Missing),
        }
    }
}

// ==================================================================
// GDEH0154D67 (200x200) backend, feature `watchy`
// ==================================================================
#[cfg(feature = "watchy")]
mod epd_backend {
    use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};
    use esp_hal::{
        delay::Delay,
        gpio::{Input, Output},
        spi::master::{Config, Spi},
        spi::Mode,
        time::Rate,
        Blocking,
    };

    use crate::gdeh0154d67::{Gdeh0154d67, EPD_BUFFER_SIZE};
    use crate::wiring::DisplayPins;

    pub type DisplayType<'a> = Gdeh0154d67<
        'a,
        ExclusiveDevice<Spi<'a, Blocking>, Output<'a>, NoDelay>,
        Output<'a>,
        Input<'a>,
        Delay,
    >;

    /// Build the panel driver. Returns `None` (logged) when the SPI bus cannot be set up;
    /// wrapped in an `OptionalSurface`, the watch then runs without a display this wake.
    pub fn setup_display<'a>(
        display_pins: DisplayPins<'a>,
        fb: &'a mut [u8; EPD_BUFFER_SIZE],
    ) -> Option<DisplayType<'a>> {
        let DisplayPins {
            spi2,
            sck,
            mosi,
            cs,
            dc,
            rst,
            busy,
        } = display_pins;

        // SPI @ 20 MHz, Mode 0; the SSD1681 is write-only here
        let spi = match Spi::new(
            spi2,
            Config::default()
                .with_frequency(Rate::from_mhz(20))
                .with_mode(Mode::_0),
        ) {
            Ok(spi) => spi.with_sck(sck).with_mosi(mosi),
            Err(e) => {
                log::warn!("display: SPI config rejected: {:?}", e);
                return None;
            }
        };

        let spi_dev = match ExclusiveDevice::new(spi, cs, NoDelay) {
            Ok(dev) => dev,
            Err(e) => {
                log::warn!("display: CS pin setup failed: {:?}", e);
                return None;
            }
        };

        Some(Gdeh0154d67::new(spi_dev, dc, rst, busy, Delay::new(), fb))
    }
}

#[cfg(feature = "watchy")]
pub use epd_backend::{setup_display, DisplayType};
