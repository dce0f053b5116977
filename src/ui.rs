//! Screens and drawing helpers.
//!
//! This module provides:
//! - The `WatchFace` trait and its default implementation, `DigitalFace`
//! - The menu, hourglass progress and editor screens
//! - Seven-segment digits and the battery gauge, shared by the screens above
//!
//! Everything draws into any embedded-graphics `DrawTarget<Color = BinaryColor>`; the caller
//! clears the target and decides how to refresh the panel. `BinaryColor::On` is ink (black).
//! Drawing into the framebuffer cannot fail in practice, so results are dropped with `.ok()`.

use core::fmt::Write;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::{Point, Primitive, Size},
    primitives::{PrimitiveStyle, Rectangle},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
    Drawable,
};
use heapless::String;

use crate::battery::BatteryLevel;
use crate::clock::DateTime;
use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH, HOURGLASS_SEGMENTS, MENU_ITEMS, YEAR_BASE};
use crate::menu::{TimeEditor, TimeField};

pub const INK: BinaryColor = BinaryColor::On;
pub const PAPER: BinaryColor = BinaryColor::Off;

// Display configuration, (0,0) is top-left corner
pub const CENTER: i32 = DISPLAY_WIDTH as i32 / 2;

// Seven-segment digit geometry
const DIGIT_W: i32 = 36;
const DIGIT_H: i32 = 64;
const SEG_T: i32 = 6;
const DIGIT_GAP: i32 = 6;
const COLON_W: i32 = 14;
// HH:MM block, centred horizontally
const CLOCK_W: i32 = 4 * DIGIT_W + 2 * DIGIT_GAP + COLON_W + 2 * DIGIT_GAP;
const CLOCK_X: i32 = (DISPLAY_WIDTH as i32 - CLOCK_W) / 2;

const MENU_TOP: i32 = 12;
const MENU_ROW_H: i32 = 30;

const BATTERY_ORIGIN: Point = Point::new(154, 5);

// Segment bits: a b c d e f g = bit 0..6
const DIGIT_SEGMENTS: [u8; 10] = [0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F];
const DASH: u8 = 0x40;

/// Watch face drawn on every minute-level wake. Swap the implementation to restyle the watch.
pub trait WatchFace {
    /// `now` is `None` when the clock could not be read this wake.
    fn draw<D>(&self, target: &mut D, now: Option<&DateTime>, battery: BatteryLevel)
    where
        D: DrawTarget<Color = BinaryColor>;
}

/// Big `HH:MM` in seven-segment digits with the battery gauge in the top-right corner.
#[derive(Copy, Clone, Debug, Default)]
pub struct DigitalFace;

impl WatchFace for DigitalFace {
    fn draw<D>(&self, target: &mut D, now: Option<&DateTime>, battery: BatteryLevel)
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        target.clear(PAPER).ok();
        let y = 60;
        draw_clock(
            target,
            y,
            now.map(|t| t.hour),
            now.map(|t| t.minute),
            INK,
            None,
        );
        draw_battery(target, BATTERY_ORIGIN, battery);
    }
}

/// Main menu: one row per item, the selected one inverted.
pub fn draw_menu<D>(target: &mut D, selected: u8)
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(INK).ok();
    for (i, item) in MENU_ITEMS.iter().enumerate() {
        let top = MENU_TOP + MENU_ROW_H * i as i32;
        let text_color = if i as u8 == selected {
            Rectangle::new(
                Point::new(0, top),
                Size::new(DISPLAY_WIDTH, MENU_ROW_H as u32),
            )
            .into_styled(PrimitiveStyle::with_fill(PAPER))
            .draw(target)
            .ok();
            INK
        } else {
            PAPER
        };
        Text::with_baseline(
            item,
            Point::new(4, top + MENU_ROW_H / 2),
            MonoTextStyle::new(&FONT_10X20, text_color),
            Baseline::Middle,
        )
        .draw(target)
        .ok();
    }
}

/// Hourglass progress: `filled` bars stacked up from the bottom, minutes left on top.
pub fn draw_hourglass<D>(target: &mut D, minutes_remaining: u8, filled: u8)
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(PAPER).ok();
    let bar_h = DISPLAY_HEIGHT as i32 / HOURGLASS_SEGMENTS as i32;
    for i in 0..filled.min(HOURGLASS_SEGMENTS) as i32 {
        Rectangle::new(
            Point::new(0, DISPLAY_HEIGHT as i32 - bar_h * (i + 1)),
            Size::new(DISPLAY_WIDTH, bar_h as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(INK))
        .draw(target)
        .ok();
    }

    let mut label: String<8> = String::new();
    write!(label, "{} min", minutes_remaining).ok();
    Text::with_baseline(
        &label,
        Point::new(4, 2),
        MonoTextStyle::new(&FONT_10X20, INK),
        Baseline::Top,
    )
    .draw(target)
    .ok();
}

/// Time editor: `HH:MM` on top, `YYYY/MM/DD` below; the field under the cursor blinks.
pub fn draw_time_editor<D>(target: &mut D, editor: &TimeEditor, blink_on: bool)
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(INK).ok();
    let hidden = (!blink_on).then_some(editor.field);

    draw_clock(
        target,
        40,
        Some(editor.hour),
        Some(editor.minute),
        PAPER,
        hidden,
    );

    // Date line, one fixed-width field at a time so a blank field keeps its slot
    let style = MonoTextStyle::new(&FONT_10X20, PAPER);
    let char_w = FONT_10X20.character_size.width as i32;
    let fields = [
        (TimeField::Year, YEAR_BASE + editor.year as u16, 4usize),
        (TimeField::Month, editor.month as u16, 2),
        (TimeField::Day, editor.day as u16, 2),
    ];
    let total_chars = 4 + 1 + 2 + 1 + 2;
    let mut x = CENTER - total_chars * char_w / 2;
    let y = 150;
    for (n, (field, value, width)) in fields.iter().enumerate() {
        if n > 0 {
            Text::with_baseline("/", Point::new(x, y), style, Baseline::Middle)
                .draw(target)
                .ok();
            x += char_w;
        }
        if hidden != Some(*field) {
            let mut s: String<4> = String::new();
            write!(s, "{:0w$}", value, w = *width).ok();
            Text::with_baseline(&s, Point::new(x, y), style, Baseline::Middle)
                .draw(target)
                .ok();
        }
        x += *width as i32 * char_w;
    }
}

/// Hourglass duration editor: the minutes, blinking.
pub fn draw_duration_editor<D>(target: &mut D, minutes: u8, blink_on: bool)
where
    D: DrawTarget<Color = BinaryColor>,
{
    target.clear(INK).ok();
    let centered = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    let style = MonoTextStyle::new(&FONT_10X20, PAPER);

    Text::with_text_style("Hourglass", Point::new(CENTER, 24), style, centered)
        .draw(target)
        .ok();
    if blink_on {
        let x = CENTER - DIGIT_W - DIGIT_GAP / 2;
        draw_two_digits(target, Point::new(x, 60), Some(minutes), PAPER);
    }
    Text::with_text_style("minutes", Point::new(CENTER, 150), style, centered)
        .draw(target)
        .ok();
}

/// Battery outline with up to three level segments.
pub fn draw_battery<D>(target: &mut D, origin: Point, level: BatteryLevel)
where
    D: DrawTarget<Color = BinaryColor>,
{
    const SEGMENT_W: u32 = 7;
    const SEGMENT_H: u32 = 11;
    const SEGMENT_SPACING: i32 = 9;

    Rectangle::new(origin, Size::new(34, 21))
        .into_styled(PrimitiveStyle::with_stroke(INK, 2))
        .draw(target)
        .ok();
    // terminal nub
    Rectangle::new(origin + Point::new(34, 6), Size::new(3, 9))
        .into_styled(PrimitiveStyle::with_fill(INK))
        .draw(target)
        .ok();
    for i in 0..level.segments() as i32 {
        Rectangle::new(
            origin + Point::new(5 + i * SEGMENT_SPACING, 5),
            Size::new(SEGMENT_W, SEGMENT_H),
        )
        .into_styled(PrimitiveStyle::with_fill(INK))
        .draw(target)
        .ok();
    }
}

// HH:MM at row `y`. A `None` pair shows dashes; the pair named by `blank` is left out.
fn draw_clock<D>(
    target: &mut D,
    y: i32,
    hour: Option<u8>,
    minute: Option<u8>,
    color: BinaryColor,
    blank: Option<TimeField>,
) where
    D: DrawTarget<Color = BinaryColor>,
{
    let colon_left = CLOCK_X + 2 * DIGIT_W + 2 * DIGIT_GAP;
    let minute_x = colon_left + COLON_W + DIGIT_GAP;
    if blank != Some(TimeField::Hour) {
        draw_two_digits(target, Point::new(CLOCK_X, y), hour, color);
    }
    if blank != Some(TimeField::Minute) {
        draw_two_digits(target, Point::new(minute_x, y), minute, color);
    }

    // colon dots
    let colon_x = colon_left + (COLON_W - SEG_T) / 2;
    for dy in [DIGIT_H / 3, 2 * DIGIT_H / 3] {
        Rectangle::new(
            Point::new(colon_x, y + dy - SEG_T / 2),
            Size::new(SEG_T as u32, SEG_T as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(target)
        .ok();
    }
}

// Two zero-padded digits; `None` draws two dashes.
fn draw_two_digits<D>(target: &mut D, origin: Point, value: Option<u8>, color: BinaryColor)
where
    D: DrawTarget<Color = BinaryColor>,
{
    let (tens, ones) = match value {
        Some(v) => (DIGIT_SEGMENTS[(v / 10 % 10) as usize], DIGIT_SEGMENTS[(v % 10) as usize]),
        None => (DASH, DASH),
    };
    draw_segments(target, origin, tens, color);
    draw_segments(target, origin + Point::new(DIGIT_W + DIGIT_GAP, 0), ones, color);
}

fn draw_segments<D>(target: &mut D, origin: Point, segments: u8, color: BinaryColor)
where
    D: DrawTarget<Color = BinaryColor>,
{
    let half = DIGIT_H / 2;
    let horiz = Size::new((DIGIT_W - 2 * SEG_T) as u32, SEG_T as u32);
    let vert = Size::new(SEG_T as u32, (half - SEG_T) as u32);
    let rects = [
        (Point::new(SEG_T, 0), horiz),                      // a
        (Point::new(DIGIT_W - SEG_T, SEG_T), vert),         // b
        (Point::new(DIGIT_W - SEG_T, half), vert),          // c
        (Point::new(SEG_T, DIGIT_H - SEG_T), horiz),        // d
        (Point::new(0, half), vert),                        // e
        (Point::new(0, SEG_T), vert),                       // f
        (Point::new(SEG_T, half - SEG_T / 2), horiz),       // g
    ];
    for (bit, (offset, size)) in rects.iter().enumerate() {
        if segments & (1 << bit) != 0 {
            Rectangle::new(origin + *offset, *size)
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(target)
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_graphics::{prelude::OriginDimensions, Pixel};

    struct Canvas {
        ink: Vec<bool>,
    }

    impl Canvas {
        fn new() -> Self {
            Self {
                ink: vec![false; (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize],
            }
        }

        fn at(&self, x: i32, y: i32) -> bool {
            self.ink[(y as u32 * DISPLAY_WIDTH + x as u32) as usize]
        }
    }

    impl OriginDimensions for Canvas {
        fn size(&self) -> Size {
            Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        }
    }

    impl DrawTarget for Canvas {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<BinaryColor>>,
        {
            for Pixel(p, c) in pixels {
                if p.x >= 0 && p.y >= 0 && p.x < DISPLAY_WIDTH as i32 && p.y < DISPLAY_HEIGHT as i32
                {
                    self.ink[(p.y as u32 * DISPLAY_WIDTH + p.x as u32) as usize] = c.is_on();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn seven_segment_one_lights_only_the_right_side() {
        let mut c = Canvas::new();
        draw_segments(&mut c, Point::new(0, 0), DIGIT_SEGMENTS[1], INK);
        // b and c
        assert!(c.at(DIGIT_W - 2, 10));
        assert!(c.at(DIGIT_W - 2, DIGIT_H - 10));
        // a, f, g stay blank
        assert!(!c.at(DIGIT_W / 2, 2));
        assert!(!c.at(2, 10));
        assert!(!c.at(DIGIT_W / 2, DIGIT_H / 2));
    }

    #[test]
    fn hourglass_bars_fill_from_the_bottom() {
        let mut c = Canvas::new();
        draw_hourglass(&mut c, 6, 2);
        assert!(c.at(100, 199));
        assert!(c.at(100, 151));
        assert!(!c.at(100, 149));
        assert!(!c.at(100, 60));
    }

    #[test]
    fn menu_inverts_the_selected_row() {
        let mut c = Canvas::new();
        draw_menu(&mut c, 1);
        let row = |i: i32| MENU_TOP + MENU_ROW_H * i + 1;
        assert!(c.at(195, row(0)));
        assert!(!c.at(195, row(1)));
    }

    #[test]
    fn battery_gauge_shows_level_segments() {
        let mut c = Canvas::new();
        draw_battery(&mut c, Point::new(0, 0), BatteryLevel::from_voltage(3.9));
        assert!(c.at(8, 10));
        assert!(c.at(17, 10));
        assert!(!c.at(26, 10));
    }

    #[test]
    fn face_without_a_clock_reading_shows_dashes() {
        let mut c = Canvas::new();
        DigitalFace.draw(&mut c, None, BatteryLevel::EMPTY);
        // middle bar of the first digit lit, top bar not
        assert!(c.at(CLOCK_X + DIGIT_W / 2, 60 + DIGIT_H / 2));
        assert!(!c.at(CLOCK_X + DIGIT_W / 2, 62));
    }

    #[test]
    fn blinking_field_disappears_on_the_off_phase() {
        let editor = TimeEditor::new(&DateTime {
            hour: 8,
            ..DateTime::default()
        });
        let spot = (CLOCK_X + DIGIT_W + DIGIT_GAP + DIGIT_W - 2, 40 + 10); // "8": segment b
        let mut on = Canvas::new();
        draw_time_editor(&mut on, &editor, true);
        let mut off = Canvas::new();
        draw_time_editor(&mut off, &editor, false);
        // background is ink; a lit segment is paper
        assert!(!on.at(spot.0, spot.1));
        assert!(off.at(spot.0, spot.1));
    }
}
