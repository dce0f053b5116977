//! Button handling: the menu state machine, the fast-menu loop and the two editors.
//!
//! A button wake in a passive mode handles exactly one press and goes back to sleep. Anywhere
//! else the watch stays awake polling the buttons until nothing happens for a while, so moving
//! through the menu doesn't cost a wake per press.

use embedded_graphics::{draw_target::DrawTarget, pixelcolor::BinaryColor};

use crate::battery::BatterySampler;
use crate::bma423::MotionSensor;
use crate::clock::{wrap_dec, wrap_inc, Clock, DateTime};
use crate::config::{
    EDITOR_BLINK_MS, EDITOR_IDLE_TIMEOUT_MS, EDITOR_SELECT_DEBOUNCE_MS, FAST_MENU_TIMEOUT_MS,
    MAX_COUNTDOWN_MINUTES, MIN_COUNTDOWN_MINUTES, POLL_INTERVAL_MS, YEAR_BASE,
};
use crate::display::Surface;
use crate::haptic::Haptic;
use crate::input::{Button, ButtonMask, ButtonTracker, InputSource, TimeSource};
use crate::state::{clamp_countdown, App, UiMode};
use crate::ui::{self, WatchFace};
use crate::watch::Watch;

/// Field under the time editor's cursor, in cursor order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeField {
    Hour,
    Minute,
    Year,
    Month,
    Day,
}

impl TimeField {
    /// `None` past the last field.
    pub fn next(self) -> Option<TimeField> {
        match self {
            TimeField::Hour => Some(TimeField::Minute),
            TimeField::Minute => Some(TimeField::Year),
            TimeField::Year => Some(TimeField::Month),
            TimeField::Month => Some(TimeField::Day),
            TimeField::Day => None,
        }
    }

    /// Stays on the first field.
    pub fn prev(self) -> TimeField {
        match self {
            TimeField::Hour | TimeField::Minute => TimeField::Hour,
            TimeField::Year => TimeField::Minute,
            TimeField::Month => TimeField::Year,
            TimeField::Day => TimeField::Month,
        }
    }

    fn range(self) -> (u8, u8) {
        match self {
            TimeField::Hour => (0, 23),
            TimeField::Minute => (0, 59),
            TimeField::Year => (0, 99),
            TimeField::Month => (1, 12),
            TimeField::Day => (1, 31),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Continue,
    Commit,
    Cancel,
}

/// Something the editor loop can drive.
pub trait Editor {
    fn press(&mut self, button: Button) -> EditOutcome;

    fn draw<D>(&self, target: &mut D, blink_on: bool)
    where
        D: DrawTarget<Color = BinaryColor>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeEditor {
    pub field: TimeField,
    pub hour: u8,
    pub minute: u8,
    /// Years since `YEAR_BASE`.
    pub year: u8,
    pub month: u8,
    pub day: u8,
}

impl TimeEditor {
    pub fn new(now: &DateTime) -> Self {
        Self {
            field: TimeField::Hour,
            hour: now.hour.min(23),
            minute: now.minute.min(59),
            year: now.year_offset(),
            month: now.month.clamp(1, 12),
            day: now.day.clamp(1, 31),
        }
    }

    fn value_mut(&mut self, field: TimeField) -> &mut u8 {
        match field {
            TimeField::Hour => &mut self.hour,
            TimeField::Minute => &mut self.minute,
            TimeField::Year => &mut self.year,
            TimeField::Month => &mut self.month,
            TimeField::Day => &mut self.day,
        }
    }

    /// The edited time, seconds zeroed. A day past the end of the month is pulled back to
    /// the last day.
    pub fn to_datetime(&self) -> DateTime {
        let year = YEAR_BASE + self.year as u16;
        DateTime {
            year,
            month: self.month,
            day: self.day.min(days_in_month(year, self.month)),
            hour: self.hour,
            minute: self.minute,
            second: 0,
        }
    }
}

impl Editor for TimeEditor {
    fn press(&mut self, button: Button) -> EditOutcome {
        let field = self.field;
        let (lo, hi) = field.range();
        match button {
            Button::Select => match field.next() {
                Some(next) => self.field = next,
                None => return EditOutcome::Commit,
            },
            Button::Back => self.field = field.prev(),
            Button::Increase => {
                let v = self.value_mut(field);
                *v = wrap_inc(*v, lo, hi);
            }
            Button::Decrease => {
                let v = self.value_mut(field);
                *v = wrap_dec(*v, lo, hi);
            }
        }
        EditOutcome::Continue
    }

    fn draw<D>(&self, target: &mut D, blink_on: bool)
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        ui::draw_time_editor(target, self, blink_on);
    }
}

pub fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DurationEditor {
    pub minutes: u8,
}

impl DurationEditor {
    pub fn new(minutes: u8) -> Self {
        Self {
            minutes: clamp_countdown(minutes),
        }
    }
}

impl Editor for DurationEditor {
    fn press(&mut self, button: Button) -> EditOutcome {
        match button {
            Button::Select => return EditOutcome::Commit,
            Button::Back => return EditOutcome::Cancel,
            // clamps, does not wrap
            Button::Increase => self.minutes = (self.minutes + 1).min(MAX_COUNTDOWN_MINUTES),
            Button::Decrease => {
                self.minutes = self.minutes.saturating_sub(1).max(MIN_COUNTDOWN_MINUTES)
            }
        }
        EditOutcome::Continue
    }

    fn draw<D>(&self, target: &mut D, blink_on: bool)
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        ui::draw_duration_editor(target, self.minutes, blink_on);
    }
}

impl<C, S, I, H, B, M, T, F> Watch<C, S, I, H, B, M, T, F>
where
    C: Clock,
    S: Surface,
    I: InputSource,
    H: Haptic,
    B: BatterySampler,
    M: MotionSensor,
    T: TimeSource,
    F: WatchFace,
{
    /// One step of the menu state machine.
    pub fn apply_button(&mut self, button: Button) {
        log::debug!("button: {:?} in {:?}", button, self.state.mode);
        match (self.state.mode, button) {
            (UiMode::WatchFace | UiMode::Countdown, Button::Select) => self.show_menu(true),
            (UiMode::WatchFace | UiMode::Countdown, Button::Decrease) => self.start_countdown(),
            (UiMode::WatchFace | UiMode::Countdown, _) => {}

            (UiMode::MainMenu, Button::Select) => {
                self.open_app(App::from_menu_index(self.state.menu_index))
            }
            (UiMode::MainMenu, Button::Back) => self.show_watch_face(false),
            (UiMode::MainMenu, Button::Increase) => {
                self.state.menu_next();
                self.show_menu(true);
            }
            (UiMode::MainMenu, Button::Decrease) => {
                self.state.menu_prev();
                self.show_menu(true);
            }

            (UiMode::AppEditing(_), Button::Back) => self.show_menu(false),
            (UiMode::AppEditing(app), Button::Select) => self.open_app(app),
            (UiMode::AppEditing(_), _) => {}
        }
    }

    /// Button wake: act on the pressed button, then keep polling while the watch is in an
    /// interactive mode.
    pub fn handle_button_edge(&mut self) {
        let status = self.input.button_edge_mask();
        let mask = ButtonMask::from_wake_status(status, &self.buttons);
        match mask.first() {
            Some(button) => self.apply_button(button),
            None => log::warn!("button: wake with no button set ({:#x})", status),
        }
        if !self.state.mode.is_passive() {
            self.fast_menu();
        }
    }

    /// Poll the buttons until `FAST_MENU_TIMEOUT_MS` pass without a press or a passive
    /// screen is reached.
    pub fn fast_menu(&mut self) {
        let mut tracker = ButtonTracker::new(&mut self.input);
        let mut last_input = self.time.now_ms();
        loop {
            let now = self.time.now_ms();
            if now.saturating_sub(last_input) >= FAST_MENU_TIMEOUT_MS {
                log::debug!("menu: idle, going back to sleep");
                break;
            }
            if let Some(button) = tracker.poll(&mut self.input, now) {
                self.apply_button(button);
                if self.state.mode.is_passive() {
                    break;
                }
                // an editor may have run in between; start from the current levels
                tracker = ButtonTracker::new(&mut self.input);
                last_input = self.time.now_ms();
            }
            self.time.delay_ms(POLL_INTERVAL_MS);
        }
    }

    fn open_app(&mut self, app: App) {
        self.set_mode(UiMode::AppEditing(app));
        match app {
            App::SetTime => {
                let now = self.now().unwrap_or_default();
                let mut editor = TimeEditor::new(&now);
                if self.run_editor(&mut editor) == EditOutcome::Commit {
                    let dt = editor.to_datetime();
                    match self.clock.set_time(&dt) {
                        Ok(()) => log::info!("clock: set to {}", dt),
                        Err(e) => log::warn!("clock: set failed: {:?}", e),
                    }
                }
            }
            App::SetHourglass => {
                let mut editor = DurationEditor::new(self.state.countdown_minutes);
                if self.run_editor(&mut editor) == EditOutcome::Commit {
                    self.state.set_countdown_minutes(editor.minutes);
                    log::info!("hourglass: {} min", self.state.countdown_minutes);
                }
            }
        }
        self.show_watch_face(false);
    }

    /// Run an editor until it commits, cancels or sits idle for `EDITOR_IDLE_TIMEOUT_MS`.
    pub fn run_editor<E: Editor>(&mut self, editor: &mut E) -> EditOutcome {
        let mut tracker = ButtonTracker::new(&mut self.input);
        let start = self.time.now_ms();
        tracker.suppress(Button::Select, start + EDITOR_SELECT_DEBOUNCE_MS);

        let mut last_input = start;
        let mut last_blink = start;
        let mut blink_on = true;
        editor.draw(&mut self.display, blink_on);
        self.render(true);

        loop {
            let now = self.time.now_ms();
            if now.saturating_sub(last_input) >= EDITOR_IDLE_TIMEOUT_MS {
                log::debug!("editor: idle, discarding");
                return EditOutcome::Cancel;
            }

            let mut dirty = false;
            if let Some(button) = tracker.poll(&mut self.input, now) {
                last_input = now;
                match editor.press(button) {
                    EditOutcome::Continue => {
                        blink_on = true;
                        last_blink = now;
                        dirty = true;
                    }
                    done => return done,
                }
            } else if now.saturating_sub(last_blink) >= EDITOR_BLINK_MS {
                blink_on = !blink_on;
                last_blink = now;
                dirty = true;
            }

            if dirty {
                editor.draw(&mut self.display, blink_on);
                self.render(true);
            }
            self.time.delay_ms(POLL_INTERVAL_MS);
        }
    }
}
