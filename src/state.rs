//! State that survives deep sleep.
//!
//! Every wake is a cold start of the control logic, so everything the watch needs to remember
//! between wakes lives in [`PersistedState`]. It is loaded once at the start of a run and stored
//! once by the power lifecycle right before sleep; nothing else touches the retained memory.
//!
//! The retained blob is framed as `MAGIC | len | postcard payload | crc32`. Anything that does not
//! check out (first power-up, brown-out garbage, a layout from an older firmware) loads as the
//! default state, which is exactly what a cold boot wants.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_COUNTDOWN_MINUTES, MAX_COUNTDOWN_MINUTES, MENU_LENGTH, MIN_COUNTDOWN_MINUTES,
};

/// Sub-application opened from the main menu.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum App {
    SetTime,
    SetHourglass,
}

impl App {
    // Menu order matches config::MENU_ITEMS
    pub fn from_menu_index(index: u8) -> Self {
        match index {
            1 => App::SetHourglass,
            _ => App::SetTime,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiMode {
    WatchFace,
    Countdown,
    MainMenu,
    AppEditing(App),
}

impl UiMode {
    /// Modes in which a button edge is handled and the watch goes straight back to sleep.
    pub fn is_passive(self) -> bool {
        matches!(self, UiMode::WatchFace | UiMode::Countdown)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub mode: UiMode,
    pub menu_index: u8,
    pub countdown_minutes: u8,
    /// Minute-of-hour at which the running countdown completes.
    pub target_minute: Option<u8>,
    /// A clock alarm is scheduled and has not fired yet.
    pub alarm_armed: bool,
    /// The panel has never been initialised since power-up.
    pub display_full_init: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            mode: UiMode::WatchFace,
            menu_index: 0,
            countdown_minutes: DEFAULT_COUNTDOWN_MINUTES,
            target_minute: None,
            alarm_armed: false,
            display_full_init: true,
        }
    }
}

impl PersistedState {
    pub fn menu_next(&mut self) {
        self.menu_index = if self.menu_index + 1 >= MENU_LENGTH {
            0
        } else {
            self.menu_index + 1
        };
    }

    pub fn menu_prev(&mut self) {
        self.menu_index = if self.menu_index == 0 {
            MENU_LENGTH - 1
        } else {
            self.menu_index - 1
        };
    }

    pub fn set_countdown_minutes(&mut self, minutes: u8) {
        self.countdown_minutes = clamp_countdown(minutes);
    }

    // Pull every field back into its valid range.
    fn sanitized(mut self) -> Self {
        self.menu_index = self.menu_index.min(MENU_LENGTH - 1);
        self.countdown_minutes = clamp_countdown(self.countdown_minutes);
        self.target_minute = self.target_minute.filter(|m| *m < 60);
        self
    }
}

pub fn clamp_countdown(minutes: u8) -> u8 {
    minutes.clamp(MIN_COUNTDOWN_MINUTES, MAX_COUNTDOWN_MINUTES)
}

const MAGIC: u32 = 0x4847_5331; // 'HGS1'
const HEADER_SIZE: usize = 4 + 1; // Magic + PayloadLen
const CRC_SIZE: usize = 4;

/// Size of the retained-memory region reserved for the state.
pub const RETAINED_LEN: usize = 32;
const MAX_PAYLOAD_SIZE: usize = RETAINED_LEN - HEADER_SIZE - CRC_SIZE;

#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    BufferTooSmall,
    NoData,
    Corrupted,
    Format,
}

/// Load/store boundary over a retained byte region.
pub struct RetainedStore<'a> {
    buf: &'a mut [u8],
}

impl<'a> RetainedStore<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// Load the state, falling back to defaults when the region holds nothing valid.
    pub fn load(&self) -> PersistedState {
        match self.try_load() {
            Ok(state) => state,
            Err(StoreError::NoData) => {
                log::info!("state: no retained state, starting fresh");
                PersistedState::default()
            }
            Err(e) => {
                log::warn!("state: retained state unusable ({:?}), starting fresh", e);
                PersistedState::default()
            }
        }
    }

    pub fn try_load(&self) -> Result<PersistedState, StoreError> {
        if self.buf.len() < HEADER_SIZE + CRC_SIZE {
            return Err(StoreError::BufferTooSmall);
        }
        let magic = u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
        if magic != MAGIC {
            return Err(StoreError::NoData);
        }
        let payload_len = self.buf[4] as usize;
        let crc_offset = HEADER_SIZE + payload_len;
        if payload_len > MAX_PAYLOAD_SIZE || crc_offset + CRC_SIZE > self.buf.len() {
            return Err(StoreError::Corrupted);
        }

        let c = &self.buf[crc_offset..crc_offset + CRC_SIZE];
        let stored_crc = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        if stored_crc != compute_crc(&self.buf[..crc_offset]) {
            return Err(StoreError::Corrupted);
        }

        let state: PersistedState = postcard::from_bytes(&self.buf[HEADER_SIZE..crc_offset])
            .map_err(|_| StoreError::Format)?;
        Ok(state.sanitized())
    }

    pub fn store(&mut self, state: &PersistedState) -> Result<(), StoreError> {
        if self.buf.len() < RETAINED_LEN {
            return Err(StoreError::BufferTooSmall);
        }
        let mut payload = [0u8; MAX_PAYLOAD_SIZE];
        let payload_len = postcard::to_slice(state, &mut payload)
            .map_err(|_| StoreError::Format)?
            .len();

        self.buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        self.buf[4] = payload_len as u8;
        self.buf[HEADER_SIZE..HEADER_SIZE + payload_len].copy_from_slice(&payload[..payload_len]);

        let crc_offset = HEADER_SIZE + payload_len;
        let crc = compute_crc(&self.buf[..crc_offset]);
        self.buf[crc_offset..crc_offset + CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
        Ok(())
    }
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}
