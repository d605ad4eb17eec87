//! Pattern metadata and the read-only view handed to the exporter.

use alloc::string::String;

use crate::event::Event;
use crate::event_list::EventList;
use crate::pulse::{self, Pulse, DEFAULT_BEATS_PER_BAR, DEFAULT_BEAT_WIDTH, DEFAULT_PPQN};
use crate::trigger::TriggerList;

/// Channel byte that marks a free-channel pattern on disk.
pub const FREE_CHANNEL: u8 = 0x80;

/// How a pattern is shown in an editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Note,
    Drum,
}

impl EditMode {
    pub fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            Self::Note
        } else {
            Self::Drum
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Note => 0,
            Self::Drum => 1,
        }
    }
}

/// Why a pattern cannot be exported in song mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotExportable {
    Muted,
    NoTriggers,
}

/// Scalar metadata of a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackInfo {
    /// Track name
    pub name: String,
    /// Sequence number (slot)
    pub seq_number: u16,
    /// Output channel; `None` writes each event's own channel
    pub channel: Option<u8>,
    /// Output buss (port)
    pub buss: u8,
    pub beats_per_bar: u8,
    pub beat_width: u8,
    /// Pulses per quarter note
    pub ppqn: u16,
    /// Musical key (0 = C)
    pub key: u8,
    /// Scale index (0 = off)
    pub scale: u8,
    /// Sequence drawn behind this one in an editor
    pub background: Option<u32>,
    /// Palette color index
    pub color: Option<u8>,
    /// Number of loops to play, zero for unlimited
    pub loop_count: u16,
    /// Follows song transposition
    pub transposable: bool,
    pub edit_mode: EditMode,
    pub muted: bool,
}

impl Default for TrackInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            seq_number: 0,
            channel: Some(0),
            buss: 0,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            beat_width: DEFAULT_BEAT_WIDTH,
            ppqn: DEFAULT_PPQN,
            key: 0,
            scale: 0,
            background: None,
            color: None,
            loop_count: 0,
            transposable: true,
            edit_mode: EditMode::Note,
            muted: false,
        }
    }
}

impl TrackInfo {
    /// Pulses per measure for this pattern's time signature.
    pub fn measures_to_ticks(&self) -> Pulse {
        pulse::measure_ticks(self.ppqn, self.beats_per_bar, self.beat_width)
    }

    pub fn is_free_channel(&self) -> bool {
        self.channel.is_none()
    }

    /// The channel byte stored on disk.
    pub fn channel_byte(&self) -> u8 {
        self.channel.unwrap_or(FREE_CHANNEL)
    }

    /// Inverse of [`Self::channel_byte`].
    pub fn set_channel_byte(&mut self, byte: u8) {
        self.channel = if byte >= FREE_CHANNEL { None } else { Some(byte & 0x0F) };
    }

    /// Channel to write for an event: its own on free-channel patterns,
    /// the pattern's otherwise.
    pub fn resolve_channel(&self, event_channel: u8) -> u8 {
        self.channel.unwrap_or(event_channel)
    }
}

/// A pattern: events, triggers and metadata.
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    pub info: TrackInfo,
    pub events: EventList,
    pub triggers: TriggerList,
}

impl Sequence {
    /// An empty pattern `measures` bars long.
    pub fn new(name: &str, measures: u32) -> Self {
        let info = TrackInfo {
            name: String::from(name),
            ..TrackInfo::default()
        };
        let length = info.measures_to_ticks() * measures.max(1) as Pulse;
        let mut seq = Self {
            info,
            events: EventList::new(),
            triggers: TriggerList::new(length),
        };
        seq.set_length(length);
        seq
    }

    pub fn length(&self) -> Pulse {
        self.events.length()
    }

    /// Set the pattern length for both events and triggers.
    pub fn set_length(&mut self, length: Pulse) {
        self.events.set_length(length);
        self.triggers.adjust_offsets_to_length(length);
    }

    /// Add a linked note of `len` pulses, shortened by the note-off margin.
    pub fn add_note(&mut self, tick: Pulse, len: Pulse, note: u8, velocity: u8) -> bool {
        if tick < 0 || len <= 0 {
            return false;
        }
        let channel = self.info.channel.unwrap_or(0);
        let margin = self.events.note_off_margin();
        let off_tick = tick + (len - margin).max(1);
        let on = self.events.insert(Event::note_on(tick, channel, note, velocity));
        let off = self.events.insert(Event::note_off(off_tick, channel, note, 0));
        self.events.link_notes(on, off)
    }

    /// Scale the pattern in time, keeping triggers and metadata in step.
    pub fn apply_time_factor(&mut self, factor: f64, keep_note_length: bool) -> Pulse {
        let length = self.events.apply_time_factor(factor, keep_note_length, true);
        self.triggers.adjust_offsets_to_length(length);
        length
    }

    /// Change the PPQN of the whole pattern.
    pub fn change_ppqn(&mut self, ppqn: u16) -> bool {
        let old = self.info.ppqn;
        if !self.events.rescale(old, ppqn) {
            return false;
        }
        self.triggers.rescale(old, ppqn);
        self.info.ppqn = ppqn;
        true
    }

    pub fn view(&self) -> TrackView<'_> {
        TrackView {
            info: &self.info,
            events: &self.events,
            triggers: &self.triggers,
        }
    }
}

/// Everything the exporter reads from a pattern, borrowed.
#[derive(Clone, Copy, Debug)]
pub struct TrackView<'a> {
    pub info: &'a TrackInfo,
    pub events: &'a EventList,
    pub triggers: &'a TriggerList,
}

impl TrackView<'_> {
    pub fn length(&self) -> Pulse {
        self.events.length()
    }

    /// Song export needs an unmuted pattern with at least one trigger.
    pub fn song_exportable(&self) -> Result<(), NotExportable> {
        if self.info.muted {
            Err(NotExportable::Muted)
        } else if self.triggers.is_empty() {
            Err(NotExportable::NoTriggers)
        } else {
            Ok(())
        }
    }
}
