//! A single MIDI, meta, or SysEx event.

use alloc::vec::Vec;

use crate::pulse::Pulse;
use crate::status::{self, meta, ChannelStatus, DATA_MAX};

slotmap::new_key_type! {
    /// Stable key of an event inside an [`EventList`](crate::EventList).
    pub struct EventId;
}

/// A channel-voice message: status nibble, channel, and up to two data bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub status: ChannelStatus,
    /// Channel 0-15
    pub channel: u8,
    /// Data bytes; the second is ignored for one-byte messages
    pub data: [u8; 2],
}

/// A meta event (`FF type len data`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaEvent {
    pub meta_type: u8,
    pub data: Vec<u8>,
}

/// One SysEx packet as it appears in a track.
///
/// `status` is `0xF0` for the first packet of a message and `0xF7` for
/// continuation packets and escape sequences. `data` holds the bytes after
/// the status byte, including a trailing `0xF7` when the packet ends the
/// message. Whether an `0xF7` packet is a continuation or an escape is not
/// stored; it follows from the packets before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SysExEvent {
    pub status: u8,
    pub data: Vec<u8>,
}

impl SysExEvent {
    /// True if the last payload byte is the `0xF7` terminator.
    pub fn is_terminated(&self) -> bool {
        self.data.last() == Some(&status::SYSEX_END)
    }
}

/// The three event families.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Channel(ChannelMessage),
    Meta(MetaEvent),
    SysEx(SysExEvent),
}

/// A time-stamped event with editing flags and an optional note link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Absolute time in pulses
    pub timestamp: Pulse,
    /// What the event is
    pub kind: EventKind,
    /// Selected in an editor
    pub selected: bool,
    /// Marked for removal
    pub marked: bool,
    /// Recently painted (drawn) by an editor
    pub painted: bool,
    /// Partner note event; maintained only by the owning list
    link: Option<EventId>,
}

impl Event {
    /// Create an event with cleared flags and no link.
    pub fn new(timestamp: Pulse, kind: EventKind) -> Self {
        Self {
            timestamp,
            kind,
            selected: false,
            marked: false,
            painted: false,
            link: None,
        }
    }

    /// Create a channel-voice event. Channel and data bytes are masked to
    /// their valid ranges.
    pub fn channel(timestamp: Pulse, status: ChannelStatus, channel: u8, d0: u8, d1: u8) -> Self {
        Self::new(
            timestamp,
            EventKind::Channel(ChannelMessage {
                status,
                channel: channel & 0x0F,
                data: [d0 & DATA_MAX, d1 & DATA_MAX],
            }),
        )
    }

    pub fn note_on(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel(timestamp, ChannelStatus::NoteOn, channel, note, velocity)
    }

    pub fn note_off(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel(timestamp, ChannelStatus::NoteOff, channel, note, velocity)
    }

    pub fn control_change(timestamp: Pulse, channel: u8, controller: u8, value: u8) -> Self {
        Self::channel(timestamp, ChannelStatus::ControlChange, channel, controller, value)
    }

    pub fn program_change(timestamp: Pulse, channel: u8, program: u8) -> Self {
        Self::channel(timestamp, ChannelStatus::ProgramChange, channel, program, 0)
    }

    /// Pitch wheel with a 14-bit value (0x2000 = centre).
    pub fn pitch_wheel(timestamp: Pulse, channel: u8, value: u16) -> Self {
        let lsb = (value & 0x7F) as u8;
        let msb = ((value >> 7) & 0x7F) as u8;
        Self::channel(timestamp, ChannelStatus::PitchWheel, channel, lsb, msb)
    }

    pub fn meta(timestamp: Pulse, meta_type: u8, data: Vec<u8>) -> Self {
        Self::new(timestamp, EventKind::Meta(MetaEvent { meta_type, data }))
    }

    /// Tempo meta event from beats per minute.
    pub fn tempo(timestamp: Pulse, bpm: f64) -> Self {
        let us = if bpm > 0.0 { libm::round(60_000_000.0 / bpm) as u32 } else { 500_000 };
        let bytes = us.to_be_bytes();
        Self::meta(timestamp, meta::SET_TEMPO, alloc::vec![bytes[1], bytes[2], bytes[3]])
    }

    /// Time-signature meta event; `beat_width` must be a power of two.
    pub fn time_signature(timestamp: Pulse, beats_per_bar: u8, beat_width: u8) -> Self {
        let log2 = beat_width.max(1).trailing_zeros() as u8;
        Self::meta(timestamp, meta::TIME_SIGNATURE, alloc::vec![beats_per_bar, log2, 24, 8])
    }

    /// Key-signature meta event: `sharps_flats` in -7..=7, `minor` flag.
    pub fn key_signature(timestamp: Pulse, sharps_flats: i8, minor: bool) -> Self {
        Self::meta(timestamp, meta::KEY_SIGNATURE, alloc::vec![sharps_flats as u8, minor as u8])
    }

    /// A complete SysEx message, `F0 ... F7`, stored as one packet.
    ///
    /// A leading `F0` in `message` is stripped; the terminator is kept.
    pub fn sysex(timestamp: Pulse, message: &[u8]) -> Self {
        let data = match message.first() {
            Some(&status::SYSEX) => message[1..].to_vec(),
            _ => message.to_vec(),
        };
        Self::sysex_packet(timestamp, status::SYSEX, data)
    }

    /// A single SysEx packet with an explicit `F0`/`F7` status.
    pub fn sysex_packet(timestamp: Pulse, status: u8, data: Vec<u8>) -> Self {
        Self::new(timestamp, EventKind::SysEx(SysExEvent { status, data }))
    }

    // --- Classification ---

    pub fn channel_message(&self) -> Option<&ChannelMessage> {
        match &self.kind {
            EventKind::Channel(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn meta_event(&self) -> Option<&MetaEvent> {
        match &self.kind {
            EventKind::Meta(m) => Some(m),
            _ => None,
        }
    }

    pub fn sysex_event(&self) -> Option<&SysExEvent> {
        match &self.kind {
            EventKind::SysEx(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self.kind, EventKind::Channel(_))
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.kind, EventKind::Meta(_))
    }

    pub fn is_sysex(&self) -> bool {
        matches!(self.kind, EventKind::SysEx(_))
    }

    /// Meta or SysEx: events with a variable-length payload.
    pub fn is_ex_data(&self) -> bool {
        !self.is_channel()
    }

    /// Note-on, note-off or polyphonic aftertouch.
    pub fn is_note(&self) -> bool {
        self.channel_message().is_some_and(|m| m.status.is_note())
    }

    pub fn is_note_on(&self) -> bool {
        self.channel_message().is_some_and(|m| m.status == ChannelStatus::NoteOn)
    }

    pub fn is_note_off(&self) -> bool {
        self.channel_message().is_some_and(|m| m.status == ChannelStatus::NoteOff)
    }

    /// Note-on or note-off (excludes aftertouch).
    pub fn is_note_on_off(&self) -> bool {
        self.is_note_on() || self.is_note_off()
    }

    /// True if this event is a channel message of `status` (and controller
    /// `cc`, for control changes).
    pub fn is_status(&self, status: ChannelStatus, cc: u8) -> bool {
        match self.channel_message() {
            Some(m) if m.status == status => {
                status != ChannelStatus::ControlChange || m.data[0] == cc
            }
            _ => false,
        }
    }

    /// Events that are sent to a port during playback.
    pub fn is_playable(&self) -> bool {
        self.is_channel() || self.is_sysex()
    }

    pub fn is_tempo(&self) -> bool {
        self.meta_type() == Some(meta::SET_TEMPO)
    }

    pub fn is_time_signature(&self) -> bool {
        self.meta_type() == Some(meta::TIME_SIGNATURE)
    }

    pub fn is_key_signature(&self) -> bool {
        self.meta_type() == Some(meta::KEY_SIGNATURE)
    }

    pub fn meta_type(&self) -> Option<u8> {
        self.meta_event().map(|m| m.meta_type)
    }

    /// Tempo in beats per minute, for a well-formed tempo event.
    pub fn tempo_bpm(&self) -> Option<f64> {
        let m = self.meta_event().filter(|m| m.meta_type == meta::SET_TEMPO)?;
        if m.data.len() < 3 {
            return None;
        }
        let us = u32::from_be_bytes([0, m.data[0], m.data[1], m.data[2]]);
        (us > 0).then(|| 60_000_000.0 / us as f64)
    }

    // --- Field access ---

    /// The status byte as written on the wire (channel included).
    pub fn status_byte(&self) -> u8 {
        match &self.kind {
            EventKind::Channel(m) => m.status.code() | m.channel,
            EventKind::Meta(_) => status::META,
            EventKind::SysEx(s) => s.status,
        }
    }

    pub fn channel_number(&self) -> Option<u8> {
        self.channel_message().map(|m| m.channel)
    }

    /// Replace the channel of a channel-voice event; no-op otherwise.
    pub fn set_channel(&mut self, channel: u8) {
        if let EventKind::Channel(m) = &mut self.kind {
            m.channel = channel & 0x0F;
        }
    }

    /// Note number of a note event.
    pub fn note(&self) -> Option<u8> {
        self.channel_message().filter(|m| m.status.is_note()).map(|m| m.data[0])
    }

    /// Velocity (or pressure) of a note event.
    pub fn velocity(&self) -> Option<u8> {
        self.channel_message().filter(|m| m.status.is_note()).map(|m| m.data[1])
    }

    /// First data byte of a channel message, zero otherwise.
    pub fn d0(&self) -> u8 {
        self.channel_message().map_or(0, |m| m.data[0])
    }

    /// Second data byte of a channel message, zero otherwise.
    pub fn d1(&self) -> u8 {
        self.channel_message().map_or(0, |m| m.data[1])
    }

    pub fn set_note(&mut self, note: u8) {
        if let EventKind::Channel(m) = &mut self.kind {
            if m.status.is_note() {
                m.data[0] = note & DATA_MAX;
            }
        }
    }

    pub fn set_velocity(&mut self, velocity: u8) {
        if let EventKind::Channel(m) = &mut self.kind {
            if m.status.is_note() {
                m.data[1] = velocity & DATA_MAX;
            }
        }
    }

    /// Shift a note event by `semitones`, clamping the result to 0..=127.
    ///
    /// Returns the new note number, or `None` for non-note events.
    pub fn transpose_note(&mut self, semitones: i32) -> Option<u8> {
        let note = self.note()?;
        let shifted = (note as i32 + semitones).clamp(0, DATA_MAX as i32) as u8;
        self.set_note(shifted);
        Some(shifted)
    }

    /// Convert a note-on with velocity zero into a note-off.
    pub fn normalize_note_off(&mut self) {
        if let EventKind::Channel(m) = &mut self.kind {
            if m.status == ChannelStatus::NoteOn && m.data[1] == 0 {
                m.status = ChannelStatus::NoteOff;
            }
        }
    }

    // --- Linking ---

    pub fn link(&self) -> Option<EventId> {
        self.link
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub(crate) fn set_link(&mut self, id: Option<EventId>) {
        self.link = id;
    }

    /// Note-off for the same note and channel as this note-on.
    pub fn is_off_for(&self, on: &Event) -> bool {
        self.is_note_off()
            && on.is_note_on()
            && self.note() == on.note()
            && self.channel_number() == on.channel_number()
    }

    // --- Ordering ---

    /// Sort rank for events sharing a timestamp; lower sorts first.
    ///
    /// Note-offs precede note-ons so a repeated note closes before it
    /// reopens, then meta, program, controller, pressure-family and SysEx.
    /// Channel and note break the remaining ties.
    pub fn rank(&self) -> u32 {
        match &self.kind {
            EventKind::Channel(m) => {
                let family = match m.status {
                    ChannelStatus::NoteOff => 0,
                    ChannelStatus::NoteOn => 1,
                    ChannelStatus::ProgramChange => 3,
                    ChannelStatus::ControlChange => 4,
                    ChannelStatus::Aftertouch
                    | ChannelStatus::ChannelPressure
                    | ChannelStatus::PitchWheel => 5,
                };
                let minor = if m.status.is_note() { m.data[0] as u32 } else { 0 };
                (family << 16) | ((m.channel as u32) << 8) | minor
            }
            EventKind::Meta(_) => 2 << 16,
            EventKind::SysEx(_) => 6 << 16,
        }
    }

    /// Status, channel and data equality; the timestamp is compared only
    /// when `with_timestamp` is set. Payloads are not compared.
    pub fn matches(&self, other: &Event, with_timestamp: bool) -> bool {
        if with_timestamp && self.timestamp != other.timestamp {
            return false;
        }
        match (&self.kind, &other.kind) {
            (EventKind::Channel(a), EventKind::Channel(b)) => a == b,
            (EventKind::Meta(a), EventKind::Meta(b)) => a.meta_type == b.meta_type,
            (EventKind::SysEx(a), EventKind::SysEx(b)) => a.status == b.status,
            _ => false,
        }
    }
}
