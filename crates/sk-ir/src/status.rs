//! MIDI status bytes and meta-event type codes.

/// Meta event prefix.
pub const META: u8 = 0xFF;
/// SysEx start.
pub const SYSEX: u8 = 0xF0;
/// SysEx end, continuation, or escape prefix.
pub const SYSEX_END: u8 = 0xF7;

/// Largest 7-bit data value.
pub const DATA_MAX: u8 = 0x7F;

/// Number of distinct note numbers.
pub const NOTE_COUNT: usize = 128;

/// Meta-event type codes used by the engine.
pub mod meta {
    pub const SEQ_NUMBER: u8 = 0x00;
    pub const TEXT: u8 = 0x01;
    pub const COPYRIGHT: u8 = 0x02;
    pub const TRACK_NAME: u8 = 0x03;
    pub const INSTRUMENT: u8 = 0x04;
    pub const LYRIC: u8 = 0x05;
    pub const MARKER: u8 = 0x06;
    pub const CUE_POINT: u8 = 0x07;
    pub const CHANNEL_PREFIX: u8 = 0x20;
    pub const PORT: u8 = 0x21;
    pub const END_OF_TRACK: u8 = 0x2F;
    pub const SET_TEMPO: u8 = 0x51;
    pub const SMPTE_OFFSET: u8 = 0x54;
    pub const TIME_SIGNATURE: u8 = 0x58;
    pub const KEY_SIGNATURE: u8 = 0x59;
    pub const SEQSPEC: u8 = 0x7F;

    /// True for the text-family meta events (0x01 through 0x07).
    pub const fn is_text(meta_type: u8) -> bool {
        matches!(meta_type, TEXT..=CUE_POINT)
    }
}

/// Channel-voice message kinds (the high nibble of the status byte).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelStatus {
    NoteOff,
    NoteOn,
    Aftertouch,
    ControlChange,
    ProgramChange,
    ChannelPressure,
    PitchWheel,
}

impl ChannelStatus {
    /// Decode the high nibble of a status byte. Returns `None` for 0xF0-0xFF
    /// and for data bytes.
    pub const fn from_status(byte: u8) -> Option<Self> {
        match byte & 0xF0 {
            0x80 => Some(Self::NoteOff),
            0x90 => Some(Self::NoteOn),
            0xA0 => Some(Self::Aftertouch),
            0xB0 => Some(Self::ControlChange),
            0xC0 => Some(Self::ProgramChange),
            0xD0 => Some(Self::ChannelPressure),
            0xE0 => Some(Self::PitchWheel),
            _ => None,
        }
    }

    /// The status nibble with a zero channel.
    pub const fn code(self) -> u8 {
        match self {
            Self::NoteOff => 0x80,
            Self::NoteOn => 0x90,
            Self::Aftertouch => 0xA0,
            Self::ControlChange => 0xB0,
            Self::ProgramChange => 0xC0,
            Self::ChannelPressure => 0xD0,
            Self::PitchWheel => 0xE0,
        }
    }

    /// Number of data bytes that follow the status byte on the wire.
    pub const fn data_len(self) -> usize {
        match self {
            Self::ProgramChange | Self::ChannelPressure => 1,
            _ => 2,
        }
    }

    /// True for note-on, note-off and polyphonic aftertouch, whose first
    /// data byte is a note number.
    pub const fn is_note(self) -> bool {
        matches!(self, Self::NoteOff | Self::NoteOn | Self::Aftertouch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip_through_nibble() {
        for byte in 0x80..=0xEFu8 {
            let status = ChannelStatus::from_status(byte).unwrap();
            assert_eq!(status.code(), byte & 0xF0);
        }
        assert_eq!(ChannelStatus::from_status(0xF0), None);
        assert_eq!(ChannelStatus::from_status(0x7F), None);
    }

    #[test]
    fn data_lengths() {
        assert_eq!(ChannelStatus::NoteOn.data_len(), 2);
        assert_eq!(ChannelStatus::PitchWheel.data_len(), 2);
        assert_eq!(ChannelStatus::ProgramChange.data_len(), 1);
        assert_eq!(ChannelStatus::ChannelPressure.data_len(), 1);
    }

    #[test]
    fn text_meta_range() {
        assert!(meta::is_text(meta::TRACK_NAME));
        assert!(!meta::is_text(meta::SET_TEMPO));
        assert!(!meta::is_text(meta::SEQ_NUMBER));
    }
}
