//! SeqSpec tags: sequencer metadata carried in `FF 7F` meta events.
//!
//! Each block is `00 FF 7F <len> <tag:u32 BE> <payload>`, where `len`
//! counts the tag and the payload. Players that do not know the tags skip
//! the whole meta event.

use sk_ir::status::{meta, META};
use sk_ir::{EditMode, TrackInfo, Trigger, TriggerList};
use tracing::debug;

use crate::reader::ByteReader;
use crate::varint::{put_u32_be, put_varint};
use crate::FormatError;

/// High half shared by every tag.
pub const TAG_PREFIX: u32 = 0x2424_0000;

/// Known SeqSpec tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SeqSpec {
    MidiBus = 0x2424_0001,
    MidiChannel = 0x2424_0002,
    MidiClocks = 0x2424_0003,
    /// Triggers without offsets (oldest layout)
    Triggers = 0x2424_0004,
    Notes = 0x2424_0005,
    TimeSig = 0x2424_0006,
    BpmTag = 0x2424_0007,
    /// Triggers with offsets
    TriggersEx = 0x2424_0008,
    MuteGroups = 0x2424_0009,
    MidiCtrl = 0x2424_0010,
    MusicKey = 0x2424_0011,
    MusicScale = 0x2424_0012,
    BackSequence = 0x2424_0013,
    Transpose = 0x2424_0014,
    PerfBpMes = 0x2424_0015,
    PerfBw = 0x2424_0016,
    TempoMap = 0x2424_0017,
    Reserved1 = 0x2424_0018,
    Reserved2 = 0x2424_0019,
    TempoTrack = 0x2424_001A,
    SeqColor = 0x2424_001B,
    SeqEditMode = 0x2424_001C,
    SeqLoopCount = 0x2424_001D,
    Reserved3 = 0x2424_001E,
    Reserved4 = 0x2424_001F,
    /// Triggers with offsets and transposition
    TrigTranspose = 0x2424_0020,
}

impl SeqSpec {
    const ALL: [SeqSpec; 26] = [
        Self::MidiBus,
        Self::MidiChannel,
        Self::MidiClocks,
        Self::Triggers,
        Self::Notes,
        Self::TimeSig,
        Self::BpmTag,
        Self::TriggersEx,
        Self::MuteGroups,
        Self::MidiCtrl,
        Self::MusicKey,
        Self::MusicScale,
        Self::BackSequence,
        Self::Transpose,
        Self::PerfBpMes,
        Self::PerfBw,
        Self::TempoMap,
        Self::Reserved1,
        Self::Reserved2,
        Self::TempoTrack,
        Self::SeqColor,
        Self::SeqEditMode,
        Self::SeqLoopCount,
        Self::Reserved3,
        Self::Reserved4,
        Self::TrigTranspose,
    ];

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.tag() == tag)
    }

    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Tags that describe a single track (as opposed to the song).
    pub fn is_track_tag(self) -> bool {
        matches!(
            self,
            Self::MidiBus
                | Self::MidiChannel
                | Self::Triggers
                | Self::TimeSig
                | Self::TriggersEx
                | Self::MusicKey
                | Self::MusicScale
                | Self::BackSequence
                | Self::Transpose
                | Self::SeqColor
                | Self::SeqEditMode
                | Self::SeqLoopCount
                | Self::TrigTranspose
        )
    }
}

/// Write the header of a SeqSpec block with a zero delta time.
pub fn put_seqspec(out: &mut Vec<u8>, tag: SeqSpec, payload_len: usize) {
    out.push(0);
    out.push(META);
    out.push(meta::SEQSPEC);
    put_varint(out, payload_len as u32 + 4);
    put_u32_be(out, tag.tag());
}

/// Write every trigger as start, end and offset (and the transpose byte
/// for [`SeqSpec::TrigTranspose`]).
pub fn put_triggers(out: &mut Vec<u8>, tag: SeqSpec, triggers: &[Trigger]) {
    let with_transpose = tag == SeqSpec::TrigTranspose;
    let per = if with_transpose { 13 } else { 12 };
    put_seqspec(out, tag, triggers.len() * per);
    for t in triggers {
        put_u32_be(out, t.tick_start as u32);
        put_u32_be(out, t.tick_end as u32);
        put_u32_be(out, t.offset as u32);
        if with_transpose {
            out.push(t.transpose_byte());
        }
    }
}

/// Apply one track SeqSpec block to `info` and `triggers`.
///
/// Returns `Ok(false)` for tags that carry no track data; those are
/// skipped. A payload too short for its tag is an error.
pub fn apply_track_seqspec(
    tag: SeqSpec,
    payload: &[u8],
    info: &mut TrackInfo,
    triggers: &mut TriggerList,
) -> Result<bool, FormatError> {
    let bad = |_| FormatError::BadSeqSpec(tag.tag());
    let mut r = ByteReader::new(payload);
    match tag {
        SeqSpec::MidiBus => info.buss = r.read_u8().map_err(bad)?,
        SeqSpec::MidiChannel => {
            let byte = r.read_u8().map_err(bad)?;
            info.set_channel_byte(byte);
        }
        SeqSpec::TimeSig => {
            info.beats_per_bar = r.read_u8().map_err(bad)?;
            info.beat_width = r.read_u8().map_err(bad)?;
        }
        SeqSpec::MusicKey => info.key = r.read_u8().map_err(bad)?,
        SeqSpec::MusicScale => info.scale = r.read_u8().map_err(bad)?,
        SeqSpec::BackSequence => info.background = Some(r.read_u32_be().map_err(bad)?),
        SeqSpec::Transpose => info.transposable = r.read_u8().map_err(bad)? != 0,
        SeqSpec::SeqColor => {
            let byte = r.read_u8().map_err(bad)?;
            info.color = (byte < 0x80).then_some(byte);
        }
        SeqSpec::SeqEditMode => info.edit_mode = EditMode::from_byte(r.read_u8().map_err(bad)?),
        SeqSpec::SeqLoopCount => info.loop_count = r.read_u16_be().map_err(bad)?,
        SeqSpec::Triggers => {
            while r.remaining() >= 8 {
                let start = r.read_u32_be().map_err(bad)? as i32 as i64;
                let end = r.read_u32_be().map_err(bad)? as i32 as i64;
                triggers.append(Trigger::new(start, end, 0, 0));
            }
        }
        SeqSpec::TriggersEx | SeqSpec::TrigTranspose => {
            let per = if tag == SeqSpec::TrigTranspose { 13 } else { 12 };
            if payload.len() % per != 0 {
                return Err(FormatError::BadSeqSpec(tag.tag()));
            }
            while !r.is_empty() {
                let start = r.read_u32_be().map_err(bad)? as i32 as i64;
                let end = r.read_u32_be().map_err(bad)? as i32 as i64;
                let offset = r.read_u32_be().map_err(bad)? as i32 as i64;
                let transpose = if per == 13 {
                    Trigger::transpose_from_byte(r.read_u8().map_err(bad)?)
                } else {
                    0
                };
                triggers.append(Trigger::new(start, end, offset, transpose));
            }
        }
        other => {
            debug!(tag = other.tag(), "SeqSpec tag carries no track data");
            return Ok(false);
        }
    }
    Ok(true)
}
