//! Standard MIDI File codec for seqkit.
//!
//! Writes patterns as SMF track chunks (per pattern, or flattened through
//! their triggers for song export) with sequencer metadata stored in
//! SeqSpec meta events, and reads such tracks back.

mod parser;
mod reader;
pub mod seqspec;
mod smf;
pub mod sysex;
pub mod varint;
mod writer;

pub use parser::{parse_track, EventSink, ParseOptions, ParseReport, ParsedTrack};
pub use reader::ByteReader;
pub use seqspec::SeqSpec;
pub use smf::{read_smf, write_smf, HeaderChunk, SmfFile, SmfFormat, TrackChunk};
pub use sysex::{split_message, FramingError, PacketKind, SysExAssembler, SysExFramer, SysExState};
pub use varint::{decode_varint, encode_u16_be, encode_u32_be, encode_varint, MAX_VARINT};
pub use writer::{TrackBytes, TrackWriter, WriterOptions};

use sk_ir::{NotExportable, Pulse};
use thiserror::Error;

/// Errors raised while decoding bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Unexpected end of data
    #[error("unexpected end of data")]
    UnexpectedEof,
    /// Variable-length quantity longer than four bytes
    #[error("variable-length quantity longer than 4 bytes")]
    MalformedVarint,
    /// SysEx message missing its terminator
    #[error("SysEx message is not terminated")]
    UnterminatedSysEx,
    /// Meta event claims more bytes than remain
    #[error("meta event length {length} exceeds the {remaining} bytes left")]
    MetaOverflow { length: usize, remaining: usize },
    /// A status byte that cannot start an event in a track chunk
    #[error("unexpected status byte {0:#04x}")]
    UnexpectedStatus(u8),
    /// Invalid chunk header or magic bytes
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    /// Malformed SeqSpec payload
    #[error("malformed SeqSpec payload for tag {0:#010x}")]
    BadSeqSpec(u32),
    /// I/O error from the chunk layer
    #[error("i/o: {0}")]
    Io(String),
}

impl From<binrw::Error> for FormatError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::BadMagic { .. } => FormatError::InvalidHeader(err.to_string()),
            binrw::Error::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                FormatError::UnexpectedEof
            }
            other => FormatError::Io(other.to_string()),
        }
    }
}

/// Why a track export failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    /// An event lies before the previous one; the list was not sorted
    #[error("negative delta time {delta} at tick {tick}")]
    NegativeDelta { tick: Pulse, delta: Pulse },
    /// A delta time does not fit in a variable-length quantity
    #[error("delta time {0} does not fit in 28 bits")]
    DeltaOverflow(Pulse),
    /// The pattern has no length to replay triggers against
    #[error("pattern length is zero")]
    ZeroLength,
    /// SysEx packets out of order
    #[error("SysEx framing: {0}")]
    SysExFraming(#[from] FramingError),
    /// The track is muted or has no triggers
    #[error("track is not exportable: {0:?}")]
    NotExportable(NotExportable),
}

impl ExportError {
    /// True for errors that signal corrupt pattern state, as opposed to a
    /// track that simply has nothing to export.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, ExportError::NotExportable(_))
    }
}

impl From<NotExportable> for ExportError {
    fn from(reason: NotExportable) -> Self {
        ExportError::NotExportable(reason)
    }
}
