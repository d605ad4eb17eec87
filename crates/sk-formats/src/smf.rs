//! The SMF container: an `MThd` header followed by `MTrk` chunks.

use std::io::{Cursor, Write};

use binrw::{binrw, BinRead, BinWrite};
use tracing::{debug, warn};

use crate::writer::TrackBytes;
use crate::FormatError;

const TRACK_ID: [u8; 4] = *b"MTrk";
const HEADER_LEN: u32 = 6;

/// The `MThd` chunk.
#[binrw]
#[brw(big, magic = b"MThd")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderChunk {
    /// Body length, 6 in every file seen so far
    pub length: u32,
    pub format: u16,
    pub ntracks: u16,
    /// Pulses per quarter note, or SMPTE timing if the top bit is set
    pub division: u16,
}

#[binrw]
#[brw(big)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChunkHeader {
    id: [u8; 4],
    length: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmfFormat {
    /// One track holding every channel
    Single = 0,
    /// Simultaneous tracks
    Parallel = 1,
    /// Independent sequential patterns
    Sequential = 2,
}

impl SmfFormat {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Single),
            1 => Some(Self::Parallel),
            2 => Some(Self::Sequential),
            _ => None,
        }
    }
}

/// Raw bytes of one `MTrk` chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackChunk {
    /// Position among the file's track chunks
    pub index: usize,
    pub data: Vec<u8>,
    /// The chunk claimed more bytes than the file holds
    pub truncated: bool,
}

/// A file split into its track chunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmfFile {
    pub format: SmfFormat,
    pub division: u16,
    pub tracks: Vec<TrackChunk>,
}

impl SmfFile {
    /// Pulses per quarter note, unless the file uses SMPTE timing.
    pub fn ppqn(&self) -> Option<u16> {
        (self.division & 0x8000 == 0).then_some(self.division)
    }
}

/// Write a header and one `MTrk` chunk per track.
pub fn write_smf(format: SmfFormat, division: u16, tracks: &[TrackBytes]) -> Result<Vec<u8>, FormatError> {
    let ntracks = u16::try_from(tracks.len())
        .map_err(|_| FormatError::InvalidHeader(format!("{} tracks do not fit in MThd", tracks.len())))?;
    let body: usize = tracks.iter().map(|t| t.data.len() + 8).sum();
    let mut cursor = Cursor::new(Vec::with_capacity(14 + body));
    HeaderChunk {
        length: HEADER_LEN,
        format: format as u16,
        ntracks,
        division,
    }
    .write(&mut cursor)?;
    for track in tracks {
        let length = u32::try_from(track.data.len())
            .map_err(|_| FormatError::InvalidHeader(format!("track of {} bytes", track.data.len())))?;
        ChunkHeader { id: TRACK_ID, length }.write(&mut cursor)?;
        cursor.write_all(&track.data).map_err(|e| FormatError::Io(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Split a file into its track chunks.
///
/// Chunks other than `MTrk` are skipped. A last chunk that runs past the
/// end of the file is kept with whatever bytes are there.
pub fn read_smf(bytes: &[u8]) -> Result<SmfFile, FormatError> {
    let mut cursor = Cursor::new(bytes);
    let header = HeaderChunk::read(&mut cursor)?;
    if header.length < HEADER_LEN {
        return Err(FormatError::InvalidHeader(format!("MThd length {}", header.length)));
    }
    let format = SmfFormat::from_u16(header.format)
        .ok_or_else(|| FormatError::InvalidHeader(format!("format {}", header.format)))?;
    cursor.set_position(8 + header.length as u64);

    let mut tracks = Vec::with_capacity(header.ntracks as usize);
    while cursor.position() as usize + 8 <= bytes.len() {
        let chunk = ChunkHeader::read(&mut cursor)?;
        let start = cursor.position() as usize;
        let available = bytes.len() - start;
        let truncated = chunk.length as usize > available;
        let end = if truncated {
            warn!(index = tracks.len(), length = chunk.length, available, "chunk runs past end of file");
            bytes.len()
        } else {
            start + chunk.length as usize
        };
        if chunk.id == TRACK_ID {
            tracks.push(TrackChunk {
                index: tracks.len(),
                data: bytes[start..end].to_vec(),
                truncated,
            });
        } else {
            debug!(id = ?chunk.id, length = chunk.length, "skipping unknown chunk");
        }
        cursor.set_position(end as u64);
    }
    if tracks.len() != header.ntracks as usize {
        warn!(declared = header.ntracks, found = tracks.len(), "track count mismatch");
    }
    Ok(SmfFile {
        format,
        division: header.division,
        tracks,
    })
}
