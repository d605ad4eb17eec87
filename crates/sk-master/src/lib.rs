//! Headless editing session for seqkit.
//!
//! Owns the patterns of a song, the event clipboard, and the export and
//! import paths, so the CLI and tests drive the engine through one API.

mod config;
mod shared;

use std::sync::Arc;

use sk_formats::{parse_track, read_smf, write_smf, ExportError, ParseReport, TrackBytes, TrackWriter};
use sk_ir::{Clipboard, Pulse, Sequence};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use config::{ExportMode, ExportOptions, ImportOptions};
pub use shared::SharedSequence;
pub use sk_formats::{FormatError, SmfFormat};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Format(#[from] FormatError),
    /// Every track was skipped or failed
    #[error("no track could be exported")]
    NothingToExport(ExportReport),
}

/// A track left out of an export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFailure {
    /// Slot of the pattern in the session
    pub index: usize,
    pub name: String,
    pub error: ExportError,
}

/// Outcome of [`Session::export`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Slots written, in file order
    pub exported: Vec<usize>,
    pub failures: Vec<TrackFailure>,
}

impl ExportReport {
    /// Failures that point at corrupt pattern state rather than a track
    /// with nothing to play.
    pub fn corrupt(&self) -> impl Iterator<Item = &TrackFailure> {
        self.failures.iter().filter(|f| f.error.is_corruption())
    }
}

/// Outcome of [`Session::import`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Slot of the first imported pattern
    pub first_index: usize,
    /// One report per track chunk
    pub tracks: Vec<ParseReport>,
}

/// The patterns of a song and the clipboard shared between them.
#[derive(Debug, Default)]
pub struct Session {
    sequences: Vec<Arc<SharedSequence>>,
    clipboard: Clipboard,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Patterns ---

    /// Add a pattern in the next slot and return the slot. The pattern's
    /// sequence number is set to the slot.
    pub fn add(&mut self, mut sequence: Sequence) -> usize {
        let index = self.sequences.len();
        sequence.info.seq_number = index as u16;
        self.sequences.push(Arc::new(SharedSequence::new(sequence)));
        index
    }

    pub fn get(&self, index: usize) -> Option<&Arc<SharedSequence>> {
        self.sequences.get(index)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SharedSequence>> {
        self.sequences.iter()
    }

    // --- Clipboard ---

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    /// Copy the selected events of a pattern to the clipboard.
    pub fn copy(&mut self, index: usize) -> bool {
        let Some(shared) = self.sequences.get(index) else {
            return false;
        };
        let clipboard = &mut self.clipboard;
        shared.read(|seq| seq.events.copy_selected(clipboard))
    }

    /// Copy the selected events, then remove them from the pattern.
    pub fn cut(&mut self, index: usize) -> bool {
        if !self.copy(index) {
            return false;
        }
        match self.sequences.get(index) {
            Some(shared) => shared.edit(|seq| seq.events.remove_selected()),
            None => false,
        }
    }

    /// Paste the clipboard into a pattern at `tick`, optionally moving the
    /// highest note to `note`.
    pub fn paste(&mut self, index: usize, tick: Pulse, note: Option<u8>) -> bool {
        let Some(shared) = self.sequences.get(index) else {
            return false;
        };
        let clipboard = &self.clipboard;
        shared.edit(|seq| seq.events.paste_selected(clipboard, tick, note))
    }

    // --- Files ---

    /// Write every pattern as a track of one file.
    ///
    /// A track that fails is left out and listed in the report; the other
    /// tracks are still written.
    pub fn export(&self, options: &ExportOptions) -> Result<(Vec<u8>, ExportReport), SessionError> {
        let mut report = ExportReport::default();
        let mut tracks: Vec<TrackBytes> = Vec::with_capacity(self.sequences.len());
        for (index, shared) in self.sequences.iter().enumerate() {
            let seq = shared.snapshot();
            let writer = TrackWriter::new(seq.view(), options.writer);
            let result = match options.mode {
                ExportMode::Regular => writer.fill(),
                ExportMode::Song => writer.song_fill(),
            };
            match result {
                Ok(track) => {
                    tracks.push(track);
                    report.exported.push(index);
                }
                Err(e) => {
                    if e.is_corruption() {
                        error!(index, track = %seq.info.name, error = %e, "track export failed");
                    } else {
                        debug!(index, track = %seq.info.name, error = %e, "track skipped");
                    }
                    report.failures.push(TrackFailure {
                        index,
                        name: seq.info.name.clone(),
                        error: e,
                    });
                }
            }
        }
        if tracks.is_empty() {
            return Err(SessionError::NothingToExport(report));
        }
        if options.format == SmfFormat::Single && tracks.len() > 1 {
            return Err(FormatError::InvalidHeader(format!("format 0 file with {} tracks", tracks.len())).into());
        }
        let bytes = write_smf(options.format, options.ppqn, &tracks)?;
        info!(tracks = tracks.len(), failed = report.failures.len(), bytes = bytes.len(), "exported");
        Ok((bytes, report))
    }

    /// Read every track of a file into new patterns appended to the
    /// session. A damaged track keeps what could be read and is flagged
    /// in its report.
    pub fn import(&mut self, bytes: &[u8], options: &ImportOptions) -> Result<ImportReport, SessionError> {
        let file = read_smf(bytes)?;
        let ppqn = file.ppqn();
        if ppqn.is_none() {
            warn!(division = file.division, "SMPTE timing is not supported, keeping default PPQN");
        }
        let mut report = ImportReport {
            first_index: self.sequences.len(),
            tracks: Vec::with_capacity(file.tracks.len()),
        };
        for chunk in &file.tracks {
            let mut seq = Sequence::default();
            if let Some(ppqn) = ppqn {
                seq.info.ppqn = ppqn;
            }
            let mut track = parse_track(&chunk.data, &mut seq, (*options).into());
            track.truncated |= chunk.truncated;
            if track.truncated || track.dropped > 0 {
                warn!(index = chunk.index, dropped = track.dropped, truncated = track.truncated, "track imported with damage");
            }
            self.sequences.push(Arc::new(SharedSequence::new(seq)));
            report.tracks.push(track);
        }
        info!(tracks = report.tracks.len(), "imported");
        Ok(report)
    }
}
