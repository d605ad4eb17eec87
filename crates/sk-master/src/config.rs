//! Export and import settings.

use sk_formats::{ParseOptions, SmfFormat, WriterOptions};
use sk_ir::DEFAULT_PPQN;

/// How patterns become tracks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportMode {
    /// Each pattern once, with its triggers stored as metadata
    #[default]
    Regular,
    /// Each pattern replayed through its triggers
    Song,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub mode: ExportMode,
    pub writer: WriterOptions,
    pub format: SmfFormat,
    /// Division written to the file header
    pub ppqn: u16,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mode: ExportMode::Regular,
            writer: WriterOptions::default(),
            format: SmfFormat::Parallel,
            ppqn: DEFAULT_PPQN,
        }
    }
}

impl ExportOptions {
    pub fn song() -> Self {
        Self {
            mode: ExportMode::Song,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportOptions {
    /// Link notes that wrap around the end of the pattern
    pub link_wrap: bool,
    /// Recover running status after SysEx and meta events
    pub recover_running_status: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        let parse = ParseOptions::default();
        Self {
            link_wrap: parse.link_wrap,
            recover_running_status: parse.recover_running_status,
        }
    }
}

impl From<ImportOptions> for ParseOptions {
    fn from(options: ImportOptions) -> Self {
        ParseOptions {
            link_wrap: options.link_wrap,
            recover_running_status: options.recover_running_status,
        }
    }
}
