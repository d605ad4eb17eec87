//! Core data types for the seqkit sequencer engine.
//!
//! Patterns are ordered lists of time-stamped MIDI events with note-on and
//! note-off pairs linked together, plus a list of triggers that place the
//! pattern on the song timeline. The format crate serializes these types;
//! the session crate edits and shares them.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod clipboard;
mod edit;
mod event;
mod event_list;
mod pulse;
mod sequence;
pub mod status;
mod trigger;

pub use clipboard::Clipboard;
pub use event::{ChannelMessage, Event, EventId, EventKind, MetaEvent, SysExEvent};
pub use event_list::{EventList, Select, DEFAULT_NOTE_OFF_MARGIN};
pub use pulse::{
    measure_ticks, scale, snap_down, snap_nearest, wrap, Pulse, DEFAULT_BEATS_PER_BAR,
    DEFAULT_BEAT_WIDTH, DEFAULT_PPQN,
};
pub use sequence::{EditMode, NotExportable, Sequence, TrackInfo, TrackView, FREE_CHANNEL};
pub use status::ChannelStatus;
pub use trigger::{Grow, SplitPoint, Trigger, TriggerList, MAX_TRIGGER_TRANSPOSE, UNDO_DEPTH};
