//! Event clipboard shared by cut, copy and paste.

use crate::event_list::EventList;

/// Copied events, with timestamps relative to the first copied event.
///
/// Owned by the editing session and passed into copy/paste calls; the
/// last copy wins.
#[derive(Clone, Debug, Default)]
pub struct Clipboard {
    events: EventList,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &EventList {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub(crate) fn replace(&mut self, events: EventList) {
        self.events = events;
    }

    /// Highest note number on the clipboard.
    pub fn highest_note(&self) -> Option<u8> {
        self.events.iter().filter(|e| e.is_note_on()).filter_map(|e| e.note()).max()
    }
}
