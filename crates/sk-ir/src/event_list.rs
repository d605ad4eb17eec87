//! Ordered, linkable collection of events.
//!
//! Events live in a slot-map arena so that note links are stable keys
//! rather than positions; `order` holds the traversal order. Insertion
//! order is not playback order until [`EventList::sort`] is called.

use alloc::vec;
use alloc::vec::Vec;
use slotmap::{SecondaryMap, SlotMap};
use tracing::trace;

use crate::event::{Event, EventId};
use crate::pulse::Pulse;
use crate::status::{ChannelStatus, NOTE_COUNT};

/// Ticks shaved off the end of painted notes.
pub const DEFAULT_NOTE_OFF_MARGIN: Pulse = 2;

/// Selection actions for [`EventList::select_events`] and
/// [`EventList::select_note_events`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Select {
    /// Select every match.
    Selecting,
    /// Select the first match only.
    SelectOne,
    /// Count matches that are already selected.
    Selected,
    /// Count matches without changing them.
    WouldSelect,
    /// Deselect every match.
    Deselect,
    /// Flip the selection of every match.
    Toggle,
    /// Remove the first matching note.
    Remove,
    /// Select the first matching note-on only.
    Onset,
    /// Count selected note-ons.
    IsOnset,
}

/// The event container of one pattern.
#[derive(Clone, Debug)]
pub struct EventList {
    events: SlotMap<EventId, Event>,
    order: Vec<EventId>,
    /// Nominal pattern length; not derived from the events
    length: Pulse,
    note_off_margin: Pulse,
    modified: bool,
    has_tempo: bool,
    has_time_signature: bool,
    has_key_signature: bool,
}

impl Default for EventList {
    fn default() -> Self {
        Self::new()
    }
}

impl EventList {
    pub fn new() -> Self {
        Self {
            events: SlotMap::with_key(),
            order: Vec::new(),
            length: 0,
            note_off_margin: DEFAULT_NOTE_OFF_MARGIN,
            modified: false,
            has_tempo: false,
            has_time_signature: false,
            has_key_signature: false,
        }
    }

    pub fn with_length(length: Pulse) -> Self {
        let mut list = Self::new();
        list.set_length(length);
        list
    }

    // --- Accessors ---

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Pattern length in pulses.
    pub fn length(&self) -> Pulse {
        self.length
    }

    /// Set the pattern length; non-positive values are ignored.
    pub fn set_length(&mut self, length: Pulse) {
        if length > 0 {
            self.length = length;
        }
    }

    pub fn note_off_margin(&self) -> Pulse {
        self.note_off_margin
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn unmodify(&mut self) {
        self.modified = false;
    }

    pub(crate) fn touch(&mut self) {
        self.modified = true;
    }

    pub fn has_tempo(&self) -> bool {
        self.has_tempo
    }

    pub fn has_time_signature(&self) -> bool {
        self.has_time_signature
    }

    pub fn has_key_signature(&self) -> bool {
        self.has_key_signature
    }

    /// Event keys in traversal order.
    pub fn ids(&self) -> &[EventId] {
        &self.order
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)
    }

    /// Mutable access to one event. Changing the note or status of a
    /// linked event leaves the link in place; call [`Self::verify_and_link`]
    /// afterwards if that matters.
    pub fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.get_mut(id)
    }

    /// Events in traversal order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.order.iter().map(move |id| &self.events[*id])
    }

    /// Keys and events in traversal order.
    pub fn iter_ids(&self) -> impl Iterator<Item = (EventId, &Event)> + '_ {
        self.order.iter().map(move |id| (*id, &self.events[*id]))
    }

    /// The partner of a linked event.
    pub fn linked(&self, id: EventId) -> Option<&Event> {
        self.events.get(id)?.link().and_then(|l| self.events.get(l))
    }

    // --- Insertion and removal ---

    /// Add an event at the end of the traversal order and flag the list
    /// as modified. Returns false only if the arena and the order vector
    /// disagree, which indicates internal corruption.
    pub fn add(&mut self, event: Event) -> bool {
        let ok = self.append(event);
        self.modified = true;
        ok
    }

    /// Add an event without flagging the list as modified (import path).
    pub fn append(&mut self, event: Event) -> bool {
        self.note_meta(&event);
        let id = self.events.insert(event);
        self.order.push(id);
        self.events.len() == self.order.len()
    }

    /// Add an event and return its key.
    pub fn insert(&mut self, event: Event) -> EventId {
        self.note_meta(&event);
        let id = self.events.insert(event);
        self.order.push(id);
        self.modified = true;
        id
    }

    fn note_meta(&mut self, event: &Event) {
        self.has_tempo |= event.is_tempo();
        self.has_time_signature |= event.is_time_signature();
        self.has_key_signature |= event.is_key_signature();
    }

    /// Remove one event, clearing its partner's link.
    pub fn remove(&mut self, id: EventId) -> Option<Event> {
        let event = self.events.remove(id)?;
        if let Some(partner) = event.link().and_then(|l| self.events.get_mut(l)) {
            partner.set_link(None);
        }
        self.order.retain(|&x| x != id);
        self.modified = true;
        Some(event)
    }

    pub fn clear(&mut self) {
        if !self.order.is_empty() {
            self.modified = true;
        }
        self.events.clear();
        self.order.clear();
        self.has_tempo = false;
        self.has_time_signature = false;
        self.has_key_signature = false;
    }

    /// Remove every event in `ids` (and nothing else), in one pass.
    pub(crate) fn remove_ids(&mut self, ids: &[EventId]) -> usize {
        let mut removed = 0;
        for &id in ids {
            if let Some(event) = self.events.remove(id) {
                if let Some(partner) = event.link().and_then(|l| self.events.get_mut(l)) {
                    partner.set_link(None);
                }
                removed += 1;
            }
        }
        if removed > 0 {
            let events = &self.events;
            self.order.retain(|id| events.contains_key(*id));
            self.modified = true;
        }
        removed
    }

    /// Recompute the tempo/time-signature/key-signature flags.
    pub fn scan_meta_events(&mut self) {
        self.has_tempo = false;
        self.has_time_signature = false;
        self.has_key_signature = false;
        for id in self.order.clone() {
            let event = self.events[id].clone();
            self.note_meta(&event);
        }
    }

    // --- Ordering ---

    /// Stable sort by timestamp, then by [`Event::rank`].
    pub fn sort(&mut self) {
        let events = &self.events;
        self.order.sort_by(|a, b| {
            let (ea, eb) = (&events[*a], &events[*b]);
            ea.timestamp.cmp(&eb.timestamp).then(ea.rank().cmp(&eb.rank()))
        });
    }

    /// True if the traversal order is already sorted.
    pub fn is_sorted(&self) -> bool {
        self.order.windows(2).all(|w| {
            let (a, b) = (&self.events[w[0]], &self.events[w[1]]);
            (a.timestamp, a.rank()) <= (b.timestamp, b.rank())
        })
    }

    /// Copy all events of `other` into this list, keeping their links.
    pub fn merge(&mut self, other: &EventList, presort: bool) -> bool {
        if other.is_empty() {
            return false;
        }
        let mut remap: SecondaryMap<EventId, EventId> = SecondaryMap::new();
        for (old, event) in other.iter_ids() {
            let mut copy = event.clone();
            copy.set_link(None);
            remap.insert(old, self.insert(copy));
        }
        for (old, event) in other.iter_ids() {
            if let Some(partner) = event.link().and_then(|l| remap.get(l).copied()) {
                self.events[remap[old]].set_link(Some(partner));
            }
        }
        if presort {
            self.sort();
        }
        true
    }

    // --- Queries ---

    /// Number of events that would be sent to a port.
    pub fn playable_count(&self) -> usize {
        self.iter().filter(|e| e.is_playable()).count()
    }

    pub fn is_playable(&self) -> bool {
        self.iter().any(|e| e.is_playable())
    }

    pub fn min_timestamp(&self) -> Option<Pulse> {
        self.iter().map(|e| e.timestamp).min()
    }

    pub fn max_timestamp(&self) -> Option<Pulse> {
        self.iter().map(|e| e.timestamp).max()
    }

    /// Number of note-on events.
    pub fn note_count(&self) -> usize {
        self.iter().filter(|e| e.is_note_on()).count()
    }

    // --- Linking ---

    /// Link a note-on with a note-off. Both must be unlinked and match in
    /// note and channel.
    pub fn link_notes(&mut self, on: EventId, off: EventId) -> bool {
        let ok = match (self.events.get(on), self.events.get(off)) {
            (Some(e_on), Some(e_off)) => {
                !e_on.is_linked() && !e_off.is_linked() && e_off.is_off_for(e_on)
            }
            _ => false,
        };
        if ok {
            self.events[on].set_link(Some(off));
            self.events[off].set_link(Some(on));
        }
        ok
    }

    pub fn clear_links(&mut self) {
        for (_, event) in self.events.iter_mut() {
            event.set_link(None);
        }
    }

    /// Pair every unlinked note-on with the nearest following unlinked
    /// note-off of the same note and channel, in one pass over the
    /// traversal order (which should be sorted).
    ///
    /// A note-on for a note that is already sounding closes the earlier
    /// note-on, which stays unlinked. Note-offs with nothing open are
    /// ignored. With `wrap`, a note-on still open at the end links to the
    /// first matching unlinked note-off that precedes it.
    pub fn link_new(&mut self, wrap: bool) {
        let mut open: Vec<Option<(usize, EventId)>> = vec![None; 16 * NOTE_COUNT];
        for (index, &id) in self.order.iter().enumerate() {
            let event = &self.events[id];
            if event.is_linked() {
                continue;
            }
            let Some(slot) = note_slot(event) else { continue };
            if event.is_note_on() {
                if let Some((_, prev)) = open[slot] {
                    trace!(?prev, "retriggered note closes earlier note-on");
                }
                open[slot] = Some((index, id));
            } else if event.is_note_off() {
                if let Some((_, on)) = open[slot].take() {
                    self.events[on].set_link(Some(id));
                    self.events[id].set_link(Some(on));
                }
            }
        }
        if !wrap {
            return;
        }
        let mut pending: Vec<(usize, EventId)> = open.into_iter().flatten().collect();
        pending.sort_by_key(|(index, _)| *index);
        for (on_index, on) in pending {
            let found = self.order[..on_index]
                .iter()
                .copied()
                .find(|&off| {
                    let e = &self.events[off];
                    !e.is_linked() && e.is_off_for(&self.events[on])
                });
            if let Some(off) = found {
                self.events[on].set_link(Some(off));
                self.events[off].set_link(Some(on));
            }
        }
    }

    /// Sort, relink from scratch, and remove events lying outside the
    /// pattern (together with their partners). Returns the number of
    /// events removed.
    pub fn verify_and_link(&mut self, length: Pulse, wrap: bool) -> usize {
        self.sort();
        self.clear_links();
        self.unmark_all();
        self.link_new(wrap);
        if length > 0 {
            self.mark_out_of_range(length);
        }
        self.remove_marked()
    }

    /// Remove note-ons and note-offs that have no partner.
    pub fn remove_unlinked_notes(&mut self) -> bool {
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.is_note_on_off() && !e.is_linked())
            .map(|(id, _)| id)
            .collect();
        self.remove_ids(&ids) > 0
    }

    /// After quantizing, wrap events that landed in the last half-snap of
    /// the pattern (or past its end) back to the start, and pull note-offs
    /// past the end inside the pattern.
    pub fn edge_fix(&mut self, snap: Pulse, length: Pulse) -> bool {
        if snap <= 0 || length <= 0 {
            return false;
        }
        let threshold = length - snap / 2;
        let margin = self.note_off_margin;
        let mut changed = false;
        for &id in &self.order {
            let event = &mut self.events[id];
            if event.is_note_off() {
                if event.timestamp > length {
                    event.timestamp = length - margin;
                    changed = true;
                }
            } else if event.timestamp >= threshold {
                let snapped = crate::pulse::snap_nearest(event.timestamp, snap);
                event.timestamp = snapped.rem_euclid(length);
                changed = true;
            }
        }
        if changed {
            self.modified = true;
            self.sort();
        }
        changed
    }

    // --- Marking ---

    /// Mark selected events and their partners. Returns true if any.
    pub fn mark_selected(&mut self) -> bool {
        let mut any = false;
        for id in self.order.clone() {
            if self.events[id].selected {
                self.events[id].marked = true;
                if let Some(partner) = self.events[id].link() {
                    if let Some(p) = self.events.get_mut(partner) {
                        p.marked = true;
                    }
                }
                any = true;
            }
        }
        any
    }

    /// Mark events beyond `length` (or before zero) and their partners.
    pub fn mark_out_of_range(&mut self, length: Pulse) {
        for id in self.order.clone() {
            let ts = self.events[id].timestamp;
            if ts > length || ts < 0 {
                self.events[id].marked = true;
                if let Some(partner) = self.events[id].link() {
                    if let Some(p) = self.events.get_mut(partner) {
                        p.marked = true;
                    }
                }
            }
        }
    }

    pub fn mark_all(&mut self) {
        for (_, event) in self.events.iter_mut() {
            event.marked = true;
        }
    }

    pub fn unmark_all(&mut self) {
        for (_, event) in self.events.iter_mut() {
            event.marked = false;
        }
    }

    /// Remove marked events. Returns the number removed.
    pub fn remove_marked(&mut self) -> usize {
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.marked)
            .map(|(id, _)| id)
            .collect();
        self.remove_ids(&ids)
    }

    /// Remove selected events together with their partners.
    pub fn remove_selected(&mut self) -> bool {
        self.unmark_all();
        self.mark_selected() && self.remove_marked() > 0
    }

    pub fn unpaint_all(&mut self) {
        for (_, event) in self.events.iter_mut() {
            event.painted = false;
        }
    }

    // --- Selection ---

    /// Number of selected note-ons.
    pub fn count_selected_notes(&self) -> usize {
        self.iter().filter(|e| e.is_note_on() && e.selected).count()
    }

    pub fn any_selected_notes(&self) -> bool {
        self.iter().any(|e| e.is_note_on() && e.selected)
    }

    /// Number of selected events of `status` (and controller `cc`).
    pub fn count_selected_events(&self, status: ChannelStatus, cc: u8) -> usize {
        self.iter().filter(|e| e.selected && e.is_status(status, cc)).count()
    }

    pub fn any_selected_events(&self) -> bool {
        self.iter().any(|e| e.selected)
    }

    pub fn any_selected_events_of(&self, status: ChannelStatus, cc: u8) -> bool {
        self.iter().any(|e| e.selected && e.is_status(status, cc))
    }

    pub fn select_all(&mut self) {
        for (_, event) in self.events.iter_mut() {
            event.selected = true;
        }
    }

    pub fn unselect_all(&mut self) {
        for (_, event) in self.events.iter_mut() {
            event.selected = false;
        }
    }

    /// Select every channel event on `channel`.
    pub fn select_by_channel(&mut self, channel: u8) {
        for (_, event) in self.events.iter_mut() {
            if event.channel_number() == Some(channel) {
                event.selected = true;
            }
        }
    }

    /// Select every note event on `channel`.
    pub fn select_notes_by_channel(&mut self, channel: u8) {
        for (_, event) in self.events.iter_mut() {
            if event.is_note() && event.channel_number() == Some(channel) {
                event.selected = true;
            }
        }
    }

    /// Move every channel event to `channel`. Returns true if any changed.
    pub fn set_channels(&mut self, channel: u8) -> bool {
        let mut changed = false;
        for (_, event) in self.events.iter_mut() {
            if let Some(current) = event.channel_number() {
                if current != channel & 0x0F {
                    event.set_channel(channel);
                    changed = true;
                }
            }
        }
        if changed {
            self.modified = true;
        }
        changed
    }

    /// Earliest and latest timestamps of the selected events.
    pub fn get_selected_events_interval(&self) -> Option<(Pulse, Pulse)> {
        let mut selected = self.iter().filter(|e| e.selected).map(|e| e.timestamp);
        let first = selected.next()?;
        Some(selected.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Apply `action` to events of `status` (and controller `cc`) with
    /// timestamps in the closed interval `[tick_s, tick_f]`. Note statuses
    /// select whole notes. Returns the number of events affected or
    /// counted; an empty or inverted interval returns zero.
    pub fn select_events(
        &mut self,
        tick_s: Pulse,
        tick_f: Pulse,
        status: ChannelStatus,
        cc: u8,
        action: Select,
    ) -> usize {
        if tick_s < 0 || tick_f < tick_s {
            return 0;
        }
        let matches: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| {
                let by_status = if status.is_note() {
                    e.is_note()
                } else {
                    e.is_status(status, cc)
                };
                by_status && e.timestamp >= tick_s && e.timestamp <= tick_f
            })
            .map(|(id, _)| id)
            .collect();
        self.apply_select(&matches, action)
    }

    /// Apply `action` to notes with pitch in `[note_l, note_h]` sounding
    /// anywhere in `[tick_s, tick_f]`. A linked note counts as sounding
    /// from its note-on to its note-off (wrapping past the pattern end).
    pub fn select_note_events(
        &mut self,
        tick_s: Pulse,
        note_h: u8,
        tick_f: Pulse,
        note_l: u8,
        action: Select,
    ) -> usize {
        if tick_s < 0 || tick_f < tick_s || note_h < note_l {
            return 0;
        }
        let length = self.length;
        let matches: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.is_note_on())
            .filter(|(_, e)| e.note().is_some_and(|n| n >= note_l && n <= note_h))
            .filter(|(id, e)| {
                let on = e.timestamp;
                match self.linked(*id).map(|off| off.timestamp) {
                    Some(off) if off >= on => on <= tick_f && off >= tick_s,
                    Some(off) => {
                        let tail = on <= tick_f && (length <= 0 || length >= tick_s);
                        tail || off >= tick_s
                    }
                    None => on >= tick_s && on <= tick_f,
                }
            })
            .map(|(id, _)| id)
            .collect();
        self.apply_select(&matches, action)
    }

    fn apply_select(&mut self, matches: &[EventId], action: Select) -> usize {
        match action {
            Select::WouldSelect => matches.len(),
            Select::Selected => matches.iter().filter(|id| self.events[**id].selected).count(),
            Select::IsOnset => matches
                .iter()
                .filter(|id| self.events[**id].is_note_on() && self.events[**id].selected)
                .count(),
            Select::Selecting | Select::Deselect | Select::Toggle => {
                for &id in matches {
                    let value = match action {
                        Select::Selecting => true,
                        Select::Deselect => false,
                        _ => !self.events[id].selected,
                    };
                    self.set_note_selected(id, value);
                }
                matches.len()
            }
            Select::SelectOne => match matches.first() {
                Some(&id) => {
                    self.set_note_selected(id, true);
                    1
                }
                None => 0,
            },
            Select::Onset => match matches.iter().find(|id| self.events[**id].is_note_on()) {
                Some(&id) => {
                    self.events[id].selected = true;
                    1
                }
                None => 0,
            },
            Select::Remove => match matches.first() {
                Some(&id) => {
                    let mut ids = vec![id];
                    ids.extend(self.events[id].link());
                    self.remove_ids(&ids);
                    1
                }
                None => 0,
            },
        }
    }

    fn set_note_selected(&mut self, id: EventId, value: bool) {
        self.events[id].selected = value;
        if let Some(partner) = self.events[id].link() {
            if let Some(p) = self.events.get_mut(partner) {
                p.selected = value;
            }
        }
    }

    // --- Matching ---

    /// First event at or after `start` that matches `target`.
    pub fn find_first_match(&self, target: &Event, start: Pulse) -> Option<EventId> {
        self.iter_ids()
            .find(|(_, e)| e.timestamp >= start && e.matches(target, false))
            .map(|(id, _)| id)
    }

    /// Remove the first event at or after `start` that matches `target`.
    pub fn remove_first_match(&mut self, target: &Event, start: Pulse) -> bool {
        match self.find_first_match(target, start) {
            Some(id) => self.remove(id).is_some(),
            None => false,
        }
    }

    // --- Timestamp helpers ---

    /// Wrap `tick` into `[0, length)`; unchanged if the length is unset.
    pub fn trim_timestamp(&self, tick: Pulse) -> Pulse {
        crate::pulse::wrap(tick, self.length).unwrap_or(tick)
    }

    /// Keep a note-off after its note-on and inside the pattern.
    pub fn clip_timestamp(&self, on: Pulse, off: Pulse, snap: Pulse) -> Pulse {
        if off <= on {
            on + (snap - self.note_off_margin).max(1)
        } else if self.length > 0 && off >= self.length {
            self.length - self.note_off_margin
        } else {
            off
        }
    }

    pub(crate) fn events_mut(&mut self) -> &mut SlotMap<EventId, Event> {
        &mut self.events
    }
}

/// Open-note table index for a note-on or note-off.
fn note_slot(event: &Event) -> Option<usize> {
    if !event.is_note_on_off() {
        return None;
    }
    let channel = event.channel_number()? as usize;
    let note = event.note()? as usize;
    Some(channel * NOTE_COUNT + note)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &EventList) -> Vec<(Pulse, Pulse, u8)> {
        let mut out: Vec<_> = list
            .iter_ids()
            .filter(|(_, e)| e.is_note_on())
            .filter_map(|(id, e)| Some((e.timestamp, list.linked(id)?.timestamp, e.note()?)))
            .collect();
        out.sort();
        out
    }

    fn sample_events() -> Vec<Event> {
        vec![
            Event::note_on(0, 0, 60, 100),
            Event::note_off(48, 0, 60, 0),
            Event::note_on(48, 0, 60, 90),
            Event::note_off(96, 0, 60, 0),
            Event::note_on(10, 0, 64, 80),
            Event::note_on(20, 0, 64, 80),
            Event::note_off(30, 0, 64, 0),
            Event::note_off(150, 0, 67, 0),
            Event::control_change(48, 0, 7, 100),
        ]
    }

    #[test]
    fn add_never_fails_on_valid_input() {
        let mut list = EventList::new();
        for e in sample_events() {
            assert!(list.add(e));
        }
        assert_eq!(list.len(), 9);
        assert!(list.is_modified());
    }

    #[test]
    fn sort_puts_note_off_before_note_on_at_same_tick() {
        let mut list = EventList::new();
        for e in sample_events() {
            list.add(e);
        }
        list.sort();
        let at_48: Vec<_> = list.iter().filter(|e| e.timestamp == 48).collect();
        assert!(at_48[0].is_note_off());
        assert!(at_48[1].is_note_on());
        assert!(!at_48[2].is_note());
        assert!(list.is_sorted());
    }

    #[test]
    fn sort_is_idempotent() {
        let mut list = EventList::new();
        for e in sample_events() {
            list.add(e);
        }
        list.sort();
        let once: Vec<EventId> = list.ids().to_vec();
        list.sort();
        assert_eq!(list.ids(), &once[..]);
    }

    #[test]
    fn link_new_pairs_nearest_off_and_handles_retrigger() {
        let mut list = EventList::with_length(192);
        for e in sample_events() {
            list.add(e);
        }
        list.sort();
        list.link_new(false);
        assert_eq!(pairs(&list), vec![(0, 48, 60), (20, 30, 64), (48, 96, 60)]);
        // retriggered note 64 at tick 10 is closed without a partner
        let early = list.iter().find(|e| e.timestamp == 10).unwrap();
        assert!(!early.is_linked());
        // orphan note-off stays unlinked
        let orphan = list.iter().find(|e| e.timestamp == 150).unwrap();
        assert!(!orphan.is_linked());
    }

    #[test]
    fn link_new_is_independent_of_insertion_order() {
        let mut forward = EventList::with_length(192);
        let mut backward = EventList::with_length(192);
        for e in sample_events() {
            forward.add(e);
        }
        for e in sample_events().into_iter().rev() {
            backward.add(e);
        }
        forward.sort();
        backward.sort();
        forward.link_new(false);
        backward.link_new(false);
        assert_eq!(pairs(&forward), pairs(&backward));
    }

    #[test]
    fn link_new_wraps_to_start_of_pattern() {
        let mut list = EventList::with_length(192);
        list.add(Event::note_off(10, 0, 72, 0));
        list.add(Event::note_on(180, 0, 72, 100));
        list.sort();
        list.link_new(false);
        assert!(pairs(&list).is_empty());
        list.link_new(true);
        assert_eq!(pairs(&list), vec![(180, 10, 72)]);
    }

    #[test]
    fn verify_and_link_drops_notes_past_the_end() {
        let mut list = EventList::with_length(96);
        list.add(Event::note_on(0, 0, 60, 100));
        list.add(Event::note_off(40, 0, 60, 0));
        list.add(Event::note_on(120, 0, 62, 100));
        list.add(Event::note_off(130, 0, 62, 0));
        let removed = list.verify_and_link(96, false);
        assert_eq!(removed, 2);
        assert_eq!(pairs(&list), vec![(0, 40, 60)]);
    }

    #[test]
    fn remove_clears_partner_link() {
        let mut list = EventList::new();
        let on = list.insert(Event::note_on(0, 0, 60, 100));
        let off = list.insert(Event::note_off(10, 0, 60, 0));
        assert!(list.link_notes(on, off));
        list.remove(off);
        assert!(!list.get(on).unwrap().is_linked());
    }

    #[test]
    fn merge_keeps_links() {
        let mut src = EventList::new();
        let on = src.insert(Event::note_on(0, 0, 60, 100));
        let off = src.insert(Event::note_off(10, 0, 60, 0));
        src.link_notes(on, off);
        let mut dst = EventList::new();
        dst.add(Event::control_change(5, 0, 1, 1));
        assert!(dst.merge(&src, true));
        assert_eq!(dst.len(), 3);
        assert_eq!(pairs(&dst), vec![(0, 10, 60)]);
    }

    #[test]
    fn select_events_rejects_inverted_range() {
        let mut list = EventList::new();
        list.add(Event::note_on(10, 0, 60, 100));
        assert_eq!(list.select_events(20, 5, ChannelStatus::NoteOn, 0, Select::Selecting), 0);
        assert_eq!(list.select_events(-1, 5, ChannelStatus::NoteOn, 0, Select::Selecting), 0);
        assert!(!list.any_selected_events());
    }

    #[test]
    fn select_note_events_selects_whole_notes() {
        let mut list = EventList::with_length(192);
        list.add(Event::note_on(0, 0, 60, 100));
        list.add(Event::note_off(100, 0, 60, 0));
        list.add(Event::note_on(0, 0, 72, 100));
        list.add(Event::note_off(20, 0, 72, 0));
        list.sort();
        list.link_new(false);
        // the interval overlaps the sounding part of note 60 only
        let n = list.select_note_events(50, 70, 60, 55, Select::Selecting);
        assert_eq!(n, 1);
        assert_eq!(list.count_selected_notes(), 1);
        assert_eq!(list.iter().filter(|e| e.selected).count(), 2);
        assert_eq!(list.select_note_events(0, 127, 191, 0, Select::WouldSelect), 2);
    }

    #[test]
    fn remove_action_deletes_note_pair() {
        let mut list = EventList::with_length(192);
        list.add(Event::note_on(0, 0, 60, 100));
        list.add(Event::note_off(100, 0, 60, 0));
        list.sort();
        list.link_new(false);
        assert_eq!(list.select_note_events(0, 60, 10, 60, Select::Remove), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn selected_interval_spans_selection() {
        let mut list = EventList::new();
        list.add(Event::note_on(30, 0, 60, 100));
        list.add(Event::note_on(5, 0, 62, 100));
        list.add(Event::note_on(90, 0, 64, 100));
        assert_eq!(list.get_selected_events_interval(), None);
        list.select_all();
        assert_eq!(list.get_selected_events_interval(), Some((5, 90)));
    }

    #[test]
    fn clip_timestamp_keeps_off_inside_pattern() {
        let list = EventList::with_length(192);
        assert_eq!(list.clip_timestamp(10, 5, 12), 20);
        assert_eq!(list.clip_timestamp(10, 300, 12), 190);
        assert_eq!(list.clip_timestamp(10, 50, 12), 50);
    }

    #[test]
    fn scan_meta_events_tracks_tempo() {
        let mut list = EventList::new();
        list.add(Event::tempo(0, 120.0));
        assert!(list.has_tempo());
        list.clear();
        assert!(!list.has_tempo());
    }
}
