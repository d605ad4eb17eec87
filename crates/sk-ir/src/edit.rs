//! Editing passes over an [`EventList`].
//!
//! Every pass returns `false` (or leaves the list unchanged) when there is
//! nothing to do: no selection, an empty range, or invalid arguments.

use alloc::vec::Vec;
use rand::Rng;
use slotmap::SecondaryMap;
use tracing::debug;

use crate::clipboard::Clipboard;
use crate::event::{EventId, EventKind};
use crate::event_list::EventList;
use crate::pulse::{self, Pulse};
use crate::status::{ChannelStatus, DATA_MAX};

impl EventList {
    fn selected_ids(&self, status: ChannelStatus, cc: u8) -> Vec<EventId> {
        self.iter_ids()
            .filter(|(_, e)| e.selected && e.is_status(status, cc))
            .map(|(id, _)| id)
            .collect()
    }

    fn timestamp_of(&self, id: EventId) -> Pulse {
        self.get(id).map_or(0, |e| e.timestamp)
    }

    fn set_timestamp(&mut self, id: EventId, tick: Pulse) {
        if let Some(e) = self.get_mut(id) {
            e.timestamp = tick;
        }
    }

    /// Move an event to `tick`, wrapped into the pattern. Returns the new
    /// timestamp.
    pub fn adjust_timestamp(&mut self, id: EventId, tick: Pulse) -> Option<Pulse> {
        let wrapped = self.trim_timestamp(tick);
        let e = self.get_mut(id)?;
        e.timestamp = wrapped;
        self.touch();
        Some(wrapped)
    }

    /// Shift an event and, with `fixlink`, its note-off partner by the
    /// same amount so the note keeps its duration.
    fn shift_with_partner(&mut self, id: EventId, target: Pulse, fixlink: bool) {
        let old = self.timestamp_of(id);
        let delta = target - old;
        self.set_timestamp(id, target);
        if !fixlink || delta == 0 {
            return;
        }
        let partner = self.get(id).filter(|e| e.is_note_on()).and_then(|e| e.link());
        if let Some(off) = partner {
            let moved = self.timestamp_of(off) + delta;
            let moved = if self.length() > 0 && moved > self.length() {
                moved - self.length()
            } else {
                moved.max(0)
            };
            self.set_timestamp(off, moved);
        }
    }

    // --- Quantization ---

    /// Snap selected events of `status` to the nearest multiple of
    /// `snap / divide`. With `fixlink`, note-offs follow their note-ons.
    /// Events snapped onto the pattern end wrap to its start.
    pub fn quantize_events(
        &mut self,
        status: ChannelStatus,
        cc: u8,
        snap: Pulse,
        divide: i32,
        fixlink: bool,
    ) -> bool {
        if snap <= 0 || divide <= 0 {
            return false;
        }
        let quantum = snap / divide as Pulse;
        let ids = self.selected_ids(status, cc);
        self.quantize_ids(&ids, quantum, fixlink)
    }

    fn quantize_ids(&mut self, ids: &[EventId], quantum: Pulse, fixlink: bool) -> bool {
        if quantum <= 0 || ids.is_empty() {
            return false;
        }
        let length = self.length();
        for &id in ids {
            let mut snapped = pulse::snap_nearest(self.timestamp_of(id), quantum);
            if length > 0 && snapped >= length {
                snapped -= length;
            }
            self.shift_with_partner(id, snapped, fixlink);
        }
        self.touch();
        self.sort();
        true
    }

    /// Quantize selected notes, keeping their durations.
    pub fn quantize_notes(&mut self, snap: Pulse, divide: i32) -> bool {
        self.quantize_events(ChannelStatus::NoteOn, 0, snap, divide, true)
    }

    /// Quantize every event regardless of selection. Linked note-offs move
    /// with their note-ons.
    pub fn quantize_all_events(&mut self, snap: Pulse, divide: i32) -> bool {
        if snap <= 0 || divide <= 0 {
            return false;
        }
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| !(e.is_note_off() && e.is_linked()))
            .map(|(id, _)| id)
            .collect();
        self.quantize_ids(&ids, snap / divide as Pulse, true)
    }

    /// Move selected events of `status` half-way toward the nearest
    /// multiple of `snap`.
    pub fn tighten_events(
        &mut self,
        status: ChannelStatus,
        cc: u8,
        snap: Pulse,
        fixlink: bool,
    ) -> bool {
        if snap <= 0 {
            return false;
        }
        let ids = self.selected_ids(status, cc);
        if ids.is_empty() {
            return false;
        }
        for id in ids {
            let ts = self.timestamp_of(id);
            let target = ts + (pulse::snap_nearest(ts, snap) - ts) / 2;
            self.shift_with_partner(id, target, fixlink);
        }
        self.touch();
        self.sort();
        true
    }

    pub fn tighten_notes(&mut self, snap: Pulse) -> bool {
        self.tighten_events(ChannelStatus::NoteOn, 0, snap, true)
    }

    // --- Time scaling ---

    /// Scale every timestamp and the pattern length by `factor`.
    ///
    /// With `keep_note_length`, note-offs are placed at the scaled note-on
    /// plus the original duration. With `relink`, the list is relinked
    /// against the new length. Returns the new length; a factor that is
    /// not a positive finite number leaves the list untouched.
    pub fn apply_time_factor(&mut self, factor: f64, keep_note_length: bool, relink: bool) -> Pulse {
        let length = self.length();
        if !(factor > 0.0 && factor.is_finite()) {
            return length;
        }
        let new_length = pulse::scale(length, factor);
        let mut durations: SecondaryMap<EventId, Pulse> = SecondaryMap::new();
        if keep_note_length {
            for (id, e) in self.iter_ids() {
                if !e.is_note_on() {
                    continue;
                }
                if let Some(off) = self.linked(id) {
                    let mut dur = off.timestamp - e.timestamp;
                    if dur < 0 {
                        dur += length;
                    }
                    durations.insert(id, dur);
                }
            }
        }
        let ids: Vec<EventId> = self.ids().to_vec();
        for &id in &ids {
            let Some(e) = self.get(id) else { continue };
            if keep_note_length && e.is_note_off() && e.link().is_some_and(|on| durations.contains_key(on)) {
                continue;
            }
            let scaled = pulse::scale(e.timestamp, factor);
            self.set_timestamp(id, scaled);
            if let (Some(&dur), Some(off)) = (durations.get(id), link_of(self, id)) {
                let mut end = scaled + dur;
                if new_length > 0 && end > new_length {
                    end -= new_length;
                }
                self.set_timestamp(off, end);
            }
        }
        self.set_length(new_length);
        self.touch();
        if relink {
            self.verify_and_link(new_length, false);
        } else {
            self.sort();
        }
        debug!(factor, new_length, "applied time factor");
        new_length
    }

    /// Convert timestamps from one PPQN to another.
    pub fn rescale(&mut self, old_ppqn: u16, new_ppqn: u16) -> bool {
        if old_ppqn == 0 || new_ppqn == 0 || old_ppqn == new_ppqn {
            return false;
        }
        let (old, new) = (old_ppqn as Pulse, new_ppqn as Pulse);
        for id in self.ids().to_vec() {
            let ts = self.timestamp_of(id);
            self.set_timestamp(id, ts * new / old);
        }
        let length = self.length() * new / old;
        self.set_length(length);
        self.touch();
        true
    }

    // --- Structural edits ---

    /// Mirror the selected events in time. With `in_place` the mirror
    /// spans the selection, otherwise the whole pattern. Linked notes keep
    /// their durations.
    pub fn reverse_events(&mut self, in_place: bool, relink: bool) -> bool {
        let Some((first, last)) = self.get_selected_events_interval() else {
            return false;
        };
        let length = self.length();
        let (lo, hi) = if in_place { (first, last) } else { (0, length) };
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.selected)
            .map(|(id, _)| id)
            .collect();
        let mut done: SecondaryMap<EventId, ()> = SecondaryMap::new();
        for id in ids {
            if done.contains_key(id) {
                continue;
            }
            let e = self.get(id).cloned();
            let Some(e) = e else { continue };
            let partner = e.link().filter(|p| self.get(*p).is_some_and(|o| o.selected));
            match partner {
                Some(off) if e.is_note_on() => {
                    let off_ts = self.timestamp_of(off);
                    self.set_timestamp(id, lo + hi - off_ts);
                    self.set_timestamp(off, lo + hi - e.timestamp);
                    done.insert(off, ());
                }
                Some(_) => continue,
                None => {
                    let mut t = lo + hi - e.timestamp;
                    if !in_place && length > 0 {
                        t = t.min(length - 1);
                    }
                    self.set_timestamp(id, t);
                }
            }
            done.insert(id, ());
        }
        self.touch();
        self.sort();
        if relink {
            self.clear_links();
            self.link_new(false);
        }
        true
    }

    /// Move selected note events by `delta_tick` pulses (wrapping in the
    /// pattern) and `delta_note` semitones. Fails without changes if any
    /// note would leave 0..=127.
    pub fn move_selected_notes(&mut self, delta_tick: Pulse, delta_note: i32) -> bool {
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.selected && e.is_note())
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() {
            return false;
        }
        let in_range = ids.iter().all(|id| {
            self.get(*id)
                .and_then(|e| e.note())
                .is_some_and(|n| (0..=DATA_MAX as i32).contains(&(n as i32 + delta_note)))
        });
        if !in_range {
            return false;
        }
        for id in ids {
            let ts = self.trim_timestamp(self.timestamp_of(id) + delta_tick);
            if let Some(e) = self.get_mut(id) {
                e.timestamp = ts;
                e.transpose_note(delta_note);
            }
        }
        self.touch();
        self.sort();
        true
    }

    /// Move every selected event by `delta_tick`, wrapping in the pattern.
    pub fn move_selected_events(&mut self, delta_tick: Pulse) -> bool {
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.selected)
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() || delta_tick == 0 {
            return false;
        }
        for id in ids {
            let ts = self.trim_timestamp(self.timestamp_of(id) + delta_tick);
            self.set_timestamp(id, ts);
        }
        self.touch();
        self.sort();
        true
    }

    /// Shift the selection so that its earliest event sits at tick 0.
    pub fn align_left(&mut self) -> bool {
        match self.get_selected_events_interval() {
            Some((first, _)) if first > 0 => self.move_selected_events(-first),
            _ => false,
        }
    }

    /// Stretch the selection by `delta` pulses, keeping its first event
    /// fixed.
    pub fn stretch_selected(&mut self, delta: Pulse) -> bool {
        let Some((first, last)) = self.get_selected_events_interval() else {
            return false;
        };
        let span = last - first;
        if span <= 0 || delta == 0 || span + delta <= 0 {
            return false;
        }
        let ids: Vec<EventId> = self
            .iter_ids()
            .filter(|(_, e)| e.selected)
            .map(|(id, _)| id)
            .collect();
        for id in ids {
            let ts = self.timestamp_of(id);
            self.set_timestamp(id, first + (ts - first) * (span + delta) / span);
        }
        self.touch();
        self.sort();
        true
    }

    /// Lengthen (or shorten) selected notes by moving their note-offs.
    pub fn grow_selected(&mut self, delta: Pulse, snap: Pulse) -> bool {
        let pairs: Vec<(Pulse, EventId, Pulse)> = self
            .iter_ids()
            .filter(|(_, e)| e.selected && e.is_note_on())
            .filter_map(|(id, e)| {
                let off = e.link()?;
                let off_ts = self.get(off)?.timestamp;
                (off_ts >= e.timestamp).then_some((e.timestamp, off, off_ts))
            })
            .collect();
        if pairs.is_empty() || delta == 0 {
            return false;
        }
        for (on_ts, off, off_ts) in pairs {
            let grown = self.clip_timestamp(on_ts, off_ts + delta, snap);
            self.set_timestamp(off, grown);
        }
        self.touch();
        self.sort();
        true
    }

    /// Transpose note events, clamping at the keyboard ends.
    pub fn transpose_notes(&mut self, steps: i32, selected_only: bool) -> bool {
        if steps == 0 {
            return false;
        }
        let mut any = false;
        for (_, e) in self.events_mut().iter_mut() {
            if e.is_note() && (!selected_only || e.selected) {
                e.transpose_note(steps);
                any = true;
            }
        }
        if any {
            self.touch();
        }
        any
    }

    // --- Randomization ---

    /// Add a random amount in `-range..=range` to the value byte of
    /// selected events of `status` (velocity for notes), clamped to 0..=127.
    pub fn randomize_selected<R: Rng + ?Sized>(
        &mut self,
        status: ChannelStatus,
        cc: u8,
        range: i32,
        rng: &mut R,
    ) -> bool {
        if range <= 0 {
            return false;
        }
        let ids = self.selected_ids(status, cc);
        if ids.is_empty() {
            return false;
        }
        for id in ids {
            let Some(EventKind::Channel(m)) = self.get_mut(id).map(|e| &mut e.kind) else {
                continue;
            };
            let index = if m.status.data_len() == 1 { 0 } else { 1 };
            let value = m.data[index] as i32 + rng.gen_range(-range..=range);
            m.data[index] = value.clamp(0, DATA_MAX as i32) as u8;
        }
        self.touch();
        true
    }

    pub fn randomize_selected_notes<R: Rng + ?Sized>(&mut self, range: i32, rng: &mut R) -> bool {
        self.randomize_selected(ChannelStatus::NoteOn, 0, range, rng)
    }

    /// Move selected notes by a random amount in `-range..=range`, limited
    /// to half a snap. Notes keep their durations.
    pub fn jitter_notes<R: Rng + ?Sized>(&mut self, snap: Pulse, range: Pulse, rng: &mut R) -> bool {
        let range = if snap > 0 { range.min(snap / 2) } else { range };
        if range <= 0 {
            return false;
        }
        let ids = self.selected_ids(ChannelStatus::NoteOn, 0);
        if ids.is_empty() {
            return false;
        }
        for id in ids {
            let delta = rng.gen_range(-range..=range);
            let target = self.trim_timestamp(self.timestamp_of(id) + delta);
            self.shift_with_partner(id, target, true);
        }
        self.touch();
        self.sort();
        true
    }

    // --- Clipboard ---

    /// Copy the selected events to `clipboard`, rebased to tick 0.
    /// Links between two copied events are kept.
    pub fn copy_selected(&self, clipboard: &mut Clipboard) -> bool {
        let Some((first, _)) = self.get_selected_events_interval() else {
            return false;
        };
        let mut copied = EventList::with_length(self.length());
        let mut remap: SecondaryMap<EventId, EventId> = SecondaryMap::new();
        for (id, e) in self.iter_ids().filter(|(_, e)| e.selected) {
            let mut copy = e.clone();
            copy.timestamp -= first;
            copy.selected = false;
            copy.marked = false;
            copy.set_link(None);
            remap.insert(id, copied.insert(copy));
        }
        for (id, e) in self.iter_ids().filter(|(_, e)| e.selected) {
            if let (Some(&new_id), Some(&partner)) =
                (remap.get(id), e.link().and_then(|l| remap.get(l)))
            {
                if let Some(c) = copied.get_mut(new_id) {
                    c.set_link(Some(partner));
                }
            }
        }
        copied.unmodify();
        clipboard.replace(copied);
        true
    }

    /// Paste the clipboard at `tick`. With `note`, notes are shifted so the
    /// highest copied note lands on it. Pasted events become the selection.
    pub fn paste_selected(&mut self, clipboard: &Clipboard, tick: Pulse, note: Option<u8>) -> bool {
        if clipboard.is_empty() || tick < 0 {
            return false;
        }
        let shift = match (note, clipboard.highest_note()) {
            (Some(n), Some(high)) => n as i32 - high as i32,
            _ => 0,
        };
        let mut pasted = clipboard.events().clone();
        for (_, e) in pasted.events_mut().iter_mut() {
            e.timestamp += tick;
            e.selected = true;
            if shift != 0 {
                e.transpose_note(shift);
            }
        }
        self.unselect_all();
        self.merge(&pasted, true)
    }
}

fn link_of(list: &EventList, id: EventId) -> Option<EventId> {
    list.get(id).and_then(|e| e.link())
}
