//! Triggers: windows of song time that replay a looped pattern.

use alloc::vec::Vec;
use heapless::Deque;
use tracing::trace;

use crate::pulse::{self, Pulse};

/// Largest transposition a trigger can carry, in semitones.
pub const MAX_TRIGGER_TRANSPOSE: i8 = 63;

/// Bias added to a transposition when it is stored as a byte.
const TRANSPOSE_BIAS: i16 = 0x40;

/// Depth of the trigger undo and redo histories.
pub const UNDO_DEPTH: usize = 16;

/// One playback window of a pattern.
///
/// `offset` is an absolute phase: pattern tick `t` plays at song ticks
/// `t + offset + k * length` that fall inside `[tick_start, tick_end]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trigger {
    /// First tick of the window
    pub tick_start: Pulse,
    /// Last tick of the window (inclusive)
    pub tick_end: Pulse,
    /// Phase shift into the pattern
    pub offset: Pulse,
    /// Semitone shift, zero for none
    pub transpose: i8,
    pub selected: bool,
}

impl Trigger {
    /// A trigger covering `[tick_start, tick_end]`. Swapped bounds are
    /// reordered and the transposition is clamped to its valid range.
    pub fn new(tick_start: Pulse, tick_end: Pulse, offset: Pulse, transpose: i8) -> Self {
        let (s, e) = if tick_end < tick_start { (tick_end, tick_start) } else { (tick_start, tick_end) };
        Self {
            tick_start: s,
            tick_end: e,
            offset,
            transpose: transpose.clamp(-MAX_TRIGGER_TRANSPOSE, MAX_TRIGGER_TRANSPOSE),
            selected: false,
        }
    }

    /// Number of ticks covered.
    pub fn length(&self) -> Pulse {
        self.tick_end - self.tick_start + 1
    }

    pub fn is_valid(&self) -> bool {
        self.tick_end >= self.tick_start
    }

    pub fn covers(&self, tick: Pulse) -> bool {
        tick >= self.tick_start && tick <= self.tick_end
    }

    pub fn transposed(&self) -> bool {
        self.transpose != 0
    }

    /// Transposition as stored on disk: zero for none, otherwise biased
    /// by 0x40.
    pub fn transpose_byte(&self) -> u8 {
        if self.transpose == 0 {
            0
        } else {
            (self.transpose as i16 + TRANSPOSE_BIAS) as u8
        }
    }

    /// Inverse of [`Self::transpose_byte`]; out-of-range bytes mean none.
    pub fn transpose_from_byte(byte: u8) -> i8 {
        if byte > 0 && byte < 0x80 {
            (byte as i16 - TRANSPOSE_BIAS) as i8
        } else {
            0
        }
    }

    fn shift(&mut self, delta: Pulse, with_offset: bool) {
        self.tick_start += delta;
        self.tick_end += delta;
        if with_offset {
            self.offset += delta;
        }
    }
}

/// Where [`TriggerList::split`] cuts a trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplitPoint {
    /// Half-way through the trigger
    Middle,
    /// The requested tick rounded down to this snap
    Snap(Pulse),
    /// Exactly at the requested tick
    Exact,
}

/// Which edge [`TriggerList::move_selected`] changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grow {
    Start,
    End,
    Move,
}

/// Triggers of one pattern, ordered by start tick.
#[derive(Clone, Debug)]
pub struct TriggerList {
    triggers: Vec<Trigger>,
    /// Length of the pattern the triggers replay
    length: Pulse,
    clipboard: Option<Trigger>,
    undo: Deque<Vec<Trigger>, UNDO_DEPTH>,
    redo: Deque<Vec<Trigger>, UNDO_DEPTH>,
}

impl Default for TriggerList {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TriggerList {
    pub fn new(length: Pulse) -> Self {
        Self {
            triggers: Vec::new(),
            length,
            clipboard: None,
            undo: Deque::new(),
            redo: Deque::new(),
        }
    }

    pub fn length(&self) -> Pulse {
        self.length
    }

    pub fn set_length(&mut self, length: Pulse) {
        if length > 0 {
            self.length = length;
        }
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> + '_ {
        self.triggers.iter()
    }

    pub fn as_slice(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn get(&self, index: usize) -> Option<&Trigger> {
        self.triggers.get(index)
    }

    pub fn clear(&mut self) {
        self.triggers.clear();
    }

    fn sort(&mut self) {
        self.triggers.sort_by_key(|t| t.tick_start);
    }

    /// Wrap an offset into the pattern length.
    pub fn adjust_offset(&self, offset: Pulse) -> Pulse {
        pulse::wrap(offset, self.length).unwrap_or(offset)
    }

    /// Add a trigger as read from a file, without overlap handling.
    pub fn append(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
        self.sort();
    }

    /// Add a trigger of `len` ticks at `tick`. Triggers it covers are
    /// removed, partly overlapped ones are trimmed, and one that contains
    /// it is split around it.
    pub fn add(&mut self, tick: Pulse, len: Pulse, offset: Pulse, transpose: i8, adjust_offset: bool) -> bool {
        if len <= 0 || tick < 0 {
            return false;
        }
        let offset = if adjust_offset { self.adjust_offset(offset) } else { offset };
        let new = Trigger::new(tick, tick + len - 1, offset, transpose);
        let mut kept = Vec::with_capacity(self.triggers.len() + 2);
        for t in self.triggers.drain(..) {
            if t.tick_end < new.tick_start || t.tick_start > new.tick_end {
                kept.push(t);
            } else if t.tick_start >= new.tick_start && t.tick_end <= new.tick_end {
                trace!(start = t.tick_start, "trigger covered by new trigger");
            } else {
                if t.tick_start < new.tick_start {
                    kept.push(Trigger { tick_end: new.tick_start - 1, ..t });
                }
                if t.tick_end > new.tick_end {
                    kept.push(Trigger { tick_start: new.tick_end + 1, ..t });
                }
            }
        }
        kept.push(new);
        self.triggers = kept;
        self.sort();
        true
    }

    /// Index of the trigger covering `tick`.
    pub fn find_trigger(&self, tick: Pulse) -> Option<usize> {
        self.triggers.iter().position(|t| t.covers(tick))
    }

    /// True if a trigger covers `tick`.
    pub fn get_state(&self, tick: Pulse) -> bool {
        self.find_trigger(tick).is_some()
    }

    /// Bounds of the trigger covering `tick`.
    pub fn intersect(&self, tick: Pulse) -> Option<(Pulse, Pulse)> {
        self.find_trigger(tick).map(|i| (self.triggers[i].tick_start, self.triggers[i].tick_end))
    }

    /// Remove the trigger covering `tick`.
    pub fn remove(&mut self, tick: Pulse) -> bool {
        match self.find_trigger(tick) {
            Some(i) => {
                self.triggers.remove(i);
                true
            }
            None => false,
        }
    }

    /// Cut the trigger covering `tick` in two. Both halves keep the
    /// offset, so playback across the cut is unchanged.
    pub fn split(&mut self, tick: Pulse, point: SplitPoint) -> bool {
        let Some(i) = self.find_trigger(tick) else {
            return false;
        };
        let t = self.triggers[i];
        let at = match point {
            SplitPoint::Middle => t.tick_start + t.length() / 2,
            SplitPoint::Snap(snap) => pulse::snap_down(tick, snap),
            SplitPoint::Exact => tick,
        };
        if at <= t.tick_start || at > t.tick_end {
            return false;
        }
        self.triggers[i].tick_end = at - 1;
        self.triggers.insert(i + 1, Trigger { tick_start: at, selected: false, ..t });
        true
    }

    /// Extend the trigger covering `from` so that it also covers
    /// `[to, to + len - 1]`. The offset is unchanged, so content already
    /// inside the trigger keeps its place.
    pub fn grow_trigger(&mut self, from: Pulse, to: Pulse, len: Pulse) -> bool {
        let Some(i) = self.find_trigger(from) else {
            return false;
        };
        let t = &mut self.triggers[i];
        if to < t.tick_start {
            t.tick_start = to;
        } else if to + len - 1 > t.tick_end {
            t.tick_end = to + len - 1;
        } else {
            return false;
        }
        true
    }

    /// Set the transposition of the trigger covering `tick`.
    pub fn transpose(&mut self, tick: Pulse, semitones: i8) -> bool {
        match self.find_trigger(tick) {
            Some(i) => {
                self.triggers[i].transpose = semitones.clamp(-MAX_TRIGGER_TRANSPOSE, MAX_TRIGGER_TRANSPOSE);
                true
            }
            None => false,
        }
    }

    pub fn any_transposed(&self) -> bool {
        self.triggers.iter().any(Trigger::transposed)
    }

    // --- Selection ---

    pub fn select(&mut self, tick: Pulse) -> bool {
        self.set_selected(tick, true)
    }

    pub fn unselect(&mut self, tick: Pulse) -> bool {
        self.set_selected(tick, false)
    }

    fn set_selected(&mut self, tick: Pulse, value: bool) -> bool {
        match self.find_trigger(tick) {
            Some(i) => {
                self.triggers[i].selected = value;
                true
            }
            None => false,
        }
    }

    pub fn unselect_all(&mut self) {
        for t in &mut self.triggers {
            t.selected = false;
        }
    }

    pub fn number_selected(&self) -> usize {
        self.triggers.iter().filter(|t| t.selected).count()
    }

    pub fn remove_selected(&mut self) -> bool {
        let before = self.triggers.len();
        self.triggers.retain(|t| !t.selected);
        self.triggers.len() != before
    }

    /// Start of the first selected trigger.
    pub fn selected_start(&self) -> Option<Pulse> {
        self.triggers.iter().filter(|t| t.selected).map(|t| t.tick_start).min()
    }

    /// End of the last selected trigger.
    pub fn selected_end(&self) -> Option<Pulse> {
        self.triggers.iter().filter(|t| t.selected).map(|t| t.tick_end).max()
    }

    /// End tick of the last trigger.
    pub fn maximum(&self) -> Option<Pulse> {
        self.triggers.iter().map(|t| t.tick_end).max()
    }

    /// Remember the first selected trigger for [`Self::paste`].
    pub fn copy_selected(&mut self) -> bool {
        self.clipboard = self.triggers.iter().find(|t| t.selected).copied();
        self.clipboard.is_some()
    }

    /// Paste the copied trigger at `tick`, or right after the original
    /// when `tick` is `None`. The offset moves with the trigger so it
    /// replays the same content.
    pub fn paste(&mut self, tick: Option<Pulse>) -> bool {
        let Some(t) = self.clipboard else {
            return false;
        };
        let start = tick.unwrap_or(t.tick_end + 1);
        let delta = start - t.tick_start;
        let added = self.add(start, t.length(), t.offset + delta, t.transpose, true);
        if added && tick.is_none() {
            self.clipboard = Some(Trigger {
                tick_start: start,
                tick_end: start + t.length() - 1,
                offset: t.offset + delta,
                ..t
            });
        }
        added
    }

    /// Move or resize the selected trigger. With [`Grow::Move`] the
    /// trigger keeps its length and stops at its neighbours; with
    /// `adjust_offset` its content moves with it.
    pub fn move_selected(&mut self, tick: Pulse, adjust_offset: bool, which: Grow) -> bool {
        let Some(i) = self.triggers.iter().position(|t| t.selected) else {
            return false;
        };
        let min_start = if i > 0 { self.triggers[i - 1].tick_end + 1 } else { 0 };
        let max_end = self.triggers.get(i + 1).map(|n| n.tick_start - 1);
        let t = &mut self.triggers[i];
        match which {
            Grow::Start => {
                if tick >= t.tick_end || tick < min_start {
                    return false;
                }
                t.tick_start = tick;
            }
            Grow::End => {
                if tick <= t.tick_start || max_end.is_some_and(|m| tick > m) {
                    return false;
                }
                t.tick_end = tick;
            }
            Grow::Move => {
                let len = t.length();
                let mut start = tick.max(min_start);
                if let Some(m) = max_end {
                    start = start.min(m - len + 1);
                }
                if start < min_start || start == t.tick_start {
                    return false;
                }
                let delta = start - t.tick_start;
                t.shift(delta, adjust_offset);
            }
        }
        true
    }

    /// Insert (`insert == true`) or delete `distance` ticks of song time at
    /// `start`, splitting triggers that straddle the edit point.
    pub fn move_triggers(&mut self, start: Pulse, distance: Pulse, insert: bool) -> bool {
        if distance <= 0 || start < 0 {
            return false;
        }
        self.split(start, SplitPoint::Exact);
        if insert {
            for t in self.triggers.iter_mut().filter(|t| t.tick_start >= start) {
                t.shift(distance, true);
            }
        } else {
            let end = start + distance;
            self.split(end, SplitPoint::Exact);
            self.triggers.retain(|t| !(t.tick_start >= start && t.tick_end < end));
            for t in self.triggers.iter_mut().filter(|t| t.tick_start >= end) {
                t.shift(-distance, true);
            }
        }
        true
    }

    /// Duplicate the triggers in `[start, start + distance)` right after
    /// that range, pushing later triggers back.
    pub fn copy_range(&mut self, start: Pulse, distance: Pulse) -> bool {
        if distance <= 0 || start < 0 {
            return false;
        }
        let end = start + distance;
        self.split(start, SplitPoint::Exact);
        self.split(end, SplitPoint::Exact);
        let copies: Vec<Trigger> = self
            .triggers
            .iter()
            .filter(|t| t.tick_start >= start && t.tick_end < end)
            .map(|t| {
                let mut c = *t;
                c.shift(distance, true);
                c.selected = false;
                c
            })
            .collect();
        self.move_triggers(end, distance, true);
        self.triggers.extend(copies);
        self.sort();
        true
    }

    /// Bytes needed to store the list in a SeqSpec trigger block.
    pub fn datasize(&self, with_transpose: bool) -> usize {
        let per = if with_transpose { 13 } else { 12 };
        self.triggers.len() * per
    }

    /// Change the pattern length and rewrap every offset into it.
    pub fn adjust_offsets_to_length(&mut self, length: Pulse) {
        self.set_length(length);
        let len = self.length;
        for t in &mut self.triggers {
            t.offset = pulse::wrap(t.offset, len).unwrap_or(t.offset);
        }
    }

    /// Convert trigger ticks from one PPQN to another.
    pub fn rescale(&mut self, old_ppqn: u16, new_ppqn: u16) -> bool {
        if old_ppqn == 0 || new_ppqn == 0 || old_ppqn == new_ppqn {
            return false;
        }
        let (old, new) = (old_ppqn as Pulse, new_ppqn as Pulse);
        for t in &mut self.triggers {
            t.tick_start = t.tick_start * new / old;
            t.tick_end = (t.tick_end + 1) * new / old - 1;
            t.offset = t.offset * new / old;
        }
        self.length = self.length * new / old;
        true
    }

    // --- Undo ---

    /// Save the current triggers for [`Self::pop_undo`]. Clears the redo
    /// history; the oldest entry is dropped when the history is full.
    pub fn push_undo(&mut self) {
        push_bounded(&mut self.undo, self.triggers.clone());
        self.redo.clear();
    }

    pub fn pop_undo(&mut self) -> bool {
        match self.undo.pop_back() {
            Some(prev) => {
                let current = core::mem::replace(&mut self.triggers, prev);
                push_bounded(&mut self.redo, current);
                true
            }
            None => false,
        }
    }

    pub fn pop_redo(&mut self) -> bool {
        match self.redo.pop_back() {
            Some(next) => {
                let current = core::mem::replace(&mut self.triggers, next);
                push_bounded(&mut self.undo, current);
                true
            }
            None => false,
        }
    }
}

fn push_bounded(history: &mut Deque<Vec<Trigger>, UNDO_DEPTH>, entry: Vec<Trigger>) {
    if history.is_full() {
        history.pop_front();
    }
    let _ = history.push_back(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(list: &TriggerList) -> Vec<(Pulse, Pulse)> {
        list.iter().map(|t| (t.tick_start, t.tick_end)).collect()
    }

    #[test]
    fn transpose_byte_encoding() {
        let mut t = Trigger::new(0, 10, 0, 0);
        assert_eq!(t.transpose_byte(), 0);
        t.transpose = 5;
        assert_eq!(t.transpose_byte(), 0x45);
        t.transpose = -12;
        assert_eq!(t.transpose_byte(), 0x34);
        assert_eq!(Trigger::transpose_from_byte(0x45), 5);
        assert_eq!(Trigger::transpose_from_byte(0x34), -12);
        assert_eq!(Trigger::transpose_from_byte(0), 0);
        assert_eq!(Trigger::transpose_from_byte(0x90), 0);
        assert_eq!(Trigger::new(0, 1, 0, 100).transpose, 63);
    }

    #[test]
    fn add_trims_and_removes_overlaps() {
        let mut list = TriggerList::new(192);
        list.add(0, 100, 0, 0, true);
        list.add(200, 100, 0, 0, true);
        list.add(400, 50, 0, 0, true);
        list.add(50, 380, 0, 0, true);
        assert_eq!(spans(&list), vec![(0, 49), (50, 429), (430, 449)]);
    }

    #[test]
    fn add_inside_existing_splits_it() {
        let mut list = TriggerList::new(192);
        list.add(0, 400, 10, 0, true);
        list.add(100, 50, 0, 0, true);
        assert_eq!(spans(&list), vec![(0, 99), (100, 149), (150, 399)]);
        assert_eq!(list.get(2).unwrap().offset, 10);
    }

    #[test]
    fn add_wraps_offset() {
        let mut list = TriggerList::new(192);
        list.add(0, 10, 200, 0, true);
        assert_eq!(list.get(0).unwrap().offset, 8);
        list.add(20, 10, 200, 0, false);
        assert_eq!(list.get(1).unwrap().offset, 200);
        assert!(!list.add(0, 0, 0, 0, true));
    }

    #[test]
    fn split_policies() {
        let mut list = TriggerList::new(192);
        list.add(0, 384, 50, 3, true);
        assert!(list.split(10, SplitPoint::Middle));
        assert_eq!(spans(&list), vec![(0, 191), (192, 383)]);
        assert!(list.split(250, SplitPoint::Snap(48)));
        assert_eq!(spans(&list), vec![(0, 191), (192, 239), (240, 383)]);
        assert!(list.split(300, SplitPoint::Exact));
        assert!(list.iter().all(|t| t.offset == 50 && t.transpose == 3));
        assert!(!list.split(300, SplitPoint::Exact));
        assert!(!list.split(1000, SplitPoint::Exact));
    }

    #[test]
    fn grow_extends_either_edge() {
        let mut list = TriggerList::new(192);
        list.add(100, 100, 0, 0, true);
        assert!(list.grow_trigger(150, 50, 10));
        assert_eq!(spans(&list), vec![(50, 199)]);
        assert!(list.grow_trigger(150, 250, 10));
        assert_eq!(spans(&list), vec![(50, 259)]);
        assert!(!list.grow_trigger(150, 100, 10));
        assert!(!list.grow_trigger(10, 100, 10));
    }

    #[test]
    fn queries_and_selection() {
        let mut list = TriggerList::new(192);
        list.add(0, 100, 0, 0, true);
        list.add(200, 100, 0, 0, true);
        assert!(list.get_state(250));
        assert!(!list.get_state(150));
        assert_eq!(list.intersect(50), Some((0, 99)));
        assert!(list.select(250));
        assert_eq!(list.selected_start(), Some(200));
        assert_eq!(list.selected_end(), Some(299));
        assert_eq!(list.maximum(), Some(299));
        assert!(list.transpose(10, -5));
        assert!(list.any_transposed());
        assert!(list.remove_selected());
        assert_eq!(spans(&list), vec![(0, 99)]);
    }

    #[test]
    fn move_selected_stops_at_neighbours() {
        let mut list = TriggerList::new(192);
        list.add(0, 100, 0, 0, true);
        list.add(200, 100, 0, 0, true);
        list.add(500, 100, 0, 0, true);
        list.select(250);
        assert!(list.move_selected(450, true, Grow::Move));
        assert_eq!(spans(&list)[1], (400, 499));
        assert_eq!(list.get(1).unwrap().offset, 200);
        assert!(list.move_selected(150, true, Grow::Start));
        assert_eq!(spans(&list)[1], (150, 499));
        assert!(!list.move_selected(50, true, Grow::Start));
        assert!(!list.move_selected(550, true, Grow::End));
    }

    #[test]
    fn insert_and_delete_time() {
        let mut list = TriggerList::new(192);
        list.add(0, 200, 0, 0, true);
        list.add(300, 100, 0, 0, true);
        assert!(list.move_triggers(100, 50, true));
        assert_eq!(spans(&list), vec![(0, 99), (150, 249), (350, 449)]);
        assert_eq!(list.get(1).unwrap().offset, 50);
        assert!(list.move_triggers(100, 50, false));
        assert_eq!(spans(&list), vec![(0, 99), (100, 199), (300, 399)]);
        assert_eq!(list.get(1).unwrap().offset, 0);
    }

    #[test]
    fn copy_range_duplicates_after() {
        let mut list = TriggerList::new(192);
        list.add(0, 100, 0, 0, true);
        list.add(100, 100, 0, 0, true);
        assert!(list.copy_range(0, 100));
        assert_eq!(spans(&list), vec![(0, 99), (100, 199), (200, 299)]);
        assert_eq!(list.get(1).unwrap().offset, 100);
    }

    #[test]
    fn copy_and_paste_after_original() {
        let mut list = TriggerList::new(192);
        list.add(0, 96, 0, 0, true);
        list.select(0);
        assert!(list.copy_selected());
        assert!(list.paste(None));
        assert!(list.paste(None));
        assert_eq!(spans(&list), vec![(0, 95), (96, 191), (192, 287)]);
        assert_eq!(list.get(1).unwrap().offset, 96);
        assert_eq!(list.get(2).unwrap().offset, 0);
    }

    #[test]
    fn datasize_counts_transpose_byte() {
        let mut list = TriggerList::new(192);
        list.add(0, 96, 0, 0, true);
        list.add(96, 96, 0, 0, true);
        assert_eq!(list.datasize(false), 24);
        assert_eq!(list.datasize(true), 26);
    }

    #[test]
    fn rescale_and_offsets() {
        let mut list = TriggerList::new(192);
        list.add(0, 192, 100, 0, false);
        assert!(list.rescale(192, 96));
        assert_eq!(spans(&list), vec![(0, 95)]);
        assert_eq!(list.get(0).unwrap().offset, 50);
        list.adjust_offsets_to_length(32);
        assert_eq!(list.get(0).unwrap().offset, 18);
    }

    #[test]
    fn undo_and_redo() {
        let mut list = TriggerList::new(192);
        list.push_undo();
        list.add(0, 96, 0, 0, true);
        list.push_undo();
        list.add(96, 96, 0, 0, true);
        assert!(list.pop_undo());
        assert_eq!(list.len(), 1);
        assert!(list.pop_undo());
        assert!(list.is_empty());
        assert!(!list.pop_undo());
        assert!(list.pop_redo());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn undo_history_is_bounded() {
        let mut list = TriggerList::new(192);
        for i in 0..(UNDO_DEPTH as Pulse + 4) {
            list.push_undo();
            list.add(i * 10, 5, 0, 0, true);
        }
        let mut undone = 0;
        while list.pop_undo() {
            undone += 1;
        }
        assert_eq!(undone, UNDO_DEPTH);
    }
}
