//! Track export: one pattern to the bytes of one `MTrk` chunk.
//!
//! Regular export writes the pattern once, followed by its triggers and
//! metadata as SeqSpec blocks. Song export replays the pattern through
//! every trigger and writes the flattened result.

use sk_ir::status::{meta, META, NOTE_COUNT};
use sk_ir::{Event, EventKind, EventList, Pulse, TrackView, Trigger};
use tracing::{debug, error};

use crate::seqspec::{self, put_seqspec, SeqSpec};
use crate::sysex::SysExFramer;
use crate::varint::{put_u16_be, put_u32_be, put_varint, MAX_VARINT};
use crate::ExportError;

/// Switches for track export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    /// Write triggers and metadata as SeqSpec blocks
    pub seqspec: bool,
    /// Always use the triggers-with-offset tag, dropping transposition
    pub legacy_triggers: bool,
    /// Key, scale and background sequence are song-wide; skip them per track
    pub global_key_scale: bool,
    /// Song export writes the sequence number and track name
    pub standalone: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            seqspec: true,
            legacy_triggers: false,
            global_key_scale: false,
            standalone: true,
        }
    }
}

/// The bytes of one track chunk and the tick length they cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackBytes {
    pub data: Vec<u8>,
    pub length: Pulse,
}

/// Accumulates one track. Deltas are computed against the timestamp of
/// the last event written.
pub struct TrackWriter<'a> {
    view: TrackView<'a>,
    options: WriterOptions,
    out: Vec<u8>,
    prev: Pulse,
    framer: SysExFramer,
}

impl<'a> TrackWriter<'a> {
    pub fn new(view: TrackView<'a>, options: WriterOptions) -> Self {
        Self {
            view,
            options,
            out: Vec::new(),
            prev: 0,
            framer: SysExFramer::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    /// Regular export of the pattern.
    pub fn fill(mut self) -> Result<TrackBytes, ExportError> {
        let mut events = self.view.events.clone();
        events.sort();
        if self.options.seqspec {
            self.put_seq_number();
        }
        self.put_track_name();
        self.put_events(events.iter())?;
        if self.options.seqspec {
            self.put_trigger_block();
            self.put_proprietary();
        }
        let length = self.view.length();
        self.put_end_of_track(length)?;
        debug!(track = %self.view.info.name, bytes = self.out.len(), "exported track");
        Ok(TrackBytes { data: self.out, length })
    }

    /// Song export: the pattern replayed through every trigger.
    pub fn song_fill(mut self) -> Result<TrackBytes, ExportError> {
        self.view.song_exportable()?;
        let len = self.view.length();
        if len <= 0 {
            return Err(ExportError::ZeroLength);
        }
        if self.options.standalone {
            self.put_seq_number();
            self.put_track_name();
        }
        let mut events = self.view.events.clone();
        events.sort();
        let triggers = self.view.triggers;
        for trigger in triggers.iter() {
            self.song_fill_trigger(&events, trigger, len)?;
        }
        let last_end = triggers.maximum().unwrap_or(0);
        let measure = self.view.info.measures_to_ticks();
        let mut end = last_end;
        if measure > 0 {
            let rem = end % measure;
            if rem != measure - 1 {
                end += measure - rem - 1;
            }
        }
        if self.options.seqspec {
            let flattened = Trigger::new(0, last_end, 0, 0);
            seqspec::put_triggers(&mut self.out, SeqSpec::TriggersEx, &[flattened]);
            self.put_proprietary();
        }
        self.put_end_of_track(end)?;
        debug!(track = %self.view.info.name, bytes = self.out.len(), end, "exported song track");
        Ok(TrackBytes { data: self.out, length: end })
    }

    /// Replay the pattern through one trigger.
    ///
    /// Each pass shifts the pattern by one more length. Note-ons after the
    /// trigger end are skipped. Note-offs are written only for notes this
    /// trigger opened and are clipped to its end; aftertouch past the end
    /// is kept the same way while its note sounds. Other events at or after
    /// the end are dropped.
    fn song_fill_trigger(&mut self, events: &EventList, trigger: &Trigger, len: Pulse) -> Result<(), ExportError> {
        let trig_offset = trigger.offset.rem_euclid(len);
        let start_offset = trigger.tick_start.rem_euclid(len);
        let mut time_offset = trigger.tick_start + trig_offset - start_offset;
        if trig_offset > start_offset {
            time_offset -= len;
        }
        let times_played = 1 + (trigger.length() - 1) / len;
        let mut open = [0u32; NOTE_COUNT];
        for _ in 0..=times_played {
            for e in events.iter() {
                let mut ev = e.clone();
                ev.timestamp += time_offset;
                if ev.timestamp < trigger.tick_start {
                    continue;
                }
                let note = ev.note().unwrap_or(0) as usize;
                if trigger.transposed() {
                    ev.transpose_note(trigger.transpose as i32);
                }
                if ev.is_note_on() {
                    if ev.timestamp > trigger.tick_end {
                        continue;
                    }
                    open[note] += 1;
                } else if ev.is_note_off() {
                    if open[note] == 0 {
                        continue;
                    }
                    open[note] -= 1;
                    ev.timestamp = ev.timestamp.min(trigger.tick_end);
                } else if ev.is_note() {
                    if ev.timestamp >= trigger.tick_end {
                        if open[note] == 0 {
                            continue;
                        }
                        ev.timestamp = trigger.tick_end;
                    }
                } else if ev.timestamp >= trigger.tick_end {
                    continue;
                }
                self.put_event(&ev)?;
            }
            time_offset += len;
        }
        Ok(())
    }

    // --- Primitives ---

    /// `FF 00 02 <seq number>`.
    pub fn put_seq_number(&mut self) {
        self.out.extend_from_slice(&[0, META, meta::SEQ_NUMBER, 2]);
        put_u16_be(&mut self.out, self.view.info.seq_number);
    }

    /// `FF 03 <len> <name>`.
    pub fn put_track_name(&mut self) {
        let name = self.view.info.name.as_bytes();
        self.out.extend_from_slice(&[0, META, meta::TRACK_NAME]);
        put_varint(&mut self.out, name.len() as u32);
        self.out.extend_from_slice(name);
    }

    pub fn put_events<'e>(&mut self, events: impl IntoIterator<Item = &'e Event>) -> Result<(), ExportError> {
        for e in events {
            self.put_event(e)?;
        }
        Ok(())
    }

    /// Write one event with its delta time. An event earlier than the
    /// previous one aborts the export. End-of-track metas in the list are
    /// skipped; the writer adds its own. Sequencer-specific metas are
    /// skipped too when SeqSpec output is off.
    pub fn put_event(&mut self, event: &Event) -> Result<(), ExportError> {
        if !self.options.seqspec && event.meta_type() == Some(meta::SEQSPEC) {
            return Ok(());
        }
        let delta = event.timestamp - self.prev;
        if delta < 0 {
            error!(track = %self.view.info.name, tick = event.timestamp, delta, "negative delta time, aborting export");
            return Err(ExportError::NegativeDelta { tick: event.timestamp, delta });
        }
        if delta > MAX_VARINT as Pulse {
            return Err(ExportError::DeltaOverflow(delta));
        }
        match &event.kind {
            EventKind::Channel(m) => {
                put_varint(&mut self.out, delta as u32);
                self.out.push(m.status.code() | self.view.info.resolve_channel(m.channel));
                self.out.push(m.data[0]);
                if m.status.data_len() == 2 {
                    self.out.push(m.data[1]);
                }
            }
            EventKind::Meta(m) => {
                if m.meta_type == meta::END_OF_TRACK {
                    return Ok(());
                }
                put_varint(&mut self.out, delta as u32);
                self.out.extend_from_slice(&[META, m.meta_type]);
                put_varint(&mut self.out, m.data.len() as u32);
                self.out.extend_from_slice(&m.data);
            }
            EventKind::SysEx(s) => {
                self.framer.next(s.status, &s.data)?;
                put_varint(&mut self.out, delta as u32);
                self.out.push(s.status);
                put_varint(&mut self.out, s.data.len() as u32);
                self.out.extend_from_slice(&s.data);
            }
        }
        self.prev = event.timestamp;
        Ok(())
    }

    /// The trigger list, tagged once for the whole track: with
    /// transposition if any trigger is transposed.
    pub fn put_trigger_block(&mut self) {
        let triggers = self.view.triggers;
        if triggers.is_empty() {
            return;
        }
        let tag = if triggers.any_transposed() && !self.options.legacy_triggers {
            SeqSpec::TrigTranspose
        } else {
            SeqSpec::TriggersEx
        };
        seqspec::put_triggers(&mut self.out, tag, triggers.as_slice());
    }

    /// Track metadata. Each field is written only when it differs from
    /// its default.
    pub fn put_proprietary(&mut self) {
        let info = self.view.info;
        let defaults = sk_ir::TrackInfo::default();
        let out = &mut self.out;
        if info.buss != defaults.buss {
            put_seqspec(out, SeqSpec::MidiBus, 1);
            out.push(info.buss);
        }
        if (info.beats_per_bar, info.beat_width) != (defaults.beats_per_bar, defaults.beat_width) {
            put_seqspec(out, SeqSpec::TimeSig, 2);
            out.push(info.beats_per_bar);
            out.push(info.beat_width);
        }
        if info.channel != defaults.channel {
            put_seqspec(out, SeqSpec::MidiChannel, 1);
            out.push(info.channel_byte());
        }
        if !self.options.global_key_scale {
            if info.key != defaults.key {
                put_seqspec(out, SeqSpec::MusicKey, 1);
                out.push(info.key);
            }
            if info.scale != defaults.scale {
                put_seqspec(out, SeqSpec::MusicScale, 1);
                out.push(info.scale);
            }
            if let Some(background) = info.background {
                put_seqspec(out, SeqSpec::BackSequence, 4);
                put_u32_be(out, background);
            }
        }
        if info.transposable != defaults.transposable {
            put_seqspec(out, SeqSpec::Transpose, 1);
            out.push(info.transposable as u8);
        }
        if let Some(color) = info.color {
            put_seqspec(out, SeqSpec::SeqColor, 1);
            out.push(color);
        }
        if info.edit_mode != defaults.edit_mode {
            put_seqspec(out, SeqSpec::SeqEditMode, 1);
            out.push(info.edit_mode.to_byte());
        }
        if info.loop_count != defaults.loop_count {
            put_seqspec(out, SeqSpec::SeqLoopCount, 2);
            put_u16_be(out, info.loop_count);
        }
    }

    /// `FF 2F 00` at `length`, or right after the last event if that is
    /// later. Fails if a split SysEx message is still open.
    pub fn put_end_of_track(&mut self, length: Pulse) -> Result<(), ExportError> {
        self.framer.finish()?;
        let delta = (length - self.prev).max(0);
        if delta > MAX_VARINT as Pulse {
            return Err(ExportError::DeltaOverflow(delta));
        }
        put_varint(&mut self.out, delta as u32);
        self.out.extend_from_slice(&[META, meta::END_OF_TRACK, 0]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_ir::{EventList, Sequence};

    fn no_seqspec() -> WriterOptions {
        WriterOptions {
            seqspec: false,
            ..WriterOptions::default()
        }
    }

    #[test]
    fn regular_export_bytes() {
        let mut seq = Sequence::new("A", 1);
        seq.info.channel = Some(2);
        seq.events.add(Event::note_off(96, 0, 60, 0));
        seq.events.add(Event::note_on(0, 0, 60, 100));
        let bytes = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap();
        assert_eq!(
            bytes.data,
            vec![
                0x00, 0xFF, 0x03, 0x01, b'A', // name
                0x00, 0x92, 60, 100, // note on, pattern channel
                0x60, 0x82, 60, 0, // note off after 96 ticks
                0x85, 0x20, 0xFF, 0x2F, 0x00, // end of track at 768
            ]
        );
        assert_eq!(bytes.length, 768);
    }

    #[test]
    fn free_channel_keeps_event_channel() {
        let mut seq = Sequence::new("", 1);
        seq.info.channel = None;
        seq.events.add(Event::program_change(0, 9, 5));
        let bytes = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap();
        assert_eq!(&bytes.data[4..7], &[0x00, 0xC9, 5]);
    }

    #[test]
    fn meta_events_keep_their_bytes() {
        let mut seq = Sequence::new("", 1);
        seq.events.add(Event::tempo(0, 120.0));
        let bytes = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap();
        assert_eq!(&bytes.data[4..11], &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    }

    #[test]
    fn unsorted_events_abort() {
        let seq = Sequence::new("x", 1);
        let mut w = TrackWriter::new(seq.view(), no_seqspec());
        let events = [Event::note_on(50, 0, 60, 100), Event::note_off(10, 0, 60, 0)];
        let err = w.put_events(events.iter()).unwrap_err();
        assert_eq!(err, ExportError::NegativeDelta { tick: 10, delta: -40 });
        assert!(err.is_corruption());
    }

    #[test]
    fn end_of_track_never_goes_back() {
        let mut seq = Sequence::new("", 1);
        seq.events.add(Event::control_change(800, 0, 7, 1));
        let bytes = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap();
        assert_eq!(&bytes.data[bytes.data.len() - 4..], &[0x00, 0xFF, 0x2F, 0x00]);
    }

    #[test]
    fn open_split_sysex_fails_export() {
        let mut seq = Sequence::new("", 1);
        seq.events.add(Event::sysex_packet(0, 0xF0, vec![0x43, 0x12]));
        let err = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap_err();
        assert!(matches!(err, ExportError::SysExFraming(_)));
    }

    #[test]
    fn defaults_write_no_metadata() {
        let seq = Sequence::new("", 1);
        let bytes = TrackWriter::new(seq.view(), WriterOptions::default()).fill().unwrap();
        // seq number, empty name, end of track
        assert_eq!(bytes.data.len(), 6 + 4 + 5);
    }

    #[test]
    fn trigger_tag_is_chosen_per_track() {
        let mut seq = Sequence::new("", 1);
        seq.triggers.add(0, 768, 0, 0, true);
        seq.triggers.add(768, 768, 0, 2, true);
        let data = TrackWriter::new(seq.view(), WriterOptions::default()).fill().unwrap().data;
        let tag = SeqSpec::TrigTranspose.tag().to_be_bytes();
        assert!(data.windows(4).any(|w| w == tag));
        let legacy = WriterOptions {
            legacy_triggers: true,
            ..WriterOptions::default()
        };
        let data = TrackWriter::new(seq.view(), legacy).fill().unwrap().data;
        let tag = SeqSpec::TriggersEx.tag().to_be_bytes();
        assert!(data.windows(4).any(|w| w == tag));
    }

    #[test]
    fn song_export_requires_triggers() {
        let mut seq = Sequence::new("", 1);
        let err = TrackWriter::new(seq.view(), WriterOptions::default()).song_fill().unwrap_err();
        assert_eq!(err, ExportError::NotExportable(sk_ir::NotExportable::NoTriggers));
        assert!(!err.is_corruption());
        seq.triggers.add(0, 10, 0, 0, true);
        seq.info.muted = true;
        let err = TrackWriter::new(seq.view(), WriterOptions::default()).song_fill().unwrap_err();
        assert_eq!(err, ExportError::NotExportable(sk_ir::NotExportable::Muted));
    }

    #[test]
    fn song_export_applies_trigger_transpose() {
        let mut seq = Sequence::new("", 1);
        seq.add_note(0, 96, 60, 100);
        seq.triggers.add(0, 768, 0, 5, true);
        let options = WriterOptions {
            seqspec: false,
            standalone: false,
            ..WriterOptions::default()
        };
        let bytes = TrackWriter::new(seq.view(), options).song_fill().unwrap();
        assert_eq!(&bytes.data[..4], &[0x00, 0x90, 65, 100]);
        assert_eq!(bytes.length, 767);
    }

    #[test]
    fn sorted_twice_exports_identically() {
        let mut list = EventList::with_length(192);
        for (t, n) in [(48, 62), (0, 60), (48, 60), (96, 64)] {
            list.add(Event::note_on(t, 0, n, 90));
            list.add(Event::note_off(t + 40, 0, n, 0));
        }
        let mut seq = Sequence::new("", 1);
        seq.events = list;
        seq.events.sort();
        let once = TrackWriter::new(seq.view(), WriterOptions::default()).fill().unwrap();
        seq.events.sort();
        let twice = TrackWriter::new(seq.view(), WriterOptions::default()).fill().unwrap();
        assert_eq!(once, twice);
    }

    fn has_tag(data: &[u8], tag: SeqSpec) -> bool {
        data.windows(4).any(|w| w == tag.tag().to_be_bytes())
    }

    #[test]
    fn global_key_scale_leaves_out_track_key() {
        let mut seq = Sequence::new("", 1);
        seq.info.key = 5;
        seq.info.scale = 2;
        seq.info.background = Some(3);
        seq.info.color = Some(1);
        let data = TrackWriter::new(seq.view(), WriterOptions::default()).fill().unwrap().data;
        assert!(has_tag(&data, SeqSpec::MusicKey));
        assert!(has_tag(&data, SeqSpec::MusicScale));
        assert!(has_tag(&data, SeqSpec::BackSequence));

        let global = WriterOptions {
            global_key_scale: true,
            ..WriterOptions::default()
        };
        let data = TrackWriter::new(seq.view(), global).fill().unwrap().data;
        assert!(!has_tag(&data, SeqSpec::MusicKey));
        assert!(!has_tag(&data, SeqSpec::MusicScale));
        assert!(!has_tag(&data, SeqSpec::BackSequence));
        assert!(has_tag(&data, SeqSpec::SeqColor));
    }

    #[test]
    fn song_export_of_zero_length_pattern_fails() {
        let mut seq = Sequence::default();
        assert_eq!(seq.length(), 0);
        seq.events.add(Event::note_on(0, 0, 60, 100));
        seq.triggers.append(Trigger::new(0, 191, 0, 0));
        let err = TrackWriter::new(seq.view(), WriterOptions::default()).song_fill().unwrap_err();
        assert_eq!(err, ExportError::ZeroLength);
        assert!(err.is_corruption());
    }

    #[test]
    fn delta_past_28_bits_fails() {
        let mut seq = Sequence::new("", 1);
        seq.events.add(Event::note_on(0x1000_0000, 0, 60, 100));
        let err = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap_err();
        assert_eq!(err, ExportError::DeltaOverflow(0x1000_0000));

        let mut seq = Sequence::new("", 1);
        seq.events.add(Event::note_on(MAX_VARINT as Pulse, 0, 60, 100));
        assert!(TrackWriter::new(seq.view(), no_seqspec()).fill().is_ok());
    }

    #[test]
    fn sequencer_metas_follow_seqspec_switch() {
        let mut seq = Sequence::new("", 1);
        seq.events.add(Event::meta(0, meta::SEQSPEC, vec![0x00, 0x20, 0x29, 0x01]));
        seq.events.add(Event::meta(0, meta::TEXT, b"hi".to_vec()));
        let plain = TrackWriter::new(seq.view(), no_seqspec()).fill().unwrap().data;
        assert!(!plain.windows(2).any(|w| w == [META, meta::SEQSPEC]));
        assert!(plain.windows(2).any(|w| w == [META, meta::TEXT]));

        let data = TrackWriter::new(seq.view(), WriterOptions::default()).fill().unwrap().data;
        assert!(data.windows(3).any(|w| w == [META, meta::SEQSPEC, 4]));
    }
}
