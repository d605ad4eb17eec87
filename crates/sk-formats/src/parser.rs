//! Track chunk decoding.
//!
//! [`parse_track`] walks the bytes of one `MTrk` chunk and hands every
//! decoded item to an [`EventSink`]. A corrupt event is dropped; when the
//! reader can no longer tell where the next event starts, the rest of the
//! chunk is skipped and the report says so.

use sk_ir::status::{meta, ChannelStatus, DATA_MAX, META, SYSEX, SYSEX_END};
use sk_ir::{Event, Pulse, Sequence};
use tracing::{debug, warn};

use crate::reader::ByteReader;
use crate::seqspec::{apply_track_seqspec, SeqSpec, TAG_PREFIX};
use crate::sysex::{Assembled, SysExAssembler};
use crate::FormatError;

/// Receives what the parser decodes from one track.
pub trait EventSink {
    /// A channel, meta or SysEx event, in file order.
    fn event(&mut self, event: Event);

    fn track_name(&mut self, _name: &str) {}

    fn seq_number(&mut self, _number: u16) {}

    /// A SeqSpec block with a known tag. Returns `Ok(false)` if the tag
    /// carries nothing for this sink.
    fn seqspec(&mut self, _tag: SeqSpec, _payload: &[u8]) -> Result<bool, FormatError> {
        Ok(false)
    }

    /// The end-of-track meta event, or the end of the chunk if it had none.
    fn end_of_track(&mut self, _tick: Pulse) {}

    /// Output channel taken from the channel events of a track that has no
    /// channel block: the one channel used, or `None` if it mixes channels.
    fn track_channel(&mut self, _channel: Option<u8>) {}

    /// Called once after the whole chunk has been read.
    fn finish(&mut self, _link_wrap: bool) {}
}

impl EventSink for Sequence {
    fn event(&mut self, event: Event) {
        self.events.append(event);
    }

    fn track_name(&mut self, name: &str) {
        self.info.name = name.to_string();
    }

    fn seq_number(&mut self, number: u16) {
        self.info.seq_number = number;
    }

    fn seqspec(&mut self, tag: SeqSpec, payload: &[u8]) -> Result<bool, FormatError> {
        apply_track_seqspec(tag, payload, &mut self.info, &mut self.triggers)
    }

    fn track_channel(&mut self, channel: Option<u8>) {
        self.info.channel = channel;
    }

    fn end_of_track(&mut self, tick: Pulse) {
        if tick > 0 {
            self.set_length(tick);
        } else if self.length() <= 0 {
            let measure = self.info.measures_to_ticks();
            self.set_length(measure);
        }
    }

    fn finish(&mut self, link_wrap: bool) {
        let length = self.length();
        let removed = self.events.verify_and_link(length, link_wrap);
        if removed > 0 {
            debug!(track = %self.info.name, removed, "dropped events outside the pattern");
        }
        self.events.scan_meta_events();
    }
}

/// Switches for track import.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    /// Link note-offs at the start of the pattern to note-ons left open at
    /// its end
    pub link_wrap: bool,
    /// After a SysEx or meta event, let a data byte fall back to the last
    /// channel status instead of dropping it
    pub recover_running_status: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            link_wrap: false,
            recover_running_status: true,
        }
    }
}

/// What happened while reading one track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseReport {
    /// Events delivered to the sink
    pub events: usize,
    /// Events or packets dropped as corrupt
    pub dropped: usize,
    /// SeqSpec blocks with a tag this parser does not know
    pub unknown_tags: usize,
    /// The chunk ended without an end-of-track event, or the rest of it
    /// was skipped
    pub truncated: bool,
}

/// A track decoded into a fresh [`Sequence`].
#[derive(Clone, Debug)]
pub struct ParsedTrack {
    pub sequence: Sequence,
    pub report: ParseReport,
}

impl ParsedTrack {
    pub fn parse(data: &[u8], options: ParseOptions) -> Self {
        let mut sequence = Sequence::default();
        let report = parse_track(data, &mut sequence, options);
        Self { sequence, report }
    }
}

/// Decode one track chunk into `sink`.
pub fn parse_track<S: EventSink + ?Sized>(data: &[u8], sink: &mut S, options: ParseOptions) -> ParseReport {
    let mut parser = TrackParser {
        r: ByteReader::new(data),
        sink,
        options,
        report: ParseReport::default(),
        time: 0,
        running: None,
        last_running: None,
        sysex: SysExAssembler::new(),
        sysex_tick: 0,
        channels: ChannelsSeen::None,
        channel_block: false,
    };
    parser.run();
    parser.report
}

enum Step {
    Continue,
    End,
}

/// Channels used by the channel events of a track.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ChannelsSeen {
    None,
    One(u8),
    Mixed,
}

impl ChannelsSeen {
    fn add(self, channel: u8) -> Self {
        match self {
            Self::None => Self::One(channel),
            Self::One(c) if c == channel => self,
            _ => Self::Mixed,
        }
    }
}

struct TrackParser<'a, 'b, S: EventSink + ?Sized> {
    r: ByteReader<'a>,
    sink: &'b mut S,
    options: ParseOptions,
    report: ParseReport,
    time: Pulse,
    /// Status in force for running-status data bytes
    running: Option<u8>,
    /// Last channel status seen, kept across SysEx
    last_running: Option<u8>,
    sysex: SysExAssembler,
    /// Tick of the first packet of the message being assembled
    sysex_tick: Pulse,
    channels: ChannelsSeen,
    /// A channel SeqSpec block was applied
    channel_block: bool,
}

impl<S: EventSink + ?Sized> TrackParser<'_, '_, S> {
    fn run(&mut self) {
        let mut ended = false;
        while !self.r.is_empty() {
            match self.next_event() {
                Ok(Step::Continue) => {}
                Ok(Step::End) => {
                    ended = true;
                    break;
                }
                Err(e) => {
                    warn!(offset = self.r.position(), error = %e, "corrupt event, skipping rest of track");
                    self.report.dropped += 1;
                    self.report.truncated = true;
                    break;
                }
            }
        }
        if self.sysex.finish().is_err() {
            warn!("track ended inside a split SysEx message");
            self.report.dropped += 1;
        }
        if !ended {
            if !self.report.truncated {
                warn!(tick = self.time, "track has no end-of-track event");
            }
            self.report.truncated = true;
            self.sink.end_of_track(self.time);
        }
        if !self.channel_block {
            match self.channels {
                ChannelsSeen::None => {}
                ChannelsSeen::One(c) => self.sink.track_channel(Some(c)),
                ChannelsSeen::Mixed => self.sink.track_channel(None),
            }
        }
        self.sink.finish(self.options.link_wrap);
    }

    fn emit(&mut self, event: Event) {
        self.report.events += 1;
        self.sink.event(event);
    }

    fn next_event(&mut self) -> Result<Step, FormatError> {
        let delta = self.r.read_varint()?;
        self.time += delta as Pulse;
        let byte = self.r.peek_u8()?;
        let status = if byte & 0x80 != 0 {
            self.r.skip(1)?;
            if byte < SYSEX {
                self.running = Some(byte);
                self.last_running = Some(byte);
            } else if byte <= SYSEX_END {
                self.running = None;
            }
            byte
        } else if let Some(status) = self.running {
            status
        } else if let Some(status) = self.last_running.filter(|_| self.options.recover_running_status) {
            self.running = Some(status);
            status
        } else {
            debug!(offset = self.r.position(), byte, "data byte without running status, dropped");
            self.r.skip(1)?;
            self.report.dropped += 1;
            return Ok(Step::Continue);
        };

        if let Some(kind) = ChannelStatus::from_status(status) {
            self.channel_event(kind, status & 0x0F)?;
            return Ok(Step::Continue);
        }
        match status {
            META => self.meta_event(),
            SYSEX | SYSEX_END => {
                self.sysex_packet(status)?;
                Ok(Step::Continue)
            }
            other => {
                debug!(tick = self.time, status = other, "system message in track, dropped");
                self.report.dropped += 1;
                Ok(Step::Continue)
            }
        }
    }

    fn data_byte(&mut self) -> Result<u8, FormatError> {
        let b = self.r.read_u8()?;
        if b > DATA_MAX {
            return Err(FormatError::UnexpectedStatus(b));
        }
        Ok(b)
    }

    fn channel_event(&mut self, kind: ChannelStatus, channel: u8) -> Result<(), FormatError> {
        let d0 = self.data_byte()?;
        let d1 = if kind.data_len() == 2 { self.data_byte()? } else { 0 };
        let kind = if kind == ChannelStatus::NoteOn && d1 == 0 {
            ChannelStatus::NoteOff
        } else {
            kind
        };
        self.channels = self.channels.add(channel);
        self.emit(Event::channel(self.time, kind, channel, d0, d1));
        Ok(())
    }

    fn meta_event(&mut self) -> Result<Step, FormatError> {
        let meta_type = self.r.read_u8()?;
        let length = self.r.read_varint()? as usize;
        let remaining = self.r.remaining();
        if length > remaining {
            return Err(FormatError::MetaOverflow { length, remaining });
        }
        let data = self.r.read_bytes(length)?;
        match meta_type {
            meta::END_OF_TRACK => {
                self.sink.end_of_track(self.time);
                return Ok(Step::End);
            }
            meta::SEQ_NUMBER if data.len() == 2 => {
                self.sink.seq_number(u16::from_be_bytes([data[0], data[1]]));
            }
            meta::SEQ_NUMBER => {}
            meta::TRACK_NAME => {
                self.sink.track_name(&String::from_utf8_lossy(data));
            }
            meta::SEQSPEC if data.len() >= 4 => {
                let tag = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                if tag & 0xFFFF_0000 == TAG_PREFIX {
                    self.seqspec(tag, &data[4..]);
                } else {
                    self.emit(Event::meta(self.time, meta_type, data.to_vec()));
                }
            }
            _ => self.emit(Event::meta(self.time, meta_type, data.to_vec())),
        }
        Ok(Step::Continue)
    }

    fn seqspec(&mut self, tag: u32, payload: &[u8]) {
        let Some(spec) = SeqSpec::from_tag(tag) else {
            warn!(tag, "unknown SeqSpec tag, skipped");
            self.report.unknown_tags += 1;
            return;
        };
        match self.sink.seqspec(spec, payload) {
            Ok(true) => self.channel_block |= spec == SeqSpec::MidiChannel,
            Ok(false) => debug!(?spec, "SeqSpec block ignored"),
            Err(e) => {
                warn!(?spec, error = %e, "malformed SeqSpec block, skipped");
                self.report.dropped += 1;
            }
        }
    }

    fn sysex_packet(&mut self, status: u8) -> Result<(), FormatError> {
        let length = self.r.read_varint()? as usize;
        let data = self.r.read_bytes(length)?;
        if !self.sysex.in_progress() {
            self.sysex_tick = self.time;
        }
        match self.sysex.push(status, data) {
            Ok(Some(Assembled::Message(message))) => {
                self.emit(Event::sysex(self.sysex_tick, &message));
            }
            Ok(Some(Assembled::Escape(bytes))) => {
                self.emit(Event::sysex_packet(self.time, SYSEX_END, bytes));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(tick = self.time, error = %e, "SysEx packet dropped");
                self.report.dropped += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_ir::EventKind;

    fn parse(data: &[u8]) -> ParsedTrack {
        ParsedTrack::parse(data, ParseOptions::default())
    }

    #[test]
    fn running_status_and_zero_velocity() {
        let data = [
            0x00, 0x93, 60, 100, // note on, channel 3
            0x60, 60, 0, // running status, velocity 0
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let track = parse(&data);
        assert_eq!(track.report.events, 2);
        assert!(!track.report.truncated);
        let events: Vec<&Event> = track.sequence.events.iter().collect();
        assert!(events[0].is_note_on());
        assert_eq!(events[0].channel_number(), Some(3));
        assert!(events[1].is_note_off());
        assert_eq!(events[1].timestamp, 96);
        assert!(events[0].is_linked());
        assert_eq!(track.sequence.length(), 96);
    }

    #[test]
    fn name_and_number_go_to_the_sink() {
        let data = [
            0x00, 0xFF, 0x00, 0x02, 0x00, 0x07, // sequence number 7
            0x00, 0xFF, 0x03, 0x03, b'B', b'a', b's', // name
            0x83, 0x00, 0xFF, 0x2F, 0x00, // end at 384
        ];
        let track = parse(&data);
        assert_eq!(track.sequence.info.seq_number, 7);
        assert_eq!(track.sequence.info.name, "Bas");
        assert_eq!(track.sequence.length(), 384);
        assert!(track.sequence.events.is_empty());
    }

    #[test]
    fn tempo_meta_is_kept() {
        let data = [0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, 0x00, 0xFF, 0x2F, 0x00];
        let track = parse(&data);
        assert!(track.sequence.events.has_tempo());
        let e = track.sequence.events.iter().next().unwrap();
        assert_eq!(e.tempo_bpm(), Some(120.0));
    }

    #[test]
    fn unknown_seqspec_tag_is_skipped() {
        let data = [
            0x00, 0xFF, 0x7F, 0x05, 0x24, 0x24, 0x00, 0x99, 0x01, // unknown
            0x00, 0xFF, 0x7F, 0x05, 0x24, 0x24, 0x00, 0x11, 0x05, // key 5
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let track = parse(&data);
        assert_eq!(track.report.unknown_tags, 1);
        assert_eq!(track.sequence.info.key, 5);
    }

    #[test]
    fn split_sysex_is_reassembled() {
        let data = [
            0x00, 0xF0, 0x03, 0x43, 0x12, 0x00, // start
            0x10, 0xF7, 0x04, 0x43, 0x12, 0x00, 0xF7, // end
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let track = parse(&data);
        assert_eq!(track.report.events, 1);
        let e = track.sequence.events.iter().next().unwrap();
        assert_eq!(e.timestamp, 0);
        match &e.kind {
            EventKind::SysEx(s) => {
                assert_eq!(s.status, 0xF0);
                assert_eq!(s.data, vec![0x43, 0x12, 0x00, 0x43, 0x12, 0x00, 0xF7]);
            }
            other => panic!("expected SysEx, got {other:?}"),
        }
    }

    #[test]
    fn running_status_recovers_after_sysex() {
        let data = [
            0x00, 0x90, 60, 100, // note on
            0x00, 0xF0, 0x02, 0x01, 0xF7, // sysex clears running status
            0x10, 60, 0, // data byte
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let track = parse(&data);
        assert_eq!(track.report.events, 3);
        assert_eq!(track.report.dropped, 0);
        let strict = ParsedTrack::parse(
            &data,
            ParseOptions {
                recover_running_status: false,
                ..ParseOptions::default()
            },
        );
        assert!(strict.report.dropped > 0);
    }

    #[test]
    fn meta_overflow_truncates_track() {
        let data = [0x00, 0x90, 60, 100, 0x00, 0xFF, 0x01, 0x10, b'x'];
        let track = parse(&data);
        assert!(track.report.truncated);
        assert_eq!(track.report.dropped, 1);
        assert_eq!(track.report.events, 1);
    }

    #[test]
    fn missing_end_of_track_still_finishes() {
        let data = [0x00, 0x90, 60, 100, 0x40, 0x80, 60, 0];
        let track = parse(&data);
        assert!(track.report.truncated);
        assert_eq!(track.sequence.length(), 64);
        assert_eq!(track.sequence.events.len(), 2);
    }

    #[test]
    fn system_messages_are_dropped() {
        let data = [0x00, 0xF8, 0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00];
        let track = parse(&data);
        assert_eq!(track.report.dropped, 1);
        assert_eq!(track.report.events, 1);
        assert!(!track.report.truncated);
    }

    #[test]
    fn status_byte_inside_event_truncates_track() {
        let data = [0x00, 0x90, 60, 0x90, 0x00, 0xFF, 0x2F, 0x00];
        let track = parse(&data);
        assert!(track.report.truncated);
        assert_eq!(track.report.events, 0);
    }

    #[test]
    fn track_without_channel_events_keeps_default_channel() {
        let track = parse(&[0x00, 0xFF, 0x01, 0x01, b'x', 0x00, 0xFF, 0x2F, 0x00]);
        assert_eq!(track.sequence.info.channel, Some(0));
        let track = parse(&[0x00, 0xC5, 0x03, 0x00, 0xFF, 0x2F, 0x00]);
        assert_eq!(track.sequence.info.channel, Some(5));
    }
}
