//! SysEx packet framing.
//!
//! A message is either one `F0 <len> <data> F7` packet or, when split, an
//! `F0` packet followed by `F7`-prefixed continuation packets, the last of
//! which ends in `F7`. An `F7` packet that does not continue a message is
//! an escape: raw bytes with no framing. Only the framing state tells a
//! continuation from an escape, so the writer and the reader drive the
//! same state machine.

use sk_ir::status::{SYSEX, SYSEX_END};
use sk_ir::{Event, Pulse};
use thiserror::Error;

/// Framing state between packets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SysExState {
    #[default]
    Idle,
    /// Inside an `F0` packet, before its terminator has been checked
    InSingle,
    /// Between the packets of a split message
    InMulti,
}

/// What a packet turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    /// A whole message in one packet
    Complete,
    /// First packet of a split message
    Start,
    /// Middle packet of a split message
    Continuation,
    /// Last packet of a split message
    End,
    /// Raw bytes outside any message
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("new SysEx message started before the previous one ended")]
    Interrupted,
    #[error("packet status {0:#04x} is not a SysEx status")]
    BadStatus(u8),
    #[error("split message ended early")]
    Unterminated,
    #[error("continuation bytes do not add up to the message length")]
    LengthMismatch,
    #[error("message must start with F0 and end with F7")]
    NotAMessage,
}

/// The SysEx framing state machine.
#[derive(Clone, Debug, Default)]
pub struct SysExFramer {
    state: SysExState,
    /// Payload bytes seen in the current message
    accumulated: usize,
}

impl SysExFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SysExState {
        self.state
    }

    /// Payload bytes seen so far in the current message.
    pub fn accumulated(&self) -> usize {
        self.accumulated
    }

    /// Classify the next packet and advance.
    pub fn next(&mut self, status: u8, data: &[u8]) -> Result<PacketKind, FramingError> {
        let terminated = data.last() == Some(&SYSEX_END);
        match (self.state, status) {
            (SysExState::Idle, SYSEX) => {
                self.state = SysExState::InSingle;
                self.accumulated = data.len();
                if terminated {
                    self.state = SysExState::Idle;
                    Ok(PacketKind::Complete)
                } else {
                    self.state = SysExState::InMulti;
                    Ok(PacketKind::Start)
                }
            }
            (SysExState::Idle, SYSEX_END) => Ok(PacketKind::Escape),
            (SysExState::InMulti, SYSEX_END) => {
                self.accumulated += data.len();
                if terminated {
                    self.state = SysExState::Idle;
                    Ok(PacketKind::End)
                } else {
                    Ok(PacketKind::Continuation)
                }
            }
            (SysExState::InMulti | SysExState::InSingle, SYSEX) => {
                self.reset();
                Err(FramingError::Interrupted)
            }
            (_, other) => Err(FramingError::BadStatus(other)),
        }
    }

    /// Check that no split message is left open.
    pub fn finish(&mut self) -> Result<(), FramingError> {
        let open = self.state != SysExState::Idle;
        self.reset();
        if open {
            Err(FramingError::Unterminated)
        } else {
            Ok(())
        }
    }

    pub fn reset(&mut self) {
        self.state = SysExState::Idle;
        self.accumulated = 0;
    }
}

/// Split a complete `F0 ... F7` message into packets carrying at most
/// `chunk` bytes before the final `F7`, all at `timestamp`.
pub fn split_message(timestamp: Pulse, message: &[u8], chunk: usize) -> Result<Vec<Event>, FramingError> {
    let body = match message {
        [SYSEX, body @ .., SYSEX_END] => body,
        _ => return Err(FramingError::NotAMessage),
    };
    let chunk = chunk.max(1);
    let mut pieces: Vec<Vec<u8>> = body.chunks(chunk).map(<[u8]>::to_vec).collect();
    match pieces.last_mut() {
        Some(last) => last.push(SYSEX_END),
        None => pieces.push(vec![SYSEX_END]),
    }
    let mut framer = SysExFramer::new();
    let mut packets = Vec::with_capacity(pieces.len());
    for (i, data) in pieces.into_iter().enumerate() {
        let status = if i == 0 { SYSEX } else { SYSEX_END };
        framer.next(status, &data)?;
        packets.push(Event::sysex_packet(timestamp, status, data));
    }
    if framer.state() != SysExState::Idle {
        return Err(FramingError::Unterminated);
    }
    if framer.accumulated() != message.len() - 1 {
        return Err(FramingError::LengthMismatch);
    }
    Ok(packets)
}

/// Output of [`SysExAssembler::push`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assembled {
    /// A whole message, `F0 ... F7`
    Message(Vec<u8>),
    /// Raw escaped bytes
    Escape(Vec<u8>),
}

/// Rebuilds whole messages from packets on import.
#[derive(Clone, Debug, Default)]
pub struct SysExAssembler {
    framer: SysExFramer,
    buffer: Vec<u8>,
}

impl SysExAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_progress(&self) -> bool {
        self.framer.state() != SysExState::Idle
    }

    /// Feed one packet. Returns a result once a message or escape is
    /// complete; a framing error discards the partial message.
    pub fn push(&mut self, status: u8, data: &[u8]) -> Result<Option<Assembled>, FramingError> {
        let kind = match self.framer.next(status, data) {
            Ok(kind) => kind,
            Err(e) => {
                self.buffer.clear();
                return Err(e);
            }
        };
        match kind {
            PacketKind::Escape => Ok(Some(Assembled::Escape(data.to_vec()))),
            PacketKind::Complete => {
                let mut message = Vec::with_capacity(data.len() + 1);
                message.push(SYSEX);
                message.extend_from_slice(data);
                Ok(Some(Assembled::Message(message)))
            }
            PacketKind::Start => {
                self.buffer.clear();
                self.buffer.push(SYSEX);
                self.buffer.extend_from_slice(data);
                Ok(None)
            }
            PacketKind::Continuation => {
                self.buffer.extend_from_slice(data);
                Ok(None)
            }
            PacketKind::End => {
                self.buffer.extend_from_slice(data);
                Ok(Some(Assembled::Message(std::mem::take(&mut self.buffer))))
            }
        }
    }

    /// Drop any partial message; errors if one was open.
    pub fn finish(&mut self) -> Result<(), FramingError> {
        self.buffer.clear();
        self.framer.finish()
    }
}
