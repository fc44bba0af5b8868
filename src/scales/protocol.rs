//! Acaia frame codec: checksum, outbound encoding and the reassembling
//! notification decoder.
//!
//! Structure of every frame, checksums calculated over the payload:
//!
//! ```text
//! ---------------------------------------------------------------
//! |  0xEF  |  0xDD  |  0x00 |  0x00   | ....... | 0x00   | 0x00
//! ---------------------------------------------------------------
//! |     Header      |  Mesg |      Payload      |    Checksum
//! |  byte1 |  byte2 |  Type | Length  |   Data  | even    | odd
//! ---------------------------------------------------------------
//! ```
//!
//! The checksum is a pair of independent mod-256 sums over even- and
//! odd-indexed payload bytes, not a CRC. Notifications fragment frames at
//! arbitrary boundaries, so decoding runs over a growing reassembly buffer.

use crate::types::WeightUnit;
use log::{debug, warn};

pub const HEADER1: u8 = 0xEF;
pub const HEADER2: u8 = 0xDD;

/// Two magic bytes plus the message type byte.
pub const HEADER_LEN: usize = 3;
pub const CHECKSUM_LEN: usize = 2;
/// Header + checksum + at least one payload byte.
pub const MIN_FRAME_LEN: usize = HEADER_LEN + 1 + CHECKSUM_LEN;

/// Longest payload this codec ever sends (the 15-byte identify blob plus an
/// event length prefix).
pub const MAX_PAYLOAD_LEN: usize = 16;
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN + CHECKSUM_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    System = 0x00,
    Tare = 0x04,
    Handshake = 0x06,
    Info = 0x07,
    Status = 0x08,
    Identify = 0x0B,
    Event = 0x0C,
}

impl MessageType {
    fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(MessageType::System),
            0x04 => Some(MessageType::Tare),
            0x06 => Some(MessageType::Handshake),
            0x07 => Some(MessageType::Info),
            0x08 => Some(MessageType::Status),
            0x0B => Some(MessageType::Identify),
            0x0C => Some(MessageType::Event),
            _ => None,
        }
    }
}

// Event subtypes carried inside MessageType::Event payloads.
const EVENT_WEIGHT: u8 = 0x05;
const EVENT_BATTERY: u8 = 0x06;
const EVENT_TIMER: u8 = 0x07;
const EVENT_KEY: u8 = 0x08;
const EVENT_ACK: u8 = 0x0B;

// Unit codes carried in status frames.
const UNIT_GRAMS: u8 = 2;
const UNIT_OUNCES: u8 = 5;

/// One semantic event decoded from a validated frame.
///
/// `Battery`, `Timer` and `Key` are informational: the scale reports them
/// but nothing in the connection logic depends on them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleEvent {
    /// Weight in grams, signed, scaling already applied.
    Weight(f32),
    Battery(u8),
    /// Timer reading in seconds.
    Timer(f32),
    Key(u8),
    Status { battery: u8, unit: WeightUnit },
    /// Info frame: the remote session is desynchronized and the connection
    /// should be rebuilt.
    SessionDesync,
    Unrecognized(u8),
}

/// Independent mod-256 sums over even- and odd-indexed payload bytes.
pub fn checksum(payload: &[u8]) -> (u8, u8) {
    let mut even: u8 = 0;
    let mut odd: u8 = 0;
    for (i, byte) in payload.iter().enumerate() {
        if i % 2 == 0 {
            even = even.wrapping_add(*byte);
        } else {
            odd = odd.wrapping_add(*byte);
        }
    }
    (even, odd)
}

/// Assemble a complete outbound frame around `payload`.
pub fn encode_message(msg_type: MessageType, payload: &[u8]) -> heapless::Vec<u8, MAX_FRAME_LEN> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
    let mut frame = heapless::Vec::new();
    let _ = frame.push(HEADER1);
    let _ = frame.push(HEADER2);
    let _ = frame.push(msg_type as u8);
    let _ = frame.extend_from_slice(payload);
    let (even, odd) = checksum(payload);
    let _ = frame.push(even);
    let _ = frame.push(odd);
    frame
}

/// Event frames carry their payload length (including the length byte
/// itself) as the first payload byte.
pub fn encode_event(payload: &[u8]) -> heapless::Vec<u8, MAX_FRAME_LEN> {
    debug_assert!(payload.len() < MAX_PAYLOAD_LEN);
    let mut body: heapless::Vec<u8, MAX_PAYLOAD_LEN> = heapless::Vec::new();
    let _ = body.push(payload.len() as u8 + 1);
    let _ = body.extend_from_slice(payload);
    encode_message(MessageType::Event, &body)
}

/// Reassembles notification fragments into frames and decodes them.
///
/// A frame is only dispatched once its declared length is fully buffered and
/// its checksum matches; short data is held, a corrupt frame is dropped in
/// isolation. Never dispatches a partial frame.
#[derive(Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partially assembled frame, e.g. across a reconnect.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Append a notification chunk and decode every complete frame in the
    /// buffer.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ScaleEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        loop {
            self.discard_junk();
            if self.buffer.len() < MIN_FRAME_LEN {
                break;
            }

            // Declared payload length (the byte at offset 3) fixes the full
            // frame length; wait for the rest if it is not all here yet.
            let frame_len = HEADER_LEN + self.buffer[3] as usize + CHECKSUM_LEN;
            if self.buffer.len() < frame_len {
                break;
            }

            let payload_end = frame_len - CHECKSUM_LEN;
            let (even, odd) = checksum(&self.buffer[HEADER_LEN..payload_end]);
            if even != self.buffer[frame_len - 2] || odd != self.buffer[frame_len - 1] {
                warn!(
                    "Checksum failed: calc[{:02X} {:02X}] but actual[{:02X} {:02X}]. Discarding frame.",
                    even, odd,
                    self.buffer[frame_len - 2],
                    self.buffer[frame_len - 1]
                );
                // Drop exactly this frame's bytes and resume on the rest.
                self.buffer.drain(..frame_len);
                continue;
            }

            if let Some(event) =
                decode_frame(self.buffer[2], &self.buffer[HEADER_LEN..payload_end])
            {
                events.push(event);
            }
            self.buffer.drain(..frame_len);
        }
        events
    }

    /// Discard leading bytes that cannot start a frame, so the buffer head
    /// is always empty or a candidate frame. A lone trailing `0xEF` is kept
    /// in case its partner byte arrives with the next chunk.
    fn discard_junk(&mut self) {
        match self
            .buffer
            .windows(2)
            .position(|pair| pair == [HEADER1, HEADER2])
        {
            Some(0) => {}
            Some(start) => {
                self.buffer.drain(..start);
            }
            None => {
                if self.buffer.last() == Some(&HEADER1) {
                    let junk = self.buffer.len() - 1;
                    self.buffer.drain(..junk);
                } else {
                    self.buffer.clear();
                }
            }
        }
    }
}

fn decode_frame(raw_type: u8, payload: &[u8]) -> Option<ScaleEvent> {
    match MessageType::from_raw(raw_type) {
        Some(MessageType::Event) => decode_event(payload),
        Some(MessageType::Status) => decode_status(payload),
        Some(MessageType::Info) => {
            debug!("Got info frame: {:02X?}", payload);
            Some(ScaleEvent::SessionDesync)
        }
        _ => {
            debug!("Unknown message type {:02X}: {:02X?}", raw_type, payload);
            Some(ScaleEvent::Unrecognized(raw_type))
        }
    }
}

/// Payload layout: `[length, event subtype, data...]`.
fn decode_event(payload: &[u8]) -> Option<ScaleEvent> {
    if payload.len() < 2 {
        warn!("Event payload too short: {:02X?}", payload);
        return None;
    }
    match payload[1] {
        EVENT_WEIGHT => decode_weight(payload.get(2..8)?).map(ScaleEvent::Weight),
        EVENT_BATTERY => payload.get(2).map(|level| ScaleEvent::Battery(level & 0x7F)),
        EVENT_TIMER => decode_time(payload.get(2..5)?).map(ScaleEvent::Timer),
        EVENT_KEY => payload.get(2).copied().map(ScaleEvent::Key),
        EVENT_ACK => None,
        other => {
            warn!("Unknown event subtype {:02X}: {:02X?}", other, payload);
            None
        }
    }
}

/// Six-byte weight encoding: little-endian magnitude, a scaling exponent at
/// offset 4 (divide by 10^n, n in 1..=4) and a sign bit in the trailing
/// flags byte. The sign is applied after scaling.
fn decode_weight(data: &[u8]) -> Option<f32> {
    let magnitude = u16::from_le_bytes([data[0], data[1]]) as f32;
    let divisor = match data[4] {
        1 => 10.0,
        2 => 100.0,
        3 => 1_000.0,
        4 => 10_000.0,
        scaling => {
            warn!("Invalid scaling {:02X} - {:02X?}", scaling, data);
            return None;
        }
    };
    let mut value = magnitude / divisor;
    if data[5] & 0x02 != 0 {
        value = -value;
    }
    Some(value)
}

fn decode_time(data: &[u8]) -> Option<f32> {
    Some(data[0] as f32 * 60.0 + data[1] as f32 + data[2] as f32 / 10.0)
}

/// Payload layout: `[length, battery, unit code, ...]`. The remaining bytes
/// exist on the wire (auto-off, beep flag) but carry no contract.
fn decode_status(payload: &[u8]) -> Option<ScaleEvent> {
    if payload.len() < 3 {
        warn!("Status payload too short: {:02X?}", payload);
        return None;
    }
    let battery = payload[1] & 0x7F;
    let unit = match payload[2] {
        UNIT_GRAMS => WeightUnit::Grams,
        UNIT_OUNCES => WeightUnit::Ounces,
        _ => WeightUnit::Unrecognized,
    };
    Some(ScaleEvent::Status { battery, unit })
}
