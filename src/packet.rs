//! DMR packet data model and the 53-byte "DMRD" wire codec, plus recognition
//! of the protocol's other fixed-length control frames.

use crate::error::{Error, Result};

/// Raw payload length carried by every DMR-data frame.
pub const PAYLOAD_BYTES: usize = 33;
/// Total length of a DMR-data ("DMRD") datagram on the wire.
pub const FRAME_BYTES: usize = 20 + PAYLOAD_BYTES;

const MAGIC_DMRD: &[u8; 4] = b"DMRD";
const MAGIC_MSTACK: &[u8; 6] = b"MSTACK";
const MAGIC_MSTNAK: &[u8; 6] = b"MSTNAK";
const MAGIC_MSTPING: &[u8; 7] = b"MSTPING";
const MAGIC_MSTCL: &[u8; 5] = b"MSTCL";
const MAGIC_RPTL: &[u8; 4] = b"RPTL";
const MAGIC_RPTK: &[u8; 4] = b"RPTK";
const MAGIC_RPTPONG: &[u8; 7] = b"RPTPONG";
const MAGIC_RPTCL: &[u8; 5] = b"RPTCL";
const MAGIC_RPTSBKN: &[u8; 7] = b"RPTSBKN";
const MAGIC_RPTRSSI: &[u8; 7] = b"RPTRSSI";

/// Timeslot a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeslot {
    One = 0,
    Two = 1,
}

impl Timeslot {
    fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Timeslot::One
        } else {
            Timeslot::Two
        }
    }

    fn bit(self) -> u8 {
        self as u8
    }
}

/// Call-type / flow-control bit carried in byte 15 bit 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flco {
    GroupCall = 0,
    PrivateCall = 1,
}

impl Flco {
    fn from_bit(bit: u8) -> Self {
        if bit & 1 == 0 {
            Flco::GroupCall
        } else {
            Flco::PrivateCall
        }
    }

    fn bit(self) -> u8 {
        self as u8
    }
}

/// What kind of content byte 15's upper nibble carries. The frame-kind bits
/// (byte 15, bits 2..3) select between a voice-frame index and a data-type
/// enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Voice,
    VoiceSync,
    VoiceLc,
    Data,
    /// Any other 4-bit data_type value seen when frame-kind bits are 0b10.
    Other(u8),
}

impl DataType {
    fn kind_bits(self) -> u8 {
        match self {
            DataType::Voice => 0b00,
            DataType::VoiceSync => 0b01,
            DataType::VoiceLc | DataType::Data | DataType::Other(_) => 0b10,
        }
    }

    fn data_type_nibble(self) -> u8 {
        match self {
            DataType::VoiceLc => 0,
            DataType::Data => 1,
            DataType::Other(v) => v & 0x0f,
            DataType::Voice | DataType::VoiceSync => 0,
        }
    }

    fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0 => DataType::VoiceLc,
            1 => DataType::Data,
            v => DataType::Other(v),
        }
    }
}

/// Per-frame metadata that doesn't belong to the addressing triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Meta {
    pub sequence: u8,
    /// Voice-frame index 0..15 (named A..P in logs), meaningful only for
    /// `DataType::Voice`.
    pub voice_frame: u8,
    pub stream_id: u32,
}

/// A decoded (or about-to-be-encoded) DMR-data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub src_id: u32,
    pub dst_id: u32,
    pub repeater_id: u32,
    pub timeslot: Timeslot,
    pub flco: Flco,
    pub data_type: DataType,
    pub meta: Meta,
    pub payload: [u8; PAYLOAD_BYTES],
}

impl Packet {
    /// Decode a 53-byte "DMRD" datagram. Returns `DecodeFailure` for anything
    /// that isn't recognized as a data frame by [`frame_type`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if frame_type(bytes) != FrameType::DmrData {
            return Err(Error::DecodeFailure(format!(
                "not a DMRD frame ({} bytes)",
                bytes.len()
            )));
        }

        let sequence = bytes[4];
        let src_id = u32::from(bytes[5]) << 16 | u32::from(bytes[6]) << 8 | u32::from(bytes[7]);
        let dst_id = u32::from(bytes[8]) << 16 | u32::from(bytes[9]) << 8 | u32::from(bytes[10]);
        let repeater_id = u32::from(bytes[11]) << 24
            | u32::from(bytes[12]) << 16
            | u32::from(bytes[13]) << 8
            | u32::from(bytes[14]);
        let flags = bytes[15];
        let timeslot = Timeslot::from_bit(flags & 0x01);
        let flco = Flco::from_bit((flags & 0x02) >> 1);
        let kind = (flags & 0x0c) >> 2;
        let (data_type, voice_frame) = match kind {
            0b00 => (DataType::Voice, (flags & 0xf0) >> 4),
            0b01 => (DataType::VoiceSync, 0),
            _ => (DataType::from_nibble((flags & 0xf0) >> 4), 0),
        };
        let stream_id = u32::from(bytes[16]) << 24
            | u32::from(bytes[17]) << 16
            | u32::from(bytes[18]) << 8
            | u32::from(bytes[19]);
        let mut payload = [0u8; PAYLOAD_BYTES];
        payload.copy_from_slice(&bytes[20..FRAME_BYTES]);

        Ok(Packet {
            src_id,
            dst_id,
            repeater_id,
            timeslot,
            flco,
            data_type,
            meta: Meta {
                sequence,
                voice_frame,
                stream_id,
            },
            payload,
        })
    }

    /// Encode this packet as a 53-byte "DMRD" datagram, using `stream_id` as
    /// the value to place in bytes 16..19 (the caller/session is responsible
    /// for minting a fresh one at burst start, per the transmit invariant).
    pub fn encode(&self, stream_id: u32) -> [u8; FRAME_BYTES] {
        let mut buf = [0u8; FRAME_BYTES];
        buf[0..4].copy_from_slice(MAGIC_DMRD);
        buf[4] = self.meta.sequence;
        buf[5] = (self.src_id >> 16) as u8;
        buf[6] = (self.src_id >> 8) as u8;
        buf[7] = self.src_id as u8;
        buf[8] = (self.dst_id >> 16) as u8;
        buf[9] = (self.dst_id >> 8) as u8;
        buf[10] = self.dst_id as u8;
        buf[11] = (self.repeater_id >> 24) as u8;
        buf[12] = (self.repeater_id >> 16) as u8;
        buf[13] = (self.repeater_id >> 8) as u8;
        buf[14] = self.repeater_id as u8;

        let mut flags = self.timeslot.bit() | (self.flco.bit() << 1);
        flags |= self.data_type.kind_bits() << 2;
        let upper = match self.data_type {
            DataType::Voice => self.meta.voice_frame & 0x0f,
            DataType::VoiceSync => 0,
            _ => self.data_type.data_type_nibble(),
        };
        flags |= upper << 4;
        buf[15] = flags;

        buf[16] = (stream_id >> 24) as u8;
        buf[17] = (stream_id >> 16) as u8;
        buf[18] = (stream_id >> 8) as u8;
        buf[19] = stream_id as u8;
        buf[20..FRAME_BYTES].copy_from_slice(&self.payload);
        buf
    }

    /// Whether this packet starts a new burst (fresh stream_id must be
    /// minted): sequence 0 on a VOICE_LC or DATA frame.
    pub fn starts_burst(&self) -> bool {
        matches!(self.data_type, DataType::VoiceLc | DataType::Data) && self.meta.sequence == 0
    }
}

/// Render a voice_frame index (0..15) as a letter 'A'..'P', the conventional
/// trace-log rendering for DMR voice frames. Out-of-range indices (can't
/// occur from `decode`, but this is also reachable from hand-built packets)
/// clamp to 'P'.
pub fn voice_frame_letter(voice_frame: u8) -> char {
    (b'A' + voice_frame.min(15)) as char
}

/// The recognized frame shapes, identified purely by length + magic prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    DmrData,
    MasterAck,
    MasterAckNonce,
    MasterNak,
    MasterPing,
    MasterClosing,
    RepeaterLogin,
    RepeaterKey,
    RepeaterPong,
    RepeaterClosing,
    RepeaterBeacon,
    RepeaterRssi,
    Unknown,
}

/// Classify a received datagram by exact length and magic prefix. Matches
/// none of the known shapes -> `Unknown`.
pub fn frame_type(bytes: &[u8]) -> FrameType {
    match bytes.len() {
        12 if bytes.starts_with(MAGIC_RPTL) => FrameType::RepeaterLogin,
        13 if bytes.starts_with(MAGIC_MSTCL) => FrameType::MasterClosing,
        13 if bytes.starts_with(MAGIC_RPTCL) => FrameType::RepeaterClosing,
        14 if bytes.starts_with(MAGIC_MSTACK) => FrameType::MasterAck,
        14 if bytes.starts_with(MAGIC_MSTNAK) => FrameType::MasterNak,
        15 if bytes.starts_with(MAGIC_MSTPING) => FrameType::MasterPing,
        15 if bytes.starts_with(MAGIC_RPTPONG) => FrameType::RepeaterPong,
        15 if bytes.starts_with(MAGIC_RPTSBKN) => FrameType::RepeaterBeacon,
        22 if bytes.starts_with(MAGIC_MSTACK) => FrameType::MasterAckNonce,
        23 if bytes.starts_with(MAGIC_RPTRSSI) => FrameType::RepeaterRssi,
        53 if bytes.starts_with(MAGIC_DMRD) => FrameType::DmrData,
        76 if bytes.starts_with(MAGIC_RPTK) => FrameType::RepeaterKey,
        _ => FrameType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn voice_frame_letter_spans_a_to_p() {
        assert_eq!(voice_frame_letter(0), 'A');
        assert_eq!(voice_frame_letter(15), 'P');
        assert_eq!(voice_frame_letter(255), 'P');
    }

    #[test]
    fn frame_type_dispatch_is_injective_on_known_shapes() {
        assert_eq!(frame_type(b"RPTL12345678"), FrameType::RepeaterLogin);
        assert_eq!(frame_type(b"MSTCL12345678"), FrameType::MasterClosing);
        assert_eq!(frame_type(b"RPTCL12345678"), FrameType::RepeaterClosing);
        assert_eq!(frame_type(b"MSTACK12345678"), FrameType::MasterAck);
        assert_eq!(frame_type(b"MSTNAK12345678"), FrameType::MasterNak);
        assert_eq!(frame_type(b"MSTPING1234567"), FrameType::MasterPing);
        assert_eq!(frame_type(b"RPTPONG1234567"), FrameType::RepeaterPong);
        assert_eq!(frame_type(b"RPTSBKN1234567"), FrameType::RepeaterBeacon);
        assert_eq!(frame_type(b"MSTACK1234567890123456"), FrameType::MasterAckNonce);
        assert_eq!(frame_type(b"RPTRSSI12345678901234567"), FrameType::RepeaterRssi);
        assert_eq!(frame_type(&[0u8; 53]), FrameType::Unknown);
        let mut dmrd = [0u8; 53];
        dmrd[0..4].copy_from_slice(b"DMRD");
        assert_eq!(frame_type(&dmrd), FrameType::DmrData);
    }

    #[test]
    fn frame_type_unknown_for_unmatched_length() {
        assert_eq!(frame_type(b"x"), FrameType::Unknown);
        assert_eq!(frame_type(b""), FrameType::Unknown);
    }

    #[test]
    fn decode_voice_frame_scenario() {
        let mut bytes = vec![
            0x44, 0x4d, 0x52, 0x44, 0x05, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x14, 0x00, 0x00, 0x07,
            0xb9, 0x03, 0xde, 0xad, 0xbe, 0xef,
        ];
        bytes.extend_from_slice(&[0u8; PAYLOAD_BYTES]);
        let packet = Packet::decode(&bytes).unwrap();
        assert_eq!(packet.src_id, 10);
        assert_eq!(packet.dst_id, 20);
        assert_eq!(packet.repeater_id, 0x000007b9);
        assert_eq!(packet.timeslot, Timeslot::Two);
        assert_eq!(packet.flco, Flco::PrivateCall);
        assert_eq!(packet.data_type, DataType::Voice);
        assert_eq!(packet.meta.voice_frame, 0);
        assert_eq!(packet.meta.stream_id, 0xdead_beef);
        assert_eq!(packet.meta.sequence, 5);
    }

    #[test]
    fn encode_decode_round_trips_voice_lc() {
        let packet = Packet {
            src_id: 0x0102_03 & 0xff_ffff,
            dst_id: 99,
            repeater_id: 0x1234_5678,
            timeslot: Timeslot::One,
            flco: Flco::GroupCall,
            data_type: DataType::VoiceLc,
            meta: Meta {
                sequence: 0,
                voice_frame: 0,
                stream_id: 0,
            },
            payload: [7u8; PAYLOAD_BYTES],
        };
        assert!(packet.starts_burst());
        let wire = packet.encode(0xcafe_babe);
        assert_eq!(wire.len(), FRAME_BYTES);
        let decoded = Packet::decode(&wire).unwrap();
        assert_eq!(decoded.src_id, packet.src_id);
        assert_eq!(decoded.dst_id, packet.dst_id);
        assert_eq!(decoded.repeater_id, packet.repeater_id);
        assert_eq!(decoded.data_type, DataType::VoiceLc);
        assert_eq!(decoded.meta.stream_id, 0xcafe_babe);
        assert_eq!(decoded.payload, packet.payload);
    }

    #[test]
    fn voice_sync_clears_upper_nibble() {
        let packet = Packet {
            src_id: 1,
            dst_id: 2,
            repeater_id: 3,
            timeslot: Timeslot::Two,
            flco: Flco::GroupCall,
            data_type: DataType::VoiceSync,
            meta: Meta {
                sequence: 1,
                voice_frame: 0,
                stream_id: 0,
            },
            payload: [0u8; PAYLOAD_BYTES],
        };
        let wire = packet.encode(42);
        assert_eq!(wire[15] & 0x0c, 0x04);
        assert_eq!(wire[15] & 0xf0, 0);
    }
}
