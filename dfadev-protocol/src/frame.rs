//! Binary frame format for DCP.
//!
//! Frame layout (16 bytes header + payload):
//!
//! ```text
//! +--------+---------+--------+-------------+--------+
//! | magic  | version | flags  | payload_len | crc32c |
//! | 4 bytes| 2 bytes |2 bytes |   4 bytes   | 4 bytes|
//! +--------+---------+--------+-------------+--------+
//! | payload (payload_len bytes)                      |
//! +--------------------------------------------------+
//! ```
//!
//! All integers are big-endian. The checksum covers the payload only and is
//! zero when `CRC_PRESENT` is clear.

use crate::error::ProtocolError;
use crate::{MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic bytes identifying DCP frames: "DFAX"
pub const MAGIC: [u8; 4] = *b"DFAX";

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// Payload checksum is present.
    pub const CRC_PRESENT: u16 = 1 << 0;

    const KNOWN: u16 = Self::CRC_PRESENT;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_crc(self) -> Self {
        Self(self.0 | Self::CRC_PRESENT)
    }

    pub fn has_crc(&self) -> bool {
        self.0 & Self::CRC_PRESENT != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    /// Parses a flags word, rejecting bits this version does not define.
    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        match bits & !Self::KNOWN {
            0 => Ok(Self(bits)),
            _ => Err(ProtocolError::InvalidFlags(bits)),
        }
    }
}

/// Fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    version: u16,
    flags: FrameFlags,
    payload_len: usize,
    crc: u32,
}

impl Header {
    /// Parses and validates a header. Nothing about the payload is checked.
    fn parse(raw: &[u8; FRAME_HEADER_SIZE]) -> Result<Self, ProtocolError> {
        let mut cursor = &raw[..];

        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = cursor.get_u16();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let flags = FrameFlags::from_bits(cursor.get_u16())?;
        let payload_len = check_len(cursor.get_u32() as usize)?;
        let crc = cursor.get_u32();

        Ok(Self {
            version,
            flags,
            payload_len,
            crc,
        })
    }

    fn write(&self, buf: &mut BytesMut) {
        buf.put_slice(&MAGIC);
        buf.put_u16(self.version);
        buf.put_u16(self.flags.bits());
        buf.put_u32(self.payload_len as u32);
        buf.put_u32(self.crc);
    }
}

fn check_len(len: usize) -> Result<usize, ProtocolError> {
    if len > MAX_PAYLOAD_SIZE as usize {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(len)
}

/// A parsed DCP frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Protocol version.
    pub version: u16,
    /// Frame flags.
    pub flags: FrameFlags,
    /// Frame payload (JSON data).
    pub payload: Bytes,
}

impl Frame {
    /// Creates a checksummed frame for the current protocol version.
    pub fn new(payload: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            flags: FrameFlags::new().with_crc(),
            payload,
        }
    }

    /// Creates a frame whose payload is the JSON encoding of `value`.
    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, ProtocolError> {
        Ok(Self::new(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let header = Header {
            version: self.version,
            flags: self.flags,
            payload_len: check_len(self.payload.len())?,
            crc: if self.flags.has_crc() {
                crc32c::crc32c(&self.payload)
            } else {
                0
            },
        };

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        header.write(&mut buf);
        buf.put_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched until a whole frame is
    /// buffered. A bad header is reported as soon as its 16 bytes arrive.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        let Some(raw) = buf.first_chunk::<FRAME_HEADER_SIZE>() else {
            return Ok(None);
        };
        let header = Header::parse(raw)?;

        if buf.len() < FRAME_HEADER_SIZE + header.payload_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.payload_len).freeze();

        if header.flags.has_crc() {
            let actual = crc32c::crc32c(&payload);
            if actual != header.crc {
                return Err(ProtocolError::CrcMismatch {
                    expected: header.crc,
                    actual,
                });
            }
        }

        Ok(Some(Self {
            version: header.version,
            flags: header.flags,
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(version: u16, flags: u16, len: u32, crc: u32) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u16(version);
        buf.put_u16(flags);
        buf.put_u32(len);
        buf.put_u32(crc);
        buf
    }

    #[test]
    fn test_encode_layout() {
        let payload = Bytes::from_static(br#"{"op":"PING"}"#);
        let encoded = Frame::new(payload.clone()).encode().unwrap();

        assert_eq!(&encoded[0..4], b"DFAX");
        assert_eq!(&encoded[4..6], &PROTOCOL_VERSION.to_be_bytes());
        assert_eq!(&encoded[6..8], &FrameFlags::CRC_PRESENT.to_be_bytes());
        assert_eq!(&encoded[8..12], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&encoded[12..16], &crc32c::crc32c(&payload).to_be_bytes());
        assert_eq!(&encoded[16..], &payload[..]);
    }

    #[test]
    fn test_decode_consumes_one_frame() {
        let payload = Bytes::from_static(br#"{"type":"request","id":"1","op":"READ"}"#);
        let mut buf = Frame::new(payload.clone()).encode().unwrap();

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.version, PROTOCOL_VERSION);
        assert!(decoded.flags.has_crc());
        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_corrupted_payload() {
        let mut encoded = Frame::new(Bytes::from_static(br#"{"op":"WRITE"}"#))
            .encode()
            .unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;

        assert!(matches!(
            Frame::decode(&mut encoded),
            Err(ProtocolError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_checksum_ignored_without_flag() {
        let mut buf = header_bytes(PROTOCOL_VERSION, 0, 2, 0xdead_beef);
        buf.put_slice(b"{}");

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(!decoded.flags.has_crc());
        assert_eq!(&decoded.payload[..], b"{}");
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = header_bytes(PROTOCOL_VERSION, 0, 0, 0);
        buf[0] = b'R';
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::InvalidMagic([b'R', b'F', b'A', b'X']))
        ));
    }

    #[test]
    fn test_needs_more_data() {
        let encoded = Frame::new(Bytes::from_static(br#"{"id":"1"}"#))
            .encode()
            .unwrap();

        let mut short_header = BytesMut::from(&encoded[..FRAME_HEADER_SIZE - 1]);
        assert!(Frame::decode(&mut short_header).unwrap().is_none());

        let mut short_payload = BytesMut::from(&encoded[..encoded.len() - 2]);
        assert!(Frame::decode(&mut short_payload).unwrap().is_none());
        assert_eq!(short_payload.len(), encoded.len() - 2);
    }

    #[test]
    fn test_bad_header_reported_before_payload_arrives() {
        let mut buf = header_bytes(7, 0, 100, 0);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_unknown_flag_bits() {
        assert!(matches!(
            FrameFlags::from_bits(0x0100),
            Err(ProtocolError::InvalidFlags(0x0100))
        ));

        let mut buf = header_bytes(PROTOCOL_VERSION, 0x0003, 0, 0);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::InvalidFlags(0x0003))
        ));
    }

    #[test]
    fn test_payload_size_limit() {
        let frame = Frame::new(Bytes::from(vec![0u8; MAX_PAYLOAD_SIZE as usize + 1]));
        assert!(matches!(
            frame.encode(),
            Err(ProtocolError::FrameTooLarge { .. })
        ));

        let mut buf = header_bytes(PROTOCOL_VERSION, FrameFlags::CRC_PRESENT, MAX_PAYLOAD_SIZE + 1, 0);
        assert!(matches!(
            Frame::decode(&mut buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut buf = BytesMut::new();
        for id in ["1", "2", "3"] {
            let frame = Frame::from_json(&serde_json::json!({ "id": id })).unwrap();
            buf.extend_from_slice(&frame.encode().unwrap());
        }

        let mut ids = Vec::new();
        while let Some(frame) = Frame::decode(&mut buf).unwrap() {
            let value: serde_json::Value = serde_json::from_slice(&frame.payload).unwrap();
            ids.push(value["id"].as_str().unwrap().to_string());
        }
        assert_eq!(ids, ["1", "2", "3"]);
    }
}
