//! txtline frame wire format.
//!
//! Every frame on the channel is this header followed by raw payload bytes,
//! rendered as text (hex or base32) so it fits in a TXT string:
//!
//! ```text
//! MAGIC(4,BE) | MessageID(16) | Sequence(2,BE) | Total(2,BE) | Checksum(4,BE) | Payload
//! ```
//!
//! The header is part of the protocol. Changing a field or its order breaks
//! every receiver already deployed.

use bytes::Bytes;
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::config::{Encoding, ProtocolConfig};
use crate::error::{FrameError, ProtocolError, SizeError};

/// "DNSC".
pub const FRAME_MAGIC: u32 = 0x444E_5343;

/// Wire size of [`FrameHeader`].
pub const HEADER_SIZE: usize = 28;

// ── Frame Header ─────────────────────────────────────────────────────────────

/// Fixed-size metadata that precedes every payload.
///
/// All multi-byte integers are big-endian. The struct has alignment 1, so its
/// in-memory layout is exactly the wire layout.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct FrameHeader {
    pub magic: U32<BigEndian>,
    pub message_id: [u8; 16],
    /// Zero-based position of this frame.
    pub sequence: U16<BigEndian>,
    /// Number of frames in the message.
    pub total: U16<BigEndian>,
    /// [`integrity_hash`] of the payload.
    pub checksum: U32<BigEndian>,
}

assert_eq_size!(FrameHeader, [u8; HEADER_SIZE]);

impl FrameHeader {
    pub fn new(magic: u32, message_id: [u8; 16], sequence: u16, total: u16, checksum: u32) -> Self {
        Self {
            magic: U32::new(magic),
            message_id,
            sequence: U16::new(sequence),
            total: U16::new(total),
            checksum: U32::new(checksum),
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────────────────

/// One self-describing fragment of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub magic: u32,
    pub message_id: [u8; 16],
    pub sequence: u16,
    pub total: u16,
    pub checksum: u32,
    /// Unix seconds at fragmentation. Not carried on the wire; decoded
    /// frames report 0.
    pub timestamp: i64,
    pub payload_size: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn header(&self) -> FrameHeader {
        FrameHeader::new(
            self.magic,
            self.message_id,
            self.sequence,
            self.total,
            self.checksum,
        )
    }

    /// Short hex form of the message id, for logs.
    pub fn id_hex(&self) -> String {
        hex::encode(&self.message_id[..8])
    }
}

/// Integrity check over a payload: add each byte, then rotate left by one.
///
/// Not a MAC. Collisions are easy to build on purpose; authentication is the
/// encryption layer's job.
pub fn integrity_hash(payload: &[u8]) -> u32 {
    payload.iter().fold(0u32, |sum, &b| {
        sum.wrapping_add(u32::from(b)).rotate_left(1)
    })
}

// ── Codec ────────────────────────────────────────────────────────────────────

/// Turns frames into channel text and back.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    config: ProtocolConfig,
}

impl FrameCodec {
    pub fn new(config: ProtocolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Header bytes followed by the payload, rendered in the configured encoding.
    pub fn encode(&self, header: &FrameHeader, payload: &[u8]) -> String {
        let mut raw = Vec::with_capacity(HEADER_SIZE + payload.len());
        raw.extend_from_slice(header.as_bytes());
        raw.extend_from_slice(payload);
        render(self.config.encoding, &raw)
    }

    pub fn encode_frame(&self, frame: &Frame) -> String {
        self.encode(&frame.header(), &frame.payload)
    }

    /// Parse text in the configured encoding.
    pub fn decode(&self, text: &str) -> Result<Frame, ProtocolError> {
        let raw = unrender(self.config.encoding, text)?;
        self.parse(&raw)
    }

    /// Parse text whose encoding is unknown: hex first, base32 if the hex
    /// reading fails or does not start with the magic.
    pub fn decode_any(&self, text: &str) -> Result<Frame, ProtocolError> {
        if let Ok(raw) = unrender(Encoding::Hex, text) {
            if let Ok(frame) = self.parse(&raw) {
                return Ok(frame);
            }
        }
        let raw = unrender(Encoding::Base32, text)?;
        self.parse(&raw)
    }

    fn parse(&self, raw: &[u8]) -> Result<Frame, ProtocolError> {
        let header = FrameHeader::read_from_prefix(raw)
            .ok_or(ProtocolError::Truncated(raw.len(), HEADER_SIZE))?;

        let magic = header.magic.get();
        if magic != self.config.magic {
            return Err(ProtocolError::BadMagic {
                found: magic,
                expected: self.config.magic,
            });
        }

        let body = &raw[HEADER_SIZE..];
        let payload_size =
            u16::try_from(body.len()).map_err(|_| ProtocolError::PayloadOverflow(body.len()))?;
        let payload = Bytes::copy_from_slice(body);
        Ok(Frame {
            magic,
            message_id: header.message_id,
            sequence: header.sequence.get(),
            total: header.total.get(),
            checksum: header.checksum.get(),
            timestamp: 0,
            payload_size,
            payload,
        })
    }

    /// Cheap standalone checks, used to drop obviously corrupt frames before
    /// a full reassembly is attempted.
    pub fn validate(&self, frame: &Frame) -> Result<(), FrameError> {
        if frame.magic != self.config.magic {
            return Err(ProtocolError::BadMagic {
                found: frame.magic,
                expected: self.config.magic,
            }
            .into());
        }

        let actual = integrity_hash(&frame.payload);
        if actual != frame.checksum {
            return Err(ProtocolError::ChecksumMismatch {
                sequence: frame.sequence,
                expected: frame.checksum,
                actual,
            }
            .into());
        }

        if frame.sequence >= frame.total {
            return Err(ProtocolError::SequenceOutOfBounds {
                sequence: frame.sequence,
                total: frame.total,
            }
            .into());
        }

        if frame.payload.is_empty() {
            return Err(ProtocolError::EmptyPayload(frame.sequence).into());
        }

        let max = self.config.payload_per_frame();
        if frame.payload.len() > max {
            return Err(SizeError::PayloadTooLarge {
                size: frame.payload.len(),
                max,
            }
            .into());
        }

        Ok(())
    }
}

fn render(encoding: Encoding, raw: &[u8]) -> String {
    match encoding {
        Encoding::Hex => hex::encode(raw),
        Encoding::Base32 => data_encoding::BASE32_NOPAD.encode(raw),
    }
}

fn unrender(encoding: Encoding, text: &str) -> Result<Vec<u8>, ProtocolError> {
    let bad = |reason: String| ProtocolError::BadEncoding {
        encoding: encoding.as_str(),
        reason,
    };
    match encoding {
        Encoding::Hex => hex::decode(text).map_err(|e| bad(e.to_string())),
        Encoding::Base32 => data_encoding::BASE32_NOPAD
            .decode(text.as_bytes())
            .map_err(|e| bad(e.to_string())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(payload: &[u8], sequence: u16, total: u16) -> Frame {
        Frame {
            magic: FRAME_MAGIC,
            message_id: [0x5a; 16],
            sequence,
            total,
            checksum: integrity_hash(payload),
            timestamp: 0,
            payload_size: payload.len() as u16,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[test]
    fn header_layout_is_big_endian() {
        let header = FrameHeader::new(FRAME_MAGIC, [0x11; 16], 0x0102, 0x0304, 0xA0B0_C0D0);
        let bytes = header.as_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"DNSC");
        assert_eq!(&bytes[4..20], &[0x11; 16]);
        assert_eq!(&bytes[20..22], &[0x01, 0x02]);
        assert_eq!(&bytes[22..24], &[0x03, 0x04]);
        assert_eq!(&bytes[24..28], &[0xA0, 0xB0, 0xC0, 0xD0]);
    }

    #[test]
    fn integrity_hash_matches_reference_values() {
        assert_eq!(integrity_hash(&[]), 0);
        // 0 + 1 = 1, rotl -> 2
        assert_eq!(integrity_hash(&[1]), 2);
        // 2 + 1 = 3, rotl -> 6
        assert_eq!(integrity_hash(&[1, 1]), 6);
        // the high bit wraps around to bit 0
        assert_eq!(integrity_hash(&[0x80]), 0x100);
        // 255 * 2 + 255 = 765, rotl -> 1530
        assert_eq!(integrity_hash(&[0xff, 0xff]), 1530);
    }

    #[test]
    fn hex_encoding_is_lowercase_and_decodes() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex));
        let f = frame(b"hello", 0, 1);
        let text = codec.encode_frame(&f);

        assert!(text.starts_with("444e5343"));
        assert_eq!(text.len(), (HEADER_SIZE + 5) * 2);
        assert!(!text.chars().any(|c| c.is_ascii_uppercase()));

        let decoded = codec.decode(&text).unwrap();
        assert_eq!(decoded, f);
    }

    #[test]
    fn base32_encoding_has_no_padding() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Base32));
        let text = codec.encode_frame(&frame(b"abc", 2, 3));
        assert!(!text.contains('='));

        let decoded = codec.decode(&text).unwrap();
        assert_eq!(&decoded.payload[..], b"abc");
        assert_eq!(decoded.sequence, 2);
        assert_eq!(decoded.total, 3);
    }

    #[test]
    fn decode_any_detects_both_encodings() {
        let f = frame(b"detect me", 0, 1);
        let hex_text = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex)).encode_frame(&f);
        let b32_text =
            FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Base32)).encode_frame(&f);

        let codec = FrameCodec::new(ProtocolConfig::default());
        assert_eq!(codec.decode_any(&hex_text).unwrap(), f);
        assert_eq!(codec.decode_any(&b32_text).unwrap(), f);
    }

    #[test]
    fn decode_rejects_short_input() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex));
        let err = codec.decode(&hex::encode([0u8; 27])).unwrap_err();
        assert_eq!(err, ProtocolError::Truncated(27, HEADER_SIZE));
    }

    #[test]
    fn decode_rejects_wrong_magic() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex));
        let mut f = frame(b"x", 0, 1);
        f.magic = 0xDEAD_BEEF;
        let err = codec.decode(&codec.encode_frame(&f)).unwrap_err();
        assert!(matches!(err, ProtocolError::BadMagic { found: 0xDEAD_BEEF, .. }));
    }

    #[test]
    fn decode_rejects_payload_past_u16() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex));
        let header = FrameHeader::new(FRAME_MAGIC, [0x22; 16], 0, 1, 0);
        let mut raw = header.as_bytes().to_vec();
        raw.extend(std::iter::repeat(0u8).take(u16::MAX as usize + 1));

        let err = codec.decode(&hex::encode(&raw)).unwrap_err();
        assert_eq!(err, ProtocolError::PayloadOverflow(65_536));

        raw.pop();
        assert_eq!(codec.decode(&hex::encode(&raw)).unwrap().payload_size, u16::MAX);
    }

    #[test]
    fn decode_rejects_garbage_text() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex));
        assert!(matches!(
            codec.decode("not hex at all"),
            Err(ProtocolError::BadEncoding { encoding: "hex", .. })
        ));
    }

    #[test]
    fn validate_accepts_good_frame() {
        let codec = FrameCodec::new(ProtocolConfig::default());
        codec.validate(&frame(b"fine", 0, 1)).unwrap();
    }

    #[test]
    fn validate_catches_each_violation() {
        let codec = FrameCodec::new(ProtocolConfig::with_encoding(Encoding::Hex));

        let mut bad_sum = frame(b"data", 0, 1);
        bad_sum.checksum ^= 1;
        assert!(matches!(
            codec.validate(&bad_sum),
            Err(FrameError::Protocol(ProtocolError::ChecksumMismatch { .. }))
        ));

        assert!(matches!(
            codec.validate(&frame(b"data", 3, 3)),
            Err(FrameError::Protocol(ProtocolError::SequenceOutOfBounds { sequence: 3, total: 3 }))
        ));

        assert!(matches!(
            codec.validate(&frame(b"", 0, 1)),
            Err(FrameError::Protocol(ProtocolError::EmptyPayload(0)))
        ));

        let big = vec![7u8; 112];
        assert_eq!(
            codec.validate(&frame(&big, 0, 1)),
            Err(FrameError::Size(SizeError::PayloadTooLarge { size: 112, max: 111 }))
        );
    }
}
