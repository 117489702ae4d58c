//! Errors raised while encoding, decoding, fragmenting or reassembling frames.

/// A frame or frame set violates the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid {encoding} text: {reason}")]
    BadEncoding {
        encoding: &'static str,
        reason: String,
    },

    #[error("frame too short: {0} bytes (header is {1})")]
    Truncated(usize, usize),

    #[error("frame payload of {0} bytes overflows the 16-bit size field")]
    PayloadOverflow(usize),

    #[error("invalid magic: 0x{found:08x} (expected 0x{expected:08x})")]
    BadMagic { found: u32, expected: u32 },

    #[error("checksum mismatch in frame {sequence}: header 0x{expected:08x}, payload 0x{actual:08x}")]
    ChecksumMismatch {
        sequence: u16,
        expected: u32,
        actual: u32,
    },

    #[error("sequence {sequence} out of bounds (total: {total})")]
    SequenceOutOfBounds { sequence: u16, total: u16 },

    #[error("frame {0} has an empty payload")]
    EmptyPayload(u16),

    #[error("no frames provided")]
    NoFrames,

    #[error("mixed messages detected: {first} vs {other}")]
    MixedMessages { first: String, other: String },

    #[error("inconsistent total frames: {first} vs {other}")]
    InconsistentTotal { first: u16, other: u16 },

    #[error("sequence error at position {position}: found frame {found}")]
    SequenceGap { position: usize, found: u16 },
}

/// A buffer or payload does not fit the channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeError {
    #[error("message too large: requires {needed} frames (max {max})")]
    TooManyFrames { needed: usize, max: usize },

    #[error("payload too large: {size} > {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("nothing to fragment: input is empty")]
    EmptyInput,

    #[error("channel budget leaves no room for payload after the {0}-byte header")]
    NoPayloadRoom(usize),
}

/// Everything the frame layer can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("incomplete message: missing frames {missing:?}")]
    Incomplete { missing: Vec<u16> },

    #[error(transparent)]
    Size(#[from] SizeError),
}

impl FrameError {
    /// Sequence numbers a retry has to fetch, if this is a completeness failure.
    pub fn missing(&self) -> Option<&[u16]> {
        match self {
            FrameError::Incomplete { missing } => Some(missing),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
