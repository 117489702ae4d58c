//! Fragmentation and reassembly.
//!
//! The channel is lossy, unordered and may duplicate answers, so every frame
//! carries enough metadata to be checked and placed on its own. Reassembly is
//! all-or-nothing: one bad or missing frame discards the whole attempt and the
//! caller re-fetches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::clock::{Clock, SystemClock};
use crate::config::{Encoding, ProtocolConfig};
use crate::error::{FrameError, ProtocolError, Result, SizeError};
use crate::wire::{integrity_hash, Frame, FrameCodec};

/// A buffer split into frames, ready to hand to the name mapper.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: [u8; 16],
    pub data: Bytes,
    pub frames: Vec<Frame>,
    pub encoding: Encoding,
    /// Unix milliseconds.
    pub created_at: u64,
}

impl Message {
    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }
}

/// Running totals for one fragmenter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentStats {
    pub messages: usize,
    pub frames: usize,
    pub bytes: usize,
    pub last_duration: Duration,
}

pub struct Fragmenter {
    codec: FrameCodec,
    clock: Arc<dyn Clock>,
    stats: FragmentStats,
}

impl Fragmenter {
    pub fn new(config: ProtocolConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ProtocolConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec: FrameCodec::new(config),
            clock,
            stats: FragmentStats::default(),
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn stats(&self) -> &FragmentStats {
        &self.stats
    }

    /// Split `data` into frames.
    ///
    /// The id is the first 16 bytes of BLAKE3 over the data and the clock's
    /// nanoseconds, so fragmenting identical bytes twice yields two distinct
    /// messages.
    pub fn fragment(&mut self, data: &[u8]) -> Result<Message> {
        let started = Instant::now();
        let config = self.codec.config();

        if data.is_empty() {
            return Err(SizeError::EmptyInput.into());
        }

        let per_frame = config.payload_per_frame();
        if per_frame == 0 {
            return Err(SizeError::NoPayloadRoom(config.header_size()).into());
        }

        let total = data.len().div_ceil(per_frame);
        if total > config.max_frames || total > u16::MAX as usize {
            return Err(SizeError::TooManyFrames {
                needed: total,
                max: config.max_frames.min(u16::MAX as usize),
            }
            .into());
        }

        let now_nanos = self.clock.now_nanos();
        let id = message_id(data, now_nanos);
        let timestamp = self.clock.now_secs();
        let data = Bytes::copy_from_slice(data);

        let frames: Vec<Frame> = (0..total)
            .map(|seq| {
                let start = seq * per_frame;
                let end = (start + per_frame).min(data.len());
                let payload = data.slice(start..end);
                Frame {
                    magic: config.magic,
                    message_id: id,
                    sequence: seq as u16,
                    total: total as u16,
                    checksum: integrity_hash(&payload),
                    timestamp,
                    payload_size: payload.len() as u16,
                    payload,
                }
            })
            .collect();

        self.stats.messages += 1;
        self.stats.frames += total;
        self.stats.bytes += data.len();
        self.stats.last_duration = started.elapsed();

        tracing::debug!(
            message_id = %hex::encode(&id[..8]),
            bytes = data.len(),
            encoding = config.encoding.as_str(),
            payload_per_frame = per_frame,
            frames = total,
            overhead_percent = overhead_percent(data.len(), total, config),
            "message fragmented"
        );

        Ok(Message {
            id,
            data,
            frames,
            encoding: config.encoding,
            created_at: (now_nanos / 1_000_000) as u64,
        })
    }

    /// Rebuild the original buffer. See [`reassemble`].
    pub fn reassemble(&self, frames: Vec<Frame>) -> Result<Bytes> {
        reassemble(frames)
    }

    pub fn validate(&self, frame: &Frame) -> Result<()> {
        self.codec.validate(frame)
    }
}

fn message_id(data: &[u8], now_nanos: u128) -> [u8; 16] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(data);
    hasher.update(&now_nanos.to_le_bytes());
    let mut id = [0u8; 16];
    id.copy_from_slice(&hasher.finalize().as_bytes()[..16]);
    id
}

/// Header bytes as a percentage of the payload they carry.
fn overhead_percent(len: usize, frames: usize, config: &ProtocolConfig) -> f64 {
    (frames * config.header_size()) as f64 / len as f64 * 100.0
}

/// Rebuild a buffer from a complete frame set, in any order.
///
/// Checks, in order: the set is non-empty; all frames agree on message id and
/// a non-zero total; the frame count equals the total; after sorting the
/// sequences are exactly `0..total`; every checksum matches. The first
/// failure aborts. A surplus frame set reports `Incomplete` with whatever
/// sequences are absent, possibly none.
pub fn reassemble(mut frames: Vec<Frame>) -> Result<Bytes> {
    let first = frames.first().ok_or(ProtocolError::NoFrames)?;
    let id = first.message_id;
    let total = first.total;

    for frame in &frames {
        if frame.message_id != id {
            return Err(ProtocolError::MixedMessages {
                first: hex::encode(&id[..8]),
                other: hex::encode(&frame.message_id[..8]),
            }
            .into());
        }
        if frame.total != total {
            return Err(ProtocolError::InconsistentTotal {
                first: total,
                other: frame.total,
            }
            .into());
        }
    }

    if total == 0 {
        return Err(ProtocolError::SequenceOutOfBounds {
            sequence: first.sequence,
            total,
        }
        .into());
    }

    if frames.len() != total as usize {
        let missing = missing_sequences(&frames, total);
        tracing::debug!(
            message_id = %hex::encode(&id[..8]),
            received = frames.len(),
            total,
            missing = missing.len(),
            "reassembly incomplete"
        );
        return Err(FrameError::Incomplete { missing });
    }

    frames.sort_by_key(|f| f.sequence);

    for (position, frame) in frames.iter().enumerate() {
        if frame.sequence as usize != position {
            return Err(ProtocolError::SequenceGap {
                position,
                found: frame.sequence,
            }
            .into());
        }
    }

    for frame in &frames {
        let actual = integrity_hash(&frame.payload);
        if actual != frame.checksum {
            return Err(ProtocolError::ChecksumMismatch {
                sequence: frame.sequence,
                expected: frame.checksum,
                actual,
            }
            .into());
        }
    }

    let mut out = Vec::with_capacity(frames.iter().map(|f| f.payload.len()).sum());
    for frame in &frames {
        out.extend_from_slice(&frame.payload);
    }

    tracing::debug!(
        message_id = %hex::encode(&id[..8]),
        frames = frames.len(),
        bytes = out.len(),
        "message reassembled"
    );

    Ok(Bytes::from(out))
}

/// Sequence numbers in `0..total` that no frame carries.
pub fn missing_sequences(frames: &[Frame], total: u16) -> Vec<u16> {
    let mut present = vec![false; total as usize];
    for frame in frames {
        if let Some(slot) = present.get_mut(frame.sequence as usize) {
            *slot = true;
        }
    }
    present
        .iter()
        .enumerate()
        .filter(|(_, seen)| !**seen)
        .map(|(seq, _)| seq as u16)
        .collect()
}
