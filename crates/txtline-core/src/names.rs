//! Channel name/value mapper.
//!
//! Projects frames and manifests onto TXT records and back. A frame record is
//! named `[t{minutes}-]c-{seq}-{id}.{subdomain}.{domain}`; the manifest is
//! `m-{id}.{subdomain}.{domain}` with value `{total}:{checksum}:{unix_secs}`.
//!
//! DNS label rules apply to everything left of the first dot: at most 63
//! characters of `[a-z0-9-]`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::{ChannelConfig, ProtocolConfig};
use crate::error::ProtocolError;
use crate::fragment::Message;
use crate::wire::{Frame, FrameCodec};

/// Longest DNS label.
pub const LABEL_MAX: usize = 63;

pub const RECORD_TYPE_TXT: &str = "TXT";

/// Manifest checksum written at creation time. Never back-filled.
pub const CHECKSUM_PENDING: &str = "pending";

// ── Records ──────────────────────────────────────────────────────────────────

/// One TXT answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub ttl: u32,
    pub value: String,
}

impl TxtRecord {
    pub fn txt(name: impl Into<String>, ttl: u32, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: RECORD_TYPE_TXT.to_string(),
            ttl,
            value: value.into(),
        }
    }
}

/// What a record name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Manifest,
    Frame,
}

/// Describes a whole message so a receiver knows when to reassemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Label form of the message id.
    pub message_id: String,
    pub total_frames: usize,
    pub checksum: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub domain: String,
    /// Full names of the frame records, in sequence order.
    #[serde(default)]
    pub frame_names: Vec<String>,
}

impl Manifest {
    /// `{total}:{checksum}:{unix_secs}`
    pub fn value(&self) -> String {
        format!("{}:{}:{}", self.total_frames, self.checksum, self.timestamp)
    }

    /// Parse a manifest value. Missing or non-numeric fields read as 0, like
    /// the senders already deployed expect.
    pub fn parse_value(value: &str) -> Option<(usize, String, i64)> {
        let parts: Vec<&str> = value.split(':').collect();
        if parts.len() < 3 {
            return None;
        }
        let total = parts[0].trim().parse().unwrap_or(0);
        let timestamp = parts[2].trim().parse().unwrap_or(0);
        Some((total, parts[1].to_string(), timestamp))
    }
}

// ── Mapper ───────────────────────────────────────────────────────────────────

pub struct ChannelMapper {
    config: ChannelConfig,
    codec: FrameCodec,
    clock: Arc<dyn Clock>,
}

impl ChannelMapper {
    pub fn new(config: ChannelConfig, protocol: ProtocolConfig) -> Self {
        Self::with_clock(config, protocol, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ChannelConfig, protocol: ProtocolConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            codec: FrameCodec::new(protocol),
            clock,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Label-safe message id: the first `id_prefix_len` hex characters.
    pub fn label_id(&self, id: &[u8; 16]) -> String {
        let hex = hex::encode(id);
        let len = self.config.id_prefix_len.clamp(1, hex.len());
        sanitize_label(&hex[..len])
    }

    /// `{label}.{subdomain}.{domain}`
    pub fn full_name(&self, label: &str) -> String {
        format!("{}.{}.{}", label, self.config.subdomain, self.config.domain)
    }

    /// Current time bucket, if frame labels carry one.
    fn bucket(&self) -> Option<u64> {
        self.config
            .time_prefix
            .then(|| time_bucket(self.clock.now_secs()))
    }

    /// Manifest followed by one record per frame.
    pub fn encode_message(&self, msg: &Message) -> (Manifest, Vec<TxtRecord>) {
        let label_id = self.label_id(&msg.id);
        let mut manifest = Manifest {
            message_id: label_id.clone(),
            total_frames: msg.frames.len(),
            checksum: CHECKSUM_PENDING.to_string(),
            timestamp: (msg.created_at / 1000) as i64,
            domain: self.config.domain.clone(),
            frame_names: Vec::with_capacity(msg.frames.len()),
        };

        let mut records = Vec::with_capacity(msg.frames.len() + 1);
        records.push(self.manifest_record(&manifest));

        for frame in &msg.frames {
            let record = self.frame_record(frame, &label_id);
            manifest.frame_names.push(record.name.clone());
            records.push(record);
        }

        tracing::debug!(
            message_id = %label_id,
            records = records.len(),
            domain = %self.config.domain,
            "message mapped to TXT records"
        );

        (manifest, records)
    }

    pub fn frame_record(&self, frame: &Frame, label_id: &str) -> TxtRecord {
        let label = frame_label(frame.sequence, label_id, self.bucket());
        TxtRecord::txt(
            self.full_name(&label),
            self.config.record_ttl,
            escape_txt(&self.codec.encode_frame(frame)),
        )
    }

    pub fn manifest_record(&self, manifest: &Manifest) -> TxtRecord {
        TxtRecord::txt(
            self.full_name(&manifest_label(&manifest.message_id)),
            self.config.record_ttl,
            manifest.value(),
        )
    }

    /// Name a receiver queries for frame `sequence`, in the current bucket.
    pub fn frame_name(&self, sequence: u16, label_id: &str) -> String {
        self.full_name(&frame_label(sequence, label_id, self.bucket()))
    }

    pub fn manifest_name(&self, label_id: &str) -> String {
        self.full_name(&manifest_label(label_id))
    }

    /// Split a batch of answers into decoded frames and the manifest.
    ///
    /// Frame records that fail to parse are skipped with a warning. A frame
    /// count that disagrees with the manifest is only logged; reassembly
    /// decides whether it is fatal.
    pub fn parse_batch(&self, records: &[TxtRecord]) -> (Vec<Frame>, Option<Manifest>) {
        let mut manifest = None;
        let mut frames = Vec::new();

        for record in records {
            match record_kind(&record.name) {
                Some(RecordKind::Manifest) => {
                    manifest = self.parse_manifest_record(record);
                }
                Some(RecordKind::Frame) => match self.parse_frame_record(record) {
                    Ok(frame) => frames.push(frame),
                    Err(e) => {
                        tracing::warn!(name = %record.name, error = %e, "skipping unparseable frame record");
                    }
                },
                None => {
                    tracing::debug!(name = %record.name, "ignoring unrelated record");
                }
            }
        }

        if let Some(m) = &manifest {
            if m.total_frames != frames.len() {
                tracing::warn!(
                    message_id = %m.message_id,
                    expected = m.total_frames,
                    received = frames.len(),
                    "frame count does not match manifest"
                );
            }
        }

        (frames, manifest)
    }

    pub fn parse_frame_record(&self, record: &TxtRecord) -> Result<Frame, ProtocolError> {
        let label = canonical_label(&record.name);
        let parsed = parse_frame_label(&label);

        let frame = self.codec.decode_any(&unescape_txt(&record.value))?;

        if let Some((seq, _)) = parsed {
            if seq != frame.sequence {
                tracing::warn!(
                    name = %record.name,
                    label_sequence = seq,
                    frame_sequence = frame.sequence,
                    "record label disagrees with frame header"
                );
            }
        }
        Ok(frame)
    }

    pub fn parse_manifest_record(&self, record: &TxtRecord) -> Option<Manifest> {
        let (total_frames, checksum, timestamp) = Manifest::parse_value(&record.value)?;
        let label = canonical_label(&record.name);
        let message_id = label.strip_prefix("m-").unwrap_or(&label).to_string();
        Some(Manifest {
            message_id,
            total_frames,
            checksum,
            timestamp,
            domain: self.config.domain.clone(),
            frame_names: Vec::new(),
        })
    }
}

// ── Labels ───────────────────────────────────────────────────────────────────

/// Minutes since the epoch; changes the query name every minute so
/// resolvers cannot answer from cache.
pub fn time_bucket(unix_secs: i64) -> u64 {
    (unix_secs.max(0) / 60) as u64
}

/// `[t{bucket}-]c-{seq}-{id}`, with the id cut short when the whole label
/// would exceed 63 characters. The cut depends only on the lengths of the
/// bucket and sequence parts.
pub fn frame_label(sequence: u16, id: &str, bucket: Option<u64>) -> String {
    let prefix = bucket.map(|b| format!("t{b}-")).unwrap_or_default();
    let fixed = format!("c-{sequence}-");
    let room = LABEL_MAX.saturating_sub(prefix.len() + fixed.len());
    format!("{prefix}{fixed}{}", truncate_chars(id, room))
}

/// `m-{id}`, truncated to 63 characters.
pub fn manifest_label(id: &str) -> String {
    format!("m-{}", truncate_chars(id, LABEL_MAX - 2))
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// First label of `name`, lower-cased, trailing dot ignored, with any time
/// bucket prefix removed.
pub fn canonical_label(name: &str) -> String {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    let label = name.split('.').next().unwrap_or_default();
    strip_time_prefix(label).to_string()
}

/// Drop `t{bucket}-` from a frame label, cutting at the last `-c-`.
pub fn strip_time_prefix(label: &str) -> &str {
    if label.starts_with('t') {
        if let Some(idx) = label.rfind("-c-") {
            return &label[idx + 1..];
        }
    }
    label
}

/// Read `c-{seq}-{id}` into its sequence and (possibly truncated) id.
pub fn parse_frame_label(label: &str) -> Option<(u16, String)> {
    let rest = strip_time_prefix(label).strip_prefix("c-")?;
    let (seq, id) = rest.split_once('-')?;
    let seq = seq.parse().ok()?;
    Some((seq, id.to_string()))
}

/// Classify a record name by its `m-` / `c-` marker.
pub fn record_kind(name: &str) -> Option<RecordKind> {
    let label = canonical_label(name);
    if label.starts_with("m-") {
        return Some(RecordKind::Manifest);
    }
    if label.starts_with("c-") {
        return Some(RecordKind::Frame);
    }
    let lower = name.to_ascii_lowercase();
    if lower.contains(".m-") {
        Some(RecordKind::Manifest)
    } else if lower.contains(".c-") {
        Some(RecordKind::Frame)
    } else {
        None
    }
}

/// Reduce arbitrary text to a DNS label: lower-case `[a-z0-9-]`, no
/// leading, trailing or repeated hyphens, at most 63 characters, starting
/// with an alphanumeric.
pub fn sanitize_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.to_ascii_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    let mut out = out.trim_end_matches('-').to_string();
    out.truncate(LABEL_MAX);
    out.trim_end_matches('-').to_string()
}

// ── Value escaping ───────────────────────────────────────────────────────────

/// Escape a TXT value: `"` → `\"`, `\` → `\\`, any byte outside printable
/// ASCII → `\DDD` (decimal).
pub fn escape_txt(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03}")),
        }
    }
    out
}

/// Undo `\"` and `\\`. `\DDD` sequences are left as they are.
pub fn unescape_txt(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"') | Some('\\') => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(c);
    }
    out
}
