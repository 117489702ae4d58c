//! BIND-style zone files: one `name. TTL IN TXT "value"` line per record.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::names::{canonical_label, record_kind, RecordKind, TxtRecord};

/// Records recovered from a zone file, keyed the way the store wants them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneContents {
    /// Id taken from the manifest label, if a manifest was present.
    pub message_id: Option<String>,
    /// Frame record name → value.
    pub chunks: BTreeMap<String, String>,
    /// Manifest value.
    pub manifest: Option<String>,
}

pub fn render_zone(records: &[TxtRecord], generated_secs: i64) -> String {
    let mut zone = String::new();
    zone.push_str("; txtline zone\n");
    let _ = writeln!(zone, "; Generated: {generated_secs}");
    let _ = writeln!(zone, "; Records: {}\n", records.len());

    for r in records {
        let _ = writeln!(zone, "{}. {} IN {} \"{}\"", r.name, r.ttl, r.record_type, r.value);
    }
    zone
}

/// Collect the TXT lines of a zone file. Comments, blank lines and lines
/// that are not `IN TXT` records are ignored. Values are kept escaped.
pub fn parse_zone(text: &str) -> ZoneContents {
    let mut out = ZoneContents::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || !line.contains(" IN TXT ") {
            continue;
        }
        if line.split_whitespace().count() < 5 {
            continue;
        }
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };
        let name = name.trim_end_matches('.');

        let (Some(start), Some(end)) = (line.find('"'), line.rfind('"')) else {
            continue;
        };
        if end <= start {
            continue;
        }
        let value = &line[start + 1..end];

        match record_kind(name) {
            Some(RecordKind::Manifest) => {
                let label = canonical_label(name);
                out.message_id = label.strip_prefix("m-").map(str::to_string);
                out.manifest = Some(value.to_string());
            }
            Some(RecordKind::Frame) => {
                out.chunks.insert(name.to_string(), value.to_string());
            }
            None => {
                tracing::debug!(name, "zone record is neither manifest nor frame");
            }
        }
    }
    out
}
