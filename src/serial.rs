//! Binary snapshots of a [`RuleStore`](crate::RuleStore).
//!
//! A snapshot keeps rule ids and both id counters, so a restored store
//! continues numbering where the original left off. The format is a 32-byte
//! fixed header followed by a bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"FFIL"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! deserialization fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Owner, Rule, RuleId, RuleKind, RuleSpec, RuleStore, RuleValue, SubjectId};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"FFIL";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when serializing a [`RuleStore`](crate::RuleStore) to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode rule store: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("I/O error during serialization: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when deserializing a [`RuleStore`](crate::RuleStore) from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a formfill snapshot: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error during deserialization: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Serialized type hierarchy
// ---------------------------------------------------------------------------

// Mirrors of the public types without serde attributes that bincode cannot
// drive (untagged enums, skipped fields).

#[derive(Debug, Serialize, Deserialize)]
struct SerializedStore {
    metadata: StoreMetadata,
    rules: Vec<SerializedRule>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreMetadata {
    rule_count: usize,
    next_ordinary: u64,
    next_template: u64,
    source_digest: Option<[u8; 32]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
enum SerializedId {
    Ordinary(u64),
    Template(u64),
}

#[derive(Debug, Serialize, Deserialize)]
enum SerializedValue {
    Literal(String),
    Computed(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SerializedRule {
    id: SerializedId,
    kind: String,
    pattern: String,
    value: SerializedValue,
    scope: Option<Vec<String>>,
    threshold: Option<u64>,
    owner: String,
    subject: Option<String>,
}

// ---------------------------------------------------------------------------
// RuleStore -> SerializedStore
// ---------------------------------------------------------------------------

fn serialize_id(id: RuleId) -> SerializedId {
    match id {
        RuleId::Ordinary(n) => SerializedId::Ordinary(n),
        RuleId::Template(n) => SerializedId::Template(n),
    }
}

fn serialize_rule(rule: &Rule) -> SerializedRule {
    let spec = rule.to_spec();
    SerializedRule {
        id: serialize_id(rule.id()),
        kind: spec.kind.as_str().to_owned(),
        pattern: spec.pattern,
        value: match spec.value {
            RuleValue::Literal(text) => SerializedValue::Literal(text),
            RuleValue::Computed { computed } => SerializedValue::Computed(computed),
        },
        scope: spec.scope,
        threshold: spec.threshold.map(|t| t as u64),
        owner: spec.owner.into(),
        subject: spec.subject.map(|s| s.as_str().to_owned()),
    }
}

fn store_to_serialized(store: &RuleStore, source_text: Option<&str>) -> SerializedStore {
    let source_digest = source_text.map(|s| *blake3::hash(s.as_bytes()).as_bytes());
    let (next_ordinary, next_template) = store.counters();
    SerializedStore {
        metadata: StoreMetadata {
            rule_count: store.len(),
            next_ordinary,
            next_template,
            source_digest,
        },
        rules: store.iter().map(serialize_rule).collect(),
    }
}

// ---------------------------------------------------------------------------
// SerializedStore -> RuleStore
// ---------------------------------------------------------------------------

fn deserialize_rule(ser: SerializedRule) -> Result<Rule, DeserializeError> {
    let kind = RuleKind::from_name(&ser.kind).ok_or_else(|| {
        DeserializeError::Validation(format!("unknown rule kind '{}'", ser.kind))
    })?;
    let threshold = ser
        .threshold
        .map(usize::try_from)
        .transpose()
        .map_err(|_| DeserializeError::Validation("threshold out of range".to_owned()))?;
    let id = match ser.id {
        SerializedId::Ordinary(n) => RuleId::Ordinary(n),
        SerializedId::Template(n) => RuleId::Template(n),
    };
    let spec = RuleSpec {
        kind,
        pattern: ser.pattern,
        value: match ser.value {
            SerializedValue::Literal(text) => RuleValue::Literal(text),
            SerializedValue::Computed(name) => RuleValue::computed(name),
        },
        scope: ser.scope,
        threshold,
        owner: Owner::from(ser.owner),
        subject: ser.subject.map(SubjectId::from),
    };
    Ok(Rule::from_spec(id, spec))
}

fn serialized_to_store(ser: SerializedStore) -> Result<RuleStore, DeserializeError> {
    validate(&ser)?;
    let rules = ser
        .rules
        .into_iter()
        .map(deserialize_rule)
        .collect::<Result<Vec<_>, _>>()?;

    for (i, rule) in rules.iter().enumerate() {
        if rule.pattern().is_empty() {
            return Err(DeserializeError::Validation(format!(
                "rule {} has an empty pattern",
                rule.id()
            )));
        }
        if let Some(other) = rules[..i].iter().find(|o| o.structurally_eq(rule)) {
            return Err(DeserializeError::Validation(format!(
                "rule {} duplicates rule {}",
                rule.id(),
                other.id()
            )));
        }
    }

    Ok(RuleStore::restore(
        rules,
        ser.metadata.next_ordinary,
        ser.metadata.next_template,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(ser: &SerializedStore) -> Result<(), DeserializeError> {
    if ser.metadata.rule_count != ser.rules.len() {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} rules but payload has {}",
            ser.metadata.rule_count,
            ser.rules.len()
        )));
    }

    // Ids strictly ascending, hence unique
    for window in ser.rules.windows(2) {
        if window[0].id >= window[1].id {
            return Err(DeserializeError::Validation(
                "rules not sorted by ascending id".to_owned(),
            ));
        }
    }

    // Counters must cover every id so new ids are never reused
    for rule in &ser.rules {
        let (n, counter) = match rule.id {
            SerializedId::Ordinary(n) => (n, ser.metadata.next_ordinary),
            SerializedId::Template(n) => (n, ser.metadata.next_template),
        };
        if n == 0 || n > counter {
            return Err(DeserializeError::Validation(format!(
                "rule id {n} outside counter range 1..={counter}"
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    #[allow(clippy::cast_possible_truncation)] // payload will never exceed 4 GiB
    let payload_len = payload.len() as u32;
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // bytes[6..8] engine version, bytes[8..12] flags
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(store: &RuleStore, source_text: Option<&str>) -> Result<Vec<u8>, SerializeError> {
    let serialized = store_to_serialized(store, source_text);
    let payload = bincode::serde::encode_to_vec(&serialized, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<RuleStore, DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_end = HEADER_SIZE + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[HEADER_SIZE..payload_end];

    let computed_hash = blake3::hash(payload);
    if computed_hash.as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (serialized, _): (SerializedStore, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;

    serialized_to_store(serialized)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
