//! State record encoding and decoding.
//!
//! Format:
//! - 4 bytes: Magic ("RVM\x01")
//! - 4 bytes: Schema version (u32 little-endian)
//! - 32 bytes: SHA-256 of the payload
//! - N bytes: rkyv payload (saved-at stamp, parallel key and value sequences)

use chrono::{DateTime, Utc};
use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PersistenceError, Result};
use crate::value::{StateRecord, StateValue};

/// Current schema version.
///
/// Increment this when making breaking changes to the envelope.
/// The decoder rejects blobs with version > CURRENT_SCHEMA_VERSION.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Magic bytes at the start of every state file.
///
/// Format: "RVM" + version byte (0x01 for v1)
pub const MAGIC_BYTES: [u8; 4] = [b'R', b'V', b'M', 0x01];

const DIGEST_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC_BYTES.len() + 4 + DIGEST_LEN;

/// On-disk shape of a state record: parallel key and value sequences.
#[derive(Debug, Archive, Serialize, Deserialize)]
struct StateEnvelope {
    saved_at: String,
    keys: Vec<String>,
    values: Vec<StateValue>,
}

/// A decoded blob together with its envelope metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedState {
    pub record: StateRecord,
    /// RFC 3339 timestamp of the save that produced the blob.
    pub saved_at: String,
    /// Hex SHA-256 of the payload.
    pub digest: String,
}

impl DecodedState {
    /// Parse the saved_at timestamp.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.saved_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Encode a whole state record into one blob.
pub fn encode(record: &StateRecord) -> Result<Vec<u8>> {
    let (keys, values) = record
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .unzip();
    let envelope = StateEnvelope {
        saved_at: Utc::now().to_rfc3339(),
        keys,
        values,
    };

    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(&envelope).map_err(|e| {
        PersistenceError::Serialization {
            source: Box::new(std::io::Error::other(format!(
                "rkyv serialization failed: {e}"
            ))),
        }
    })?;

    let mut output = Vec::with_capacity(HEADER_LEN + payload.len());
    output.extend_from_slice(&MAGIC_BYTES);
    output.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    output.extend_from_slice(&Sha256::digest(&payload));
    output.extend_from_slice(&payload);

    Ok(output)
}

/// Decode a blob back into a state record.
///
/// Never returns a partially populated record: any structural problem fails
/// the whole decode.
pub fn decode(bytes: &[u8]) -> Result<StateRecord> {
    decode_envelope(bytes).map(|decoded| decoded.record)
}

/// Decode a blob, keeping the envelope metadata.
pub fn decode_envelope(bytes: &[u8]) -> Result<DecodedState> {
    if bytes.len() < HEADER_LEN {
        return Err(PersistenceError::InvalidFormat {
            reason: format!("blob too small ({} bytes)", bytes.len()),
        });
    }

    if bytes[0..4] != MAGIC_BYTES {
        return Err(PersistenceError::InvalidFormat {
            reason: "invalid magic bytes".to_string(),
        });
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version > CURRENT_SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: version,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let expected = &bytes[8..HEADER_LEN];
    let payload = &bytes[HEADER_LEN..];
    let actual = Sha256::digest(payload);
    if actual.as_slice() != expected {
        return Err(PersistenceError::ChecksumMismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        });
    }

    // rkyv needs the root aligned; the payload sits at an arbitrary offset.
    let mut aligned = AlignedVec::<16>::with_capacity(payload.len());
    aligned.extend_from_slice(payload);

    let envelope = rkyv::from_bytes::<StateEnvelope, rkyv::rancor::Error>(&aligned).map_err(
        |e| PersistenceError::Deserialization {
            source: Box::new(std::io::Error::other(format!(
                "rkyv deserialization failed: {e}"
            ))),
        },
    )?;

    if envelope.keys.len() != envelope.values.len() {
        return Err(PersistenceError::MismatchedRecord {
            keys: envelope.keys.len(),
            values: envelope.values.len(),
        });
    }

    let mut record = StateRecord::new();
    for (key, value) in envelope.keys.into_iter().zip(envelope.values) {
        if record.contains_key(&key) {
            return Err(PersistenceError::DuplicateKey { key });
        }
        record.insert(key, value);
    }

    Ok(DecodedState {
        record,
        saved_at: envelope.saved_at,
        digest: hex::encode(actual),
    })
}

/// Build a blob from raw envelope parts, bypassing the record's invariants.
#[cfg(test)]
pub(crate) fn encode_raw(keys: Vec<String>, values: Vec<StateValue>) -> Vec<u8> {
    let envelope = StateEnvelope {
        saved_at: Utc::now().to_rfc3339(),
        keys,
        values,
    };
    let payload = rkyv::to_bytes::<rkyv::rancor::Error>(&envelope).unwrap();
    let mut output = Vec::new();
    output.extend_from_slice(&MAGIC_BYTES);
    output.extend_from_slice(&CURRENT_SCHEMA_VERSION.to_le_bytes());
    output.extend_from_slice(&Sha256::digest(&payload));
    output.extend_from_slice(&payload);
    output
}
