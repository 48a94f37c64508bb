//! Persisted queue snapshot.
//!
//! ```text
//! [magic "TBQS"][version u32][payload len u32][crc32 u32][JSON payload]
//! ```
//!
//! All header fields are little-endian. Files are written to a sibling temp
//! file and renamed into place.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::message::TradeRequest;

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"TBQS";
pub const SNAPSHOT_VERSION: u32 = 1;
pub const SNAPSHOT_HEADER_LEN: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not a queue snapshot")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot truncated: expected {expected} payload bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("snapshot checksum mismatch")]
    Checksum,
}

/// Active requests in service order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub saved_at: String,
    pub requests: Vec<TradeRequest>,
}

impl Snapshot {
    pub fn new(requests: Vec<TradeRequest>) -> Self {
        let saved_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self { saved_at, requests }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = serde_json::to_vec(self)?;
        let mut buf = Vec::with_capacity(SNAPSHOT_HEADER_LEN + payload.len());
        buf.extend_from_slice(&SNAPSHOT_MAGIC);
        buf.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&crc32(&payload).to_le_bytes());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < SNAPSHOT_HEADER_LEN {
            return Err(SnapshotError::Truncated {
                expected: SNAPSHOT_HEADER_LEN,
                found: bytes.len(),
            });
        }
        if bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let version = read_u32(&bytes[4..8]);
        if version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }
        let len = read_u32(&bytes[8..12]) as usize;
        let checksum = read_u32(&bytes[12..16]);
        let payload = &bytes[SNAPSHOT_HEADER_LEN..];
        if payload.len() < len {
            return Err(SnapshotError::Truncated {
                expected: len,
                found: payload.len(),
            });
        }
        let payload = &payload[..len];
        if crc32(payload) != checksum {
            return Err(SnapshotError::Checksum);
        }
        Ok(serde_json::from_slice(payload)?)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    u32::from_le_bytes(word)
}

fn crc32(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Queue snapshot location with atomic replace semantics.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, requests: &[TradeRequest]) -> Result<(), SnapshotError> {
        let data = Snapshot::new(requests.to_vec()).encode()?;
        write_atomic(&self.path, &data)?;
        Ok(())
    }

    /// `Ok(None)` when no snapshot exists.
    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(Snapshot::decode(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn remove(&self) -> Result<(), SnapshotError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    std::fs::rename(tmp, path)?;
    Ok(())
}
