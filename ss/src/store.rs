//! Core SessionStore implementation

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::StoreError;

/// File magic for session blobs
pub const MAGIC: &[u8; 4] = b"PSES";

/// Current on-disk format version
pub const FORMAT_VERSION: u8 = 1;

/// Refuse headers larger than this (guards against garbage length prefixes)
const MAX_HEADER_LEN: usize = 1024 * 1024;

/// Lightweight index record stored uncompressed ahead of the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHeader {
    /// Session ID (also the file stem)
    pub id: String,
    /// Display title
    pub title: String,
    /// User-assigned tags
    pub tags: Vec<String>,
    /// Creation timestamp (unix ms)
    pub created_at: i64,
    /// Last modification timestamp (unix ms)
    pub updated_at: i64,
    /// Total messages seen by the session, summarized ones included
    pub message_count: u64,
    /// Whether the session holds a plan
    pub has_plan: bool,
}

/// A listed session: its header plus the file size
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub header: SessionHeader,
    pub size_bytes: u64,
}

/// Directory of session files, one per session ID
pub struct SessionStore {
    /// Base path for storage
    base_path: PathBuf,
    /// Deflate level for bodies
    compression: Compression,
}

/// Session IDs double as file names, so only `[A-Za-z0-9_-]` is accepted
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

impl SessionStore {
    /// Open or create a session store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened session store");
        Ok(Self {
            base_path,
            compression: Compression::new(crate::DEFAULT_COMPRESSION_LEVEL),
        })
    }

    /// Override the deflate level (0-9)
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Directory holding the session files
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.{}", id, crate::SESSION_EXTENSION))
    }

    /// Write a session, atomically replacing any previous version
    ///
    /// Returns the number of bytes written.
    pub fn save<T: Serialize>(&self, header: &SessionHeader, body: &T) -> Result<u64, StoreError> {
        validate_id(&header.id)?;
        debug!(id = %header.id, "save: called");

        let bytes = self.encode(header, body)?;
        let path = self.file_path(&header.id);

        let mut tmp = NamedTempFile::new_in(&self.base_path)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        info!(id = %header.id, bytes = bytes.len(), "Saved session");
        Ok(bytes.len() as u64)
    }

    fn encode<T: Serialize>(&self, header: &SessionHeader, body: &T) -> Result<Vec<u8>, StoreError> {
        let header_bytes = bincode::serialize(header)?;
        let body_bytes = bincode::serialize(body)?;
        debug!(header_len = header_bytes.len(), body_len = body_bytes.len(), "encode: serialized");

        let mut buf = Vec::with_capacity(9 + header_bytes.len() + body_bytes.len() / 4);
        buf.extend_from_slice(MAGIC);
        buf.push(FORMAT_VERSION);
        buf.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&header_bytes);

        let mut encoder = DeflateEncoder::new(buf, self.compression);
        encoder.write_all(&body_bytes)?;
        Ok(encoder.finish()?)
    }

    /// Load a session's header and decoded body
    pub fn load<T: DeserializeOwned>(&self, id: &str) -> Result<(SessionHeader, T), StoreError> {
        validate_id(id)?;
        debug!(%id, "load: called");

        let mut reader = self.open_file(id)?;
        let header = read_header(&mut reader, id)?;
        if header.id != id {
            return Err(StoreError::corrupt(id, format!("header names session {}", header.id)));
        }

        let mut body_bytes = Vec::new();
        DeflateDecoder::new(reader)
            .read_to_end(&mut body_bytes)
            .map_err(|e| StoreError::corrupt(id, format!("decompression failed: {}", e)))?;
        let body = bincode::deserialize(&body_bytes)
            .map_err(|e| StoreError::corrupt(id, format!("decoding failed: {}", e)))?;

        Ok((header, body))
    }

    /// Read only the header of a session
    pub fn header(&self, id: &str) -> Result<SessionHeader, StoreError> {
        validate_id(id)?;
        let mut reader = self.open_file(id)?;
        read_header(&mut reader, id)
    }

    fn open_file(&self, id: &str) -> Result<BufReader<fs::File>, StoreError> {
        match fs::File::open(self.file_path(id)) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// List every readable session, most recently updated first
    ///
    /// Only headers are read. Files that fail to parse are skipped.
    pub fn list(&self) -> Result<Vec<SessionEntry>, StoreError> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e != crate::SESSION_EXTENSION).unwrap_or(true) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match self.header(id) {
                Ok(header) => entries.push(SessionEntry {
                    header,
                    size_bytes: entry.metadata()?.len(),
                }),
                Err(e) => warn!(%id, error = %e, "Skipping unreadable session"),
            }
        }

        entries.sort_by(|a, b| b.header.updated_at.cmp(&a.header.updated_at));
        Ok(entries)
    }

    /// Check whether a session exists
    pub fn exists(&self, id: &str) -> bool {
        validate_id(id).is_ok() && self.file_path(id).is_file()
    }

    /// Size of a session file in bytes
    pub fn size(&self, id: &str) -> Result<u64, StoreError> {
        validate_id(id)?;
        match fs::metadata(self.file_path(id)) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Delete a session; returns false if it did not exist
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        validate_id(id)?;
        match fs::remove_file(self.file_path(id)) {
            Ok(()) => {
                info!(%id, "Deleted session");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

fn read_header(reader: &mut impl Read, id: &str) -> Result<SessionHeader, StoreError> {
    let mut prefix = [0u8; 9];
    reader
        .read_exact(&mut prefix)
        .map_err(|e| StoreError::corrupt(id, format!("truncated prefix: {}", e)))?;

    if &prefix[..4] != MAGIC {
        return Err(StoreError::corrupt(id, "bad magic"));
    }
    if prefix[4] != FORMAT_VERSION {
        return Err(StoreError::corrupt(id, format!("unsupported format version {}", prefix[4])));
    }

    let header_len = u32::from_le_bytes([prefix[5], prefix[6], prefix[7], prefix[8]]) as usize;
    if header_len > MAX_HEADER_LEN {
        return Err(StoreError::corrupt(id, format!("header length {} too large", header_len)));
    }

    let mut header_bytes = vec![0u8; header_len];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|e| StoreError::corrupt(id, format!("truncated header: {}", e)))?;

    bincode::deserialize(&header_bytes).map_err(|e| StoreError::corrupt(id, format!("bad header: {}", e)))
}
