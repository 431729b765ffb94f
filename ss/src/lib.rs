//! SessionStore - durable, compact session blobs
//!
//! Stores one opaque binary blob per session. Each file carries a small
//! uncompressed header (id, title, tags, timestamps, counts) ahead of a
//! deflate-compressed bincode body, so listings never have to decode the
//! conversation itself.
//!
//! # Architecture
//!
//! ```text
//! sessions/
//! ├── 0193a1f2-....session   # PSES | fmt | hdr_len | header | deflate(body)
//! ├── 0193a1f7-....session
//! └── ...
//! ```
//!
//! Writes go to a temp file in the same directory, are fsynced, then renamed
//! over the target. A crash mid-save leaves the previous file in place.
//!
//! # Example
//!
//! ```ignore
//! use sessionstore::{SessionHeader, SessionStore};
//!
//! let store = SessionStore::open("~/.local/share/planagent/sessions")?;
//! store.save(&header, &snapshot)?;
//! for entry in store.list()? {
//!     println!("{} {}", entry.header.id, entry.header.title);
//! }
//! ```

pub mod cli;
pub mod config;
mod error;
mod store;

pub use error::StoreError;
pub use store::{FORMAT_VERSION, MAGIC, SessionEntry, SessionHeader, SessionStore, validate_id};

/// Default deflate level (matches gzip's default trade-off)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// File extension for stored sessions
pub const SESSION_EXTENSION: &str = "session";

/// Default location for session files
pub fn default_store_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("planagent")
        .join("sessions")
}
