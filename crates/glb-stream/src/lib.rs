//! Streaming GLB validation and hashing
//!
//! An upload is checked in two steps. [`GlbUpload::validate`] reads only
//! the fixed 8-byte header and enforces the size limit, so a bad upload is
//! rejected before a destination exists. [`ValidatedGlb::write_to`] then
//! drains the rest of the stream once, feeding every chunk to the file and
//! to a SHA-256 hasher, so the returned hash covers exactly the bytes on disk.
//!
//! A failed `write_to` leaves a partial file behind. Removing it is the
//! caller's job, since the caller owns the destination.

mod error;
mod upload;

pub use error::{FormatViolation, GlbError, Result};
pub use upload::{GlbUpload, PersistedGlb, ValidatedGlb};

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of an in-memory payload
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
