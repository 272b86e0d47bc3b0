//! Error types for GLB upload handling

use std::fmt;
use std::io;

/// Which header check an upload failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatViolation {
    /// Stream ended before the 8-byte header was complete
    Truncated { len: usize },
    BadMagic { found: u32 },
    UnsupportedVersion { found: u32 },
}

impl fmt::Display for FormatViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatViolation::Truncated { len } => {
                write!(f, "file is {} bytes, shorter than the GLB header", len)
            }
            FormatViolation::BadMagic { found } => {
                write!(f, "Invalid GLB file format (magic 0x{:08X})", found)
            }
            FormatViolation::UnsupportedVersion { found } => {
                write!(f, "Unsupported GLB version {}", found)
            }
        }
    }
}

#[derive(Debug)]
pub enum GlbError {
    TooLarge { limit: u64, observed: u64 },
    InvalidFormat(FormatViolation),
    /// The upload stream itself failed, e.g. the client disconnected
    Source(io::Error),
    /// Writing the destination failed
    Io(io::Error),
}

impl fmt::Display for GlbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlbError::TooLarge { limit, observed } => write!(
                f,
                "File size exceeds limit: {} bytes seen, {} allowed",
                observed, limit
            ),
            GlbError::InvalidFormat(violation) => write!(f, "{}", violation),
            GlbError::Source(err) => write!(f, "Upload stream error: {}", err),
            GlbError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for GlbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GlbError::Source(err) | GlbError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FormatViolation> for GlbError {
    fn from(violation: FormatViolation) -> Self {
        GlbError::InvalidFormat(violation)
    }
}

pub type Result<T> = std::result::Result<T, GlbError>;
