//! Error types for SCANCO file I/O.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while reading or writing SCANCO files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying stream failure (open, read, write, seek).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The first 16 bytes do not match any known SCANCO variant.
    #[error("unrecognized SCANCO header")]
    UnrecognizedFormat,

    /// A read expected more bytes than were available.
    #[error("truncated {0}: {1} bytes missing")]
    Truncated(&'static str, u64),

    /// AIM type word outside the fixed table, or a component the writer
    /// does not support.
    #[error("unsupported component type: {0:#010x}")]
    UnsupportedComponentType(i32),

    /// A date string does not match `DD-MMM-YYYY HH:MM:SS.mmm`.
    #[error("invalid date string: '{0}' (expected DD-MMM-YYYY HH:MM:SS.mmm)")]
    BadDate(String),

    /// Writer invoked with an extension it cannot produce.
    #[error("cannot write file with extension '{0}' (supported: .isq, .aim)")]
    WriteExtension(String),

    /// Post-write cross-check of bytes written versus the expected total.
    #[error("write size mismatch: wrote {written} bytes, expected {expected}")]
    SizeMismatch { written: u64, expected: u64 },
}

impl Error {
    /// Shorthand for a truncation error with the missing byte count.
    pub(crate) fn truncated(what: &'static str, missing: u64) -> Self {
        Self::Truncated(what, missing)
    }
}
