//! Error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while feeding data into an [`Ed2k`](crate::Ed2k) hasher.
#[derive(Error, Debug)]
pub enum Error {
    /// Data was fed to a hasher that has already been finalized.
    /// The hasher has to be reset before it accepts more input.
    #[error("ED2K hasher is already finalized; reset it before updating")]
    AlreadyFinalized,

    /// The source handed to a byte-source adapter can not be read as a byte stream.
    #[error("not a readable byte source: {}", path.display())]
    InvalidInputType {
        /// Offending path
        path: PathBuf,
    },

    /// Error reported by the underlying byte source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type of the fallible hasher operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
