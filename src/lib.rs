#![doc = include_str!("../README.md")]

use std::{io::Read, path::Path};

pub use crate::error::{Error, Result};
pub use crate::implementation::{Ed2k, Output, CHUNK_SIZE};

pub use ::digest;

mod error;
pub mod implementation;
mod source;

/// Hashes `data` in one go.
pub fn digest(data: impl AsRef<[u8]>) -> Output {
    Ed2k::new().digest_of(data)
}

/// Hashes `data` in one go and returns the hash as 32 lowercase hex digits.
pub fn hexdigest(data: impl AsRef<[u8]>) -> String {
    Ed2k::new().hexdigest_of(data)
}

/// Hashes everything `reader` produces. The returned hasher is finalized.
pub fn io<R: Read>(reader: R) -> Result<Ed2k> {
    let mut hasher = Ed2k::new();
    hasher.io(reader)?.finish();
    Ok(hasher)
}

/// Hashes the file at `path`. The returned hasher is finalized.
pub fn file(path: impl AsRef<Path>) -> Result<Ed2k> {
    let mut hasher = Ed2k::new();
    hasher.file(path)?.finish();
    Ok(hasher)
}
