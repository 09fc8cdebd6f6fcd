//! Byte-source adapters
//!
//! Anything that implements [`Read`] can be streamed into a hasher: in-memory
//! buffers (`&[u8]`, [`std::io::Cursor`]), files, standard input, pipes.

use std::{
    fs::{self, File},
    io::{self, Read},
    path::Path,
};

use log::debug;

use crate::{
    error::{Error, Result},
    Ed2k,
};

/// Size of the increments read from a byte source.
const READ_BUFFER_SIZE: usize = 1 << 20;

impl Ed2k {
    /// Feeds everything `reader` produces into the hasher.
    ///
    /// Reading stops at end of input. A read error is returned as
    /// [`Error::Io`]; data read before the error stays fed to the hasher.
    pub fn io<R: Read>(&mut self, mut reader: R) -> Result<&mut Self> {
        if self.is_finalized() {
            return Err(Error::AlreadyFinalized);
        }

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let read = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.absorb(&buf[..read]);
        }
        Ok(self)
    }

    /// Feeds the contents of the file at `path` into the hasher.
    pub fn file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        if self.is_finalized() {
            return Err(Error::AlreadyFinalized);
        }

        if fs::metadata(path)?.is_dir() {
            return Err(Error::InvalidInputType {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        debug!("ed2k: hashing {}", path.display());
        self.io(file)
    }
}
