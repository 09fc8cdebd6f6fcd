//! Implementation details

use std::{fmt, io};

use digest::{
    generic_array::GenericArray, typenum::U16, FixedOutput, FixedOutputReset, HashMarker,
    OutputSizeUser, Reset, Update,
};
use log::{debug, trace};
use md4::Md4;

use crate::error::{Error, Result};

/// Size of an ED2K chunk in bytes.
pub const CHUNK_SIZE: usize = 9728000;

/// A finished ED2K hash (16 bytes). Formats as lowercase hex with `{:x}`.
pub type Output = GenericArray<u8, U16>;

/// Outer MD4 over the digests of all completed chunks.
#[derive(Default, Clone)]
struct ChunkList {
    hasher: Md4,
    chunk_counter: u64,
}
impl ChunkList {
    fn add_chunk(&mut self, hash: &Output) {
        self.chunk_counter += 1;
        self.hasher.update(hash);
    }
    fn reset(&mut self) {
        self.hasher.reset();
        self.chunk_counter = 0;
    }
    fn chunk_counter(&self) -> u64 {
        self.chunk_counter
    }
    fn list_hash_reset(&mut self) -> Output {
        self.hasher.finalize_fixed_reset()
    }
}

/// Streaming ED2K hasher.
///
/// Data is fed with [`update`](Ed2k::update) in pieces of any size, and the
/// hash is read with [`digest`](Ed2k::digest) or [`hexdigest`](Ed2k::hexdigest).
/// Reading the hash finalizes the hasher; after that it rejects further input
/// until [`reset`](Ed2k::reset) is called.
///
/// The type also implements the traits of the `digest` crate, so it can be
/// used wherever a [`digest::Digest`] is expected.
#[derive(Default, Clone)]
pub struct Ed2k {
    /// Hasher for the current chunk
    chunk_hasher: Md4,
    /// Length of the currently hashed bytes of the chunk
    chunk_len: usize,
    /// List of chunk hashes
    chunk_list: ChunkList,
    /// Bytes fed since the last reset
    total_len: u64,
    /// Final hash, present once the hasher is finalized
    finished: Option<Output>,
}

impl Ed2k {
    /// Creates a fresh hasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `data` into the hasher.
    ///
    /// Fails with [`Error::AlreadyFinalized`] if the hash was already read.
    pub fn update(&mut self, data: impl AsRef<[u8]>) -> Result<&mut Self> {
        if self.is_finalized() {
            return Err(Error::AlreadyFinalized);
        }
        self.absorb(data.as_ref());
        Ok(self)
    }

    /// Finalizes the hasher. Does nothing if it is already finalized.
    pub fn finish(&mut self) -> &mut Self {
        self.finalize_ref();
        self
    }

    /// Finalizes the hasher and returns the hash.
    pub fn digest(&mut self) -> Output {
        self.finalize_ref()
    }

    /// Finalizes the hasher and returns the hash as 32 lowercase hex digits.
    pub fn hexdigest(&mut self) -> String {
        format!("{:x}", self.finalize_ref())
    }

    /// Resets the hasher, hashes `data` and returns the hash.
    pub fn digest_of(&mut self, data: impl AsRef<[u8]>) -> Output {
        self.reset();
        self.absorb(data.as_ref());
        self.finalize_ref()
    }

    /// Resets the hasher, hashes `data` and returns the hash as hex.
    pub fn hexdigest_of(&mut self, data: impl AsRef<[u8]>) -> String {
        format!("{:x}", self.digest_of(data))
    }

    /// Returns the hash and leaves the hasher reset for new input.
    pub fn digest_reset(&mut self) -> Output {
        let hash = self.finalize_ref();
        self.reset();
        hash
    }

    /// Returns the hash as hex and leaves the hasher reset for new input.
    pub fn hexdigest_reset(&mut self) -> String {
        format!("{:x}", self.digest_reset())
    }

    /// Discards all input and returns the hasher to its initial state.
    pub fn reset(&mut self) -> &mut Self {
        self.chunk_hasher.reset();
        self.chunk_len = 0;
        self.chunk_list.reset();
        self.total_len = 0;
        self.finished = None;
        self
    }

    /// Whether the hash has been computed. A finalized hasher rejects input.
    pub fn is_finalized(&self) -> bool {
        self.finished.is_some()
    }

    /// Number of bytes fed since creation or the last reset.
    pub fn bytes_hashed(&self) -> u64 {
        self.total_len
    }

    pub(crate) fn absorb(&mut self, mut data: &[u8]) {
        debug_assert!(!self.is_finalized());
        self.total_len += data.len() as u64;
        while !data.is_empty() {
            let free = CHUNK_SIZE - self.chunk_len;
            let data_write_len = data.len().min(free);
            let data_write;
            (data_write, data) = data.split_at(data_write_len);
            self.chunk_hasher.update(data_write);
            self.chunk_len += data_write.len();
            if self.chunk_len == CHUNK_SIZE {
                self.hash_chunk();
            }
        }
    }

    fn hash_chunk(&mut self) {
        let hash = self.chunk_hasher.finalize_fixed_reset();
        self.chunk_len = 0;
        self.chunk_list.add_chunk(&hash);
        trace!("ed2k: chunk {} complete", self.chunk_list.chunk_counter());
    }

    fn finalize_ref(&mut self) -> Output {
        if let Some(hash) = self.finished {
            return hash;
        }

        let hash = if self.chunk_list.chunk_counter() == 0 {
            // simple case: input data was less than a chunk.
            // state: |##> |
            debug!("ed2k: {} bytes in a single chunk", self.total_len);
            self.chunk_hasher.finalize_fixed_reset()
        } else {
            // Input ends between two chunk boundaries, or exactly on one.
            // state: |####|..|##> |  or  |####|..|> |
            //
            // The trailing chunk is hashed even when it is empty, so an input that
            // is an exact multiple of CHUNK_SIZE gets MD4("") appended to its chunk
            // list. This is a historical quirk of ED2K, and the hashes published by
            // existing tools depend on it. Do not skip the empty chunk.
            debug!(
                "ed2k: {} bytes over {} full chunks, {} trailing",
                self.total_len,
                self.chunk_list.chunk_counter(),
                self.chunk_len
            );
            let tail = self.chunk_hasher.finalize_fixed_reset();
            self.chunk_list.add_chunk(&tail);
            self.chunk_list.list_hash_reset()
        };
        self.chunk_len = 0;
        self.finished = Some(hash);
        hash
    }
}

impl fmt::Debug for Ed2k {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.finished {
            Some(hash) => write!(f, "Ed2k {{ hash: {hash:x} }}"),
            None => f
                .debug_struct("Ed2k")
                .field("bytes_hashed", &self.total_len)
                .finish_non_exhaustive(),
        }
    }
}

impl Update for Ed2k {
    /// Feeds `data` into the hasher.
    ///
    /// # Panics
    ///
    /// Panics if the hasher was finalized through [`Ed2k::finish`],
    /// [`Ed2k::digest`] or [`Ed2k::hexdigest`] and not reset since.
    /// Use the inherent [`Ed2k::update`] to get an error instead.
    fn update(&mut self, data: &[u8]) {
        assert!(!self.is_finalized(), "{}", Error::AlreadyFinalized);
        self.absorb(data);
    }
}

impl OutputSizeUser for Ed2k {
    type OutputSize = U16;
}

impl FixedOutput for Ed2k {
    fn finalize_into(mut self, out: &mut Output) {
        *out = self.finalize_ref();
    }
}

impl HashMarker for Ed2k {}

impl Reset for Ed2k {
    fn reset(&mut self) {
        Ed2k::reset(self);
    }
}

impl FixedOutputReset for Ed2k {
    fn finalize_into_reset(&mut self, out: &mut Output) {
        *out = self.digest_reset();
    }
}

impl io::Write for Ed2k {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md4(data: &[u8]) -> Output {
        <Md4 as md4::Digest>::digest(data)
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn update_after_finish_fails() {
        let mut hasher = Ed2k::new();
        hasher.update("hello").unwrap().finish();
        assert!(matches!(
            hasher.update(" world"),
            Err(Error::AlreadyFinalized)
        ));
        // the rejected update leaves the hash untouched
        assert_eq!(hasher.hexdigest(), "866437cb7a794bce2b727acc0362ee27");
    }

    #[test]
    fn finish_is_idempotent() {
        let mut hasher = Ed2k::new();
        hasher.update(".").unwrap();
        let first = hasher.finish().digest();
        let second = hasher.finish().finish().digest();
        assert_eq!(first, second);
        assert_eq!(hasher.hexdigest(), "83ff6980515eb8d749238ec12e54baab");
    }

    #[test]
    fn reset_returns_to_fresh_state() {
        let mut hasher = Ed2k::new();
        hasher.update(vec![0x55u8; CHUNK_SIZE + 17]).unwrap();
        hasher.finish();
        hasher.reset();

        assert!(!hasher.is_finalized());
        assert_eq!(hasher.bytes_hashed(), 0);
        hasher.update("the quick brown fox").unwrap();
        assert_eq!(
            hasher.digest(),
            Ed2k::new().digest_of("the quick brown fox")
        );
    }

    #[test]
    fn reset_is_always_allowed() {
        let mut hasher = Ed2k::new();
        hasher.reset().reset();
        assert_eq!(hasher.hexdigest(), "31d6cfe0d16ae931b73c59d7e0c089c0");
    }

    #[test]
    fn full_chunks_are_drained_immediately() {
        let mut hasher = Ed2k::new();
        hasher.update(vec![0u8; CHUNK_SIZE - 1]).unwrap();
        assert_eq!(hasher.chunk_list.chunk_counter(), 0);
        assert_eq!(hasher.chunk_len, CHUNK_SIZE - 1);

        hasher.update([0u8]).unwrap();
        assert_eq!(hasher.chunk_list.chunk_counter(), 1);
        assert_eq!(hasher.chunk_len, 0);

        hasher.update(vec![0u8; 2 * CHUNK_SIZE + 5]).unwrap();
        assert_eq!(hasher.chunk_list.chunk_counter(), 3);
        assert_eq!(hasher.chunk_len, 5);
        assert_eq!(hasher.bytes_hashed(), 3 * CHUNK_SIZE as u64 + 5);
    }

    #[test]
    fn small_input_is_plain_md4() {
        let data = pattern(CHUNK_SIZE - 1);
        assert_eq!(Ed2k::new().digest_of(&data), md4(&data));
    }

    #[test]
    fn exact_chunk_appends_empty_hash() {
        let data = pattern(CHUNK_SIZE);
        let hash = Ed2k::new().digest_of(&data);

        let mut list = md4(&data).to_vec();
        list.extend_from_slice(&md4(b""));
        assert_eq!(hash, md4(&list));
        assert_ne!(hash, md4(&data));
        assert_eq!(format!("{hash:x}"), "22155255a2ed92712ccd01ad0eb9e8cb");
    }

    #[test]
    fn trailing_partial_chunk_is_hashed_once() {
        let data = pattern(CHUNK_SIZE + 9500);
        let (chunk, tail) = data.split_at(CHUNK_SIZE);

        let mut list = md4(chunk).to_vec();
        list.extend_from_slice(&md4(tail));
        assert_eq!(Ed2k::new().digest_of(&data), md4(&list));
    }

    #[test]
    fn uneven_updates_match_single_update() {
        for len in [CHUNK_SIZE - 9500, CHUNK_SIZE, CHUNK_SIZE + 9500] {
            let data = pattern(len);
            let expected = Ed2k::new().digest_of(&data);

            let mut hasher = Ed2k::new();
            for piece in data.chunks(1_234_567) {
                hasher.update(piece).unwrap();
            }
            assert_eq!(hasher.digest(), expected, "length {len}");
        }
    }

    #[test]
    fn boundary_reference_values() {
        let below = pattern(CHUNK_SIZE - 9500);
        let above = pattern(CHUNK_SIZE + 9500);
        assert_eq!(
            Ed2k::new().hexdigest_of(below),
            "98a76966dac92204b39d48b12c1cf5e3"
        );
        assert_eq!(
            Ed2k::new().hexdigest_of(above),
            "d230278650f2323d18b0ef08e0678e25"
        );
    }

    #[test]
    fn digest_reset_allows_reuse() {
        let mut hasher = Ed2k::new();
        hasher.update(".").unwrap();
        assert_eq!(hasher.hexdigest_reset(), "83ff6980515eb8d749238ec12e54baab");
        assert!(!hasher.is_finalized());
        hasher.update("").unwrap();
        assert_eq!(hasher.hexdigest_reset(), "31d6cfe0d16ae931b73c59d7e0c089c0");
    }

    #[test]
    fn debug_shows_hash_once_finalized() {
        let mut hasher = Ed2k::new();
        hasher.update("abc").unwrap();
        assert_eq!(format!("{hasher:?}"), "Ed2k { bytes_hashed: 3, .. }");
        hasher.finish();
        assert_eq!(
            format!("{hasher:?}"),
            format!("Ed2k {{ hash: {} }}", hasher.hexdigest())
        );
    }

    #[test]
    fn io_write_feeds_hasher() {
        let mut hasher = Ed2k::new();
        let copied = io::copy(&mut &b"jumps over the lazy old dog."[..], &mut hasher).unwrap();
        assert_eq!(copied, 28);
        assert_eq!(hasher.hexdigest(), "19c46ea62015d6ed476300c4dd208c67");

        let error = io::Write::write(&mut hasher, b"more").unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::Other);
    }

    #[test]
    #[should_panic(expected = "already finalized")]
    fn digest_trait_update_panics_when_finalized() {
        let mut hasher = Ed2k::new();
        hasher.finish();
        Update::update(&mut hasher, b"late");
    }
}
