#[macro_use]
extern crate afl;
extern crate ed2k_digest;

use ed2k_digest::Ed2k;

fn main() {
    fuzz!(|data: &[u8]| {
        let expected = ed2k_digest::digest(data);

        // the first byte picks a split point for a streamed run
        let split = data.first().map_or(0, |&b| b as usize * data.len() / 256);
        let (head, tail) = data.split_at(split);
        let mut hasher = Ed2k::new();
        hasher.update(head).unwrap().update(tail).unwrap();
        assert_eq!(hasher.digest(), expected);
        assert!(hasher.update(data).is_err());
    });
}
