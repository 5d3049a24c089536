//! Blake2b helpers used for ids, key hashes and script hashes

use crate::hash::Hash;
use blake2::{
    digest::consts::{U28, U32},
    Blake2b, Digest,
};

/// Blake2b-256, used for transaction ids and the script data commitment
pub fn keyhash_256(data: &[u8]) -> Hash<32> {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Hash::new(out)
}

/// Blake2b-224, used for verification key hashes
pub fn keyhash_224(data: &[u8]) -> Hash<28> {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update(data);
    finalize_224(hasher)
}

/// Blake2b-224 over `tag || data`, the script hash construction
pub fn keyhash_224_tagged(tag: u8, data: &[u8]) -> Hash<28> {
    let mut hasher = Blake2b::<U28>::new();
    hasher.update([tag]);
    hasher.update(data);
    finalize_224(hasher)
}

fn finalize_224(hasher: Blake2b<U28>) -> Hash<28> {
    let mut out = [0u8; 28];
    out.copy_from_slice(&hasher.finalize());
    Hash::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_digests() {
        assert_eq!(
            keyhash_256(&[]).to_string(),
            "0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }

    #[test]
    fn tag_changes_script_hash() {
        assert_ne!(keyhash_224_tagged(1, b"abc"), keyhash_224_tagged(2, b"abc"));
        assert_eq!(keyhash_224_tagged(2, b"abc"), {
            let mut data = vec![2u8];
            data.extend_from_slice(b"abc");
            keyhash_224(&data)
        });
    }
}
