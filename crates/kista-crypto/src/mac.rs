#![forbid(unsafe_code)]

//! Keyed MAC computation over the envelope's AuthSafe bytes.
//!
//! The MAC key comes from the PKCS#12 KDF with purpose id 3, which is
//! what separates it from encryption-key derivation for the same
//! password, salt and iteration count.

use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;

use kista_core::algorithm::MacDigest;

use crate::kdf::{self, ID_MAC};

/// Derive the MAC key for `digest` from the BMP-encoded password.
pub fn derive_key(digest: MacDigest, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    kdf::pkcs12_kdf(
        digest,
        ID_MAC,
        password,
        salt,
        iterations,
        digest.output_len(),
    )
}

/// HMAC over `data` with the given digest.
pub fn hmac_digest(digest: MacDigest, key: &[u8], data: &[u8]) -> Vec<u8> {
    macro_rules! hm {
        ($d:ty) => {{
            let mut mac = Hmac::<$d>::new_from_slice(key).expect("HMAC accepts any key size");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }};
    }
    match digest {
        MacDigest::Sha1 => hm!(sha1::Sha1),
        MacDigest::Md5 => hm!(md5::Md5),
        MacDigest::Sha256 => hm!(sha2::Sha256),
        MacDigest::Sha512 => hm!(sha2::Sha512),
        MacDigest::Sha3_256 => hm!(sha3::Sha3_256),
        MacDigest::Sha3_512 => hm!(sha3::Sha3_512),
    }
}

/// Recompute the MAC and compare constant-time against `expected`.
pub fn verify(digest: MacDigest, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
    let computed = hmac_digest(digest, key, data);
    computed.ct_eq(expected).into()
}
