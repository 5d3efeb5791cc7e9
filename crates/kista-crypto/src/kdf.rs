#![forbid(unsafe_code)]

//! Key derivation functions.
//!
//! Three families:
//! 1. PKCS#12 KDF (RFC 7292 Appendix B) — MAC keys and the appendix-C
//!    PBE schemes; takes the BMP-encoded password.
//! 2. PBKDF1 (PKCS#5 v1.5) — the pbeWithMD5AndDES / pbeWithSHA1AndDES
//!    schemes; takes the raw password bytes.
//! 3. PBKDF2 (RFC 8018) — PBES2; takes the raw password bytes.

use digest::{Digest, FixedOutputReset};
use kista_core::algorithm::MacDigest;

/// PKCS#12 KDF purpose IDs (RFC 7292 Appendix B.3).
///
/// The MAC id is what separates integrity-key derivation from
/// encryption-key derivation for the same password and salt.
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// PBKDF2 pseudo-random functions accepted in PBES2 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pbkdf2Prf {
    HmacSha1,
    HmacSha256,
}

/// Encode a password as a BMPString (UTF-16BE with two trailing zero
/// bytes), per RFC 7292 appendix B.1.
///
/// The empty password encodes to exactly `[0, 0]` — the terminator is
/// always present, which is what keeps `""` a well-defined, distinct
/// KDF input.
pub fn password_to_bmp(password: &str) -> Vec<u8> {
    let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
    for c in password.encode_utf16() {
        bmp.push((c >> 8) as u8);
        bmp.push(c as u8);
    }
    bmp.push(0);
    bmp.push(0);
    bmp
}

/// PKCS#12 KDF (RFC 7292 Appendix B).
///
/// `id` is 1 for key, 2 for IV, 3 for MAC key. `password` is the
/// BMP-encoded password. Output is `output_len` bytes.
pub fn pkcs12_kdf(
    digest: MacDigest,
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Vec<u8> {
    let u = digest.output_len();
    let v = digest.block_len();
    match digest {
        MacDigest::Sha1 => {
            pkcs12_kdf_generic::<sha1::Sha1>(id, password, salt, iterations, output_len, u, v)
        }
        MacDigest::Md5 => {
            pkcs12_kdf_generic::<md5::Md5>(id, password, salt, iterations, output_len, u, v)
        }
        MacDigest::Sha256 => {
            pkcs12_kdf_generic::<sha2::Sha256>(id, password, salt, iterations, output_len, u, v)
        }
        MacDigest::Sha512 => {
            pkcs12_kdf_generic::<sha2::Sha512>(id, password, salt, iterations, output_len, u, v)
        }
        MacDigest::Sha3_256 => {
            pkcs12_kdf_generic::<sha3::Sha3_256>(id, password, salt, iterations, output_len, u, v)
        }
        MacDigest::Sha3_512 => {
            pkcs12_kdf_generic::<sha3::Sha3_512>(id, password, salt, iterations, output_len, u, v)
        }
    }
}

fn pkcs12_kdf_generic<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    u: usize,
    v: usize,
) -> Vec<u8>
where
    D: Digest + FixedOutputReset,
{
    // Step 1: D = id repeated v times
    let d_block = vec![id; v];

    // Steps 2-4: I = S || P, each side extended to a multiple of v
    let s = extend_to_multiple(salt, v);
    let p = extend_to_multiple(password, v);
    let mut i_block = Vec::with_capacity(s.len() + p.len());
    i_block.extend_from_slice(&s);
    i_block.extend_from_slice(&p);

    let num_blocks = output_len.div_ceil(u);
    let mut result = Vec::with_capacity(num_blocks * u);

    for block_idx in 0..num_blocks {
        // Step 6a: A = H^c(D || I)
        let mut hasher = D::new();
        Digest::update(&mut hasher, &d_block);
        Digest::update(&mut hasher, &i_block);
        let mut a = hasher.finalize_reset();

        for _ in 1..iterations {
            Digest::update(&mut hasher, &a);
            a = hasher.finalize_reset();
        }

        result.extend_from_slice(&a);

        // Step 6b: I_j = (I_j + B + 1) mod 2^(v*8) for the next block
        if block_idx + 1 < num_blocks {
            let b = extend_to_multiple(&a, v);
            for j in 0..(i_block.len() / v) {
                add_one_plus_b(&mut i_block[j * v..(j + 1) * v], &b);
            }
        }
    }

    result.truncate(output_len);
    result
}

/// Extend `data` by repetition to the next multiple of `v` bytes.
fn extend_to_multiple(data: &[u8], v: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let len = data.len().div_ceil(v) * v;
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let remaining = len - out.len();
        let take = remaining.min(data.len());
        out.extend_from_slice(&data[..take]);
    }
    out
}

/// Compute (block + b + 1) mod 2^(v*8) in place; `b` has block length.
fn add_one_plus_b(block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for k in (0..block.len()).rev() {
        let sum = block[k] as u16 + b[k] as u16 + carry;
        block[k] = sum as u8;
        carry = sum >> 8;
    }
}

// ── PBKDF1 ───────────────────────────────────────────────────────────

/// PBKDF1 with MD5 (PKCS#5 v1.5). Returns the full 16-byte digest;
/// callers slice key and IV out of it.
pub fn pbkdf1_md5(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    pbkdf1_generic::<md5::Md5>(password, salt, iterations)
}

/// PBKDF1 with SHA-1 (PKCS#5 v1.5). Returns the full 20-byte digest.
pub fn pbkdf1_sha1(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    pbkdf1_generic::<sha1::Sha1>(password, salt, iterations)
}

fn pbkdf1_generic<D: Digest>(password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
    let mut hasher = D::new();
    Digest::update(&mut hasher, password);
    Digest::update(&mut hasher, salt);
    let mut dk = hasher.finalize();
    for _ in 1..iterations {
        let mut hasher = D::new();
        Digest::update(&mut hasher, &dk);
        dk = hasher.finalize();
    }
    dk.to_vec()
}

// ── PBKDF2 ───────────────────────────────────────────────────────────

/// Derive `key_len` bytes with PBKDF2 (RFC 8018).
pub fn pbkdf2_derive(
    prf: Pbkdf2Prf,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    key_len: usize,
) -> Vec<u8> {
    let mut key = vec![0u8; key_len];
    match prf {
        Pbkdf2Prf::HmacSha1 => {
            pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, iterations, &mut key)
        }
        Pbkdf2Prf::HmacSha256 => {
            pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, &mut key)
        }
    }
    key
}
