#![forbid(unsafe_code)]

//! Password-based encryption cipher dispatch.
//!
//! Two families:
//! * self-keyed PBE schemes (PKCS#12 appendix C and PKCS#5 v1.5), where
//!   key and IV are derived from the password and the parameters carry
//!   only salt and iteration count;
//! * PBES2, where PBKDF2 derives the key and the IV travels explicitly
//!   in the parameters.
//!
//! CBC modes use PKCS#7 padding; a padding failure on decrypt maps to
//! [`Error::Decryption`], which is how a wrong password surfaces for
//! these pre-AEAD schemes. RC4 is a raw keystream with no padding, so a
//! wrong password there is only caught by the caller's structure check.

use cipher::block_padding::Pkcs7;
use cipher::consts::{U16, U5};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};

use kista_core::algorithm::{MacDigest, PbeAlgorithm};
use kista_core::{Error, Result};

use crate::kdf::{self, Pbkdf2Prf, ID_IV, ID_KEY};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;
type Tdes2CbcEnc = cbc::Encryptor<des::TdesEde2>;
type Tdes2CbcDec = cbc::Decryptor<des::TdesEde2>;
type Tdes3CbcEnc = cbc::Encryptor<des::TdesEde3>;
type Tdes3CbcDec = cbc::Decryptor<des::TdesEde3>;
type Rc2CbcEnc = cbc::Encryptor<rc2::Rc2>;
type Rc2CbcDec = cbc::Decryptor<rc2::Rc2>;

// ── Self-keyed PBE schemes ───────────────────────────────────────────

/// Encrypt under a self-keyed PBE scheme (key/IV derived from password).
pub fn pbe_encrypt(
    alg: PbeAlgorithm,
    password: &str,
    salt: &[u8],
    iterations: u32,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let (key, iv) = derive_key_iv(alg, password, salt, iterations)?;
    match alg {
        PbeAlgorithm::PbeSha1And3KeyTripleDesCbc => {
            cbc_encrypt::<Tdes3CbcEnc>(&key, &iv, plaintext)
        }
        PbeAlgorithm::PbeSha1And2KeyTripleDesCbc => {
            cbc_encrypt::<Tdes2CbcEnc>(&key, &iv, plaintext)
        }
        PbeAlgorithm::PbeSha1And128BitRc2Cbc | PbeAlgorithm::PbeSha1And40BitRc2Cbc => {
            cbc_encrypt::<Rc2CbcEnc>(&key, &iv, plaintext)
        }
        PbeAlgorithm::PbeSha1AndDesCbc | PbeAlgorithm::PbeMd5AndDesCbc => {
            cbc_encrypt::<DesCbcEnc>(&key, &iv, plaintext)
        }
        PbeAlgorithm::PbeSha1And128BitRc4 => rc4_apply_128(&key, plaintext),
        PbeAlgorithm::PbeSha1And40BitRc4 => rc4_apply_40(&key, plaintext),
        other => Err(Error::Crypto(format!(
            "{} is not a self-keyed PBE scheme",
            other.short_name()
        ))),
    }
}

/// Decrypt under a self-keyed PBE scheme.
pub fn pbe_decrypt(
    alg: PbeAlgorithm,
    password: &str,
    salt: &[u8],
    iterations: u32,
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let (key, iv) = derive_key_iv(alg, password, salt, iterations)?;
    match alg {
        PbeAlgorithm::PbeSha1And3KeyTripleDesCbc => {
            cbc_decrypt::<Tdes3CbcDec>(&key, &iv, ciphertext)
        }
        PbeAlgorithm::PbeSha1And2KeyTripleDesCbc => {
            cbc_decrypt::<Tdes2CbcDec>(&key, &iv, ciphertext)
        }
        PbeAlgorithm::PbeSha1And128BitRc2Cbc | PbeAlgorithm::PbeSha1And40BitRc2Cbc => {
            cbc_decrypt::<Rc2CbcDec>(&key, &iv, ciphertext)
        }
        PbeAlgorithm::PbeSha1AndDesCbc | PbeAlgorithm::PbeMd5AndDesCbc => {
            cbc_decrypt::<DesCbcDec>(&key, &iv, ciphertext)
        }
        // RC4 is its own inverse.
        PbeAlgorithm::PbeSha1And128BitRc4 => rc4_apply_128(&key, ciphertext),
        PbeAlgorithm::PbeSha1And40BitRc4 => rc4_apply_40(&key, ciphertext),
        other => Err(Error::Crypto(format!(
            "{} is not a self-keyed PBE scheme",
            other.short_name()
        ))),
    }
}

/// Derive (key, IV) for a self-keyed scheme.
///
/// The appendix-C schemes use the PKCS#12 KDF over the BMP password;
/// the PKCS#5 v1.5 schemes use PBKDF1 over the raw password bytes with
/// key = DK[0..8], IV = DK[8..16].
fn derive_key_iv(
    alg: PbeAlgorithm,
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let pkcs12 = |key_len: usize, iv_len: usize| {
        let bmp = kdf::password_to_bmp(password);
        let key = kdf::pkcs12_kdf(MacDigest::Sha1, ID_KEY, &bmp, salt, iterations, key_len);
        let iv = if iv_len > 0 {
            kdf::pkcs12_kdf(MacDigest::Sha1, ID_IV, &bmp, salt, iterations, iv_len)
        } else {
            Vec::new()
        };
        (key, iv)
    };
    let pbkdf1 = |dk: Vec<u8>| (dk[0..8].to_vec(), dk[8..16].to_vec());

    match alg {
        PbeAlgorithm::PbeSha1And3KeyTripleDesCbc => Ok(pkcs12(24, 8)),
        PbeAlgorithm::PbeSha1And2KeyTripleDesCbc => Ok(pkcs12(16, 8)),
        PbeAlgorithm::PbeSha1And128BitRc2Cbc => Ok(pkcs12(16, 8)),
        PbeAlgorithm::PbeSha1And40BitRc2Cbc => Ok(pkcs12(5, 8)),
        PbeAlgorithm::PbeSha1And128BitRc4 => Ok(pkcs12(16, 0)),
        PbeAlgorithm::PbeSha1And40BitRc4 => Ok(pkcs12(5, 0)),
        PbeAlgorithm::PbeSha1AndDesCbc => Ok(pbkdf1(kdf::pbkdf1_sha1(
            password.as_bytes(),
            salt,
            iterations,
        ))),
        PbeAlgorithm::PbeMd5AndDesCbc => Ok(pbkdf1(kdf::pbkdf1_md5(
            password.as_bytes(),
            salt,
            iterations,
        ))),
        other => Err(Error::Crypto(format!(
            "{} is not a self-keyed PBE scheme",
            other.short_name()
        ))),
    }
}

// ── PBES2 ────────────────────────────────────────────────────────────

/// Key length for a PBES2-carried cipher.
pub fn pbes2_key_len(cipher: PbeAlgorithm) -> Result<usize> {
    match cipher {
        PbeAlgorithm::Aes128Cbc => Ok(16),
        PbeAlgorithm::Aes256Cbc => Ok(32),
        PbeAlgorithm::DesEde3Cbc => Ok(24),
        PbeAlgorithm::DesCbc => Ok(8),
        other => Err(Error::Crypto(format!(
            "{} is not a PBES2 cipher",
            other.short_name()
        ))),
    }
}

/// IV length for a PBES2-carried cipher.
pub fn pbes2_iv_len(cipher: PbeAlgorithm) -> Result<usize> {
    match cipher {
        PbeAlgorithm::Aes128Cbc | PbeAlgorithm::Aes256Cbc => Ok(16),
        PbeAlgorithm::DesEde3Cbc | PbeAlgorithm::DesCbc => Ok(8),
        other => Err(Error::Crypto(format!(
            "{} is not a PBES2 cipher",
            other.short_name()
        ))),
    }
}

/// Encrypt with PBES2: PBKDF2-derived key, explicit IV.
pub fn pbes2_encrypt(
    cipher: PbeAlgorithm,
    prf: Pbkdf2Prf,
    password: &str,
    salt: &[u8],
    iterations: u32,
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let key = kdf::pbkdf2_derive(
        prf,
        password.as_bytes(),
        salt,
        iterations,
        pbes2_key_len(cipher)?,
    );
    match cipher {
        PbeAlgorithm::Aes128Cbc => cbc_encrypt::<Aes128CbcEnc>(&key, iv, plaintext),
        PbeAlgorithm::Aes256Cbc => cbc_encrypt::<Aes256CbcEnc>(&key, iv, plaintext),
        PbeAlgorithm::DesEde3Cbc => cbc_encrypt::<Tdes3CbcEnc>(&key, iv, plaintext),
        PbeAlgorithm::DesCbc => cbc_encrypt::<DesCbcEnc>(&key, iv, plaintext),
        _ => unreachable!("pbes2_key_len rejected non-PBES2 cipher"),
    }
}

/// Decrypt with PBES2.
pub fn pbes2_decrypt(
    cipher: PbeAlgorithm,
    prf: Pbkdf2Prf,
    password: &str,
    salt: &[u8],
    iterations: u32,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let key = kdf::pbkdf2_derive(
        prf,
        password.as_bytes(),
        salt,
        iterations,
        pbes2_key_len(cipher)?,
    );
    match cipher {
        PbeAlgorithm::Aes128Cbc => cbc_decrypt::<Aes128CbcDec>(&key, iv, ciphertext),
        PbeAlgorithm::Aes256Cbc => cbc_decrypt::<Aes256CbcDec>(&key, iv, ciphertext),
        PbeAlgorithm::DesEde3Cbc => cbc_decrypt::<Tdes3CbcDec>(&key, iv, ciphertext),
        PbeAlgorithm::DesCbc => cbc_decrypt::<DesCbcDec>(&key, iv, ciphertext),
        _ => unreachable!("pbes2_key_len rejected non-PBES2 cipher"),
    }
}

// ── Shared cipher plumbing ───────────────────────────────────────────

fn cbc_encrypt<E>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>
where
    E: BlockEncryptMut + KeyIvInit,
{
    let enc = E::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("cipher init failed: {e}")))?;
    Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<D>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>
where
    D: BlockDecryptMut + KeyIvInit,
{
    let dec = D::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("cipher init failed: {e}")))?;
    dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption("bad padding (wrong password?)".into()))
}

fn rc4_apply_128(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut cipher = rc4::Rc4::<U16>::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("RC4 init failed: {e}")))?;
    let mut buf = data.to_vec();
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}

fn rc4_apply_40(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut cipher = rc4::Rc4::<U5>::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("RC4 init failed: {e}")))?;
    let mut buf = data.to_vec();
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}
