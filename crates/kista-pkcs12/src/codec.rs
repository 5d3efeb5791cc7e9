#![forbid(unsafe_code)]

//! Password-based encryption codec: self-describing encrypted blobs.
//!
//! An [`EncryptedBlob`] carries the algorithm identifier (scheme, salt,
//! iteration count and, for PBES2, the PRF and IV) next to the
//! ciphertext, so decryption needs nothing but the password. The
//! password itself is never embedded.

use rand::RngCore;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, DERWriter};

use kista_core::algorithm::{EncryptionParams, PbeAlgorithm};
use kista_core::oid::Oid;
use kista_core::{Error, Result};
use kista_crypto::kdf::Pbkdf2Prf;
use kista_crypto::{pbe, Provider};

const OID_PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
const OID_PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];
const OID_HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
const OID_HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

// ── Algorithm identifier ─────────────────────────────────────────────

/// A parsed or generated AlgorithmIdentifier for password-based
/// encryption.
#[derive(Debug, Clone)]
pub enum AlgId {
    /// Self-keyed PBE scheme: `SEQUENCE { salt, iterations }` params.
    Pkcs12Pbe {
        alg: PbeAlgorithm,
        salt: Vec<u8>,
        iterations: u32,
    },
    /// PBES2 with PBKDF2 key derivation and an explicit IV.
    Pbes2 {
        cipher: PbeAlgorithm,
        prf: Pbkdf2Prf,
        salt: Vec<u8>,
        iterations: u32,
        iv: Vec<u8>,
    },
    /// An identifier this implementation does not know. Kept verbatim
    /// so re-serialization is lossless; decryption refuses it.
    Other { oid: Oid, params: Option<Vec<u8>> },
}

impl AlgId {
    /// The scheme named by this identifier, if known.
    pub fn algorithm(&self) -> Option<PbeAlgorithm> {
        match self {
            AlgId::Pkcs12Pbe { alg, .. } => Some(*alg),
            AlgId::Pbes2 { cipher, .. } => Some(*cipher),
            AlgId::Other { .. } => None,
        }
    }

    pub fn iterations(&self) -> Option<u32> {
        match self {
            AlgId::Pkcs12Pbe { iterations, .. } | AlgId::Pbes2 { iterations, .. } => {
                Some(*iterations)
            }
            AlgId::Other { .. } => None,
        }
    }

    pub(crate) fn write(&self, w: DERWriter) {
        w.write_sequence(|w| match self {
            AlgId::Pkcs12Pbe {
                alg,
                salt,
                iterations,
            } => {
                w.next().write_oid(&oid(alg.oid()));
                w.next().write_sequence(|w| {
                    w.next().write_bytes(salt);
                    w.next().write_u32(*iterations);
                });
            }
            AlgId::Pbes2 {
                cipher,
                prf,
                salt,
                iterations,
                iv,
            } => {
                w.next().write_oid(&oid(OID_PBES2));
                w.next().write_sequence(|w| {
                    // keyDerivationFunc
                    w.next().write_sequence(|w| {
                        w.next().write_oid(&oid(OID_PBKDF2));
                        w.next().write_sequence(|w| {
                            w.next().write_bytes(salt);
                            w.next().write_u32(*iterations);
                            // HMAC-SHA1 is the DEFAULT and is omitted.
                            if *prf == Pbkdf2Prf::HmacSha256 {
                                w.next().write_sequence(|w| {
                                    w.next().write_oid(&oid(OID_HMAC_SHA256));
                                    w.next().write_null();
                                });
                            }
                        });
                    });
                    // encryptionScheme
                    w.next().write_sequence(|w| {
                        w.next().write_oid(&oid(cipher.oid()));
                        w.next().write_bytes(iv);
                    });
                });
            }
            AlgId::Other { oid: other, params } => {
                w.next()
                    .write_oid(&ObjectIdentifier::from_slice(other.components()));
                if let Some(der) = params {
                    w.next().write_der(der);
                }
            }
        })
    }

    pub(crate) fn parse(r: BERReader) -> std::result::Result<Self, ASN1Error> {
        r.read_sequence(|r| {
            let alg_oid = r.next().read_oid()?;

            if alg_oid == oid(OID_PBES2) {
                return r.next().read_sequence(|r| {
                    // keyDerivationFunc (must be PBKDF2)
                    let (salt, iterations, prf) = r.next().read_sequence(|r| {
                        let kdf_oid = r.next().read_oid()?;
                        if kdf_oid != oid(OID_PBKDF2) {
                            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                        }
                        r.next().read_sequence(|r| {
                            let salt = r.next().read_bytes()?;
                            let iterations = r.next().read_u32()?;

                            // Optional keyLength INTEGER, then optional
                            // PRF AlgorithmIdentifier (DEFAULT HMAC-SHA1).
                            let mut prf = Pbkdf2Prf::HmacSha1;
                            if let Some(der) = r.read_optional(|r| r.read_der())? {
                                if der.first() == Some(&0x30) {
                                    prf = parse_prf(&der)?;
                                } else if let Some(prf_der) =
                                    r.read_optional(|r| r.read_der())?
                                {
                                    prf = parse_prf(&prf_der)?;
                                }
                            }
                            Ok((salt, iterations, prf))
                        })
                    })?;

                    // encryptionScheme
                    let (cipher, iv) = r.next().read_sequence(|r| {
                        let enc_oid = r.next().read_oid()?;
                        let cipher = PbeAlgorithm::from_oid(enc_oid.components())
                            .filter(|c| c.is_pbes2())
                            .ok_or_else(|| ASN1Error::new(ASN1ErrorKind::Invalid))?;
                        let iv = r.next().read_bytes()?;
                        Ok((cipher, iv))
                    })?;

                    Ok(AlgId::Pbes2 {
                        cipher,
                        prf,
                        salt,
                        iterations,
                        iv,
                    })
                });
            }

            if let Some(alg) =
                PbeAlgorithm::from_oid(alg_oid.components()).filter(|a| !a.is_pbes2())
            {
                return r.next().read_sequence(|r| {
                    let salt = r.next().read_bytes()?;
                    let iterations = r.next().read_u32()?;
                    Ok(AlgId::Pkcs12Pbe {
                        alg,
                        salt,
                        iterations,
                    })
                });
            }

            let params = r.read_optional(|r| r.read_der())?;
            Ok(AlgId::Other {
                oid: Oid::from_slice(alg_oid.components()),
                params,
            })
        })
    }
}

fn parse_prf(der: &[u8]) -> std::result::Result<Pbkdf2Prf, ASN1Error> {
    yasna::parse_ber(der, |r| {
        r.read_sequence(|r| {
            let prf_oid = r.next().read_oid()?;
            let _null = r.read_optional(|r| r.read_null())?;
            if prf_oid == oid(OID_HMAC_SHA256) {
                Ok(Pbkdf2Prf::HmacSha256)
            } else if prf_oid == oid(OID_HMAC_SHA1) {
                Ok(Pbkdf2Prf::HmacSha1)
            } else {
                Err(ASN1Error::new(ASN1ErrorKind::Invalid))
            }
        })
    })
}

// ── Encrypted blob ───────────────────────────────────────────────────

/// Ciphertext together with the algorithm identifier needed to undo it.
#[derive(Debug, Clone)]
pub struct EncryptedBlob {
    pub(crate) alg: AlgId,
    pub(crate) ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `params`, drawing a fresh salt (and IV for
/// PBES2) so repeated calls never produce identical blobs.
pub fn encrypt(
    plaintext: &[u8],
    params: &EncryptionParams,
    provider: &Provider,
) -> Result<EncryptedBlob> {
    provider.require(params.algorithm)?;
    let mut rng = rand::thread_rng();

    if params.algorithm.is_pbes2() {
        let mut salt = vec![0u8; 16];
        rng.fill_bytes(&mut salt);
        let mut iv = vec![0u8; pbe::pbes2_iv_len(params.algorithm)?];
        rng.fill_bytes(&mut iv);
        let prf = Pbkdf2Prf::HmacSha256;
        let ciphertext = pbe::pbes2_encrypt(
            params.algorithm,
            prf,
            &params.password,
            &salt,
            params.iterations,
            &iv,
            plaintext,
        )?;
        Ok(EncryptedBlob {
            alg: AlgId::Pbes2 {
                cipher: params.algorithm,
                prf,
                salt,
                iterations: params.iterations,
                iv,
            },
            ciphertext,
        })
    } else {
        let mut salt = vec![0u8; 8];
        rng.fill_bytes(&mut salt);
        let ciphertext = pbe::pbe_encrypt(
            params.algorithm,
            &params.password,
            &salt,
            params.iterations,
            plaintext,
        )?;
        Ok(EncryptedBlob {
            alg: AlgId::Pkcs12Pbe {
                alg: params.algorithm,
                salt,
                iterations: params.iterations,
            },
            ciphertext,
        })
    }
}

impl EncryptedBlob {
    pub fn alg(&self) -> &AlgId {
        &self.alg
    }

    /// Decrypt with the parameters the blob describes.
    ///
    /// The result must parse as one complete BER element: CBC padding
    /// alone passes by luck roughly once in 256 wrong passwords, and
    /// the RC4 schemes have no padding at all.
    pub fn decrypt(&self, password: &str, provider: &Provider) -> Result<Vec<u8>> {
        let plaintext = match &self.alg {
            AlgId::Pkcs12Pbe {
                alg,
                salt,
                iterations,
            } => {
                provider.require(*alg)?;
                pbe::pbe_decrypt(*alg, password, salt, *iterations, &self.ciphertext)?
            }
            AlgId::Pbes2 {
                cipher,
                prf,
                salt,
                iterations,
                iv,
            } => {
                provider.require(*cipher)?;
                pbe::pbes2_decrypt(
                    *cipher,
                    *prf,
                    password,
                    salt,
                    *iterations,
                    iv,
                    &self.ciphertext,
                )?
            }
            AlgId::Other { oid, .. } => {
                return Err(Error::UnsupportedAlgorithm(format!("algorithm {oid}")));
            }
        };

        yasna::parse_ber(&plaintext, |r| r.read_der())
            .map_err(|_| Error::Decryption("wrong password or corrupted ciphertext".into()))?;
        Ok(plaintext)
    }

    /// EncryptedPrivateKeyInfo layout: `SEQUENCE { AlgId, OCTET STRING }`.
    pub(crate) fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            self.alg.write(w.next());
            w.next().write_bytes(&self.ciphertext);
        })
    }

    pub(crate) fn parse(r: BERReader) -> std::result::Result<Self, ASN1Error> {
        r.read_sequence(|r| {
            let alg = AlgId::parse(r.next())?;
            let ciphertext = r.next().read_bytes()?;
            Ok(EncryptedBlob { alg, ciphertext })
        })
    }
}
