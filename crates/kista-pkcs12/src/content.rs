#![forbid(unsafe_code)]

//! Content infos: a sealed group of safe bags, in the clear or under
//! one whole-content encryption pass.
//!
//! Exactly one of the two representations is active; the serialized
//! content-type OID records the choice.

use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, DERWriter, Tag};

use kista_core::algorithm::EncryptionParams;
use kista_core::oid::OidRegistry;
use kista_core::{Error, Result};
use kista_crypto::Provider;

use crate::bag::SafeBag;
use crate::codec::{self, AlgId, EncryptedBlob};

// Content types (PKCS#7)
const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
const OID_ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

/// A sealed group of safe bags.
#[derive(Debug, Clone)]
pub enum ContentInfo {
    /// Clear safe-contents: the DER of `SEQUENCE OF SafeBag`.
    Data(Vec<u8>),
    /// The same DER passed whole through the PBE codec.
    Encrypted(EncryptedBlob),
}

impl ContentInfo {
    /// Seal `bags` — in the clear when `params` is `None`, otherwise
    /// encrypted under `params`.
    pub fn seal(
        bags: &[SafeBag],
        params: Option<&EncryptionParams>,
        provider: &Provider,
    ) -> Result<ContentInfo> {
        let der = yasna::construct_der(|w| {
            w.write_sequence_of(|w| {
                for bag in bags {
                    bag.write(w.next());
                }
            })
        });
        match params {
            None => Ok(ContentInfo::Data(der)),
            Some(p) => Ok(ContentInfo::Encrypted(codec::encrypt(&der, p, provider)?)),
        }
    }

    /// Recover the bags in order, decrypting first when needed.
    pub fn unseal(
        &self,
        password: &str,
        provider: &Provider,
        registry: &OidRegistry,
    ) -> Result<Vec<SafeBag>> {
        let der = match self {
            ContentInfo::Data(der) => der.clone(),
            ContentInfo::Encrypted(blob) => blob.decrypt(password, provider)?,
        };
        yasna::parse_ber(&der, |r| {
            r.collect_sequence_of(|r| SafeBag::parse(r, registry))
        })
        .map_err(|e| Error::Parse(format!("invalid safe contents: {e}")))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, ContentInfo::Encrypted(_))
    }

    /// Algorithm identifier of an encrypted content, if any.
    pub fn encryption_alg(&self) -> Option<&AlgId> {
        match self {
            ContentInfo::Data(_) => None,
            ContentInfo::Encrypted(blob) => Some(blob.alg()),
        }
    }

    pub(crate) fn write(&self, w: DERWriter) {
        match self {
            ContentInfo::Data(der) => w.write_sequence(|w| {
                w.next().write_oid(&oid(OID_DATA));
                w.next()
                    .write_tagged(Tag::context(0), |w| w.write_bytes(der));
            }),
            ContentInfo::Encrypted(blob) => w.write_sequence(|w| {
                w.next().write_oid(&oid(OID_ENCRYPTED_DATA));
                w.next().write_tagged(Tag::context(0), |w| {
                    // EncryptedData ::= SEQUENCE { version, EncryptedContentInfo }
                    w.write_sequence(|w| {
                        w.next().write_u8(0);
                        w.next().write_sequence(|w| {
                            w.next().write_oid(&oid(OID_DATA));
                            blob.alg.write(w.next());
                            w.next().write_tagged_implicit(Tag::context(0), |w| {
                                w.write_bytes(&blob.ciphertext)
                            });
                        });
                    })
                });
            }),
        }
    }

    pub(crate) fn parse(r: BERReader) -> std::result::Result<ContentInfo, ASN1Error> {
        r.read_sequence(|r| {
            let content_type = r.next().read_oid()?;

            if content_type == oid(OID_DATA) {
                let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                return Ok(ContentInfo::Data(der));
            }

            if content_type == oid(OID_ENCRYPTED_DATA) {
                return r.next().read_tagged(Tag::context(0), |r| {
                    r.read_sequence(|r| {
                        let version = r.next().read_u8()?;
                        if version != 0 {
                            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                        }
                        r.next().read_sequence(|r| {
                            let inner_type = r.next().read_oid()?;
                            if inner_type != oid(OID_DATA) {
                                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                            }
                            let alg = AlgId::parse(r.next())?;
                            let ciphertext = r
                                .next()
                                .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                            Ok(ContentInfo::Encrypted(EncryptedBlob { alg, ciphertext }))
                        })
                    })
                });
            }

            // Anything else fails closed.
            Err(ASN1Error::new(ASN1ErrorKind::Invalid))
        })
    }
}
