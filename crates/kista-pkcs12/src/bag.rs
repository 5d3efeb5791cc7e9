#![forbid(unsafe_code)]

//! Safe bags: typed payloads plus their attribute sets.
//!
//! Certificates and private keys are opaque DER blobs here; nothing in
//! the container interprets them beyond carrying them faithfully.

use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, DERWriter, Tag};

use kista_core::algorithm::EncryptionParams;
use kista_core::oid::{Oid, OidRegistry};
use kista_core::{Error, Result};
use kista_crypto::Provider;

use crate::attr::AttributeSet;
use crate::codec::{self, EncryptedBlob};

// Bag types (PKCS#12)
const OID_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
const OID_PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
const OID_CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
const OID_SECRET_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 5];

// Certificate type (PKCS#9)
const OID_X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

/// The typed payload of a safe bag.
#[derive(Debug, Clone)]
pub enum BagValue {
    /// X.509 certificate, DER-encoded.
    Cert(Vec<u8>),
    /// Private key in the clear, DER-encoded.
    Key(Vec<u8>),
    /// Private key under password-based encryption
    /// (pkcs8ShroudedKeyBag).
    ShroudedKey(EncryptedBlob),
    /// Opaque secret under a caller-chosen type OID.
    Secret { type_oid: Oid, payload: Vec<u8> },
}

/// A safe bag: payload plus attributes.
#[derive(Debug, Clone)]
pub struct SafeBag {
    pub value: BagValue,
    pub attrs: AttributeSet,
}

impl SafeBag {
    pub fn cert(der: &[u8], attrs: AttributeSet) -> SafeBag {
        SafeBag {
            value: BagValue::Cert(der.to_vec()),
            attrs,
        }
    }

    /// A key bag; with `enc` present the key is shrouded through the
    /// PBE codec, otherwise it is stored in the clear.
    pub fn key(
        der: &[u8],
        attrs: AttributeSet,
        enc: Option<&EncryptionParams>,
        provider: &Provider,
    ) -> Result<SafeBag> {
        let value = match enc {
            Some(params) => BagValue::ShroudedKey(codec::encrypt(der, params, provider)?),
            None => BagValue::Key(der.to_vec()),
        };
        Ok(SafeBag { value, attrs })
    }

    /// A secret bag. `type_identifier` is resolved through the registry
    /// (a registered name or a dotted OID).
    pub fn secret(
        registry: &OidRegistry,
        type_identifier: &str,
        payload: &[u8],
        attrs: AttributeSet,
    ) -> Result<SafeBag> {
        let type_oid = registry.resolve(type_identifier)?;
        Ok(SafeBag {
            value: BagValue::Secret {
                type_oid,
                payload: payload.to_vec(),
            },
            attrs,
        })
    }

    /// Plaintext key bytes, decrypting a shrouded bag if necessary.
    pub fn decrypted_key(&self, password: &str, provider: &Provider) -> Result<Vec<u8>> {
        match &self.value {
            BagValue::Key(der) => Ok(der.clone()),
            BagValue::ShroudedKey(blob) => blob.decrypt(password, provider),
            _ => Err(Error::ProtocolViolation("not a key bag".into())),
        }
    }

    /// Verification equality: attribute sets must match exactly
    /// (identifiers, values, order) and payloads byte-for-byte. Key
    /// bags are compared by plaintext — shrouded ciphertext is salted
    /// fresh on every encryption and is never compared directly.
    pub fn matches(&self, other: &SafeBag, password: &str, provider: &Provider) -> Result<bool> {
        if self.attrs != other.attrs {
            return Ok(false);
        }
        match (&self.value, &other.value) {
            (BagValue::Cert(a), BagValue::Cert(b)) => Ok(a == b),
            (
                BagValue::Secret {
                    type_oid: ta,
                    payload: pa,
                },
                BagValue::Secret {
                    type_oid: tb,
                    payload: pb,
                },
            ) => Ok(ta == tb && pa == pb),
            (
                BagValue::Key(_) | BagValue::ShroudedKey(_),
                BagValue::Key(_) | BagValue::ShroudedKey(_),
            ) => Ok(self.decrypted_key(password, provider)?
                == other.decrypted_key(password, provider)?),
            _ => Ok(false),
        }
    }

    pub(crate) fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            match &self.value {
                BagValue::Cert(der) => {
                    w.next().write_oid(&oid(OID_CERT_BAG));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            w.next().write_oid(&oid(OID_X509_CERTIFICATE));
                            w.next()
                                .write_tagged(Tag::context(0), |w| w.write_bytes(der));
                        })
                    });
                }
                BagValue::Key(der) => {
                    w.next().write_oid(&oid(OID_KEY_BAG));
                    w.next().write_tagged(Tag::context(0), |w| w.write_der(der));
                }
                BagValue::ShroudedKey(blob) => {
                    w.next().write_oid(&oid(OID_PKCS8_SHROUDED_KEY_BAG));
                    w.next().write_tagged(Tag::context(0), |w| blob.write(w));
                }
                BagValue::Secret { type_oid, payload } => {
                    w.next().write_oid(&oid(OID_SECRET_BAG));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            w.next()
                                .write_oid(&ObjectIdentifier::from_slice(type_oid.components()));
                            w.next()
                                .write_tagged(Tag::context(0), |w| w.write_bytes(payload));
                        })
                    });
                }
            }
            if !self.attrs.is_empty() {
                self.attrs.write(w.next());
            }
        })
    }

    pub(crate) fn parse(
        r: BERReader,
        registry: &OidRegistry,
    ) -> std::result::Result<SafeBag, ASN1Error> {
        r.read_sequence(|r| {
            let bag_type = r.next().read_oid()?;

            let value = if bag_type == oid(OID_CERT_BAG) {
                r.next().read_tagged(Tag::context(0), |r| {
                    r.read_sequence(|r| {
                        let cert_type = r.next().read_oid()?;
                        if cert_type != oid(OID_X509_CERTIFICATE) {
                            return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                        }
                        let der = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                        Ok(BagValue::Cert(der))
                    })
                })?
            } else if bag_type == oid(OID_KEY_BAG) {
                let der = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                BagValue::Key(der)
            } else if bag_type == oid(OID_PKCS8_SHROUDED_KEY_BAG) {
                let blob = r
                    .next()
                    .read_tagged(Tag::context(0), EncryptedBlob::parse)?;
                BagValue::ShroudedKey(blob)
            } else if bag_type == oid(OID_SECRET_BAG) {
                r.next().read_tagged(Tag::context(0), |r| {
                    r.read_sequence(|r| {
                        let type_oid = r.next().read_oid()?;
                        let payload = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                        Ok(BagValue::Secret {
                            type_oid: Oid::from_slice(type_oid.components()),
                            payload,
                        })
                    })
                })?
            } else {
                // Unknown bag types fail closed.
                return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
            };

            let attrs = r
                .read_optional(|r| AttributeSet::parse(r, registry))?
                .unwrap_or_default();

            Ok(SafeBag { value, attrs })
        })
    }
}
