#![forbid(unsafe_code)]

//! The PFX envelope: an ordered sequence of content infos plus an
//! optional keyed-MAC integrity envelope.
//!
//! The MAC covers the exact serialized AuthSafe bytes (the
//! `SEQUENCE OF ContentInfo`), with a key derived through the PKCS#12
//! KDF under its MAC purpose id.

use rand::RngCore;
use sha1::{Digest, Sha1};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, DERWriter, Tag};

use kista_core::algorithm::{EncryptionParams, MacDigest, MacParams, PbeAlgorithm};
use kista_core::oid::OidRegistry;
use kista_core::{Error, Result};
use kista_crypto::{kdf, mac, Provider};

use crate::attr::AttributeSet;
use crate::bag::SafeBag;
use crate::content::ContentInfo;

const OID_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];

fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

// ── MacData ──────────────────────────────────────────────────────────

/// The integrity envelope: digest algorithm, computed digest, KDF salt
/// and iteration count.
#[derive(Debug, Clone)]
pub struct MacData {
    pub digest: MacDigest,
    pub digest_value: Vec<u8>,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl MacData {
    /// Compute a fresh MAC over `auth_safe`.
    pub fn compute(params: &MacParams, auth_safe: &[u8]) -> MacData {
        let mut salt = vec![0u8; 8];
        rand::thread_rng().fill_bytes(&mut salt);

        let bmp = kdf::password_to_bmp(&params.password);
        let key = mac::derive_key(params.digest, &bmp, &salt, params.iterations);
        let digest_value = mac::hmac_digest(params.digest, &key, auth_safe);
        MacData {
            digest: params.digest,
            digest_value,
            salt,
            iterations: params.iterations,
        }
    }

    /// Recompute over `auth_safe` and compare constant-time.
    pub fn verify(&self, auth_safe: &[u8], password: &str) -> Result<()> {
        let bmp = kdf::password_to_bmp(password);
        let key = mac::derive_key(self.digest, &bmp, &self.salt, self.iterations);
        if mac::verify(self.digest, &key, auth_safe, &self.digest_value) {
            Ok(())
        } else {
            Err(Error::Integrity(
                "MAC mismatch (wrong password or corrupted archive)".into(),
            ))
        }
    }

    fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            // DigestInfo ::= SEQUENCE { AlgorithmIdentifier, OCTET STRING }
            w.next().write_sequence(|w| {
                w.next().write_sequence(|w| {
                    w.next()
                        .write_oid(&ObjectIdentifier::from_slice(self.digest.oid()));
                    w.next().write_null();
                });
                w.next().write_bytes(&self.digest_value);
            });
            w.next().write_bytes(&self.salt);
            // iterations has DEFAULT 1 and is omitted at that value
            if self.iterations != 1 {
                w.next().write_u32(self.iterations);
            }
        })
    }

    fn parse(r: BERReader) -> std::result::Result<MacData, ASN1Error> {
        r.read_sequence(|r| {
            let (digest, digest_value) = r.next().read_sequence(|r| {
                let digest = r.next().read_sequence(|r| {
                    let digest_oid = r.next().read_oid()?;
                    let _null = r.read_optional(|r| r.read_null())?;
                    MacDigest::from_oid(digest_oid.components())
                        .ok_or_else(|| ASN1Error::new(ASN1ErrorKind::Invalid))
                })?;
                let digest_value = r.next().read_bytes()?;
                Ok((digest, digest_value))
            })?;

            let salt = r.next().read_bytes()?;
            let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);

            Ok(MacData {
                digest,
                digest_value,
                salt,
                iterations,
            })
        })
    }
}

// ── PFX ──────────────────────────────────────────────────────────────

/// A PKCS#12 envelope: ordered content infos, the serialized AuthSafe
/// they came from, and the optional MAC over it.
#[derive(Debug, Clone)]
pub struct Pfx {
    contents: Vec<ContentInfo>,
    mac: Option<MacData>,
    auth_safe_der: Vec<u8>,
}

impl Pfx {
    /// Assemble an unauthenticated envelope.
    pub fn build(contents: Vec<ContentInfo>) -> Pfx {
        let auth_safe_der = encode_auth_safe(&contents);
        Pfx {
            contents,
            mac: None,
            auth_safe_der,
        }
    }

    /// Assemble a MAC-protected envelope.
    pub fn build_with_mac(contents: Vec<ContentInfo>, params: &MacParams) -> Pfx {
        let auth_safe_der = encode_auth_safe(&contents);
        let mac = MacData::compute(params, &auth_safe_der);
        Pfx {
            contents,
            mac: Some(mac),
            auth_safe_der,
        }
    }

    /// The content infos in envelope order, still sealed.
    pub fn contents(&self) -> &[ContentInfo] {
        &self.contents
    }

    pub fn mac(&self) -> Option<&MacData> {
        self.mac.as_ref()
    }

    /// The exact bytes the MAC covers.
    pub fn auth_safe_der(&self) -> &[u8] {
        &self.auth_safe_der
    }

    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(3);
                // authSafe ContentInfo of type data wrapping the AuthSafe
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(OID_DATA));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_bytes(&self.auth_safe_der));
                });
                if let Some(mac) = &self.mac {
                    mac.write(w.next());
                }
            })
        })
    }

    /// Parse an envelope. Contents stay sealed; a missing MacData is a
    /// valid (unauthenticated) state.
    pub fn parse(data: &[u8]) -> Result<Pfx> {
        let (auth_safe_der, mac) = yasna::parse_ber(data, |r| {
            r.read_sequence(|r| {
                let version = r.next().read_u32()?;
                if version != 3 {
                    return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                }
                let auth_safe_der = r.next().read_sequence(|r| {
                    let content_type = r.next().read_oid()?;
                    if content_type != oid(OID_DATA) {
                        return Err(ASN1Error::new(ASN1ErrorKind::Invalid));
                    }
                    r.next().read_tagged(Tag::context(0), |r| r.read_bytes())
                })?;
                let mac = r.read_optional(MacData::parse)?;
                Ok((auth_safe_der, mac))
            })
        })
        .map_err(|e| Error::Parse(format!("invalid PKCS#12 envelope: {e}")))?;

        let contents = yasna::parse_ber(&auth_safe_der, |r| {
            r.collect_sequence_of(ContentInfo::parse)
        })
        .map_err(|e| Error::Parse(format!("invalid AuthSafe: {e}")))?;

        Ok(Pfx {
            contents,
            mac,
            auth_safe_der,
        })
    }

    /// Verify the MAC against `password`.
    ///
    /// Asking to verify an envelope that carries no MAC is API misuse;
    /// query [`Pfx::mac`] first.
    pub fn verify_mac(&self, password: &str) -> Result<()> {
        match &self.mac {
            Some(mac) => mac.verify(&self.auth_safe_der, password),
            None => Err(Error::ProtocolViolation("archive has no MAC".into())),
        }
    }

    /// Convenience assembler for the common one-cert-one-key layout:
    /// certificate in an encrypted content, shrouded key in a clear
    /// content, AES-256-CBC with 2048 iterations, SHA-256 MAC.
    pub fn create(
        cert_der: &[u8],
        key_der: &[u8],
        password: &str,
        friendly_name: &str,
        registry: &OidRegistry,
        provider: &Provider,
    ) -> Result<Pfx> {
        let enc = EncryptionParams::new(PbeAlgorithm::Aes256Cbc, password, 2048);

        let key_id: String = Sha1::digest(cert_der)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let mut attrs = AttributeSet::new();
        attrs.add(registry, "friendlyName", friendly_name)?;
        attrs.add(registry, "localKeyID", &key_id)?;

        let cert_bag = SafeBag::cert(cert_der, attrs.clone());
        let key_bag = SafeBag::key(key_der, attrs, Some(&enc), provider)?;

        let cert_content = ContentInfo::seal(&[cert_bag], Some(&enc), provider)?;
        let key_content = ContentInfo::seal(&[key_bag], None, provider)?;

        Ok(Pfx::build_with_mac(
            vec![cert_content, key_content],
            &MacParams::new(MacDigest::Sha256, password, 2048),
        ))
    }
}

fn encode_auth_safe(contents: &[ContentInfo]) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence_of(|w| {
            for content in contents {
                content.write(w.next());
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert_der() -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(2);
                w.next().write_bytes(b"certificate stand-in");
            })
        })
    }

    fn one_cert_content(provider: &Provider) -> ContentInfo {
        let bag = SafeBag::cert(&cert_der(), AttributeSet::new());
        ContentInfo::seal(&[bag], None, provider).unwrap()
    }

    #[test]
    fn test_build_parse_no_mac() {
        let provider = Provider::default_set();
        let pfx = Pfx::build(vec![one_cert_content(&provider)]);
        let der = pfx.to_der();

        let parsed = Pfx::parse(&der).unwrap();
        assert!(parsed.mac().is_none());
        assert_eq!(parsed.contents().len(), 1);
        assert!(matches!(
            parsed.verify_mac("any").unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[test]
    fn test_build_parse_with_mac_all_digests() {
        let provider = Provider::default_set();
        for &digest in MacDigest::ALL {
            let pfx = Pfx::build_with_mac(
                vec![one_cert_content(&provider)],
                &MacParams::new(digest, "Password1", 1000),
            );
            let parsed = Pfx::parse(&pfx.to_der()).unwrap();
            assert_eq!(parsed.mac().unwrap().digest, digest);
            parsed.verify_mac("Password1").unwrap();
            assert!(matches!(
                parsed.verify_mac("Password2").unwrap_err(),
                Error::Integrity(_)
            ));
        }
    }

    #[test]
    fn test_mac_iteration_one_omitted_and_restored() {
        let provider = Provider::default_set();
        let pfx = Pfx::build_with_mac(
            vec![one_cert_content(&provider)],
            &MacParams::new(MacDigest::Sha1, "Password1", 1),
        );
        let parsed = Pfx::parse(&pfx.to_der()).unwrap();
        assert_eq!(parsed.mac().unwrap().iterations, 1);
        parsed.verify_mac("Password1").unwrap();
    }

    #[test]
    fn test_version_must_be_three() {
        let provider = Provider::default_set();
        let pfx = Pfx::build(vec![one_cert_content(&provider)]);
        let mut der = pfx.to_der();
        // Skip the outer SEQUENCE header to the version INTEGER value.
        let header = if der[1] & 0x80 != 0 {
            2 + (der[1] & 0x7f) as usize
        } else {
            2
        };
        assert_eq!(&der[header..header + 2], &[0x02, 0x01]);
        der[header + 2] = 4;
        assert!(matches!(Pfx::parse(&der).unwrap_err(), Error::Parse(_)));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let provider = Provider::default_set();
        let mut der = Pfx::build(vec![one_cert_content(&provider)]).to_der();
        der.extend_from_slice(b"junk");
        assert!(matches!(Pfx::parse(&der).unwrap_err(), Error::Parse(_)));
    }

    #[test]
    fn test_create_roundtrip() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let key_der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(0);
                w.next().write_bytes(b"private key stand-in");
            })
        });

        let pfx = Pfx::create(
            &cert_der(),
            &key_der,
            "changeit",
            "server-1",
            &registry,
            &provider,
        )
        .unwrap();
        let parsed = Pfx::parse(&pfx.to_der()).unwrap();
        parsed.verify_mac("changeit").unwrap();
        assert_eq!(parsed.contents().len(), 2);
        assert!(parsed.contents()[0].is_encrypted());
        assert!(!parsed.contents()[1].is_encrypted());

        let cert_bags = parsed.contents()[0]
            .unseal("changeit", &provider, &registry)
            .unwrap();
        assert_eq!(cert_bags.len(), 1);
        assert_eq!(cert_bags[0].attrs.get("friendlyName").unwrap(), "server-1");

        let key_bags = parsed.contents()[1]
            .unseal("changeit", &provider, &registry)
            .unwrap();
        assert_eq!(
            key_bags[0].decrypted_key("changeit", &provider).unwrap(),
            key_der
        );
    }
}
