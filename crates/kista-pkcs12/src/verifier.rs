#![forbid(unsafe_code)]

//! Archive verification: parse, check the MAC, unseal contents.
//!
//! Mirrors the builder in reverse. When the envelope carries a MAC,
//! every unseal is gated behind a successful `verify_mac` — decrypted
//! content from an unverified archive must never be trusted.

use kista_core::oid::OidRegistry;
use kista_core::{Error, Result};
use kista_crypto::Provider;

use crate::bag::SafeBag;
use crate::content::ContentInfo;
use crate::pfx::Pfx;

pub struct Pkcs12Verifier<'a> {
    registry: &'a OidRegistry,
    provider: &'a Provider,
    pfx: Pfx,
    mac_checked: bool,
}

impl<'a> Pkcs12Verifier<'a> {
    /// Parse an envelope; contents stay sealed.
    pub fn parse(data: &[u8], registry: &'a OidRegistry, provider: &'a Provider) -> Result<Self> {
        Ok(Pkcs12Verifier {
            registry,
            provider,
            pfx: Pfx::parse(data)?,
            mac_checked: false,
        })
    }

    /// Whether the envelope carries integrity protection at all —
    /// distinct from whether a present MAC verifies.
    pub fn has_mac(&self) -> bool {
        self.pfx.mac().is_some()
    }

    /// Check the MAC. On success subsequent unseals are permitted; on
    /// mismatch the archive stays locked.
    pub fn verify_mac(&mut self, password: &str) -> Result<()> {
        self.pfx.verify_mac(password)?;
        self.mac_checked = true;
        Ok(())
    }

    pub fn content_count(&self) -> usize {
        self.pfx.contents().len()
    }

    /// The still-sealed content info at `index`.
    pub fn content(&self, index: usize) -> Result<&ContentInfo> {
        self.pfx
            .contents()
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("content info {index}")))
    }

    /// Unseal the content info at `index`, decrypting when needed.
    ///
    /// A present-but-unverified MAC makes this a protocol violation,
    /// not a data error.
    pub fn unseal(&self, index: usize, password: &str) -> Result<Vec<SafeBag>> {
        if self.has_mac() && !self.mac_checked {
            return Err(Error::ProtocolViolation(
                "MAC present but not verified before unsealing".into(),
            ));
        }
        self.content(index)?
            .unseal(password, self.provider, self.registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::AttributeSet;
    use crate::pfx::Pfx;
    use kista_core::algorithm::{MacDigest, MacParams};

    fn mac_protected_archive(provider: &Provider) -> Vec<u8> {
        let bag = SafeBag::cert(b"\x30\x03\x02\x01\x09", AttributeSet::new());
        let content = ContentInfo::seal(&[bag], None, provider).unwrap();
        Pfx::build_with_mac(
            vec![content],
            &MacParams::new(MacDigest::Sha256, "Password1", 1000),
        )
        .to_der()
    }

    #[test]
    fn test_unseal_before_mac_check_is_violation() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let der = mac_protected_archive(&provider);

        let verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
        assert!(verifier.has_mac());
        assert!(matches!(
            verifier.unseal(0, "Password1").unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[test]
    fn test_failed_mac_keeps_archive_locked() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let der = mac_protected_archive(&provider);

        let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
        assert!(matches!(
            verifier.verify_mac("wrong").unwrap_err(),
            Error::Integrity(_)
        ));
        assert!(matches!(
            verifier.unseal(0, "Password1").unwrap_err(),
            Error::ProtocolViolation(_)
        ));

        // The right password unlocks it.
        verifier.verify_mac("Password1").unwrap();
        assert_eq!(verifier.unseal(0, "Password1").unwrap().len(), 1);
    }

    #[test]
    fn test_unauthenticated_archive_unseals_directly() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let bag = SafeBag::cert(b"\x30\x03\x02\x01\x09", AttributeSet::new());
        let content = ContentInfo::seal(&[bag], None, &provider).unwrap();
        let der = Pfx::build(vec![content]).to_der();

        let verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
        assert!(!verifier.has_mac());
        assert_eq!(verifier.unseal(0, "").unwrap().len(), 1);
    }

    #[test]
    fn test_out_of_range_content_is_not_found() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let der = mac_protected_archive(&provider);
        let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
        verifier.verify_mac("Password1").unwrap();
        assert!(matches!(
            verifier.unseal(5, "Password1").unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
