#![forbid(unsafe_code)]

//! Archive construction: accumulate bags, seal them into content
//! infos, finalize the envelope.
//!
//! Transitions are one-directional. `finish`/`finish_with_mac` consume
//! the builder, so touching a finalized archive is a compile error;
//! the remaining misuse cases (sealing an empty group, finishing with
//! unsealed bags or nothing sealed) are [`Error::ProtocolViolation`].

use kista_core::algorithm::{EncryptionParams, MacParams};
use kista_core::oid::OidRegistry;
use kista_core::{Error, Result};
use kista_crypto::Provider;

use crate::attr::AttributeSet;
use crate::bag::SafeBag;
use crate::content::ContentInfo;
use crate::pfx::Pfx;

pub struct Pkcs12Builder<'a> {
    registry: &'a OidRegistry,
    provider: &'a Provider,
    pending: Vec<SafeBag>,
    contents: Vec<ContentInfo>,
}

impl<'a> Pkcs12Builder<'a> {
    pub fn new(registry: &'a OidRegistry, provider: &'a Provider) -> Self {
        Pkcs12Builder {
            registry,
            provider,
            pending: Vec::new(),
            contents: Vec::new(),
        }
    }

    /// Add a certificate bag to the pending group.
    pub fn add_cert_bag(&mut self, der: &[u8], attrs: AttributeSet) {
        self.pending.push(SafeBag::cert(der, attrs));
    }

    /// Add a key bag; shrouded when `enc` is present, clear otherwise.
    pub fn add_key_bag(
        &mut self,
        der: &[u8],
        attrs: AttributeSet,
        enc: Option<&EncryptionParams>,
    ) -> Result<()> {
        self.pending
            .push(SafeBag::key(der, attrs, enc, self.provider)?);
        Ok(())
    }

    /// Add a secret bag under a registered or dotted type identifier.
    pub fn add_secret_bag(
        &mut self,
        type_identifier: &str,
        payload: &[u8],
        attrs: AttributeSet,
    ) -> Result<()> {
        self.pending
            .push(SafeBag::secret(self.registry, type_identifier, payload, attrs)?);
        Ok(())
    }

    /// Seal the pending bags into one content info — in the clear with
    /// `None`, encrypted otherwise. The group must be non-empty.
    pub fn seal_content(&mut self, enc: Option<&EncryptionParams>) -> Result<()> {
        if self.pending.is_empty() {
            return Err(Error::ProtocolViolation(
                "no bags accumulated since the last seal".into(),
            ));
        }
        let bags = std::mem::take(&mut self.pending);
        self.contents
            .push(ContentInfo::seal(&bags, enc, self.provider)?);
        Ok(())
    }

    /// Finalize without integrity protection.
    pub fn finish(self) -> Result<Vec<u8>> {
        let contents = self.take_contents()?;
        Ok(Pfx::build(contents).to_der())
    }

    /// Finalize under a keyed MAC.
    pub fn finish_with_mac(self, mac: &MacParams) -> Result<Vec<u8>> {
        let contents = self.take_contents()?;
        Ok(Pfx::build_with_mac(contents, mac).to_der())
    }

    fn take_contents(self) -> Result<Vec<ContentInfo>> {
        if !self.pending.is_empty() {
            return Err(Error::ProtocolViolation(
                "bags accumulated but never sealed".into(),
            ));
        }
        if self.contents.is_empty() {
            return Err(Error::ProtocolViolation("no content infos sealed".into()));
        }
        Ok(self.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::Pkcs12Verifier;
    use kista_core::algorithm::{MacDigest, PbeAlgorithm};

    fn cert() -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(2);
                w.next().write_bytes(b"cert stand-in");
            })
        })
    }

    #[test]
    fn test_seal_without_bags_is_violation() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let mut builder = Pkcs12Builder::new(&registry, &provider);
        assert!(matches!(
            builder.seal_content(None).unwrap_err(),
            Error::ProtocolViolation(_)
        ));

        // Sealing twice in a row hits the same wall.
        builder.add_cert_bag(&cert(), AttributeSet::new());
        builder.seal_content(None).unwrap();
        assert!(matches!(
            builder.seal_content(None).unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[test]
    fn test_finish_with_unsealed_bags_is_violation() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let mut builder = Pkcs12Builder::new(&registry, &provider);
        builder.add_cert_bag(&cert(), AttributeSet::new());
        assert!(matches!(
            builder.finish().unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[test]
    fn test_finish_empty_is_violation() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let builder = Pkcs12Builder::new(&registry, &provider);
        assert!(matches!(
            builder.finish().unwrap_err(),
            Error::ProtocolViolation(_)
        ));
    }

    #[test]
    fn test_gated_algorithm_fails_at_seal() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let mut builder = Pkcs12Builder::new(&registry, &provider);
        builder.add_cert_bag(&cert(), AttributeSet::new());
        let legacy_only = EncryptionParams::new(PbeAlgorithm::PbeSha1And40BitRc2Cbc, "pw", 1000);
        assert!(matches!(
            builder.seal_content(Some(&legacy_only)).unwrap_err(),
            Error::UnsupportedAlgorithm(_)
        ));
    }

    #[test]
    fn test_build_then_verify() {
        let registry = OidRegistry::new();
        let provider = Provider::default_set();
        let mut builder = Pkcs12Builder::new(&registry, &provider);
        builder.add_cert_bag(&cert(), AttributeSet::new());
        builder.seal_content(None).unwrap();
        let der = builder
            .finish_with_mac(&MacParams::new(MacDigest::Sha1, "Password1", 1000))
            .unwrap();

        let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
        assert!(verifier.has_mac());
        verifier.verify_mac("Password1").unwrap();
        let bags = verifier.unseal(0, "Password1").unwrap();
        assert_eq!(bags.len(), 1);
    }
}
