//! End-to-end format tests: every archive built here is torn back down
//! through the verifier and compared bag-for-bag against what went in.

use kista_core::algorithm::{EncryptionParams, MacDigest, MacParams, PbeAlgorithm};
use kista_core::oid::OidRegistry;
use kista_core::Error;
use kista_crypto::Provider;
use kista_pkcs12::{AttributeSet, BagValue, ContentInfo, Pfx, Pkcs12Builder, Pkcs12Verifier, SafeBag};

// ── Test data ────────────────────────────────────────────────────────

fn test_cert(serial: u32) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_u32(serial);
            w.next().write_bytes(b"to-be-signed certificate material");
            w.next().write_bytes(b"signature bits");
        })
    })
}

fn test_key(serial: u32) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_u32(0);
            w.next().write_u32(serial);
            w.next().write_bytes(b"modulus and exponents stand-in");
        })
    })
}

fn attrs1(registry: &OidRegistry) -> AttributeSet {
    let mut a = AttributeSet::new();
    a.add(registry, "friendlyName", "george").unwrap();
    a.add(registry, "localKeyID", "1234567890").unwrap();
    a.add(registry, "1.2.3.4.5", "MyCustomAttribute").unwrap();
    a
}

fn attrs2(registry: &OidRegistry) -> AttributeSet {
    let mut a = AttributeSet::new();
    a.add(registry, "friendlyName", "janet").unwrap();
    a.add(registry, "localKeyID", "987654321").unwrap();
    a.add(registry, "1.2.3.5.8.13", "AnotherCustomAttribute")
        .unwrap();
    a
}

fn attrs3(registry: &OidRegistry) -> AttributeSet {
    let mut a = AttributeSet::new();
    a.add(registry, "friendlyName", "wildduk").unwrap();
    a.add(registry, "localKeyID", "1122334455").unwrap();
    a.add(registry, "oracle-jdk-trustedkeyusage", "anyExtendedKeyUsage")
        .unwrap();
    a
}

fn attrs4(registry: &OidRegistry) -> AttributeSet {
    let mut a = AttributeSet::new();
    a.add(registry, "friendlyName", "wildduk").unwrap();
    a.add(registry, "localKeyID", "1122334455").unwrap();
    a
}

fn enc_default() -> EncryptionParams {
    EncryptionParams::new(PbeAlgorithm::PbeSha1And3KeyTripleDesCbc, "Password1", 1000)
}

fn mac_default() -> MacParams {
    MacParams::new(MacDigest::Sha1, "Password1", 1000)
}

fn register_custom_secret_oid(registry: &OidRegistry) {
    // Registration is idempotent, so every test may call this.
    registry
        .register("1.3.5.7.9", "CustomSecretOID", "My custom secret OID")
        .unwrap();
}

fn check_bags(expected: &[SafeBag], actual: &[SafeBag], password: &str, provider: &Provider) {
    assert_eq!(expected.len(), actual.len(), "bag count mismatch");
    for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
        assert!(
            e.matches(a, password, provider).unwrap(),
            "bag {i} does not match"
        );
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn test_single_cert_no_attrs() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), AttributeSet::new());
    builder.seal_content(None).unwrap();
    let der = builder.finish().unwrap();

    let verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    assert!(!verifier.has_mac());
    assert_eq!(verifier.content_count(), 1);
    let bags = verifier.unseal(0, "").unwrap();
    let expected = [SafeBag::cert(&test_cert(1), AttributeSet::new())];
    check_bags(&expected, &bags, "", &provider);
}

fn single_key_roundtrip(enc: &EncryptionParams, provider: &Provider) {
    let registry = OidRegistry::new();
    let key = test_key(1);

    let mut builder = Pkcs12Builder::new(&registry, provider);
    builder
        .add_key_bag(&key, AttributeSet::new(), Some(enc))
        .unwrap();
    builder.seal_content(None).unwrap();
    let der = builder.finish().unwrap();

    let verifier = Pkcs12Verifier::parse(&der, &registry, provider).unwrap();
    let bags = verifier.unseal(0, &enc.password).unwrap();
    assert_eq!(bags.len(), 1, "{}", enc.algorithm.short_name());
    assert!(
        matches!(bags[0].value, BagValue::ShroudedKey(_)),
        "{}",
        enc.algorithm.short_name()
    );
    // The decrypted key must be byte-for-byte the original DER.
    assert_eq!(
        bags[0].decrypted_key(&enc.password, provider).unwrap(),
        key,
        "{}",
        enc.algorithm.short_name()
    );
}

#[test]
fn test_single_key_enc_alg_default_provider() {
    let provider = Provider::default_set();
    for alg in provider.available_algorithms() {
        single_key_roundtrip(&EncryptionParams::new(alg, "Password1", 1000), &provider);
    }
}

#[test]
fn test_single_key_enc_alg_legacy_provider() {
    let provider = Provider::with_legacy();
    for alg in provider.available_algorithms() {
        single_key_roundtrip(&EncryptionParams::new(alg, "Password1", 1000), &provider);
    }
}

#[test]
fn test_single_key_enc_pass() {
    let provider = Provider::default_set();
    for password in ["Password1", ""] {
        let enc = EncryptionParams::new(enc_default().algorithm, password, 1000);
        single_key_roundtrip(&enc, &provider);
    }
}

#[test]
fn test_single_key_enc_iter() {
    let provider = Provider::default_set();
    for iterations in [1u32, 1000] {
        let enc = EncryptionParams::new(enc_default().algorithm, "Password1", iterations);
        single_key_roundtrip(&enc, &provider);
    }
}

#[test]
fn test_single_key_with_attrs() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();
    let key = test_key(1);

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder
        .add_key_bag(&key, attrs1(&registry), Some(&enc_default()))
        .unwrap();
    builder.seal_content(None).unwrap();
    let der = builder.finish().unwrap();

    let verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    let bags = verifier.unseal(0, "Password1").unwrap();
    let expected =
        [SafeBag::key(&key, attrs1(&registry), Some(&enc_default()), &provider).unwrap()];
    check_bags(&expected, &bags, "Password1", &provider);

    assert_eq!(bags[0].attrs.get("friendlyName").unwrap(), "george");
    assert_eq!(bags[0].attrs.get("localKeyID").unwrap(), "1234567890");
    assert_eq!(bags[0].attrs.get("1.2.3.4.5").unwrap(), "MyCustomAttribute");
}

fn single_cert_mac_roundtrip(mac: &MacParams) {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), AttributeSet::new());
    builder.seal_content(None).unwrap();
    let der = builder.finish_with_mac(mac).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    assert!(verifier.has_mac());
    verifier.verify_mac(&mac.password).unwrap();
    let bags = verifier.unseal(0, &mac.password).unwrap();
    let expected = [SafeBag::cert(&test_cert(1), AttributeSet::new())];
    check_bags(&expected, &bags, &mac.password, &provider);
}

#[test]
fn test_single_cert_mac_alg() {
    for &digest in MacDigest::ALL {
        single_cert_mac_roundtrip(&MacParams::new(digest, "Password1", 1000));
    }
}

#[test]
fn test_single_cert_mac_pass() {
    for password in ["Password1", ""] {
        single_cert_mac_roundtrip(&MacParams::new(MacDigest::Sha1, password, 1000));
    }
}

#[test]
fn test_single_cert_mac_iter() {
    for iterations in [1u32, 1000] {
        single_cert_mac_roundtrip(&MacParams::new(MacDigest::Sha1, "Password1", iterations));
    }
}

#[test]
fn test_cert_key_with_attrs_and_mac() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), attrs1(&registry));
    builder
        .add_key_bag(&test_key(1), attrs1(&registry), Some(&enc_default()))
        .unwrap();
    builder.seal_content(None).unwrap();
    let der = builder.finish_with_mac(&mac_default()).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    verifier.verify_mac("Password1").unwrap();
    let bags = verifier.unseal(0, "Password1").unwrap();
    let expected = [
        SafeBag::cert(&test_cert(1), attrs1(&registry)),
        SafeBag::key(&test_key(1), attrs1(&registry), Some(&enc_default()), &provider).unwrap(),
    ];
    check_bags(&expected, &bags, "Password1", &provider);
}

#[test]
fn test_cert_key_encrypted_content() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), attrs1(&registry));
    builder
        .add_key_bag(&test_key(1), attrs1(&registry), Some(&enc_default()))
        .unwrap();
    builder.seal_content(Some(&enc_default())).unwrap();
    let der = builder.finish_with_mac(&mac_default()).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    verifier.verify_mac("Password1").unwrap();
    assert!(verifier.content(0).unwrap().is_encrypted());

    let bags = verifier.unseal(0, "Password1").unwrap();
    let expected = [
        SafeBag::cert(&test_cert(1), attrs1(&registry)),
        SafeBag::key(&test_key(1), attrs1(&registry), Some(&enc_default()), &provider).unwrap(),
    ];
    check_bags(&expected, &bags, "Password1", &provider);

    // Wrong password fails the content decryption, not the parse.
    assert!(verifier.unseal(0, "nope").is_err());
}

#[test]
fn test_single_secret_encrypted_content() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();
    register_custom_secret_oid(&registry);

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder
        .add_secret_bag("CustomSecretOID", b"VerySecretMessage", attrs1(&registry))
        .unwrap();
    builder.seal_content(Some(&enc_default())).unwrap();
    let der = builder.finish_with_mac(&mac_default()).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    verifier.verify_mac("Password1").unwrap();
    let bags = verifier.unseal(0, "Password1").unwrap();
    assert_eq!(bags.len(), 1);
    match &bags[0].value {
        BagValue::Secret { type_oid, payload } => {
            assert_eq!(type_oid.to_string(), "1.3.5.7.9");
            assert_eq!(registry.short_name(type_oid).as_deref(), Some("CustomSecretOID"));
            assert_eq!(payload, b"VerySecretMessage");
        }
        other => panic!("expected secret bag, got {other:?}"),
    }
    check_bags(
        &[SafeBag::secret(&registry, "1.3.5.7.9", b"VerySecretMessage", attrs1(&registry)).unwrap()],
        &bags,
        "Password1",
        &provider,
    );
}

fn single_secret_roundtrip(enc: &EncryptionParams, provider: &Provider) {
    let registry = OidRegistry::new();
    register_custom_secret_oid(&registry);

    let mut builder = Pkcs12Builder::new(&registry, provider);
    builder
        .add_secret_bag("CustomSecretOID", b"VerySecretMessage", attrs1(&registry))
        .unwrap();
    builder.seal_content(Some(enc)).unwrap();
    let der = builder.finish_with_mac(&mac_default()).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, provider).unwrap();
    verifier.verify_mac("Password1").unwrap();
    let bags = verifier.unseal(0, &enc.password).unwrap();
    check_bags(
        &[SafeBag::secret(&registry, "CustomSecretOID", b"VerySecretMessage", attrs1(&registry))
            .unwrap()],
        &bags,
        &enc.password,
        provider,
    );
}

#[test]
fn test_single_secret_enc_alg_default_provider() {
    let provider = Provider::default_set();
    for alg in provider.available_algorithms() {
        single_secret_roundtrip(&EncryptionParams::new(alg, "Password1", 1000), &provider);
    }
}

#[test]
fn test_single_secret_enc_alg_legacy_provider() {
    let provider = Provider::with_legacy();
    for alg in provider.available_algorithms() {
        single_secret_roundtrip(&EncryptionParams::new(alg, "Password1", 1000), &provider);
    }
}

#[test]
fn test_multiple_contents() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();
    register_custom_secret_oid(&registry);

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), attrs1(&registry));
    builder.add_cert_bag(&test_cert(2), attrs2(&registry));
    builder
        .add_key_bag(&test_key(1), attrs1(&registry), Some(&enc_default()))
        .unwrap();
    builder
        .add_key_bag(&test_key(2), attrs2(&registry), Some(&enc_default()))
        .unwrap();
    builder.seal_content(None).unwrap();

    builder
        .add_secret_bag("CustomSecretOID", b"VeryVerySecretMessage", attrs1(&registry))
        .unwrap();
    builder.seal_content(Some(&enc_default())).unwrap();

    let der = builder.finish_with_mac(&mac_default()).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    verifier.verify_mac("Password1").unwrap();
    assert_eq!(verifier.content_count(), 2);
    assert!(!verifier.content(0).unwrap().is_encrypted());
    assert!(verifier.content(1).unwrap().is_encrypted());

    // Content A: four bags, original insertion order.
    let bags_a = verifier.unseal(0, "Password1").unwrap();
    let expected_a = [
        SafeBag::cert(&test_cert(1), attrs1(&registry)),
        SafeBag::cert(&test_cert(2), attrs2(&registry)),
        SafeBag::key(&test_key(1), attrs1(&registry), Some(&enc_default()), &provider).unwrap(),
        SafeBag::key(&test_key(2), attrs2(&registry), Some(&enc_default()), &provider).unwrap(),
    ];
    check_bags(&expected_a, &bags_a, "Password1", &provider);
    let names: Vec<&str> = bags_a
        .iter()
        .map(|b| b.attrs.get("friendlyName").unwrap())
        .collect();
    assert_eq!(names, ["george", "janet", "george", "janet"]);

    // Content B follows A and holds the secret.
    let bags_b = verifier.unseal(1, "Password1").unwrap();
    check_bags(
        &[SafeBag::secret(
            &registry,
            "CustomSecretOID",
            b"VeryVerySecretMessage",
            attrs1(&registry),
        )
        .unwrap()],
        &bags_b,
        "Password1",
        &provider,
    );
}

#[test]
fn test_jdk_trusted_attr() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), attrs3(&registry));
    builder.seal_content(None).unwrap();
    let der = builder.finish_with_mac(&mac_default()).unwrap();

    let mut verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    verifier.verify_mac("Password1").unwrap();
    let bags = verifier.unseal(0, "Password1").unwrap();
    check_bags(
        &[SafeBag::cert(&test_cert(1), attrs3(&registry))],
        &bags,
        "Password1",
        &provider,
    );
    assert_eq!(
        bags[0].attrs.get("oracle-jdk-trustedkeyusage").unwrap(),
        "anyExtendedKeyUsage"
    );
}

#[test]
fn test_mutate_attrs_on_reopened_bag() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    // Build with name/local-key-id only.
    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), attrs4(&registry));
    builder.seal_content(None).unwrap();
    let der = builder.finish().unwrap();

    // Reopen, add the trusted-usage attribute, re-serialize.
    let verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
    let mut bags = verifier.unseal(0, "").unwrap();
    bags[0]
        .attrs
        .add(&registry, "oracle-jdk-trustedkeyusage", "anyExtendedKeyUsage")
        .unwrap();
    let content = ContentInfo::seal(&bags, None, &provider).unwrap();
    let der2 = Pfx::build(vec![content]).to_der();

    // The rewritten archive now carries the full attrs3 set.
    let verifier2 = Pkcs12Verifier::parse(&der2, &registry, &provider).unwrap();
    let bags2 = verifier2.unseal(0, "").unwrap();
    check_bags(
        &[SafeBag::cert(&test_cert(1), attrs3(&registry))],
        &bags2,
        "",
        &provider,
    );
}

#[test]
fn test_legacy_gating_both_ways() {
    let registry = OidRegistry::new();
    let legacy_only = EncryptionParams::new(PbeAlgorithm::PbeSha1And128BitRc4, "Password1", 1000);

    // Without the legacy provider, sealing refuses the scheme.
    let stripped = Provider::default_set();
    let mut builder = Pkcs12Builder::new(&registry, &stripped);
    builder.add_cert_bag(&test_cert(1), AttributeSet::new());
    assert!(matches!(
        builder.seal_content(Some(&legacy_only)).unwrap_err(),
        Error::UnsupportedAlgorithm(_)
    ));

    // With it, the same call succeeds...
    let legacy = Provider::with_legacy();
    let mut builder = Pkcs12Builder::new(&registry, &legacy);
    builder.add_cert_bag(&test_cert(1), AttributeSet::new());
    builder.seal_content(Some(&legacy_only)).unwrap();
    let der = builder.finish().unwrap();

    // ...and the resulting archive decodes only where legacy is loaded.
    let verifier = Pkcs12Verifier::parse(&der, &registry, &legacy).unwrap();
    assert_eq!(verifier.unseal(0, "Password1").unwrap().len(), 1);

    let verifier = Pkcs12Verifier::parse(&der, &registry, &stripped).unwrap();
    assert!(matches!(
        verifier.unseal(0, "Password1").unwrap_err(),
        Error::UnsupportedAlgorithm(_)
    ));
}

#[test]
fn test_mac_detects_every_byte_mutation() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();

    let mut builder = Pkcs12Builder::new(&registry, &provider);
    builder.add_cert_bag(&test_cert(1), attrs1(&registry));
    builder.seal_content(None).unwrap();
    // Iteration count 1 keeps the sweep fast without weakening the check.
    let der = builder
        .finish_with_mac(&MacParams::new(MacDigest::Sha1, "Password1", 1))
        .unwrap();

    for i in 0..der.len() {
        let mut corrupt = der.clone();
        corrupt[i] ^= 1 << (i % 8);
        let survived = match Pkcs12Verifier::parse(&corrupt, &registry, &provider) {
            // Structural damage is a parse error; anything that still
            // parses must fail the MAC.
            Err(_) => false,
            Ok(mut verifier) => verifier.verify_mac("Password1").is_ok(),
        };
        assert!(!survived, "mutation at byte {i} went undetected");
    }
}

#[test]
fn test_empty_and_nonempty_passwords_are_disjoint() {
    let registry = OidRegistry::new();
    let provider = Provider::default_set();
    let key = test_key(1);

    for (enc_pass, wrong_pass) in [("", "Password1"), ("Password1", "")] {
        let enc = EncryptionParams::new(enc_default().algorithm, enc_pass, 1000);
        let mut builder = Pkcs12Builder::new(&registry, &provider);
        builder
            .add_key_bag(&key, AttributeSet::new(), Some(&enc))
            .unwrap();
        builder.seal_content(None).unwrap();
        let der = builder.finish().unwrap();

        let verifier = Pkcs12Verifier::parse(&der, &registry, &provider).unwrap();
        let bags = verifier.unseal(0, enc_pass).unwrap();
        assert_eq!(bags[0].decrypted_key(enc_pass, &provider).unwrap(), key);
        assert!(bags[0].decrypted_key(wrong_pass, &provider).is_err());
    }
}
