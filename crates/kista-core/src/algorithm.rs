#![forbid(unsafe_code)]

//! Password-based encryption schemes and MAC digests supported by the
//! container format, with their object identifiers and short names.

// ── PBE schemes ──────────────────────────────────────────────────────

/// A password-based encryption scheme.
///
/// The first four entries are block ciphers carried through PBES2
/// (PBKDF2 key derivation, explicit IV). The `PbeSha1And*` /
/// `PbeMd5And*` entries are the PKCS#12 appendix-C and PKCS#5 v1.5
/// schemes with their historical key derivation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PbeAlgorithm {
    Aes128Cbc,
    Aes256Cbc,
    DesEde3Cbc,
    DesCbc,
    PbeSha1And3KeyTripleDesCbc,
    PbeSha1And2KeyTripleDesCbc,
    PbeSha1And128BitRc2Cbc,
    PbeSha1And40BitRc2Cbc,
    PbeSha1And128BitRc4,
    PbeSha1And40BitRc4,
    PbeSha1AndDesCbc,
    PbeMd5AndDesCbc,
}

impl PbeAlgorithm {
    /// All schemes, in the order the format test matrix exercises them.
    pub const ALL: &'static [PbeAlgorithm] = &[
        PbeAlgorithm::Aes128Cbc,
        PbeAlgorithm::Aes256Cbc,
        PbeAlgorithm::DesEde3Cbc,
        PbeAlgorithm::DesCbc,
        PbeAlgorithm::PbeSha1And3KeyTripleDesCbc,
        PbeAlgorithm::PbeSha1And2KeyTripleDesCbc,
        PbeAlgorithm::PbeSha1And128BitRc2Cbc,
        PbeAlgorithm::PbeSha1And40BitRc2Cbc,
        PbeAlgorithm::PbeSha1And128BitRc4,
        PbeAlgorithm::PbeSha1And40BitRc4,
        PbeAlgorithm::PbeSha1AndDesCbc,
        PbeAlgorithm::PbeMd5AndDesCbc,
    ];

    /// Object identifier components.
    ///
    /// For the PBES2-carried ciphers this is the cipher OID (the scheme
    /// is selected by naming the cipher, and the envelope records
    /// id-PBES2 with the cipher in its parameters).
    pub fn oid(&self) -> &'static [u64] {
        match self {
            PbeAlgorithm::Aes128Cbc => &[2, 16, 840, 1, 101, 3, 4, 1, 2],
            PbeAlgorithm::Aes256Cbc => &[2, 16, 840, 1, 101, 3, 4, 1, 42],
            PbeAlgorithm::DesEde3Cbc => &[1, 2, 840, 113549, 3, 7],
            PbeAlgorithm::DesCbc => &[1, 3, 14, 3, 2, 7],
            PbeAlgorithm::PbeSha1And128BitRc4 => &[1, 2, 840, 113549, 1, 12, 1, 1],
            PbeAlgorithm::PbeSha1And40BitRc4 => &[1, 2, 840, 113549, 1, 12, 1, 2],
            PbeAlgorithm::PbeSha1And3KeyTripleDesCbc => &[1, 2, 840, 113549, 1, 12, 1, 3],
            PbeAlgorithm::PbeSha1And2KeyTripleDesCbc => &[1, 2, 840, 113549, 1, 12, 1, 4],
            PbeAlgorithm::PbeSha1And128BitRc2Cbc => &[1, 2, 840, 113549, 1, 12, 1, 5],
            PbeAlgorithm::PbeSha1And40BitRc2Cbc => &[1, 2, 840, 113549, 1, 12, 1, 6],
            PbeAlgorithm::PbeMd5AndDesCbc => &[1, 2, 840, 113549, 1, 5, 3],
            PbeAlgorithm::PbeSha1AndDesCbc => &[1, 2, 840, 113549, 1, 5, 10],
        }
    }

    /// Look a scheme up by object identifier.
    pub fn from_oid(oid: &[u64]) -> Option<PbeAlgorithm> {
        PbeAlgorithm::ALL.iter().copied().find(|a| a.oid() == oid)
    }

    /// Short algorithm name, as it appears in tooling output.
    pub fn short_name(&self) -> &'static str {
        match self {
            PbeAlgorithm::Aes128Cbc => "AES-128-CBC",
            PbeAlgorithm::Aes256Cbc => "AES-256-CBC",
            PbeAlgorithm::DesEde3Cbc => "DES-EDE3-CBC",
            PbeAlgorithm::DesCbc => "DES-CBC",
            PbeAlgorithm::PbeSha1And3KeyTripleDesCbc => "PBE-SHA1-3DES",
            PbeAlgorithm::PbeSha1And2KeyTripleDesCbc => "PBE-SHA1-2DES",
            PbeAlgorithm::PbeSha1And128BitRc2Cbc => "PBE-SHA1-RC2-128",
            PbeAlgorithm::PbeSha1And40BitRc2Cbc => "PBE-SHA1-RC2-40",
            PbeAlgorithm::PbeSha1And128BitRc4 => "PBE-SHA1-RC4-128",
            PbeAlgorithm::PbeSha1And40BitRc4 => "PBE-SHA1-RC4-40",
            PbeAlgorithm::PbeSha1AndDesCbc => "PBE-SHA1-DES",
            PbeAlgorithm::PbeMd5AndDesCbc => "PBE-MD5-DES",
        }
    }

    /// Whether this scheme is expressed through PBES2 on the wire.
    pub fn is_pbes2(&self) -> bool {
        matches!(
            self,
            PbeAlgorithm::Aes128Cbc
                | PbeAlgorithm::Aes256Cbc
                | PbeAlgorithm::DesEde3Cbc
                | PbeAlgorithm::DesCbc
        )
    }

    /// Whether the scheme is only available from the legacy provider.
    ///
    /// The always-available subset is AES-128/256-CBC, DES-EDE3-CBC and
    /// the two/three key triple-DES PBE schemes; everything else (single
    /// DES, RC2, RC4, MD5-based derivation) needs legacy support.
    pub fn requires_legacy(&self) -> bool {
        !matches!(
            self,
            PbeAlgorithm::Aes128Cbc
                | PbeAlgorithm::Aes256Cbc
                | PbeAlgorithm::DesEde3Cbc
                | PbeAlgorithm::PbeSha1And3KeyTripleDesCbc
                | PbeAlgorithm::PbeSha1And2KeyTripleDesCbc
        )
    }
}

// ── MAC digests ──────────────────────────────────────────────────────

/// Digest used for the envelope's keyed integrity MAC (HMAC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacDigest {
    Sha1,
    Md5,
    Sha256,
    Sha512,
    Sha3_256,
    Sha3_512,
}

impl MacDigest {
    pub const ALL: &'static [MacDigest] = &[
        MacDigest::Sha1,
        MacDigest::Md5,
        MacDigest::Sha256,
        MacDigest::Sha512,
        MacDigest::Sha3_256,
        MacDigest::Sha3_512,
    ];

    pub fn oid(&self) -> &'static [u64] {
        match self {
            MacDigest::Sha1 => &[1, 3, 14, 3, 2, 26],
            MacDigest::Md5 => &[1, 2, 840, 113549, 2, 5],
            MacDigest::Sha256 => &[2, 16, 840, 1, 101, 3, 4, 2, 1],
            MacDigest::Sha512 => &[2, 16, 840, 1, 101, 3, 4, 2, 3],
            MacDigest::Sha3_256 => &[2, 16, 840, 1, 101, 3, 4, 2, 8],
            MacDigest::Sha3_512 => &[2, 16, 840, 1, 101, 3, 4, 2, 10],
        }
    }

    pub fn from_oid(oid: &[u64]) -> Option<MacDigest> {
        MacDigest::ALL.iter().copied().find(|d| d.oid() == oid)
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            MacDigest::Sha1 => "SHA1",
            MacDigest::Md5 => "MD5",
            MacDigest::Sha256 => "SHA256",
            MacDigest::Sha512 => "SHA512",
            MacDigest::Sha3_256 => "SHA3-256",
            MacDigest::Sha3_512 => "SHA3-512",
        }
    }

    /// Digest output length in bytes (u in the RFC 7292 KDF).
    pub fn output_len(&self) -> usize {
        match self {
            MacDigest::Md5 => 16,
            MacDigest::Sha1 => 20,
            MacDigest::Sha256 | MacDigest::Sha3_256 => 32,
            MacDigest::Sha512 | MacDigest::Sha3_512 => 64,
        }
    }

    /// Digest block length in bytes (v in the RFC 7292 KDF).
    ///
    /// For the SHA-3 family this is the sponge rate, which is what the
    /// KDF uses in place of a block size.
    pub fn block_len(&self) -> usize {
        match self {
            MacDigest::Md5 | MacDigest::Sha1 | MacDigest::Sha256 => 64,
            MacDigest::Sha512 => 128,
            MacDigest::Sha3_256 => 136,
            MacDigest::Sha3_512 => 72,
        }
    }
}

// ── Parameter bundles ────────────────────────────────────────────────

/// Parameters governing one password-based encryption operation.
///
/// An empty password is a valid value distinct from "no encryption";
/// iteration counts of 1 and 1000 are both in normal use. The iteration
/// count directly bounds CPU cost and is entirely caller-controlled.
#[derive(Debug, Clone)]
pub struct EncryptionParams {
    pub algorithm: PbeAlgorithm,
    pub password: String,
    pub iterations: u32,
}

impl EncryptionParams {
    pub fn new(algorithm: PbeAlgorithm, password: &str, iterations: u32) -> Self {
        Self {
            algorithm,
            password: password.to_owned(),
            iterations,
        }
    }
}

/// Parameters governing the envelope MAC.
#[derive(Debug, Clone)]
pub struct MacParams {
    pub digest: MacDigest,
    pub password: String,
    pub iterations: u32,
}

impl MacParams {
    pub fn new(digest: MacDigest, password: &str, iterations: u32) -> Self {
        Self {
            digest,
            password: password.to_owned(),
            iterations,
        }
    }
}
