#![forbid(unsafe_code)]

//! Object identifiers and the process-wide identifier registry.
//!
//! The registry is an explicit, thread-safe table passed by reference to
//! the codec rather than ambient global state; callers create one,
//! register any custom identifiers, and hand it to the builder/verifier.

use std::fmt;
use std::sync::RwLock;

use crate::error::{Error, Result};

// ── Oid value type ───────────────────────────────────────────────────

/// A dotted-numeric object identifier, e.g. `1.3.5.7.9`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u64>);

impl Oid {
    pub fn from_slice(components: &[u64]) -> Self {
        Oid(components.to_vec())
    }

    pub fn components(&self) -> &[u64] {
        &self.0
    }

    /// Parse a dotted identifier string.
    pub fn parse(dotted: &str) -> Result<Oid> {
        let components: std::result::Result<Vec<u64>, _> =
            dotted.split('.').map(str::parse::<u64>).collect();
        let components =
            components.map_err(|_| Error::InvalidOid(format!("not a dotted OID: {dotted}")))?;
        if components.len() < 2 {
            return Err(Error::InvalidOid(format!(
                "OID needs at least two components: {dotted}"
            )));
        }
        Ok(Oid(components))
    }

    /// Whether `identifier` is syntactically a dotted OID rather than a
    /// registered name.
    pub fn looks_numeric(identifier: &str) -> bool {
        identifier
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for c in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{c}")?;
            first = false;
        }
        Ok(())
    }
}

// ── Attribute value encoding kinds ───────────────────────────────────

/// How an attribute value is encoded on the wire, resolved once from the
/// identifier at registration/lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// UTF-16BE BMPString (friendly names).
    BmpString,
    /// Raw OCTET STRING (local key identifiers).
    OctetString,
    /// UTF8String; the default for custom identifiers.
    Utf8String,
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct OidEntry {
    oid: Oid,
    short_name: String,
    long_name: String,
    kind: ValueKind,
}

/// Table of known object identifiers, supporting runtime registration
/// of custom (dotted OID, short name, long name) mappings and lookup in
/// both directions.
pub struct OidRegistry {
    entries: RwLock<Vec<OidEntry>>,
}

impl OidRegistry {
    /// A registry pre-loaded with the well-known attribute identifiers.
    pub fn new() -> Self {
        let builtins = vec![
            OidEntry {
                oid: Oid::from_slice(&[1, 2, 840, 113549, 1, 9, 20]),
                short_name: "friendlyName".into(),
                long_name: "PKCS #9 friendlyName".into(),
                kind: ValueKind::BmpString,
            },
            OidEntry {
                oid: Oid::from_slice(&[1, 2, 840, 113549, 1, 9, 21]),
                short_name: "localKeyID".into(),
                long_name: "PKCS #9 localKeyID".into(),
                kind: ValueKind::OctetString,
            },
            OidEntry {
                oid: Oid::from_slice(&[2, 16, 840, 1, 113894, 746875, 1, 1]),
                short_name: "oracle-jdk-trustedkeyusage".into(),
                long_name: "Trusted key usage (Oracle)".into(),
                kind: ValueKind::Utf8String,
            },
        ];
        OidRegistry {
            entries: RwLock::new(builtins),
        }
    }

    /// Register a custom identifier. Idempotent: registering the same
    /// (OID, short name) pair again succeeds without duplicating; a
    /// conflicting mapping for either side is an error.
    ///
    /// Custom identifiers get UTF-8 value encoding.
    pub fn register(&self, dotted: &str, short_name: &str, long_name: &str) -> Result<Oid> {
        let oid = Oid::parse(dotted)?;
        let mut entries = self.entries.write().expect("oid registry poisoned");
        for e in entries.iter() {
            if e.oid == oid {
                if e.short_name == short_name {
                    return Ok(oid);
                }
                return Err(Error::InvalidOid(format!(
                    "{dotted} already registered as {}",
                    e.short_name
                )));
            }
            if e.short_name == short_name {
                return Err(Error::InvalidOid(format!(
                    "name {short_name} already bound to {}",
                    e.oid
                )));
            }
        }
        entries.push(OidEntry {
            oid: oid.clone(),
            short_name: short_name.into(),
            long_name: long_name.into(),
            kind: ValueKind::Utf8String,
        });
        Ok(oid)
    }

    /// Resolve an identifier — a short name, long name, or dotted OID
    /// string — to its OID.
    pub fn resolve(&self, identifier: &str) -> Result<Oid> {
        if Oid::looks_numeric(identifier) {
            return Oid::parse(identifier);
        }
        let entries = self.entries.read().expect("oid registry poisoned");
        entries
            .iter()
            .find(|e| e.short_name == identifier || e.long_name == identifier)
            .map(|e| e.oid.clone())
            .ok_or_else(|| Error::NotFound(format!("identifier: {identifier}")))
    }

    /// Human-readable short name for an OID, if one is registered.
    pub fn short_name(&self, oid: &Oid) -> Option<String> {
        let entries = self.entries.read().expect("oid registry poisoned");
        entries
            .iter()
            .find(|e| &e.oid == oid)
            .map(|e| e.short_name.clone())
    }

    /// Value encoding for an attribute identifier. Unregistered OIDs
    /// decode with the UTF-8 rule.
    pub fn value_kind(&self, oid: &Oid) -> ValueKind {
        let entries = self.entries.read().expect("oid registry poisoned");
        entries
            .iter()
            .find(|e| &e.oid == oid)
            .map(|e| e.kind)
            .unwrap_or(ValueKind::Utf8String)
    }
}

impl Default for OidRegistry {
    fn default() -> Self {
        Self::new()
    }
}
