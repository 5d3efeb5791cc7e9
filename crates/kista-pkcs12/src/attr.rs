#![forbid(unsafe_code)]

//! Bag attributes: ordered (identifier, value) pairs.
//!
//! Each identifier carries a value-encoding kind resolved through the
//! [`OidRegistry`] — BMPString for friendly names, OCTET STRING for
//! local key ids, UTF8String for everything else. Insertion order is
//! significant and survives round-trip: the attribute SET is emitted in
//! insertion order (legal BER), not DER-sorted.

use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, ASN1ErrorKind, BERReader, DERWriter};

use kista_core::oid::{Oid, OidRegistry, ValueKind};
use kista_core::{Error, Result};

/// One attribute: an identifier plus its string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    oid: Oid,
    name: Option<String>,
    kind: ValueKind,
    value: String,
}

impl Attribute {
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Registered short name, if the identifier is known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            w.next()
                .write_oid(&ObjectIdentifier::from_slice(self.oid.components()));
            w.next().write_set_of(|w| match self.kind {
                ValueKind::BmpString => w.next().write_bmp_string(&self.value),
                ValueKind::OctetString => w.next().write_bytes(self.value.as_bytes()),
                ValueKind::Utf8String => w.next().write_utf8string(&self.value),
            });
        })
    }

    fn parse(r: BERReader, registry: &OidRegistry) -> std::result::Result<Self, ASN1Error> {
        r.read_sequence(|r| {
            let raw = r.next().read_oid()?;
            let oid = Oid::from_slice(raw.components());
            let kind = registry.value_kind(&oid);
            let value = match kind {
                ValueKind::BmpString => r.next().collect_set_of(|s| s.read_bmp_string())?.pop(),
                ValueKind::OctetString => {
                    match r.next().collect_set_of(|s| s.read_bytes())?.pop() {
                        Some(bytes) => Some(
                            String::from_utf8(bytes)
                                .map_err(|_| ASN1Error::new(ASN1ErrorKind::Invalid))?,
                        ),
                        None => None,
                    }
                }
                ValueKind::Utf8String => r.next().collect_set_of(|s| s.read_utf8string())?.pop(),
            };
            let value = value.ok_or_else(|| ASN1Error::new(ASN1ErrorKind::Invalid))?;
            let name = registry.short_name(&oid);
            Ok(Attribute {
                oid,
                name,
                kind,
                value,
            })
        })
    }
}

/// Ordered attribute set attached to a safe bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    attrs: Vec<Attribute>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute. `identifier` is a registered short name, a
    /// long name, or a dotted OID string.
    pub fn add(&mut self, registry: &OidRegistry, identifier: &str, value: &str) -> Result<()> {
        let oid = registry.resolve(identifier)?;
        let kind = registry.value_kind(&oid);
        let name = registry.short_name(&oid);
        self.attrs.push(Attribute {
            oid,
            name,
            kind,
            value: value.to_owned(),
        });
        Ok(())
    }

    /// Look up a value by identifier (short name or dotted OID).
    pub fn get(&self, identifier: &str) -> Result<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.as_deref() == Some(identifier) || a.oid.to_string() == identifier)
            .map(|a| a.value.as_str())
            .ok_or_else(|| Error::NotFound(format!("attribute: {identifier}")))
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter()
    }

    /// Write the attribute SET in insertion order.
    ///
    /// yasna's `write_set_of` DER-sorts its elements, which would lose
    /// the caller's ordering, so the SET header is assembled by hand.
    pub(crate) fn write(&self, w: DERWriter) {
        let mut content = Vec::new();
        for attr in &self.attrs {
            content.extend_from_slice(&yasna::construct_der(|w| attr.write(w)));
        }
        w.write_der(&raw_tlv(0x31, &content));
    }

    pub(crate) fn parse(
        r: BERReader,
        registry: &OidRegistry,
    ) -> std::result::Result<Self, ASN1Error> {
        let attrs = r.collect_set_of(|r| Attribute::parse(r, registry))?;
        Ok(AttributeSet { attrs })
    }
}

/// Assemble one tag-length-value with the definite length form.
fn raw_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    let len = content.len();
    if len < 128 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}
