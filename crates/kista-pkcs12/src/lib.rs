#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) archive builder and verifier.
//!
//! Assembles certificates, private keys and opaque secrets into the
//! nested, optionally encrypted and MAC-protected PFX container, and
//! parses such containers back while validating every structural and
//! cryptographic property on the way.
//!
//! Files are written as DER via `yasna::construct_der` and read as BER
//! via `yasna::parse_ber`, since PKCS#12 producers are not required to
//! emit strict DER.

pub mod attr;
pub mod bag;
pub mod builder;
pub mod codec;
pub mod content;
pub mod pfx;
pub mod verifier;

pub use attr::{Attribute, AttributeSet};
pub use bag::{BagValue, SafeBag};
pub use builder::Pkcs12Builder;
pub use codec::{AlgId, EncryptedBlob};
pub use content::ContentInfo;
pub use pfx::{MacData, Pfx};
pub use verifier::Pkcs12Verifier;
