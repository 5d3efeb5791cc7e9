#![forbid(unsafe_code)]

//! Cryptographic operations for the Kista PKCS#12 library: key
//! derivation, password-based encryption, MAC computation, and the
//! algorithm-availability gate.

pub mod kdf;
pub mod mac;
pub mod pbe;
pub mod provider;

pub use provider::Provider;
