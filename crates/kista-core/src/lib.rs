#![forbid(unsafe_code)]

//! Core types shared across the Kista PKCS#12 library: the error
//! taxonomy, algorithm identifiers, and the object identifier registry.

pub mod algorithm;
pub mod error;
pub mod oid;

pub use error::{Error, Result};
