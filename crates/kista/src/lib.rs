#![forbid(unsafe_code)]

pub use kista_core as core;
pub use kista_crypto as crypto;
pub use kista_pkcs12 as pkcs12;
