#![forbid(unsafe_code)]

//! Algorithm-availability gate.
//!
//! Mirrors a provider model where the legacy cipher set (single DES,
//! RC2, RC4, MD5-based derivation) may be absent at runtime. Both the
//! encode and decode paths consult the gate before touching a scheme;
//! naming a disabled algorithm is an error, never a silent downgrade.

use kista_core::algorithm::PbeAlgorithm;
use kista_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct Provider {
    legacy: bool,
}

impl Provider {
    /// Only the always-available algorithm subset.
    pub fn default_set() -> Self {
        Provider { legacy: false }
    }

    /// Default subset plus the legacy ciphers.
    pub fn with_legacy() -> Self {
        Provider { legacy: true }
    }

    pub fn has_legacy(&self) -> bool {
        self.legacy
    }

    pub fn is_available(&self, alg: PbeAlgorithm) -> bool {
        self.legacy || !alg.requires_legacy()
    }

    /// Error with `UnsupportedAlgorithm` unless `alg` is available.
    pub fn require(&self, alg: PbeAlgorithm) -> Result<()> {
        if self.is_available(alg) {
            Ok(())
        } else {
            Err(Error::UnsupportedAlgorithm(format!(
                "{} (legacy provider not loaded)",
                alg.short_name()
            )))
        }
    }

    /// The algorithms this provider accepts, in matrix order.
    pub fn available_algorithms(&self) -> Vec<PbeAlgorithm> {
        PbeAlgorithm::ALL
            .iter()
            .copied()
            .filter(|&a| self.is_available(a))
            .collect()
    }
}

impl Default for Provider {
    fn default() -> Self {
        Self::default_set()
    }
}
