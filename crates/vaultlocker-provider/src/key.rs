//! In-memory representation of dm-crypt key material.

use std::fmt;
use zeroize::Zeroizing;

/// Key material as stored in the secret store and handed to `cryptsetup`.
///
/// The value is the encoded text form of the key (what the store holds under
/// `dmcrypt_key`). It is wiped on drop and never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial(Zeroizing<String>);

impl KeyMaterial {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(Zeroizing::new(encoded.into()))
    }

    /// Text form, as written to the store.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Bytes piped to the device tool-chain on stdin.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial(<redacted {} bytes>)", self.0.len())
    }
}
