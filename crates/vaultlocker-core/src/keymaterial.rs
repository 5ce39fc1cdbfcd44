//! Key material generation.

use crate::error::{VaultlockerError, VaultlockerResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use vaultlocker_provider::KeyMaterial;
use zeroize::Zeroizing;

/// Size of generated keys.
pub const KEY_BITS: usize = 4096;
pub const KEY_BYTES: usize = KEY_BITS / 8;

/// Draw a fresh key from the OS CSPRNG.
///
/// The raw bytes are base64 encoded; the encoded text is what gets stored and
/// what `cryptsetup` receives as the passphrase. Failure to obtain entropy is
/// fatal.
pub fn generate_key() -> VaultlockerResult<KeyMaterial> {
    let mut raw = Zeroizing::new(vec![0u8; KEY_BYTES]);
    OsRng
        .try_fill_bytes(raw.as_mut_slice())
        .map_err(|err| VaultlockerError::Entropy(err.to_string()))?;
    let encoded = Zeroizing::new(STANDARD.encode(raw.as_slice()));
    Ok(KeyMaterial::new(encoded.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_decodes_to_fixed_length() {
        let key = generate_key().unwrap();
        let decoded = STANDARD.decode(key.expose()).unwrap();
        assert_eq!(decoded.len(), KEY_BYTES);
    }

    #[test]
    fn consecutive_keys_differ() {
        let first = generate_key().unwrap();
        let second = generate_key().unwrap();
        assert_ne!(first, second);
    }
}
