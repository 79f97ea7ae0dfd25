//! SSH key generation for machines and managed control planes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::rngs::OsRng;
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::PrivateKey;
use tracing::info;

use crate::error::{Error, Result};

/// Size of generated RSA keys.
pub const SSH_KEY_BITS: usize = 2048;

/// Generate an RSA key pair and return the base64-encoded authorized-keys
/// line of its public half. The private half is discarded.
pub fn generate_ssh_public_key() -> Result<String> {
    let keypair = RsaKeypair::random(&mut OsRng, SSH_KEY_BITS)
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    let private = PrivateKey::new(KeypairData::from(keypair), "")
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    let line = private
        .public_key()
        .to_openssh()
        .map_err(|e| Error::KeyGeneration(e.to_string()))?;
    info!(bits = SSH_KEY_BITS, "Generated SSH public key");
    Ok(STANDARD.encode(format!("{line}\n")))
}

/// Fill an empty key with a freshly generated one.
pub fn set_ssh_public_key_default(key: &mut String) -> Result<()> {
    if key.is_empty() {
        *key = generate_ssh_public_key()?;
    }
    Ok(())
}
