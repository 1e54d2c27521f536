use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use crate::fingerprint::fingerprint;

// Ed25519-based ephemeral identity. One per session, generated at connect
// time and discarded at disconnect; the secret never leaves memory.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// The user-visible digest of this identity's public key.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key_bytes())
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}
