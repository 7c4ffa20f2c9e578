// PKCE (RFC 7636) verifier/challenge generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Random bytes behind each verifier. 64 bytes encode to 86 characters,
/// inside the 43..=128 range the RFC allows.
const VERIFIER_BYTES: usize = 64;

/// A code verifier bound to its S256 code challenge for one login attempt.
#[derive(Debug, Clone)]
pub struct PkcePair {
    verifier: SecretString,
    challenge: String,
}

impl PkcePair {
    /// Generate a fresh random verifier and derive its challenge.
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Build a pair from a known verifier.
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = challenge_for(&verifier);
        Self {
            verifier: SecretString::from(verifier),
            challenge,
        }
    }

    pub fn verifier(&self) -> &SecretString {
        &self.verifier
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }

    /// Check that `challenge` was derived from this pair's verifier.
    pub fn matches(&self, challenge: &str) -> bool {
        challenge_for(self.verifier.expose_secret()) == challenge
    }
}

/// `BASE64URL-NOPAD(SHA256(verifier))`.
fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}
