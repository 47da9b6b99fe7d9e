use crate::{
    error::{Error, Result},
    util::SecureRandom,
};

use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use sha3::{Digest, Sha3_256};

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// Authenticated encryption for cookie values.
///
/// `name` is bound to the sealed value so a value lifted from one cookie cannot be
/// replayed under another name.
pub trait CookieSealer: Send + Sync + 'static {
    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<String>;

    /// Must fail with [`Error::Decode`] for anything it did not seal itself.
    fn open(&self, name: &str, sealed: &str) -> Result<Vec<u8>>;
}

/// AES-256-GCM sealer keyed by a caller supplied secret of any length.
///
/// Nonces are drawn from `random`, normally the same source the shield mints tokens
/// from.
#[derive(Clone)]
pub struct AesGcmSealer {
    cipher: Aes256Gcm,
    random: Arc<dyn SecureRandom>,
}

impl AesGcmSealer {
    pub fn new(auth_key: &[u8], random: Arc<dyn SecureRandom>) -> Result<Self> {
        if auth_key.is_empty() {
            return Err(Error::Config("authentication key must not be empty".into()));
        }
        let key = Sha3_256::digest(auth_key);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|_| Error::Config("derived key has the wrong length".into()))?;
        Ok(Self { cipher, random })
    }
}

impl std::fmt::Debug for AesGcmSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSealer").finish_non_exhaustive()
    }
}

impl CookieSealer for AesGcmSealer {
    fn seal(&self, name: &str, plaintext: &[u8]) -> Result<String> {
        let mut nonce = [0; NONCE_LENGTH];
        self.random.fill(&mut nonce)?;
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| Error::Encode)?;

        let mut sealed = nonce.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(base64::encode_config(sealed, base64::URL_SAFE_NO_PAD))
    }

    fn open(&self, name: &str, sealed: &str) -> Result<Vec<u8>> {
        let sealed =
            base64::decode_config(sealed, base64::URL_SAFE_NO_PAD).map_err(|_| Error::Decode)?;
        if sealed.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(Error::Decode);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LENGTH);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: name.as_bytes(),
                },
            )
            .map_err(|_| Error::Decode)
    }
}
