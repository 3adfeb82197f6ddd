//! Session token codec
//!
//! Turns a serialized session into an opaque cookie value and back.
//!
//! Token format: base64url(nonce || ciphertext || tag), AES-256-GCM with a
//! random 96-bit nonce per token. The GCM tag covers the whole ciphertext,
//! so any modification of the token is rejected on decode.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use thiserror::Error;

/// Required key length in bytes
pub const SESSION_KEY_BYTES: usize = 32;

/// Upper bound on the encoded token, in characters
///
/// Browsers cap a single cookie at roughly 4 KiB.
pub const MAX_TOKEN_LEN: usize = 4096;

const AES_GCM_NONCE_BYTES: usize = 12;
const AES_GCM_TAG_BYTES: usize = 16;

/// Codec failures
///
/// `Decode` covers malformed, forged and foreign-key tokens alike.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("session key must be {SESSION_KEY_BYTES} bytes")]
    InvalidKey,

    #[error("failed to encode session token")]
    Encode,

    #[error("failed to decode session token")]
    Decode,
}

/// Encodes and decodes session cookie values
#[cfg_attr(test, mockall::automock)]
pub trait SessionCodec: Send + Sync {
    /// Encrypt and authenticate `payload` into a cookie-safe token
    fn encode(&self, payload: &[u8]) -> Result<String, CodecError>;

    /// Verify and decrypt a token produced by `encode`
    fn decode(&self, token: &str) -> Result<Vec<u8>, CodecError>;
}

/// AES-256-GCM session codec
#[derive(Clone)]
pub struct AesGcmSessionCodec {
    cipher: Aes256Gcm,
}

impl AesGcmSessionCodec {
    /// Create a codec from a 32-byte key
    pub fn new(key: &[u8; SESSION_KEY_BYTES]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Create a codec from a key slice, rejecting any length but 32
    pub fn from_slice(key: &[u8]) -> Result<Self, CodecError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CodecError::InvalidKey)?;
        Ok(Self { cipher })
    }
}

impl std::fmt::Debug for AesGcmSessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSessionCodec").finish_non_exhaustive()
    }
}

impl SessionCodec for AesGcmSessionCodec {
    fn encode(&self, payload: &[u8]) -> Result<String, CodecError> {
        let mut nonce = [0_u8; AES_GCM_NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|_| CodecError::Encode)?;

        let mut raw = Vec::with_capacity(AES_GCM_NONCE_BYTES + ciphertext.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);

        let token = URL_SAFE_NO_PAD.encode(raw);
        if token.len() > MAX_TOKEN_LEN {
            return Err(CodecError::Encode);
        }

        Ok(token)
    }

    fn decode(&self, token: &str) -> Result<Vec<u8>, CodecError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(CodecError::Decode);
        }

        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| CodecError::Decode)?;
        if raw.len() < AES_GCM_NONCE_BYTES + AES_GCM_TAG_BYTES {
            return Err(CodecError::Decode);
        }

        let (nonce, ciphertext) = raw.split_at(AES_GCM_NONCE_BYTES);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CodecError::Decode)
    }
}
