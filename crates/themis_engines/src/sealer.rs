#![forbid(unsafe_code)]

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use themis_kernel_contracts::attribute::{SealedAttribute, SEALED_NONCE_LEN};

const SEALER_SCHEMA_VERSION: u8 = 1;
const SEALING_KEY_LEN: usize = 32;
const SEALED_WORD_LEN: usize = 8;

#[derive(Debug)]
pub enum SealerError {
    InvalidKeyLength(usize),
    UnsupportedSchema(u8),
    Uninitialized,
    Json(serde_json::Error),
    Decode(base64::DecodeError),
    Crypto,
}

impl std::fmt::Display for SealerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKeyLength(len) => write!(f, "invalid sealing key length: {len}"),
            Self::UnsupportedSchema(v) => write!(f, "unsupported sealed document schema: {v}"),
            Self::Uninitialized => write!(f, "handle is uninitialized"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Decode(err) => write!(f, "decode error: {err}"),
            Self::Crypto => write!(f, "sealing cryptographic operation failed"),
        }
    }
}

impl std::error::Error for SealerError {}

impl From<serde_json::Error> for SealerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<base64::DecodeError> for SealerError {
    fn from(value: base64::DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Transport form of a sealed handle, for carrying handles between a
/// provider and the registry as text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedAttributeDocument {
    pub schema_version: u8,
    pub nonce_b64: String,
    pub ciphertext_b64: String,
}

/// The sealing capability behind `SealedAttribute`. AES-256-GCM with a
/// fresh random nonce per seal; the registry core only ever sees the
/// opaque handle this produces.
#[derive(Debug, Clone)]
pub struct AttributeSealer {
    key: [u8; SEALING_KEY_LEN],
}

impl AttributeSealer {
    pub fn generate() -> Self {
        let mut key = [0u8; SEALING_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self, SealerError> {
        if bytes.len() != SEALING_KEY_LEN {
            return Err(SealerError::InvalidKeyLength(bytes.len()));
        }
        let mut key = [0u8; SEALING_KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    pub fn seal_u64(&self, value: u64) -> Result<SealedAttribute, SealerError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| SealerError::Crypto)?;
        let mut nonce_bytes = [0u8; SEALED_NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, value.to_be_bytes().as_slice())
            .map_err(|_| SealerError::Crypto)?;
        Ok(SealedAttribute::from_parts(nonce_bytes.to_vec(), ciphertext))
    }

    pub fn unseal_u64(&self, handle: &SealedAttribute) -> Result<u64, SealerError> {
        if !handle.is_initialized() {
            return Err(SealerError::Uninitialized);
        }
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| SealerError::Crypto)?;
        let nonce = Nonce::from_slice(&handle.nonce);
        let plaintext = cipher
            .decrypt(nonce, handle.ciphertext.as_ref())
            .map_err(|_| SealerError::Crypto)?;
        if plaintext.len() != SEALED_WORD_LEN {
            return Err(SealerError::Crypto);
        }
        let mut word = [0u8; SEALED_WORD_LEN];
        word.copy_from_slice(&plaintext);
        Ok(u64::from_be_bytes(word))
    }
}

pub fn transport_json(handle: &SealedAttribute) -> Result<String, SealerError> {
    if !handle.is_initialized() {
        return Err(SealerError::Uninitialized);
    }
    let doc = SealedAttributeDocument {
        schema_version: SEALER_SCHEMA_VERSION,
        nonce_b64: BASE64.encode(&handle.nonce),
        ciphertext_b64: BASE64.encode(&handle.ciphertext),
    };
    Ok(serde_json::to_string(&doc)?)
}

pub fn from_transport_json(json: &str) -> Result<SealedAttribute, SealerError> {
    let doc: SealedAttributeDocument = serde_json::from_str(json)?;
    if doc.schema_version != SEALER_SCHEMA_VERSION {
        return Err(SealerError::UnsupportedSchema(doc.schema_version));
    }
    let nonce = BASE64.decode(doc.nonce_b64.as_bytes())?;
    if nonce.len() != SEALED_NONCE_LEN {
        return Err(SealerError::Crypto);
    }
    let ciphertext = BASE64.decode(doc.ciphertext_b64.as_bytes())?;
    if ciphertext.is_empty() {
        return Err(SealerError::Crypto);
    }
    Ok(SealedAttribute::from_parts(nonce, ciphertext))
}
