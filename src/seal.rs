//! Opaque seal/open transform for leaf values
//!
//! Used by callers that want to keep individual leaves unreadable at rest.
//! The tree codec never calls into this module.
//!
//! ## Token Layout
//!
//! ```text
//! hex( version[1] | nonce[12] | ciphertext + tag[16] )
//! ```
//!
//! Version and nonce are passed as AAD, so neither can be altered without
//! the tag check failing.

use crate::model::Leaf;
use crate::{Error, Result};
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Token format version
const TOKEN_VERSION: u8 = 0x01;

/// AES-GCM nonce size
const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size
const TAG_LEN: usize = 16;

/// version + nonce
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// AES-256 key size
pub const KEY_LEN: usize = 32;

/// Context string for deriving a key from a passphrase
const KEY_CONTEXT: &str = "flatfs seal v1 aes-256-gcm key";

/// Reversible, authenticated transform of a leaf into an opaque token
pub trait Sealer {
    fn seal(&self, value: &Leaf) -> Result<String>;
    fn open(&self, token: &str) -> Result<Leaf>;
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyBytes([u8; KEY_LEN]);

/// AES-256-GCM sealer with a fresh random nonce per token
pub struct AesGcmSealer {
    key: KeyBytes,
}

// Keeps key material out of logs
impl std::fmt::Debug for AesGcmSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmSealer")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl AesGcmSealer {
    /// Derive the key from a passphrase
    pub fn new(passphrase: &str) -> Self {
        Self::from_key(blake3::derive_key(KEY_CONTEXT, passphrase.as_bytes()))
    }

    /// Use raw key material
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        AesGcmSealer { key: KeyBytes(key) }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key.0))
    }
}

fn build_header(nonce: &[u8; NONCE_LEN]) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = TOKEN_VERSION;
    header[1..].copy_from_slice(nonce);
    header
}

impl Sealer for AesGcmSealer {
    fn seal(&self, value: &Leaf) -> Result<String> {
        let plaintext = serde_json::to_vec(value)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let header = build_header(&nonce);

        let ciphertext = self
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: &plaintext,
                    aad: &header,
                },
            )
            .map_err(|_| Error::Seal("encryption failed".into()))?;

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        token.extend_from_slice(&header);
        token.extend_from_slice(&ciphertext);
        Ok(hex::encode(token))
    }

    fn open(&self, token: &str) -> Result<Leaf> {
        let bytes = hex::decode(token).map_err(|e| Error::Seal(format!("bad token: {}", e)))?;
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(Error::Seal("token too short".into()));
        }
        if bytes[0] != TOKEN_VERSION {
            return Err(Error::Seal(format!("unsupported token version {}", bytes[0])));
        }

        let (header, ciphertext) = bytes.split_at(HEADER_LEN);
        let plaintext = self
            .cipher()
            .decrypt(
                Nonce::from_slice(&header[1..]),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| Error::Seal("authentication failed".into()))?;

        serde_json::from_slice(&plaintext).map_err(|e| Error::Seal(format!("bad plaintext: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let sealer = AesGcmSealer::new("correct horse");
        for leaf in [
            Leaf::from("secret note"),
            Leaf::from(42),
            Leaf::Bool(false),
            Leaf::Null,
        ] {
            let token = sealer.seal(&leaf).unwrap();
            assert!(!token.contains(&hex::encode("secret")));
            assert_eq!(sealer.open(&token).unwrap(), leaf);
        }
    }

    #[test]
    fn test_each_seal_uses_a_fresh_nonce() {
        let sealer = AesGcmSealer::new("k");
        let leaf = Leaf::from("same");
        let a = sealer.seal(&leaf).unwrap();
        let b = sealer.seal(&leaf).unwrap();
        assert_ne!(a, b);
        assert_eq!(sealer.open(&a).unwrap(), leaf);
        assert_eq!(sealer.open(&b).unwrap(), leaf);
    }

    #[test]
    fn test_token_layout() {
        let token = AesGcmSealer::new("k").seal(&Leaf::from("abc")).unwrap();
        let bytes = hex::decode(&token).unwrap();
        // "abc" serializes to 5 JSON bytes
        assert_eq!(bytes.len(), HEADER_LEN + 5 + TAG_LEN);
        assert_eq!(bytes[0], TOKEN_VERSION);
    }

    #[test]
    fn test_raw_key_matches_itself_only() {
        let sealer = AesGcmSealer::from_key([7u8; KEY_LEN]);
        let token = sealer.seal(&Leaf::from(1)).unwrap();
        assert_eq!(AesGcmSealer::from_key([7u8; KEY_LEN]).open(&token).unwrap(), Leaf::from(1));
        assert!(AesGcmSealer::from_key([8u8; KEY_LEN]).open(&token).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = AesGcmSealer::new("k1").seal(&Leaf::from("x")).unwrap();
        let err = AesGcmSealer::new("k2").open(&token).unwrap_err();
        assert!(matches!(err, Error::Seal(_)));
    }

    #[test]
    fn test_tampered_token_fails() {
        let sealer = AesGcmSealer::new("k");
        let token = sealer.seal(&Leaf::from("payload")).unwrap();
        let mut bytes = hex::decode(&token).unwrap();

        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(sealer.open(&hex::encode(&bytes)), Err(Error::Seal(_))));
        bytes[last] ^= 0x01;

        // Nonce is covered by the tag
        bytes[1] ^= 0x01;
        assert!(matches!(sealer.open(&hex::encode(&bytes)), Err(Error::Seal(_))));
        bytes[1] ^= 0x01;

        bytes[0] = 0x02;
        assert!(matches!(sealer.open(&hex::encode(&bytes)), Err(Error::Seal(_))));
    }

    #[test]
    fn test_garbage_token_fails() {
        let sealer = AesGcmSealer::new("k");
        assert!(sealer.open("zz").is_err());
        assert!(sealer.open("abcd").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", AesGcmSealer::from_key([0xab; KEY_LEN]));
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"));
    }
}
