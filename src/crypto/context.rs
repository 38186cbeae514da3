//! Per-viewer encryption context
//!
//! One context = one viewer = one key exchange. The context walks a fixed
//! state machine (`Uninitialized → KeyGenerated → Ready`): `initialize()`
//! generates an X25519 key pair, `set_remote_public_key()` completes the
//! Diffie–Hellman agreement and derives the symmetric key as SHA-256 of the
//! raw shared secret. Payloads are sealed with AES-256-GCM under a fresh
//! random 96-bit nonce, 16-byte tag appended to the ciphertext.
//!
//! Private and derived key material never leaves the process and is zeroized
//! on drop. A completed context is destroyed with its viewer, never re-keyed.

use crate::capture::Frame;
use crate::error::{CryptoError, CryptoResult};
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Public key length in bytes
pub const PUBLIC_KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits)
pub const NONCE_LEN: usize = 12;

/// Derived symmetric key length in bytes
pub const SHARED_KEY_LEN: usize = 32;

/// An AEAD-sealed payload: ciphertext with appended tag, plus its nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Ciphertext with the 16-byte authentication tag appended
    pub data: Vec<u8>,
    /// The nonce the payload was sealed under
    pub iv: [u8; NONCE_LEN],
}

enum ContextState {
    Uninitialized,
    KeyGenerated {
        secret: StaticSecret,
        public: PublicKey,
    },
    Ready {
        public: PublicKey,
        key: Zeroizing<[u8; SHARED_KEY_LEN]>,
    },
}

/// End-to-end encryption context for exactly one remote viewer
pub struct EncryptionContext {
    state: ContextState,
}

impl Default for EncryptionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionContext {
    /// Creates an uninitialized context
    pub fn new() -> Self {
        Self {
            state: ContextState::Uninitialized,
        }
    }

    /// Generates the local key pair and returns the public key
    ///
    /// Idempotent once generated: later calls return the same public key
    /// without touching the key material.
    pub fn initialize(&mut self) -> CryptoResult<[u8; PUBLIC_KEY_LEN]> {
        match &self.state {
            ContextState::Uninitialized => {
                let secret = StaticSecret::random_from_rng(OsRng);
                let public = PublicKey::from(&secret);
                let public_bytes = public.to_bytes();
                self.state = ContextState::KeyGenerated { secret, public };
                Ok(public_bytes)
            }
            ContextState::KeyGenerated { public, .. } | ContextState::Ready { public, .. } => {
                Ok(public.to_bytes())
            }
        }
    }

    /// Completes key agreement with the viewer's public key
    ///
    /// # Errors
    ///
    /// `NotInitialized` when called before [`initialize`](Self::initialize),
    /// `InvalidPeerKey` on a malformed or low-order peer key, or when the
    /// agreement already completed (the derived key is immutable).
    pub fn set_remote_public_key(&mut self, peer_public_key: &[u8]) -> CryptoResult<()> {
        match self.state {
            ContextState::Uninitialized => return Err(CryptoError::NotInitialized),
            ContextState::Ready { .. } => {
                return Err(CryptoError::InvalidPeerKey(
                    "key agreement already completed".to_string(),
                ));
            }
            ContextState::KeyGenerated { .. } => {}
        }

        let peer: [u8; PUBLIC_KEY_LEN] = peer_public_key.try_into().map_err(|_| {
            CryptoError::InvalidPeerKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_LEN,
                peer_public_key.len()
            ))
        })?;
        let peer = PublicKey::from(peer);

        let (secret, public) =
            match std::mem::replace(&mut self.state, ContextState::Uninitialized) {
                ContextState::KeyGenerated { secret, public } => (secret, public),
                // Checked above
                _ => return Err(CryptoError::NotInitialized),
            };

        let shared = secret.diffie_hellman(&peer);
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPeerKey(
                "low-order peer public key".to_string(),
            ));
        }

        let digest = Sha256::digest(shared.as_bytes());
        let mut key = Zeroizing::new([0u8; SHARED_KEY_LEN]);
        key.copy_from_slice(&digest);

        self.state = ContextState::Ready { public, key };
        Ok(())
    }

    /// Returns whether the local key pair has been generated
    pub fn is_initialized(&self) -> bool {
        !matches!(self.state, ContextState::Uninitialized)
    }

    /// Returns whether key agreement has completed
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ContextState::Ready { .. })
    }

    /// Returns the local public key, if generated
    pub fn public_key(&self) -> Option<[u8; PUBLIC_KEY_LEN]> {
        match &self.state {
            ContextState::Uninitialized => None,
            ContextState::KeyGenerated { public, .. } | ContextState::Ready { public, .. } => {
                Some(public.to_bytes())
            }
        }
    }

    fn ready_key(&self) -> CryptoResult<&[u8; SHARED_KEY_LEN]> {
        match &self.state {
            ContextState::Ready { key, .. } => Ok(key),
            _ => Err(CryptoError::NotReady),
        }
    }

    /// Encrypts an opaque payload under the derived key
    ///
    /// # Errors
    ///
    /// `NotReady` before key agreement completes.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<EncryptedPayload> {
        let key = self.ready_key()?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

        let mut iv = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let data = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| CryptoError::Cipher)?;

        Ok(EncryptedPayload { data, iv })
    }

    /// Decrypts a payload sealed by the peer under the same derived key
    ///
    /// # Errors
    ///
    /// `NotReady` before key agreement completes; `Integrity` when tag
    /// verification fails — the payload is discarded, partial plaintext is
    /// never returned.
    pub fn decrypt(&self, payload: &EncryptedPayload) -> CryptoResult<Vec<u8>> {
        let key = self.ready_key()?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

        cipher
            .decrypt(Nonce::from_slice(&payload.iv), payload.data.as_ref())
            .map_err(|_| CryptoError::Integrity)
    }

    /// Encrypts a captured frame's image bytes
    pub fn encrypt_frame(&self, frame: &Frame) -> CryptoResult<EncryptedPayload> {
        self.encrypt(&frame.image_bytes)
    }

    /// Decrypts a frame payload back to image bytes
    pub fn decrypt_frame(&self, payload: &EncryptedPayload) -> CryptoResult<Vec<u8>> {
        self.decrypt(payload)
    }
}

impl std::fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            ContextState::Uninitialized => "uninitialized",
            ContextState::KeyGenerated { .. } => "key-generated",
            ContextState::Ready { .. } => "ready",
        };
        f.debug_struct("EncryptionContext")
            .field("state", &state)
            .finish()
    }
}
