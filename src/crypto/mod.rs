//! End-to-end encryption module
//!
//! Per-viewer key exchange and authenticated encryption of the frame stream:
//! X25519 Diffie–Hellman, SHA-256 key derivation, AES-256-GCM sealing.

pub mod context;

// Re-export commonly used types
pub use context::{
    EncryptedPayload, EncryptionContext, NONCE_LEN, PUBLIC_KEY_LEN, SHARED_KEY_LEN,
};
