//! Cryptographic utilities for KLAP device communication.
//!
//! Everything the KLAP protocol needs lives in the [`klap`] submodule:
//! PKCS#7 block padding, the credential hash derivations, and the
//! per-session AES-CBC cipher with its signed, sequence-numbered framing.

pub mod klap;

pub use klap::{KlapEncryptionSession, generate_auth_hash, generate_auth_hash_v2};
