//! KLAP session cipher and credential hashing.
//!
//! KLAP encrypts every application payload with AES-128-CBC. The key
//! material is derived from three byte strings mixed during the handshake:
//! the client's `local_seed`, the device's `remote_seed`, and the
//! credential-derived `auth_hash`:
//!
//! - `key`       = sha256("lsk" + local + remote + auth)[..16]
//! - `iv prefix` = sha256("iv"  + local + remote + auth)[..12]
//! - `seq`       = sha256("iv"  + local + remote + auth)[12..16] as big-endian i32
//! - `sig salt`  = sha256("ldk" + local + remote + auth)[..28]
//!
//! The sequence counter is bumped once per encrypt and appears twice on the
//! wire: as the last four bytes of the IV and as the `seq` query parameter.
//! Each frame is `sha256(sig_salt + seq_be + ciphertext)` followed by the
//! ciphertext.
//!
//! # Authentication hashes
//!
//! The credential hash algorithm has changed across firmware generations:
//!
//! - v1: `md5(md5(email) + md5(password))` - 16 bytes
//! - v2: `sha256(sha1(email) + sha1(password))` - 32 bytes
//!
//! Both are implemented here; the handshake checks the device's phase-1
//! confirmation against every candidate to pick the right one.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::credentials::Credentials;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Length of the SHA-256 signature that prefixes every frame.
pub const SIGNATURE_LEN: usize = 32;

/// Generates the v1 (MD5-based) authentication hash for a credential set.
pub fn generate_auth_hash(credentials: &Credentials) -> [u8; 16] {
    let email_digest = Md5::digest(credentials.email.as_bytes());
    let password_digest = Md5::digest(credentials.expose_password().as_bytes());

    let mut hasher = Md5::new();
    hasher.update(email_digest);
    hasher.update(password_digest);
    hasher.finalize().into()
}

/// Generates the v2 (SHA-based) authentication hash for a credential set.
pub fn generate_auth_hash_v2(credentials: &Credentials) -> [u8; 32] {
    let email_digest = Sha1::digest(credentials.email.as_bytes());
    let password_digest = Sha1::digest(credentials.expose_password().as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(email_digest);
    hasher.update(password_digest);
    hasher.finalize().into()
}

/// Phase-1 confirmation hash for KLAP v1: `sha256(local_seed + auth_hash)`.
pub fn handshake1_seed_auth_hash(local_seed: &[u8], auth_hash: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(local_seed);
    hasher.update(auth_hash);
    hasher.finalize().into()
}

/// Phase-1 confirmation hash for KLAP v2:
/// `sha256(local_seed + remote_seed + auth_hash)`.
pub fn handshake1_seed_auth_hash_v2(
    local_seed: &[u8],
    remote_seed: &[u8],
    auth_hash: &[u8],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(local_seed);
    hasher.update(remote_seed);
    hasher.update(auth_hash);
    hasher.finalize().into()
}

/// Phase-2 proof hash for KLAP v1: `sha256(remote_seed + auth_hash)`.
pub fn handshake2_seed_auth_hash(remote_seed: &[u8], auth_hash: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(remote_seed);
    hasher.update(auth_hash);
    hasher.finalize().into()
}

/// Phase-2 proof hash for KLAP v2:
/// `sha256(remote_seed + local_seed + auth_hash)`.
///
/// The seed order is reversed relative to phase 1; the asymmetry is what
/// proves to the device that the client knows `auth_hash` rather than
/// replaying the confirmation it just received.
pub fn handshake2_seed_auth_hash_v2(
    local_seed: &[u8],
    remote_seed: &[u8],
    auth_hash: &[u8],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(remote_seed);
    hasher.update(local_seed);
    hasher.update(auth_hash);
    hasher.finalize().into()
}

/// Appends PKCS#7 padding up to the next 16-byte boundary.
///
/// Always adds at least one byte; an input that is already a multiple of
/// 16 grows by a full block.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let padding = AES_BLOCK_SIZE - (data.len() % AES_BLOCK_SIZE);
    let mut padded = Vec::with_capacity(data.len() + padding);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding, padding as u8);
    padded
}

/// Strips PKCS#7 padding.
///
/// Rejects a pad count of zero, above the block size, or longer than the
/// input. The fill bytes themselves are not checked, matching the device
/// firmware's own lenient unpadder.
pub fn unpad(data: &[u8]) -> Result<&[u8], KlapCryptoError> {
    let padding = *data.last().ok_or(KlapCryptoError::InvalidPadding)? as usize;
    if padding == 0 || padding > AES_BLOCK_SIZE || padding > data.len() {
        return Err(KlapCryptoError::InvalidPadding);
    }
    Ok(&data[..data.len() - padding])
}

/// Encodes a sequence number the way it appears on the wire: four
/// big-endian bytes of its two's-complement representation.
fn seq_to_bytes(seq: i32) -> [u8; 4] {
    (seq as u32).to_be_bytes()
}

/// Per-session KLAP cipher state.
///
/// Created once at the end of the handshake. The key, IV prefix, and
/// signing salt are frozen; only the sequence counter mutates, and only
/// through [`encrypt`](Self::encrypt). The counter is a signed 32-bit
/// value and wraps negative on very long sessions, exactly like the
/// device firmware expects; reconnect before that point if the device's
/// behavior at the boundary matters.
pub struct KlapEncryptionSession {
    key: [u8; 16],
    iv: [u8; 12],
    seq: i32,
    sig: [u8; 28],
}

impl KlapEncryptionSession {
    /// Derives the session cipher state from the handshake inputs.
    pub fn new(local_seed: &[u8], remote_seed: &[u8], auth_hash: &[u8]) -> Self {
        let key_digest = derive_digest(b"lsk", local_seed, remote_seed, auth_hash);
        let iv_digest = derive_digest(b"iv", local_seed, remote_seed, auth_hash);
        let sig_digest = derive_digest(b"ldk", local_seed, remote_seed, auth_hash);

        let mut key = [0u8; 16];
        key.copy_from_slice(&key_digest[..16]);

        let mut iv = [0u8; 12];
        iv.copy_from_slice(&iv_digest[..12]);

        let mut seq_bytes = [0u8; 4];
        seq_bytes.copy_from_slice(&iv_digest[12..16]);
        let seq = i32::from_be_bytes(seq_bytes);

        let mut sig = [0u8; 28];
        sig.copy_from_slice(&sig_digest[..28]);

        Self { key, iv, seq, sig }
    }

    /// Returns the current sequence counter.
    ///
    /// Right after construction this is the derived initial value; after
    /// each [`encrypt`](Self::encrypt) it is the number that went on the
    /// wire.
    pub fn seq(&self) -> i32 {
        self.seq
    }

    /// Encrypts and signs a payload, advancing the sequence counter.
    ///
    /// Returns the wire frame (`signature(32) + ciphertext`) and the
    /// post-increment sequence number that must be sent as the `seq`
    /// query parameter alongside it.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> (Vec<u8>, i32) {
        self.seq = self.seq.wrapping_add(1);

        let padded = pad(plaintext);
        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &self.iv_for(self.seq).into())
            .encrypt_padded_vec_mut::<NoPadding>(&padded);

        let mut hasher = Sha256::new();
        hasher.update(self.sig);
        hasher.update(seq_to_bytes(self.seq));
        hasher.update(&ciphertext);
        let signature = hasher.finalize();

        let mut frame = Vec::with_capacity(SIGNATURE_LEN + ciphertext.len());
        frame.extend_from_slice(&signature);
        frame.extend_from_slice(&ciphertext);

        (frame, self.seq)
    }

    /// Verifies and decrypts a frame at the given sequence number.
    ///
    /// The device replies at the same sequence number the request carried,
    /// so callers pass the value [`encrypt`](Self::encrypt) returned. The
    /// counter is not advanced here. The leading 32 bytes must match
    /// `sha256(sig_salt + seq_be + ciphertext)`; a mismatch means the reply
    /// was tampered with or belongs to a different session.
    pub fn decrypt(&self, frame: &[u8], seq: i32) -> Result<Vec<u8>, KlapCryptoError> {
        if frame.len() < SIGNATURE_LEN + AES_BLOCK_SIZE {
            return Err(KlapCryptoError::FrameTooShort(frame.len()));
        }

        let (signature, ciphertext) = frame.split_at(SIGNATURE_LEN);
        if ciphertext.len() % AES_BLOCK_SIZE != 0 {
            return Err(KlapCryptoError::RaggedCiphertext(ciphertext.len()));
        }

        let mut hasher = Sha256::new();
        hasher.update(self.sig);
        hasher.update(seq_to_bytes(seq));
        hasher.update(ciphertext);
        if hasher.finalize().as_slice() != signature {
            return Err(KlapCryptoError::SignatureMismatch);
        }

        let padded = Aes128CbcDec::new(&self.key.into(), &self.iv_for(seq).into())
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
            .map_err(|_| KlapCryptoError::RaggedCiphertext(ciphertext.len()))?;

        let plaintext = unpad(&padded)?;
        Ok(plaintext.to_vec())
    }

    /// Builds the 16-byte IV for a sequence number: `iv_prefix + seq_be`.
    fn iv_for(&self, seq: i32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&self.iv);
        iv[12..].copy_from_slice(&seq_to_bytes(seq));
        iv
    }
}

// Implement Debug manually to avoid exposing key material
impl std::fmt::Debug for KlapEncryptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KlapEncryptionSession")
            .field("seq", &self.seq)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn derive_digest(
    label: &[u8],
    local_seed: &[u8],
    remote_seed: &[u8],
    auth_hash: &[u8],
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(local_seed);
    hasher.update(remote_seed);
    hasher.update(auth_hash);
    hasher.finalize().into()
}

/// Error type for KLAP frame operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KlapCryptoError {
    /// Padding byte count is zero, above the block size, or past the input.
    InvalidPadding,
    /// Frame shorter than a signature plus one block.
    FrameTooShort(usize),
    /// Ciphertext length is not a multiple of the block size.
    RaggedCiphertext(usize),
    /// Leading signature does not match the ciphertext.
    SignatureMismatch,
}

impl std::fmt::Display for KlapCryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPadding => write!(f, "invalid PKCS#7 padding"),
            Self::FrameTooShort(len) => {
                write!(f, "frame too short: {} bytes (need at least 48)", len)
            }
            Self::RaggedCiphertext(len) => {
                write!(f, "ciphertext length {} is not a multiple of 16", len)
            }
            Self::SignatureMismatch => write!(f, "frame signature mismatch"),
        }
    }
}

impl std::error::Error for KlapCryptoError {}
