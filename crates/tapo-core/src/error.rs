//! Error types for tapo-core.
//!
//! Nothing is retried inside the library: every error is final for the
//! current call, and a handshake error is final for the session. A device
//! reply with `error_code != 0` is NOT an error here; it is returned in
//! the [`Response`](crate::Response) for the caller to inspect.

use thiserror::Error;

/// Error type for tapo-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Phase-1 handshake failed (transport error or non-200 status).
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The device rejected the credentials (phase-1 confirmation matched
    /// no known hash, or phase 2 returned a non-200 status).
    #[error("credentials rejected: {0}")]
    CredentialsRejected(String),

    /// An application request returned a non-200 status.
    ///
    /// The sequence counter was already advanced for this request, so the
    /// session is out of step with the device; discard the client and
    /// reconnect.
    #[error("request failed with status {status}")]
    RequestFailed {
        /// HTTP status code the device answered with.
        status: u16,
    },

    /// Socket, timeout, or HTTP parse failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Padding violation, malformed frame, or signature mismatch.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Outbound request could not be serialized, or the decrypted reply
    /// was not valid JSON of the expected shape.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<crate::crypto::klap::KlapCryptoError> for Error {
    fn from(err: crate::crypto::klap::KlapCryptoError) -> Self {
        Error::Crypto(err.to_string())
    }
}
