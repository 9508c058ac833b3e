//! Credentials management for Tapo devices.
//!
//! The KLAP handshake authenticates with a hash derived from the TP-Link
//! cloud account email and password. Devices that have been paired with the
//! cloud sometimes switch between the user's credentials and a hardcoded
//! default set; devices that were never paired accept blank credentials.
//! The handshake engine checks the phase-1 confirmation against all of
//! these, so callers normally only ever construct their own account's
//! [`Credentials`].
//!
//! # Security
//!
//! Passwords are stored using [`SecretString`] from the `secrecy` crate to
//! prevent accidental logging or display. Use
//! [`Credentials::expose_password()`] to access the raw value when deriving
//! the authentication hash.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Credentials for authenticating with a Tapo device.
///
/// # Example
///
/// ```
/// use tapo_core::Credentials;
///
/// let creds = Credentials::new("user@example.com", "password123");
/// assert_eq!(creds.email, "user@example.com");
///
/// // Devices never paired with the cloud accept blank credentials.
/// let blank = Credentials::blank();
/// assert!(blank.is_blank());
/// ```
#[derive(Clone)]
pub struct Credentials {
    /// TP-Link cloud account email address.
    pub email: String,
    /// The account password (protected from accidental logging).
    password: SecretString,
}

impl Credentials {
    /// Creates new credentials with the given email and password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Creates blank credentials (empty email and password).
    ///
    /// Blank credentials work for devices that have never been connected
    /// to the TP-Link cloud.
    pub fn blank() -> Self {
        Self {
            email: String::new(),
            password: SecretString::from(String::new()),
        }
    }

    /// Returns `true` if both email and password are empty.
    pub fn is_blank(&self) -> bool {
        self.email.is_empty() && self.password.expose_secret().is_empty()
    }

    /// Exposes the password for hash derivation.
    ///
    /// Only call this when the value is actually needed; never log or
    /// display the result.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::blank()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.email == other.email
            && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl Eq for Credentials {}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Default credential set used by TP-Link devices.
///
/// Devices that have been connected to the TP-Link cloud intermittently
/// accept these hardcoded credentials instead of the user's own. The
/// handshake checks them when the user's hash does not match the device's
/// phase-1 confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultCredentials {
    /// Hardcoded Kasa credentials.
    Kasa,
    /// Hardcoded Tapo credentials.
    Tapo,
}

impl DefaultCredentials {
    /// Returns the hardcoded credentials for this set.
    ///
    /// Values documented by the python-kasa project:
    /// https://github.com/python-kasa/python-kasa/blob/master/kasa/credentials.py
    pub fn credentials(self) -> Credentials {
        match self {
            DefaultCredentials::Kasa => Credentials::new("kasa@tp-link.net", "kasaSetup"),
            DefaultCredentials::Tapo => Credentials::new("test@tp-link.net", "test"),
        }
    }

    /// Returns all default credential sets.
    pub fn all() -> &'static [DefaultCredentials] {
        &[DefaultCredentials::Kasa, DefaultCredentials::Tapo]
    }
}
