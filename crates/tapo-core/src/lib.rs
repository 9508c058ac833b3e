//! Core library for controlling TP-Link Tapo smart plugs over KLAP.
//!
//! KLAP is the authenticated, encrypted session protocol spoken by recent
//! Tapo (and newer Kasa) firmware. It runs over cleartext HTTP on port 80
//! and supplies its own end-to-end payload encryption; there is no TLS
//! involved.
//!
//! # Protocol Overview
//!
//! 1. **Handshake 1**: the client POSTs 16 random bytes to
//!    `/app/handshake1`; the device answers with its own 16-byte seed, a
//!    32-byte confirmation hash proving which credential hash it expects,
//!    and a `TP_SESSIONID` cookie.
//! 2. **Handshake 2**: the client POSTs a proof hash mixing both seeds
//!    with the credential hash to `/app/handshake2`.
//! 3. **Requests**: commands are JSON, AES-128-CBC encrypted and signed,
//!    POSTed to `/app/request?seq=N`. The sequence counter is derived
//!    during the handshake, rides in the last four IV bytes, and bumps by
//!    one per request.
//!
//! # Example
//!
//! ```no_run
//! use tapo_core::{Tapo, TapoOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tapo_core::Error> {
//!     let mut plug = Tapo::connect(
//!         "192.168.1.100",
//!         "user@example.com",
//!         "password",
//!         TapoOptions::new(),
//!     )
//!     .await?;
//!
//!     let info = plug.device_info().await?;
//!     println!("{}", serde_json::to_string(&info).unwrap());
//!     Ok(())
//! }
//! ```
//!
//! # Scope
//!
//! One client drives one device over one session. Discovery, cloud
//! pairing, firmware updates, and the legacy `securePassthrough` envelope
//! are out of scope. Operations take `&mut self`; see [`Tapo`] for the
//! concurrency and session-poisoning rules.

pub mod client;
pub mod credentials;
pub mod crypto;
pub mod error;
mod handshake;
pub mod request;
pub mod response;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use client::{Tapo, TapoOptions};
pub use credentials::Credentials;
pub use error::Error;
pub use request::{Request, RequestParams};
pub use response::{DeviceResult, Response};

/// The version of the tapo-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
