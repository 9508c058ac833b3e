//! Device client for Tapo smart plugs speaking KLAP.
//!
//! [`Tapo`] owns one authenticated session: the cipher state from the
//! handshake and the cookies the device bound it to. Each operation
//! serializes a command, encrypts it, POSTs it to `/app/request?seq=N`,
//! and decrypts the signed reply.
//!
//! # Concurrency
//!
//! A client is strictly single-threaded per operation: the sequence
//! counter advances once per request, and the IV would collide if two
//! requests raced. All operations therefore take `&mut self`; run
//! independent devices through independent clients.
//!
//! # Session lifetime
//!
//! Nothing is retried. The counter is advanced before the POST goes out,
//! so a timeout or non-200 leaves the client out of step with the device;
//! drop it and connect again. Long-running sessions should also reconnect
//! well before the counter approaches `i32::MAX`, as device behavior at
//! the wrap is unspecified.

use std::time::Duration;

use tracing::debug;

use crate::credentials::Credentials;
use crate::crypto::klap::KlapEncryptionSession;
use crate::error::Error;
use crate::handshake::{self, HandshakeData};
use crate::request::Request;
use crate::response::Response;
use crate::transport::{DEFAULT_PORT, HttpTransport};

/// Default time allowed for each HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default total pause around handshake phase 2.
pub const DEFAULT_HANDSHAKE_DELAY: Duration = Duration::from_secs(1);

/// Tunables for a [`Tapo`] connection.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tapo_core::TapoOptions;
///
/// let options = TapoOptions::new()
///     .with_handshake_delay(Duration::from_millis(750))
///     .with_request_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct TapoOptions {
    /// Total pause split in half before and after handshake phase 2.
    ///
    /// The device performs authorization slowly in the background; below
    /// roughly 500 ms it starts silently rejecting the session.
    pub handshake_delay: Duration,
    /// Timeout applied to every HTTP call.
    pub request_timeout: Duration,
}

impl TapoOptions {
    /// Creates options with the defaults (1 s handshake delay, 2 s timeout).
    pub fn new() -> Self {
        Self {
            handshake_delay: DEFAULT_HANDSHAKE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the handshake delay.
    pub fn with_handshake_delay(mut self, delay: Duration) -> Self {
        self.handshake_delay = delay;
        self
    }

    /// Sets the per-call HTTP timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for TapoOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// An authenticated KLAP session with one Tapo device.
///
/// # Example
///
/// ```no_run
/// use tapo_core::{Tapo, TapoOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), tapo_core::Error> {
///     let mut plug = Tapo::connect(
///         "192.168.1.100",
///         "user@example.com",
///         "password",
///         TapoOptions::new(),
///     )
///     .await?;
///
///     let response = plug.turn_on().await?;
///     println!("error_code: {}", response.error_code);
///     Ok(())
/// }
/// ```
pub struct Tapo {
    http: HttpTransport,
    session: KlapEncryptionSession,
    cookies: Vec<String>,
}

impl Tapo {
    /// Connects to a device and runs the two-phase handshake.
    pub async fn connect(
        ip: &str,
        email: &str,
        password: &str,
        options: TapoOptions,
    ) -> Result<Self, Error> {
        Self::connect_to(ip, DEFAULT_PORT, email, password, options).await
    }

    /// Connects on a specific port; exposed for in-process test devices.
    pub(crate) async fn connect_to(
        host: &str,
        port: u16,
        email: &str,
        password: &str,
        options: TapoOptions,
    ) -> Result<Self, Error> {
        let http = HttpTransport::new(host, port, options.request_timeout);
        let credentials = Credentials::new(email, password);

        let HandshakeData { session, cookies } =
            handshake::handshake(&http, &credentials, options.handshake_delay).await?;

        debug!(host, "session established");

        Ok(Self {
            http,
            session,
            cookies,
        })
    }

    /// Switches the relay on.
    pub async fn turn_on(&mut self) -> Result<Response, Error> {
        self.perform_request(&Request::set_device_info(true)).await
    }

    /// Switches the relay off.
    pub async fn turn_off(&mut self) -> Result<Response, Error> {
        self.perform_request(&Request::set_device_info(false)).await
    }

    /// Queries device metadata and relay state.
    pub async fn device_info(&mut self) -> Result<Response, Error> {
        self.perform_request(&Request::get_device_info()).await
    }

    /// Queries energy-metering counters.
    pub async fn energy_usage(&mut self) -> Result<Response, Error> {
        self.perform_request(&Request::get_energy_usage()).await
    }

    /// Encrypts and sends one command, decrypting the reply.
    async fn perform_request(&mut self, request: &Request) -> Result<Response, Error> {
        let plaintext =
            serde_json::to_vec(request).map_err(|e| Error::Encoding(e.to_string()))?;

        let (frame, seq) = self.session.encrypt(&plaintext);

        let path = format!("/app/request?seq={}", seq);
        debug!(host = self.http.host(), seq, method = %request.method, "sending request");

        let response = self
            .http
            .post(&path, "application/json", &frame, &self.cookies)
            .await?;

        if response.status != 200 {
            return Err(Error::RequestFailed {
                status: response.status,
            });
        }

        let plaintext = self.session.decrypt(&response.body, seq)?;

        serde_json::from_slice(&plaintext).map_err(|e| Error::Encoding(e.to_string()))
    }
}

// Implement Debug manually to avoid exposing session state
impl std::fmt::Debug for Tapo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tapo")
            .field("host", &self.http.host())
            .field("cookies", &"[REDACTED]")
            .finish()
    }
}
