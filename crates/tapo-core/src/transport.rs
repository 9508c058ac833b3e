//! Thin HTTP transport for KLAP endpoints.
//!
//! KLAP runs over cleartext HTTP/1.1 on port 80 and relies on its own
//! payload encryption. This module only knows how to POST a body and hand
//! back the status, body, and any cookies the device set.
//!
//! # Note on HTTP Implementation
//!
//! This implementation uses raw TCP sockets instead of HTTP client
//! libraries because TP-Link devices have a non-compliant HTTP server that
//! rejects requests with lowercase headers. Modern HTTP libraries
//! (reqwest, hyper, ureq) forcibly lowercase all headers following HTTP/2
//! conventions, but the devices only support HTTP/1.1 with title-case
//! headers (e.g., "Content-Type" not "content-type").

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::Error;

/// Default HTTP port for the KLAP protocol.
pub const DEFAULT_PORT: u16 = 80;

/// A parsed HTTP response.
#[derive(Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
    /// `name=value` pairs from every `Set-Cookie` header, in order.
    pub set_cookies: Vec<String>,
}

/// One-shot HTTP POST client for a single device address.
///
/// Connections are not pooled or kept alive; every call opens a fresh
/// socket, bounded end to end by the configured timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for the given device address.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Returns the device host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the device port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Sends an HTTP POST and reads the full response.
    ///
    /// `cookies` are echoed verbatim in a single `Cookie` header. Every
    /// socket step (connect, write, read) is individually bounded by the
    /// transport timeout.
    pub async fn post(
        &self,
        path: &str,
        content_type: &str,
        body: &[u8],
        cookies: &[String],
    ) -> Result<HttpResponse, Error> {
        // Build the HTTP request with title-case headers
        let mut request = format!(
            "POST {} HTTP/1.1\r\n\
             Host: {}:{}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Accept: */*\r\n",
            path,
            self.host,
            self.port,
            content_type,
            body.len()
        );

        if !cookies.is_empty() {
            request.push_str(&format!("Cookie: {}\r\n", cookies.join("; ")));
        }

        request.push_str("\r\n");

        let addr = format!("{}:{}", self.host, self.port);
        debug!(addr = %addr, path, bytes = body.len(), "posting");

        let mut stream = timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::Transport("connection timed out".into()))?
            .map_err(|e| Error::Transport(format!("connection failed: {}", e)))?;

        let mut full_request = request.into_bytes();
        full_request.extend_from_slice(body);

        timeout(self.timeout, stream.write_all(&full_request))
            .await
            .map_err(|_| Error::Transport("write timed out".into()))?
            .map_err(|e| Error::Transport(format!("write failed: {}", e)))?;

        // Read headers, then as much body as Content-Length promises
        let mut response = Vec::with_capacity(1024);
        let mut buf = [0u8; 4096];

        loop {
            let n = timeout(self.timeout, stream.read(&mut buf))
                .await
                .map_err(|_| Error::Transport("read timed out".into()))?
                .map_err(|e| Error::Transport(format!("read failed: {}", e)))?;

            if n == 0 {
                break;
            }

            response.extend_from_slice(&buf[..n]);

            if let Some(header_end) = find_header_end(&response) {
                let headers = String::from_utf8_lossy(&response[..header_end]).to_string();
                let body_start = header_end + 4;

                if let Some(expected_len) = parse_content_length(&headers) {
                    while response.len() - body_start < expected_len {
                        let n = timeout(self.timeout, stream.read(&mut buf))
                            .await
                            .map_err(|_| Error::Transport("read timed out".into()))?
                            .map_err(|e| Error::Transport(format!("read failed: {}", e)))?;

                        if n == 0 {
                            break;
                        }

                        response.extend_from_slice(&buf[..n]);
                    }
                }

                break;
            }
        }

        let header_end = find_header_end(&response)
            .ok_or_else(|| Error::Transport("invalid HTTP response: no header end".into()))?;

        let headers = String::from_utf8_lossy(&response[..header_end]);
        let body = response[header_end + 4..].to_vec();

        let status = parse_status_code(&headers)
            .ok_or_else(|| Error::Transport("invalid HTTP response: no status code".into()))?;

        let set_cookies = parse_set_cookies(&headers);

        debug!(status, bytes = body.len(), cookies = set_cookies.len(), "response");

        Ok(HttpResponse {
            status,
            body,
            set_cookies,
        })
    }
}

/// Find the position of "\r\n\r\n" in the response (end of headers).
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse the HTTP status code from the response headers.
fn parse_status_code(headers: &str) -> Option<u16> {
    // First line should be "HTTP/1.1 200 OK" or similar
    let first_line = headers.lines().next()?;
    let mut parts = first_line.split_whitespace();
    parts.next()?;
    parts.next()?.parse().ok()
}

/// Parse the Content-Length header value.
fn parse_content_length(headers: &str) -> Option<usize> {
    for line in headers.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            let value = line.split(':').nth(1)?.trim();
            return value.parse().ok();
        }
    }
    None
}

/// Collect the `name=value` pair from every Set-Cookie header.
///
/// Attributes after the first `;` (Path, TIMEOUT, ...) are dropped; the
/// device only cares about getting the pair itself echoed back.
fn parse_set_cookies(headers: &str) -> Vec<String> {
    let mut cookies = Vec::new();
    for line in headers.lines() {
        if line.to_lowercase().starts_with("set-cookie:") {
            let Some(value) = line.splitn(2, ':').nth(1) else {
                continue;
            };
            if let Some(pair) = value.trim().split(';').next() {
                if !pair.is_empty() {
                    cookies.push(pair.to_string());
                }
            }
        }
    }
    cookies
}
