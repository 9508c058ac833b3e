//! In-process fake KLAP device for handshake and request tests.
//!
//! Speaks just enough HTTP/1.1 over a `TcpListener` to satisfy the
//! transport, mirrors the client's encryption session after phase 1, and
//! records everything it receives so tests can assert on exact bytes.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::credentials::Credentials;
use crate::crypto::klap::{
    KlapEncryptionSession, generate_auth_hash, generate_auth_hash_v2, handshake1_seed_auth_hash,
    handshake1_seed_auth_hash_v2,
};

/// Cookie pair every fake device hands out in phase 1.
pub const FAKE_COOKIE: &str = "TP_SESSIONID=4D454F57";

/// Which credential hash generation the fake device was provisioned with.
pub enum FakeAuth {
    V1(Credentials),
    V2(Credentials),
}

impl FakeAuth {
    fn auth_hash(&self) -> Vec<u8> {
        match self {
            FakeAuth::V1(creds) => generate_auth_hash(creds).to_vec(),
            FakeAuth::V2(creds) => generate_auth_hash_v2(creds).to_vec(),
        }
    }

    fn confirmation(&self, local_seed: &[u8], remote_seed: &[u8]) -> [u8; 32] {
        match self {
            FakeAuth::V1(_) => handshake1_seed_auth_hash(local_seed, &self.auth_hash()),
            FakeAuth::V2(_) => {
                handshake1_seed_auth_hash_v2(local_seed, remote_seed, &self.auth_hash())
            }
        }
    }
}

pub struct FakeDeviceOptions {
    pub remote_seed: [u8; 16],
    pub auth: FakeAuth,
    pub handshake1_status: u16,
    pub handshake2_status: u16,
    pub request_status: u16,
    /// JSON plaintext returned (encrypted) by every `/app/request`.
    pub response_json: String,
}

impl Default for FakeDeviceOptions {
    fn default() -> Self {
        Self {
            remote_seed: [0xA5; 16],
            auth: FakeAuth::V2(Credentials::new("user@example.com", "hunter2")),
            handshake1_status: 200,
            handshake2_status: 200,
            request_status: 200,
            response_json: r#"{"result":null,"error_code":0}"#.to_string(),
        }
    }
}

/// Everything the fake device observed, for test assertions.
#[derive(Default, Clone)]
pub struct FakeDeviceLog {
    pub handshake1_body: Option<Vec<u8>>,
    pub handshake2_body: Option<Vec<u8>>,
    pub handshake2_cookies: Vec<String>,
    pub request_seqs: Vec<i32>,
    pub request_cookies: Vec<Vec<String>>,
    /// Decrypted plaintext of each `/app/request` body.
    pub request_plaintexts: Vec<Vec<u8>>,
}

struct FakeState {
    session: Option<KlapEncryptionSession>,
    log: FakeDeviceLog,
}

pub struct FakeDevice {
    pub port: u16,
    state: Arc<Mutex<FakeState>>,
}

impl FakeDevice {
    pub async fn start(options: FakeDeviceOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(FakeState {
            session: None,
            log: FakeDeviceLog::default(),
        }));

        let accept_state = Arc::clone(&state);
        let options = Arc::new(options);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                handle_connection(stream, Arc::clone(&accept_state), Arc::clone(&options)).await;
            }
        });

        Self { port, state }
    }

    pub fn log(&self) -> FakeDeviceLog {
        self.state.lock().unwrap().log.clone()
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    state: Arc<Mutex<FakeState>>,
    options: Arc<FakeDeviceOptions>,
) {
    let Some((path, cookies, body)) = read_request(&mut stream).await else {
        return;
    };

    let (status, mut headers, reply_body) = if path == "/app/handshake1" {
        let mut state = state.lock().unwrap();
        state.log.handshake1_body = Some(body.clone());

        if options.handshake1_status != 200 {
            (options.handshake1_status, Vec::new(), Vec::new())
        } else {
            let confirmation = options.auth.confirmation(&body, &options.remote_seed);
            state.session = Some(KlapEncryptionSession::new(
                &body,
                &options.remote_seed,
                &options.auth.auth_hash(),
            ));

            let mut reply = options.remote_seed.to_vec();
            reply.extend_from_slice(&confirmation);
            (
                200,
                vec![format!("Set-Cookie: {};TIMEOUT=86400", FAKE_COOKIE)],
                reply,
            )
        }
    } else if path == "/app/handshake2" {
        let mut state = state.lock().unwrap();
        state.log.handshake2_body = Some(body.clone());
        state.log.handshake2_cookies = cookies;
        (options.handshake2_status, Vec::new(), Vec::new())
    } else if let Some(query) = path.strip_prefix("/app/request?seq=") {
        let seq: i32 = query.parse().expect("seq query parameter");
        let mut state = state.lock().unwrap();
        state.log.request_seqs.push(seq);
        state.log.request_cookies.push(cookies);

        let session = state.session.as_mut().expect("request before handshake");
        let plaintext = session.decrypt(&body, seq).expect("decryptable request");
        state.log.request_plaintexts.push(plaintext);

        if options.request_status != 200 {
            (options.request_status, Vec::new(), Vec::new())
        } else {
            // The session mirrors the client's, so this encrypt lands on
            // the same sequence number the request carried.
            let session = state.session.as_mut().unwrap();
            let (frame, reply_seq) = session.encrypt(options.response_json.as_bytes());
            assert_eq!(reply_seq, seq, "fake device fell out of sequence lockstep");
            (200, Vec::new(), frame)
        }
    } else {
        (404, Vec::new(), Vec::new())
    };

    headers.push(format!("Content-Length: {}", reply_body.len()));
    let mut response = format!("HTTP/1.1 {} X\r\n{}\r\n\r\n", status, headers.join("\r\n"))
        .into_bytes();
    response.extend_from_slice(&reply_body);
    let _ = stream.write_all(&response).await;
}

/// Reads one HTTP request; returns (path-with-query, cookie pairs, body).
async fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<String>, Vec<u8>)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_string();
    let body_start = header_end + 4;

    let mut content_length = 0usize;
    let mut cookies = Vec::new();
    for line in headers.lines().skip(1) {
        let lower = line.to_lowercase();
        if lower.starts_with("content-length:") {
            content_length = line.split(':').nth(1)?.trim().parse().ok()?;
        } else if lower.starts_with("cookie:") {
            cookies = line
                .splitn(2, ':')
                .nth(1)?
                .split(';')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
    }

    while data.len() - body_start < content_length {
        let n = stream.read(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    }

    let path = headers.lines().next()?.split_whitespace().nth(1)?.to_string();
    Some((path, cookies, data[body_start..].to_vec()))
}
