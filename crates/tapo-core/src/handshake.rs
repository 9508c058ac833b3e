//! Two-phase KLAP handshake.
//!
//! Phase 1 exchanges 16-byte seeds: the client POSTs a random `local_seed`
//! to `/app/handshake1` and receives `remote_seed(16)` followed by a
//! 32-byte confirmation hash, plus a `TP_SESSIONID` cookie that binds the
//! session. The confirmation is checked against every credential hash the
//! device might be using (the user's, the hardcoded Kasa/Tapo defaults,
//! blank) in both the v1 and v2 hash generations; devices that have been
//! cloud-paired switch between these intermittently.
//!
//! Phase 2 proves knowledge of the matched hash by POSTing
//! `sha256(remote_seed + local_seed + auth_hash)` (seeds reversed for v1's
//! shorter formula) to `/app/handshake2` with the cookie attached. A 200
//! means the device accepted the proof and the encryption session can be
//! derived from the two seeds and the hash.
//!
//! The device needs a pause around phase 2 before it will accept
//! anything; issuing requests too soon gets them silently rejected. The
//! configured handshake delay is split in half on either side of phase 2.
//!
//! Failures are fatal for the session. Nothing here retries; callers
//! discard the handshake output and start over.

use std::time::Duration;

use rand::RngCore;
use tokio::time::sleep;
use tracing::debug;

use crate::credentials::{Credentials, DefaultCredentials};
use crate::crypto::klap::{
    KlapEncryptionSession, generate_auth_hash, generate_auth_hash_v2, handshake1_seed_auth_hash,
    handshake1_seed_auth_hash_v2, handshake2_seed_auth_hash, handshake2_seed_auth_hash_v2,
};
use crate::error::Error;
use crate::transport::HttpTransport;

const HANDSHAKE1_PATH: &str = "/app/handshake1";
const HANDSHAKE2_PATH: &str = "/app/handshake2";
const HANDSHAKE_CONTENT_TYPE: &str = "application/octet-stream";

/// Authentication hash for the KLAP protocol.
///
/// KLAP v1 uses MD5-based hashing, while v2 uses SHA256-based hashing.
#[derive(Clone)]
pub(crate) enum AuthHash {
    /// KLAP v1: `md5(md5(email) + md5(password))` - 16 bytes
    V1([u8; 16]),
    /// KLAP v2: `sha256(sha1(email) + sha1(password))` - 32 bytes
    V2([u8; 32]),
}

impl AuthHash {
    /// Returns the auth hash as a byte slice.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            AuthHash::V1(h) => h.as_slice(),
            AuthHash::V2(h) => h.as_slice(),
        }
    }
}

/// Result of a completed handshake: the derived cipher state and the
/// cookies that must accompany every request for the session's lifetime.
#[derive(Debug)]
pub(crate) struct HandshakeData {
    pub session: KlapEncryptionSession,
    pub cookies: Vec<String>,
}

/// Runs the full handshake with a freshly generated local seed.
pub(crate) async fn handshake(
    http: &HttpTransport,
    credentials: &Credentials,
    handshake_delay: Duration,
) -> Result<HandshakeData, Error> {
    let mut local_seed = [0u8; 16];
    rand::rng().fill_bytes(&mut local_seed);
    handshake_with_seed(http, credentials, handshake_delay, local_seed).await
}

/// Runs the full handshake with a caller-provided local seed.
pub(crate) async fn handshake_with_seed(
    http: &HttpTransport,
    credentials: &Credentials,
    handshake_delay: Duration,
    local_seed: [u8; 16],
) -> Result<HandshakeData, Error> {
    let (remote_seed, confirmation, cookies) = handshake1(http, &local_seed).await?;

    let (credential_type, auth_hash) =
        match_confirmation(credentials, &local_seed, &remote_seed, &confirmation).ok_or_else(
            || {
                Error::CredentialsRejected(
                    "phase-1 confirmation matched no known credential hash".into(),
                )
            },
        )?;
    debug!(credential_type, "phase-1 confirmation verified");

    sleep(handshake_delay / 2).await;

    handshake2(http, &local_seed, &remote_seed, &auth_hash, &cookies).await?;

    let session = KlapEncryptionSession::new(&local_seed, &remote_seed, auth_hash.as_bytes());

    sleep(handshake_delay / 2).await;

    Ok(HandshakeData { session, cookies })
}

/// Phase 1: send the local seed, receive remote seed + confirmation.
async fn handshake1(
    http: &HttpTransport,
    local_seed: &[u8; 16],
) -> Result<([u8; 16], [u8; 32], Vec<String>), Error> {
    debug!(
        host = http.host(),
        local_seed = %hex::encode(local_seed),
        "performing handshake1"
    );

    let response = http
        .post(HANDSHAKE1_PATH, HANDSHAKE_CONTENT_TYPE, local_seed, &[])
        .await
        .map_err(|e| Error::HandshakeFailed(e.to_string()))?;

    if response.status != 200 {
        return Err(Error::HandshakeFailed(format!(
            "handshake1 returned status {}",
            response.status
        )));
    }

    if response.body.len() != 48 {
        return Err(Error::HandshakeFailed(format!(
            "handshake1 response has unexpected length: {} (expected 48)",
            response.body.len()
        )));
    }

    let mut remote_seed = [0u8; 16];
    let mut confirmation = [0u8; 32];
    remote_seed.copy_from_slice(&response.body[..16]);
    confirmation.copy_from_slice(&response.body[16..48]);

    debug!(
        remote_seed = %hex::encode(remote_seed),
        cookies = response.set_cookies.len(),
        "handshake1 received response"
    );

    Ok((remote_seed, confirmation, response.set_cookies))
}

/// Phase 2: prove knowledge of the matched hash.
async fn handshake2(
    http: &HttpTransport,
    local_seed: &[u8; 16],
    remote_seed: &[u8; 16],
    auth_hash: &AuthHash,
    cookies: &[String],
) -> Result<(), Error> {
    let proof = match auth_hash {
        AuthHash::V1(h) => handshake2_seed_auth_hash(remote_seed, h),
        AuthHash::V2(h) => handshake2_seed_auth_hash_v2(local_seed, remote_seed, h),
    };

    debug!(host = http.host(), "performing handshake2");

    let response = http
        .post(HANDSHAKE2_PATH, HANDSHAKE_CONTENT_TYPE, &proof, cookies)
        .await
        .map_err(|e| Error::HandshakeFailed(e.to_string()))?;

    if response.status != 200 {
        return Err(Error::CredentialsRejected(format!(
            "handshake2 returned status {}",
            response.status
        )));
    }

    debug!(host = http.host(), "handshake2 succeeded");
    Ok(())
}

/// Checks the phase-1 confirmation against every candidate hash and
/// returns the first match.
fn match_confirmation(
    credentials: &Credentials,
    local_seed: &[u8; 16],
    remote_seed: &[u8; 16],
    confirmation: &[u8; 32],
) -> Option<(&'static str, AuthHash)> {
    for (credential_type, auth_hash) in candidate_auth_hashes(credentials) {
        let expected = match &auth_hash {
            AuthHash::V1(h) => handshake1_seed_auth_hash(local_seed, h),
            AuthHash::V2(h) => handshake1_seed_auth_hash_v2(local_seed, remote_seed, h),
        };
        if &expected == confirmation {
            return Some((credential_type, auth_hash));
        }
        debug!(credential_type, "confirmation did not match");
    }
    None
}

/// Candidate hashes in probe order: the user's credentials first, then
/// the hardcoded defaults, then blank (unless the user's are blank
/// already). v2 is tried before v1 for each set.
fn candidate_auth_hashes(credentials: &Credentials) -> Vec<(&'static str, AuthHash)> {
    let mut candidates = vec![
        ("user (v2)", AuthHash::V2(generate_auth_hash_v2(credentials))),
        ("user (v1)", AuthHash::V1(generate_auth_hash(credentials))),
    ];

    for default_creds in DefaultCredentials::all() {
        let creds = default_creds.credentials();
        let (name_v2, name_v1) = match default_creds {
            DefaultCredentials::Kasa => ("kasa default (v2)", "kasa default (v1)"),
            DefaultCredentials::Tapo => ("tapo default (v2)", "tapo default (v1)"),
        };
        candidates.push((name_v2, AuthHash::V2(generate_auth_hash_v2(&creds))));
        candidates.push((name_v1, AuthHash::V1(generate_auth_hash(&creds))));
    }

    if !credentials.is_blank() {
        let blank = Credentials::blank();
        candidates.push(("blank (v2)", AuthHash::V2(generate_auth_hash_v2(&blank))));
        candidates.push(("blank (v1)", AuthHash::V1(generate_auth_hash(&blank))));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutil::{FAKE_COOKIE, FakeAuth, FakeDevice, FakeDeviceOptions};

    const NO_DELAY: Duration = Duration::ZERO;

    fn transport(port: u16) -> HttpTransport {
        HttpTransport::new("127.0.0.1", port, Duration::from_secs(2))
    }

    fn user_credentials() -> Credentials {
        Credentials::new("user@example.com", "hunter2")
    }

    #[tokio::test]
    async fn test_handshake_happy_path() {
        let device = FakeDevice::start(FakeDeviceOptions::default()).await;
        let local_seed = [0x42u8; 16];

        let data = handshake_with_seed(
            &transport(device.port),
            &user_credentials(),
            NO_DELAY,
            local_seed,
        )
        .await
        .unwrap();

        let log = device.log();
        // Phase 1 carried exactly the injected seed.
        assert_eq!(log.handshake1_body.unwrap(), local_seed.to_vec());

        // Phase 2 carried sha256(remote + local + auth) and the cookie.
        let auth_hash = generate_auth_hash_v2(&user_credentials());
        let expected_proof =
            handshake2_seed_auth_hash_v2(&local_seed, &[0xA5; 16], &auth_hash);
        assert_eq!(log.handshake2_body.unwrap(), expected_proof.to_vec());
        assert_eq!(log.handshake2_cookies, vec![FAKE_COOKIE.to_string()]);

        // The derived session starts at the seq baked into the IV digest.
        let expected = KlapEncryptionSession::new(&local_seed, &[0xA5; 16], &auth_hash);
        assert_eq!(data.session.seq(), expected.seq());
        assert_eq!(data.cookies, vec![FAKE_COOKIE.to_string()]);
    }

    #[tokio::test]
    async fn test_handshake_v1_device() {
        let device = FakeDevice::start(FakeDeviceOptions {
            auth: FakeAuth::V1(user_credentials()),
            ..Default::default()
        })
        .await;
        let local_seed = [0x42u8; 16];

        let data = handshake_with_seed(
            &transport(device.port),
            &user_credentials(),
            NO_DELAY,
            local_seed,
        )
        .await
        .unwrap();

        // Phase 2 used the v1 proof formula.
        let auth_hash = generate_auth_hash(&user_credentials());
        let expected_proof = handshake2_seed_auth_hash(&[0xA5u8; 16], &auth_hash);
        assert_eq!(device.log().handshake2_body.unwrap(), expected_proof.to_vec());

        let expected = KlapEncryptionSession::new(&local_seed, &[0xA5; 16], &auth_hash);
        assert_eq!(data.session.seq(), expected.seq());
    }

    #[tokio::test]
    async fn test_handshake_falls_back_to_default_credentials() {
        // Device provisioned with the hardcoded Kasa credentials; the user
        // passes their own. The confirmation check picks the right hash.
        let device = FakeDevice::start(FakeDeviceOptions {
            auth: FakeAuth::V2(Credentials::new("kasa@tp-link.net", "kasaSetup")),
            ..Default::default()
        })
        .await;

        let data = handshake_with_seed(
            &transport(device.port),
            &Credentials::new("someone@else.net", "pw"),
            NO_DELAY,
            [0x42u8; 16],
        )
        .await
        .unwrap();

        let kasa_hash =
            generate_auth_hash_v2(&Credentials::new("kasa@tp-link.net", "kasaSetup"));
        let expected = KlapEncryptionSession::new(&[0x42u8; 16], &[0xA5; 16], &kasa_hash);
        assert_eq!(data.session.seq(), expected.seq());
    }

    #[tokio::test]
    async fn test_handshake_rejects_unknown_confirmation() {
        // Device uses credentials the client can never guess.
        let device = FakeDevice::start(FakeDeviceOptions {
            auth: FakeAuth::V2(Credentials::new("stranger@example.com", "different")),
            ..Default::default()
        })
        .await;

        let err = handshake_with_seed(
            &transport(device.port),
            &user_credentials(),
            NO_DELAY,
            [0x42u8; 16],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::CredentialsRejected(_)));
        // Phase 2 was never attempted.
        assert!(device.log().handshake2_body.is_none());
    }

    #[tokio::test]
    async fn test_handshake_phase1_failure() {
        let device = FakeDevice::start(FakeDeviceOptions {
            handshake1_status: 500,
            ..Default::default()
        })
        .await;

        let err = handshake_with_seed(
            &transport(device.port),
            &user_credentials(),
            NO_DELAY,
            [0x42u8; 16],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::HandshakeFailed(_)));
    }

    #[tokio::test]
    async fn test_handshake_phase2_rejection() {
        let device = FakeDevice::start(FakeDeviceOptions {
            handshake2_status: 403,
            ..Default::default()
        })
        .await;

        let err = handshake_with_seed(
            &transport(device.port),
            &user_credentials(),
            NO_DELAY,
            [0x42u8; 16],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::CredentialsRejected(_)));
    }

    #[tokio::test]
    async fn test_handshake_unreachable_device() {
        // Nothing is listening on this port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = handshake(&transport(port), &user_credentials(), NO_DELAY)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HandshakeFailed(_)));
    }

    #[test]
    fn test_candidate_order_and_blank_skipping() {
        let labels: Vec<&str> = candidate_auth_hashes(&user_credentials())
            .iter()
            .map(|(label, _)| *label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "user (v2)",
                "user (v1)",
                "kasa default (v2)",
                "kasa default (v1)",
                "tapo default (v2)",
                "tapo default (v1)",
                "blank (v2)",
                "blank (v1)",
            ]
        );

        // Blank user credentials already cover the blank candidates.
        let labels: Vec<&str> = candidate_auth_hashes(&Credentials::blank())
            .iter()
            .map(|(label, _)| *label)
            .collect();
        assert!(!labels.contains(&"blank (v2)"));
    }
}
