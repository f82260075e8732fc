use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_LEN: usize = 6;
const ACCEPT_OFFSETS: [i64; 5] = [0, -1, -2, -3, 1];

/// A shared secret reduced to its SHA-256 digest, the key actually fed to
/// HMAC-SHA256 for token generation and verification.
#[derive(Clone)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    pub fn derive(shared_secret: &str) -> Self {
        let digest = Sha256::digest(shared_secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self(key)
    }
}

/// Current UTC minute count, the clock basis for token windows.
pub fn current_minute(now_ms: u64) -> u64 {
    now_ms / 60_000
}

fn token_at_minute(key: &SecretKey, minute: u64, src: &str, dst: &str, text: &str, id: Option<&str>) -> String {
    let mut message = format!("{minute}:{src}:{dst}:{text}");
    if let Some(id) = id {
        message.push('{');
        message.push_str(id);
    }
    let mut mac = HmacSha256::new_from_slice(&key.0).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    let tag = mac.finalize().into_bytes();
    let encoded = STANDARD.encode(tag);
    encoded.chars().take(TOKEN_LEN).collect()
}

/// Computes the token an outgoing message should carry, stamped at the
/// current minute.
pub fn compute_token(key: &SecretKey, now_ms: u64, src: &str, dst: &str, text: &str, id: Option<&str>) -> String {
    token_at_minute(key, current_minute(now_ms), src, dst, text, id)
}

/// Checks `token` against the five minutes this station accepts: the
/// current minute, the three before it, and one minute ahead (clock
/// skew tolerance in the direction a slow clock would cause).
pub fn verify_token(key: &SecretKey, now_ms: u64, src: &str, dst: &str, text: &str, id: Option<&str>, token: &str) -> bool {
    let minute = current_minute(now_ms);
    ACCEPT_OFFSETS.iter().any(|offset| {
        let candidate = minute as i64 + offset;
        candidate >= 0 && token_at_minute(key, candidate as u64, src, dst, text, id) == token
    })
}
