use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex characters of the content digest appended to each identifier.
pub const FINGERPRINT_LEN: usize = 10;

pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_digest(data))
}

/// Random UUID followed by a short content fingerprint. Uniqueness comes
/// from the UUID; the suffix only helps eyeball which content a key holds.
pub fn generate_identifier(content: &str) -> String {
    let fingerprint = sha256_hex(content.as_bytes());
    format!("{}{}", Uuid::new_v4(), &fingerprint[..FINGERPRINT_LEN])
}
