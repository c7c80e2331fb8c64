use sha2::{Digest, Sha256};

/// Hex encoded SHA-256 digest, the format `UPLOAD_AUTH_HASH` is stored in.
pub fn calculate_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Checks a plaintext password against a stored hex digest.
///
/// The comparison walks the whole digest so timing does not reveal how many
/// leading characters matched.
pub fn verify_password(password: &str, expected_hash: &str) -> bool {
    let actual = calculate_hash(password.as_bytes());
    let expected = expected_hash.trim().to_ascii_lowercase();

    if actual.len() != expected.len() {
        return false;
    }

    actual
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
