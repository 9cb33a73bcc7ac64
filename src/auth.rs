use anyhow::{bail, Context};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::Hmac;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::pbkdf2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const ITERATIONS: u32 = 260_000;
const KEY_LENGTH: usize = 32;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CODE_VALIDITY_MINUTES: i64 = 15;

/// Hash a password as `pbkdf2:sha256:<iterations>$<salt>$<hash>` with a
/// random 16-byte salt. Base64 is URL-safe without padding.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill(&mut salt);

    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, ITERATIONS, &mut key)
        .map_err(|e| anyhow::anyhow!("pbkdf2 failed: {e}"))?;

    Ok(format!(
        "pbkdf2:sha256:{}${}${}",
        ITERATIONS,
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(key)
    ))
}

pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parts: Vec<&str> = stored_hash.split('$').collect();
    if parts.len() != 3 {
        bail!("invalid password hash format");
    }

    let header: Vec<&str> = parts[0].split(':').collect();
    if header.len() != 3 || header[0] != "pbkdf2" || header[1] != "sha256" {
        bail!("unsupported password hash header");
    }
    let iterations: u32 = header[2].parse().context("invalid iteration count")?;

    let salt = URL_SAFE_NO_PAD
        .decode(parts[1])
        .context("invalid salt encoding")?;
    let expected = URL_SAFE_NO_PAD
        .decode(parts[2])
        .context("invalid hash encoding")?;

    let mut computed = vec![0u8; expected.len()];
    pbkdf2::<HmacSha256>(password.as_bytes(), &salt, iterations, &mut computed)
        .map_err(|e| anyhow::anyhow!("pbkdf2 failed: {e}"))?;

    // Bitwise accumulate so the comparison does not short-circuit.
    let diff = computed
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b));
    Ok(diff == 0)
}

/// 6-digit zero-padded decimal code, uniform over 000000..=999999.
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..=999_999u32))
}

pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Expiry for a freshly issued verification or reset code, 15 minutes out.
/// Stored as text; the fixed format compares correctly in SQL.
pub fn code_expiry() -> String {
    (Utc::now() + Duration::minutes(CODE_VALIDITY_MINUTES))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub exp: i64,
}

/// Signed session token, 24-hour expiry. Callers treat it as an opaque
/// bearer string.
pub fn issue_token(user_id: i64, role: &str, secret: &str) -> anyhow::Result<String> {
    let exp = (Utc::now() + Duration::hours(24)).timestamp();
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("failed to sign token")
}

pub fn decode_token(token: &str, secret: &str) -> anyhow::Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .context("invalid token")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("pbkdf2:sha256:"));
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error_not_a_match() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..64 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn token_roundtrip() {
        let token = issue_token(42, "parent", "test-secret").unwrap();
        let claims = decode_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "parent");
    }

    #[test]
    fn token_rejects_wrong_secret() {
        let token = issue_token(42, "parent", "test-secret").unwrap();
        assert!(decode_token(&token, "other-secret").is_err());
    }
}
