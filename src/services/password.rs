use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const ITERATIONS: u32 = 100_000;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("Failed to generate salt")]
    RandomFailed,

    #[error("Invalid password hash format")]
    InvalidFormat,
}

/// Hashes a password with PBKDF2-HMAC-SHA256 and a random salt.
///
/// Format: `pbkdf2-sha256$<iterations>$<base64 salt>$<base64 hash>`
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| PasswordError::RandomFailed)?;

    let iterations = NonZeroU32::new(ITERATIONS).ok_or(PasswordError::InvalidFormat)?;
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(ALGORITHM, iterations, &salt, password.as_bytes(), &mut hash);

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        ITERATIONS,
        STANDARD.encode(salt),
        STANDARD.encode(hash)
    ))
}

/// Checks a password against a hash produced by `hash_password`.
/// Returns `Ok(false)` on mismatch and `Err` only when the stored hash is malformed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordError> {
    let mut parts = stored.split('$');

    let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::InvalidFormat);
    };

    if scheme != SCHEME {
        return Err(PasswordError::InvalidFormat);
    }

    let iterations = iterations
        .parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .ok_or(PasswordError::InvalidFormat)?;
    let salt = STANDARD
        .decode(salt)
        .map_err(|_| PasswordError::InvalidFormat)?;
    let hash = STANDARD
        .decode(hash)
        .map_err(|_| PasswordError::InvalidFormat)?;

    Ok(pbkdf2::verify(ALGORITHM, iterations, &salt, password.as_bytes(), &hash).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("same", &first).unwrap());
        assert!(verify_password("same", &second).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_rejected() {
        assert!(matches!(
            verify_password("pw", "not-a-hash"),
            Err(PasswordError::InvalidFormat)
        ));
        assert!(matches!(
            verify_password("pw", "bcrypt$1$AAAA$AAAA"),
            Err(PasswordError::InvalidFormat)
        ));
        assert!(matches!(
            verify_password("pw", "pbkdf2-sha256$0$AAAA$AAAA"),
            Err(PasswordError::InvalidFormat)
        ));
    }
}
