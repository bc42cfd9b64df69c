//! Passwords of connected accounts: the registration policy and Argon2id
//! storage.

use std::sync::LazyLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use immersion_core::error::CoreError;

/// Minimum length, in characters, accepted on registration.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Shortest email local part the policy looks for inside a password.
const MIN_LOCAL_PART_CHECKED: usize = 4;

/// Hash verified when the login email matches no account, so that both
/// failures cost one Argon2 verification.
static DECOY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("decoy-password-never-matched").ok());

/// Check a password chosen for the account `email`.
///
/// It must have at least [`MIN_PASSWORD_LENGTH`] characters, not be blank,
/// and not contain the local part of the email.
pub fn check_new_password(password: &str, email: &str) -> Result<(), CoreError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CoreError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    if password.trim().is_empty() {
        return Err(CoreError::Validation("Password must not be blank".into()));
    }

    let local_part = email
        .split('@')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    if local_part.chars().count() >= MIN_LOCAL_PART_CHECKED
        && password.to_lowercase().contains(&local_part)
    {
        return Err(CoreError::Validation(
            "Password must not contain the email address".into(),
        ));
    }
    Ok(())
}

/// Hash a password with Argon2id and a random salt, as a PHC string.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Whether `password` matches the stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Spend one verification on a login attempt for an unknown email.
pub fn verify_against_decoy(password: &str) {
    if let Some(hash) = DECOY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn stored_hash_is_salted_argon2id() {
        let first = hash_password("boulangerie-du-coin").unwrap();
        let second = hash_password("boulangerie-du-coin").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("boulangerie-du-coin", &first).unwrap());
        assert!(verify_password("boulangerie-du-coin", &second).unwrap());
        assert!(!verify_password("boulangerie-du-quartier", &first).unwrap());
    }

    #[test]
    fn corrupted_hash_is_an_error_not_a_mismatch() {
        assert!(verify_password("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn length_is_counted_in_characters() {
        assert_matches!(
            check_new_password("short", "claire@agence.fr"),
            Err(CoreError::Validation(msg)) if msg.contains("at least 12")
        );
        // 12 characters, more than 12 bytes.
        assert!(check_new_password("éééééééééééé", "claire@agence.fr").is_ok());
        assert!(check_new_password("            ", "claire@agence.fr").is_err());
    }

    #[test]
    fn password_cannot_embed_the_email() {
        assert!(check_new_password("Claire-Password-2026", "claire@agence.fr").is_err());
        assert!(check_new_password("a-long-enough-password", "claire@agence.fr").is_ok());
        // Short local parts are too common to reject on.
        assert!(check_new_password("lea-long-password", "lea@agence.fr").is_ok());
    }

    #[test]
    fn decoy_verification_does_not_panic() {
        verify_against_decoy("whatever-was-typed");
    }
}
