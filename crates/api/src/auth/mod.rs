//! Authentication and authorization primitives.
//!
//! - [`token`] -- signing and verification shared by every JWT kind.
//! - [`session`] -- access and refresh tokens of connected users.
//! - [`magic_link`] -- convention and establishment magic links.
//! - [`password`] -- Argon2id hashing and the registration password policy.

pub mod magic_link;
pub mod password;
pub mod session;
pub mod token;

/// Integer environment variable with a default.
///
/// # Panics
///
/// Panics if the variable is set but is not an integer.
fn env_i64(name: &str, default: i64) -> i64 {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid i64")),
        Err(_) => default,
    }
}
