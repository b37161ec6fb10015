use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

pub const DEFAULT_SECRET_LENGTH: usize = 18;
pub const DEFAULT_SALT_LENGTH: usize = 8;

/// Per-client random value stored in the CSRF cookie
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"[REDACTED]").finish()
    }
}

/// Value derived from a [`Secret`] that is safe to embed in forms and headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Secret generation, token derivation and verification.
///
/// A token has the form `<salt>-<hash>` where the salt is random alphanumeric
/// text and the hash is `base64url(sha256(salt "-" secret))`. Every call to
/// [`Tokens::create`] picks a fresh salt, so many distinct tokens verify against
/// the same secret. Verification recomputes the hash with the presented salt and
/// compares in constant time.
///
/// The type holds no mutable state and can be shared freely between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokens {
    secret_length: usize,
    salt_length: usize,
}

impl Default for Tokens {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokens {
    pub fn new() -> Self {
        Self {
            secret_length: DEFAULT_SECRET_LENGTH,
            salt_length: DEFAULT_SALT_LENGTH,
        }
    }

    /// Lengths are clamped to at least one byte/character.
    pub fn with_lengths(secret_length: usize, salt_length: usize) -> Self {
        Self {
            secret_length: secret_length.max(1),
            salt_length: salt_length.max(1),
        }
    }

    pub fn generate_secret(&self) -> Secret {
        let mut bytes = vec![0u8; self.secret_length];
        OsRng.fill_bytes(&mut bytes);
        Secret(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn create(&self, secret: &Secret) -> Token {
        let salt: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(self.salt_length)
            .map(char::from)
            .collect();

        Token(tokenize(&salt, secret.expose()))
    }

    pub fn verify(&self, secret: &Secret, token: &str) -> bool {
        // The salt is alphanumeric, so the first '-' always ends it
        let Some((salt, _)) = token.split_once('-') else {
            return false;
        };

        if salt.is_empty() {
            return false;
        }

        let expected = tokenize(salt, secret.expose());
        expected.as_bytes().ct_eq(token.as_bytes()).into()
    }
}

fn tokenize(salt: &str, secret: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(b"-")
        .chain_update(secret.as_bytes())
        .finalize();

    format!("{}-{}", salt, URL_SAFE_NO_PAD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_secrets_are_unique() {
        let tokens = Tokens::new();
        let first = tokens.generate_secret();
        let second = tokens.generate_secret();

        assert_ne!(first, second);
        // 18 bytes encode to 24 base64 characters without padding
        assert_eq!(first.expose().len(), 24);
    }

    #[test]
    fn test_created_token_verifies() {
        let tokens = Tokens::new();
        let secret = tokens.generate_secret();
        let token = tokens.create(&secret);

        assert!(tokens.verify(&secret, token.as_str()));
    }

    #[test]
    fn test_many_tokens_verify_against_one_secret() {
        let tokens = Tokens::new();
        let secret = tokens.generate_secret();
        let first = tokens.create(&secret);
        let second = tokens.create(&secret);

        assert_ne!(first, second, "each token uses a fresh salt");
        assert!(tokens.verify(&secret, first.as_str()));
        assert!(tokens.verify(&secret, second.as_str()));
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let tokens = Tokens::new();
        let secret = tokens.generate_secret();
        let other = tokens.generate_secret();
        let token = tokens.create(&other);

        assert!(!tokens.verify(&secret, token.as_str()));
    }

    #[test]
    fn test_malformed_tokens_fail() {
        let tokens = Tokens::new();
        let secret = tokens.generate_secret();
        let token = tokens.create(&secret);

        assert!(!tokens.verify(&secret, ""));
        assert!(!tokens.verify(&secret, "42"));
        assert!(!tokens.verify(&secret, "-"));
        assert!(!tokens.verify(&secret, &format!("-{}", token)));
        assert!(!tokens.verify(&secret, &token.as_str()[..token.as_str().len() - 1]));
        assert!(!tokens.verify(&secret, &format!("{}x", token)));
    }

    #[test]
    fn test_custom_lengths() {
        let tokens = Tokens::with_lengths(32, 12);
        let secret = tokens.generate_secret();
        let token = tokens.create(&secret);

        let (salt, _) = token.as_str().split_once('-').unwrap();
        assert_eq!(salt.len(), 12);
        assert!(tokens.verify(&secret, token.as_str()));

        // A verifier with different lengths still accepts the token
        assert!(Tokens::new().verify(&secret, token.as_str()));
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("super-secret-value");
        let debug = format!("{:?}", secret);

        assert!(!debug.contains("super-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
