//! Refresh tokens as handed to clients and as remembered by the store.
//!
//! A refresh token travels as `<lookup key>.<secret>`. The store is keyed by
//! the lookup key; the record keeps only a SHA-256 of the full string, so a
//! caller who learns a lookup key still cannot redeem it.

use crate::domain_model::Subject;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

const LOOKUP_KEY_BYTES: usize = 16;
const SECRET_BYTES: usize = 64;
const SEPARATOR: char = '.';

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RefreshTokenKey(pub String);

impl fmt::Display for RefreshTokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rotation chain identifier, inherited by every replacement token.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TokenFamily(pub uuid::Uuid);

impl TokenFamily {
    pub fn new() -> Self {
        TokenFamily(uuid::Uuid::new_v4())
    }
}

impl Default for TokenFamily {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex SHA-256 of a full refresh token string.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TokenHash(String);

impl TokenHash {
    pub fn of(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        TokenHash(hex::encode(hasher.finalize()))
    }

    pub fn matches(&self, other: &TokenHash) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub subject: Subject,
    pub family: TokenFamily,
    pub token_hash: TokenHash,
    pub issued_at: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration < now
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

/// A freshly minted refresh token. `value` is the only place the secret
/// exists; it goes to the client and is never stored.
#[derive(Clone)]
pub struct IssuedRefreshToken {
    pub key: RefreshTokenKey,
    pub value: String,
    pub hash: TokenHash,
}

impl IssuedRefreshToken {
    pub fn generate() -> Self {
        let mut key = [0u8; LOOKUP_KEY_BYTES];
        let mut secret = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut secret);

        let key = RefreshTokenKey(hex::encode(key));
        let value = format!("{}{}{}", key, SEPARATOR, hex::encode(secret));
        let hash = TokenHash::of(&value);
        IssuedRefreshToken { key, value, hash }
    }
}

impl fmt::Debug for IssuedRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedRefreshToken")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// A refresh token as received from a client, split but not yet trusted.
#[derive(Debug, Clone)]
pub struct PresentedRefreshToken {
    pub key: RefreshTokenKey,
    pub hash: TokenHash,
}

impl PresentedRefreshToken {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (key, secret) = token.split_once(SEPARATOR)?;
        if key.is_empty() || secret.is_empty() {
            return None;
        }
        Some(PresentedRefreshToken {
            key: RefreshTokenKey(key.to_owned()),
            hash: TokenHash::of(token),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_token_has_two_hex_segments() {
        let issued = IssuedRefreshToken::generate();
        let (key, secret) = issued.value.split_once('.').unwrap();

        assert_eq!(key, issued.key.0);
        assert_eq!(key.len(), LOOKUP_KEY_BYTES * 2);
        assert_eq!(secret.len(), SECRET_BYTES * 2);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_tokens_are_distinct() {
        let a = IssuedRefreshToken::generate();
        let b = IssuedRefreshToken::generate();
        assert_ne!(a.key, b.key);
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn presented_token_hash_matches_issued_hash() {
        let issued = IssuedRefreshToken::generate();
        let presented = PresentedRefreshToken::parse(&issued.value).unwrap();

        assert_eq!(presented.key, issued.key);
        assert!(presented.hash.matches(&issued.hash));
    }

    #[test]
    fn altered_secret_keeps_key_but_changes_hash() {
        let issued = IssuedRefreshToken::generate();
        let forged = format!("{}.{}", issued.key, "ab".repeat(SECRET_BYTES));
        let presented = PresentedRefreshToken::parse(&forged).unwrap();

        assert_eq!(presented.key, issued.key);
        assert!(!presented.hash.matches(&issued.hash));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        assert!(PresentedRefreshToken::parse("").is_none());
        assert!(PresentedRefreshToken::parse("no-separator").is_none());
        assert!(PresentedRefreshToken::parse(".secret").is_none());
        assert!(PresentedRefreshToken::parse("key.").is_none());
    }

    #[test]
    fn debug_output_hides_secret() {
        let issued = IssuedRefreshToken::generate();
        let printed = format!("{:?}", issued);
        assert!(!printed.contains(&issued.value));
    }
}
