use crate::domain_model::*;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("lookup key already in use")]
    KeyOccupied,
    #[error("store error: {0}")]
    Store(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error("no record for lookup key")]
    Unknown,
    #[error("refresh token already consumed at {consumed_at}")]
    AlreadyConsumed {
        consumed_at: DateTime<Utc>,
        family: TokenFamily,
        /// Presented hash matched the record, i.e. the genuine token was replayed.
        replayed: bool,
        /// Live tokens of the same family invalidated by this attempt.
        revoked: usize,
    },
    #[error("refresh token expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("presented token does not match stored hash")]
    Tampered,
    #[error("replacement lookup key already in use")]
    KeyOccupied,
    #[error("store error: {0}")]
    Store(String),
}

/// The successor record the store inserts when a redemption succeeds.
/// Subject and family are copied from the consumed record.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub key: RefreshTokenKey,
    pub token_hash: TokenHash,
    pub expiration: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Redemption {
    pub subject: Subject,
    pub family: TokenFamily,
}

#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a new record. Fails if the key is still held by another record.
    async fn insert(
        &self,
        key: RefreshTokenKey,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError>;

    /// Check-and-consume in a single critical section: lookup, consumed check,
    /// expiry check (removing the record when stale), hash check, then mark
    /// consumed and insert `replacement`.
    ///
    /// When `revoke_family_on_reuse` is set and a consumed record is presented
    /// with its correct hash, every unconsumed record of that family is
    /// consumed as well.
    async fn redeem(
        &self,
        key: &RefreshTokenKey,
        presented_hash: &TokenHash,
        now: DateTime<Utc>,
        replacement: Replacement,
        revoke_family_on_reuse: bool,
    ) -> Result<Redemption, RedeemError>;

    async fn get(&self, key: &RefreshTokenKey) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Remove every record whose expiration is before `now`. Returns the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}
