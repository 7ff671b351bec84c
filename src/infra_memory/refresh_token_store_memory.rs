use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Volatile refresh-token store. One mutex guards the whole map, and every
/// operation (reads included) runs under it.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    records: Mutex<HashMap<RefreshTokenKey, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_live(record: &RefreshTokenRecord, now: DateTime<Utc>) -> bool {
    !record.is_consumed() && !record.is_expired(now)
}

fn revoke_family(
    records: &mut HashMap<RefreshTokenKey, RefreshTokenRecord>,
    family: TokenFamily,
    now: DateTime<Utc>,
) -> usize {
    let mut revoked = 0;
    for record in records.values_mut() {
        if record.family == family && record.consumed_at.is_none() {
            record.consumed_at = Some(now);
            revoked += 1;
        }
    }
    revoked
}

#[async_trait::async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(
        &self,
        key: RefreshTokenKey,
        record: RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&key) {
            if is_live(existing, record.issued_at) {
                return Err(StoreError::KeyOccupied);
            }
        }
        records.insert(key, record);
        Ok(())
    }

    async fn redeem(
        &self,
        key: &RefreshTokenKey,
        presented_hash: &TokenHash,
        now: DateTime<Utc>,
        replacement: Replacement,
        revoke_family_on_reuse: bool,
    ) -> Result<Redemption, RedeemError> {
        let mut records = self.records.lock().await;

        let record = records.get(key).ok_or(RedeemError::Unknown)?;
        let family = record.family;
        let hash_matches = record.token_hash.matches(presented_hash);

        if let Some(consumed_at) = record.consumed_at {
            let revoked = if hash_matches && revoke_family_on_reuse {
                revoke_family(&mut records, family, now)
            } else {
                0
            };
            return Err(RedeemError::AlreadyConsumed {
                consumed_at,
                family,
                replayed: hash_matches,
                revoked,
            });
        }

        if record.is_expired(now) {
            let expiration = record.expiration;
            records.remove(key);
            return Err(RedeemError::Expired(expiration));
        }

        if !hash_matches {
            return Err(RedeemError::Tampered);
        }

        if records
            .get(&replacement.key)
            .is_some_and(|existing| is_live(existing, now))
        {
            return Err(RedeemError::KeyOccupied);
        }

        let Some(record) = records.get_mut(key) else {
            return Err(RedeemError::Unknown);
        };
        record.consumed_at = Some(now);
        let subject = record.subject.clone();

        records.insert(
            replacement.key,
            RefreshTokenRecord {
                subject: subject.clone(),
                family,
                token_hash: replacement.token_hash,
                issued_at: now,
                expiration: replacement.expiration,
                consumed_at: None,
            },
        );

        Ok(Redemption { subject, family })
    }

    async fn get(&self, key: &RefreshTokenKey) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.get(key).cloned())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().await.len())
    }
}
