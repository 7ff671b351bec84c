use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::settings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A 128-bit random lookup key colliding with a live one means the RNG is
/// broken; a few retries are plenty.
const MAX_KEY_ATTEMPTS: usize = 4;

#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub resource_owner_access_ttl: Duration,
    pub client_credentials_access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Revoke the rotation chain when a consumed token is replayed.
    pub strict_rotation: bool,
}

impl From<&settings::Auth> for TokenPolicy {
    fn from(auth: &settings::Auth) -> Self {
        let minutes = |m: u64| Duration::from_secs(m.saturating_mul(60));
        TokenPolicy {
            resource_owner_access_ttl: minutes(auth.access_token_lifetime.resource_owner_credentials),
            client_credentials_access_ttl: minutes(auth.access_token_lifetime.client_credentials),
            refresh_ttl: minutes(auth.refresh_token_lifetime.resource_owner_credentials),
            strict_rotation: auth.rotation.strict,
        }
    }
}

pub struct RealTokenAuthority {
    store: Arc<dyn RefreshTokenStore>,
    token_codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    policy: TokenPolicy,
}

impl RealTokenAuthority {
    pub fn new(
        store: Arc<dyn RefreshTokenStore>,
        token_codec: Arc<dyn TokenCodec>,
        clock: Arc<dyn Clock>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            store,
            token_codec,
            clock,
            policy,
        }
    }

    fn issue_access(
        &self,
        principal: &Principal,
        ttl: Duration,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(AccessToken, chrono::DateTime<chrono::Utc>), TokenError> {
        self.token_codec
            .issue_access_token(principal, ttl, now)
            .map_err(|e| TokenError::InternalError(e.to_string()))
    }

    fn refresh_expiration(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<chrono::DateTime<chrono::Utc>, TokenError> {
        chrono::TimeDelta::from_std(self.policy.refresh_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                TokenError::InternalError("refresh token lifetime out of range".to_string())
            })
    }

    fn rejected(&self, key: &RefreshTokenKey, err: RedeemError) -> TokenError {
        match err {
            RedeemError::Unknown => {
                debug!(lookup_key = %key, "refresh rejected: unknown token");
                TokenError::UnknownToken
            }
            RedeemError::AlreadyConsumed {
                consumed_at,
                family,
                replayed,
                revoked,
            } => {
                // Reuse of a rotated token: either the client raced itself or
                // the token leaked.
                warn!(
                    lookup_key = %key,
                    %family,
                    %consumed_at,
                    replayed,
                    revoked,
                    "refresh token reuse detected"
                );
                TokenError::AlreadyConsumed
            }
            RedeemError::Expired(expiration) => {
                debug!(lookup_key = %key, %expiration, "refresh rejected: expired, record removed");
                TokenError::Expired
            }
            RedeemError::Tampered => {
                warn!(lookup_key = %key, "refresh rejected: secret does not match record");
                TokenError::Tampered
            }
            RedeemError::KeyOccupied => {
                TokenError::InternalError("could not allocate a refresh token key".to_string())
            }
            RedeemError::Store(e) => TokenError::Store(e),
        }
    }
}

#[async_trait::async_trait]
impl TokenAuthority for RealTokenAuthority {
    async fn issue_for_credentials(&self, subject: Subject) -> Result<TokenGrant, TokenError> {
        let now = self.clock.now();
        let (access_token, access_exp) = self.issue_access(
            &Principal::User(subject.clone()),
            self.policy.resource_owner_access_ttl,
            now,
        )?;

        let expiration = self.refresh_expiration(now)?;
        let family = TokenFamily::new();
        for _ in 0..MAX_KEY_ATTEMPTS {
            let issued = IssuedRefreshToken::generate();
            let record = RefreshTokenRecord {
                subject: subject.clone(),
                family,
                token_hash: issued.hash.clone(),
                issued_at: now,
                expiration,
                consumed_at: None,
            };
            match self.store.insert(issued.key.clone(), record).await {
                Ok(()) => {
                    info!(%subject, %family, "tokens issued for password grant");
                    return Ok(TokenGrant {
                        access_token,
                        refresh_token: Some(RefreshToken(issued.value)),
                        access_token_expires_at: access_exp,
                    });
                }
                Err(StoreError::KeyOccupied) => {
                    warn!(lookup_key = %issued.key, "refresh token key collision, regenerating");
                }
                Err(StoreError::Store(e)) => return Err(TokenError::Store(e)),
            }
        }
        Err(TokenError::InternalError(
            "could not allocate a refresh token key".to_string(),
        ))
    }

    async fn issue_for_client_credentials(
        &self,
        client_id: ClientId,
        _client_secret: &str,
    ) -> Result<TokenGrant, TokenError> {
        // The secret was checked by the identity service before we got here.
        if client_id.0.trim().is_empty() {
            return Err(TokenError::InvalidClient);
        }

        let now = self.clock.now();
        let (access_token, access_exp) = self.issue_access(
            &Principal::Client(client_id.clone()),
            self.policy.client_credentials_access_ttl,
            now,
        )?;

        info!(%client_id, "token issued for client credentials grant");
        Ok(TokenGrant {
            access_token,
            refresh_token: None,
            access_token_expires_at: access_exp,
        })
    }

    async fn refresh(&self, presented_refresh_token: &str) -> Result<TokenGrant, TokenError> {
        let presented =
            PresentedRefreshToken::parse(presented_refresh_token).ok_or(TokenError::UnknownToken)?;

        let now = self.clock.now();
        let expiration = self.refresh_expiration(now)?;
        for _ in 0..MAX_KEY_ATTEMPTS {
            // Generated outside the store's critical section.
            let next = IssuedRefreshToken::generate();
            let replacement = Replacement {
                key: next.key.clone(),
                token_hash: next.hash.clone(),
                expiration,
            };

            match self
                .store
                .redeem(
                    &presented.key,
                    &presented.hash,
                    now,
                    replacement,
                    self.policy.strict_rotation,
                )
                .await
            {
                Ok(redemption) => {
                    let (access_token, access_exp) = self.issue_access(
                        &Principal::User(redemption.subject.clone()),
                        self.policy.resource_owner_access_ttl,
                        now,
                    )?;
                    info!(
                        subject = %redemption.subject,
                        family = %redemption.family,
                        "refresh token rotated"
                    );
                    return Ok(TokenGrant {
                        access_token,
                        refresh_token: Some(RefreshToken(next.value)),
                        access_token_expires_at: access_exp,
                    });
                }
                Err(RedeemError::KeyOccupied) => {
                    warn!(lookup_key = %next.key, "refresh token key collision, regenerating");
                }
                Err(e) => return Err(self.rejected(&presented.key, e)),
            }
        }
        Err(self.rejected(&presented.key, RedeemError::KeyOccupied))
    }

    async fn expire_stale(&self) -> Result<usize, TokenError> {
        let removed = self
            .store
            .purge_expired(self.clock.now())
            .await
            .map_err(|e| TokenError::Store(e.to_string()))?;
        if removed > 0 {
            debug!(removed, "expired refresh tokens purged");
        }
        Ok(removed)
    }
}
