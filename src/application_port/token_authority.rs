use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("unsupported grant type: {0:?}")]
    UnsupportedGrantType(String),
    #[error("missing request parameter: {0}")]
    InvalidRequest(&'static str),
    #[error("invalid client")]
    InvalidClient,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("unknown refresh token")]
    UnknownToken,
    #[error("refresh token already consumed")]
    AlreadyConsumed,
    #[error("refresh token expired")]
    Expired,
    #[error("refresh token does not match its record")]
    Tampered,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl TokenError {
    /// Refresh failures that must look identical to the caller.
    pub fn is_rejected_refresh(&self) -> bool {
        matches!(
            self,
            TokenError::UnknownToken
                | TokenError::AlreadyConsumed
                | TokenError::Expired
                | TokenError::Tampered
        )
    }
}

impl From<UnsupportedGrantType> for TokenError {
    fn from(err: UnsupportedGrantType) -> Self {
        TokenError::UnsupportedGrantType(err.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Clone, Serialize)]
pub struct RefreshToken(pub String);

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken(..)")
    }
}

#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: AccessToken,
    /// Absent for client-credentials grants.
    pub refresh_token: Option<RefreshToken>,
    pub access_token_expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenAuthority: Send + Sync {
    /// Mint an access/refresh pair for a subject whose password the caller
    /// has already verified.
    async fn issue_for_credentials(&self, subject: Subject) -> Result<TokenGrant, TokenError>;

    /// Mint a client-scoped access token. Never issues a refresh token.
    async fn issue_for_client_credentials(
        &self,
        client_id: ClientId,
        client_secret: &str,
    ) -> Result<TokenGrant, TokenError>;

    /// Redeem a refresh token exactly once and rotate it.
    async fn refresh(&self, presented_refresh_token: &str) -> Result<TokenGrant, TokenError>;

    /// Drop expired refresh-token records. Returns how many were removed.
    async fn expire_stale(&self) -> Result<usize, TokenError>;
}
