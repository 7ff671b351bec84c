use crate::application_port::AccessToken;
use crate::domain_model::Principal;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("no signing key configured: set a symmetric key or a signing certificate")]
    SigningConfigurationMissing,
    #[error("cannot read signing certificate {path}: {reason}")]
    CertificateUnreadable { path: String, reason: String },
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    #[error("cannot sign token: {0}")]
    Encoding(String),
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("access token expired")]
    Expired,
    #[error("access token invalid: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct VerifiedAccessToken {
    pub principal: Principal,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs access tokens and verifies them statelessly with the same key
/// material. Pure local computation; never blocks.
pub trait TokenCodec: Send + Sync {
    fn issue_access_token(
        &self,
        principal: &Principal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, DateTime<Utc>), SigningError>;

    fn verify_access_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedAccessToken, VerifyError>;
}
