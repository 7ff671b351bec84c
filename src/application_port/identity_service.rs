use crate::application_port::TokenError;
use crate::domain_model::{ClientId, Subject};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid client")]
    InvalidClient,
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<IdentityError> for TokenError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => TokenError::InvalidCredentials,
            IdentityError::InvalidClient => TokenError::InvalidClient,
            IdentityError::InternalError(e) => TokenError::InternalError(e),
        }
    }
}

/// Identity store the token endpoint delegates raw credential checks to.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    async fn verify_password(&self, username: &str, password: &str)
    -> Result<Subject, IdentityError>;

    async fn verify_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<ClientId, IdentityError>;
}
