use crate::application_port::{TokenError, TokenGrant};
use crate::domain_model::Grant;

/// The token endpoint: credential checks followed by issuance.
#[async_trait::async_trait]
pub trait GrantService: Send + Sync {
    async fn grant(&self, grant: Grant) -> Result<TokenGrant, TokenError>;
}
