use crate::application_port::*;
use crate::domain_model::{ClientId, Subject};

#[derive(Debug, Default)]
pub struct FakeIdentityService;

impl FakeIdentityService {
    pub fn new() -> Self {
        Self
    }
}

// Accepts any non-empty username or client id, whatever the secret.
// For local development and tests only.
#[async_trait::async_trait]
impl IdentityService for FakeIdentityService {
    async fn verify_password(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<Subject, IdentityError> {
        if username.trim().is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        Ok(Subject(username.to_string()))
    }

    async fn verify_client(
        &self,
        client_id: &str,
        _client_secret: &str,
    ) -> Result<ClientId, IdentityError> {
        if client_id.trim().is_empty() {
            return Err(IdentityError::InvalidClient);
        }
        Ok(ClientId(client_id.to_string()))
    }
}
