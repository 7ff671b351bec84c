use crate::application_port::*;
use crate::domain_model::Grant;
use std::sync::Arc;
use tracing::debug;

pub struct RealGrantService {
    identity: Arc<dyn IdentityService>,
    authority: Arc<dyn TokenAuthority>,
}

impl RealGrantService {
    pub fn new(identity: Arc<dyn IdentityService>, authority: Arc<dyn TokenAuthority>) -> Self {
        Self {
            identity,
            authority,
        }
    }
}

#[async_trait::async_trait]
impl GrantService for RealGrantService {
    async fn grant(&self, grant: Grant) -> Result<TokenGrant, TokenError> {
        debug!(grant_type = %grant.grant_type(), "token request");
        match grant {
            Grant::Password { username, password } => {
                let username = username.to_lowercase();
                let subject = self.identity.verify_password(&username, &password).await?;
                self.authority.issue_for_credentials(subject).await
            }
            Grant::RefreshToken { refresh_token } => self.authority.refresh(&refresh_token).await,
            Grant::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let client_id = self.identity.verify_client(&client_id, &client_secret).await?;
                self.authority
                    .issue_for_client_credentials(client_id, &client_secret)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::*;
    use crate::domain_model::{ClientId, Principal, Subject};
    use crate::domain_port::{Clock, ManualClock};
    use crate::infra_memory::InMemoryRefreshTokenStore;
    use crate::settings::{ClientEntry, Identity, UserEntry};
    use chrono::Utc;
    use std::time::Duration;

    fn service_with(identity: Arc<dyn IdentityService>) -> (RealGrantService, Arc<JwtCodec>) {
        let codec = Arc::new(
            JwtCodec::new(
                JwtConfig {
                    issuer: "https://issuer.test".to_string(),
                    audience: "api.test".to_string(),
                    clock_skew: Duration::ZERO,
                },
                &SigningMaterial::Symmetric(b"grant-service-test-secret".to_vec()),
            )
            .unwrap(),
        );
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
        let authority = Arc::new(RealTokenAuthority::new(
            Arc::new(InMemoryRefreshTokenStore::new()),
            codec.clone(),
            clock,
            TokenPolicy {
                resource_owner_access_ttl: Duration::from_secs(300),
                client_credentials_access_ttl: Duration::from_secs(3600),
                refresh_ttl: Duration::from_secs(86400),
                strict_rotation: true,
            },
        ));
        (RealGrantService::new(identity, authority), codec)
    }

    fn static_identity() -> Arc<dyn IdentityService> {
        Arc::new(
            StaticIdentityService::try_new(&Identity {
                backend: "static".to_string(),
                users: vec![UserEntry {
                    username: "admin".to_string(),
                    password: "password123".to_string(),
                }],
                clients: vec![ClientEntry {
                    client_id: "svc".to_string(),
                    client_secret: "s3cret".to_string(),
                }],
            })
            .unwrap(),
        )
    }

    fn subject_of(codec: &JwtCodec, grant: &TokenGrant) -> Principal {
        codec
            .verify_access_token(&grant.access_token.0, Utc::now())
            .unwrap()
            .principal
    }

    #[tokio::test]
    async fn password_grant_lowercases_username() {
        let (service, codec) = service_with(Arc::new(FakeIdentityService::new()));
        let grant = service
            .grant(Grant::Password {
                username: "Test@ABC.com".to_string(),
                password: String::new(),
            })
            .await
            .unwrap();

        assert!(grant.refresh_token.is_some());
        assert_eq!(
            subject_of(&codec, &grant),
            Principal::User(Subject("test@abc.com".to_string()))
        );
    }

    #[tokio::test]
    async fn bad_password_is_invalid_credentials() {
        let (service, _) = service_with(static_identity());
        let err = service
            .grant(Grant::Password {
                username: "admin".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_grant_rotates() {
        let (service, _) = service_with(static_identity());
        let first = service
            .grant(Grant::Password {
                username: "ADMIN".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        let refresh_token = first.refresh_token.unwrap().0;

        let second = service
            .grant(Grant::RefreshToken {
                refresh_token: refresh_token.clone(),
            })
            .await
            .unwrap();
        assert_ne!(second.refresh_token.unwrap().0, refresh_token);

        let replay = service
            .grant(Grant::RefreshToken { refresh_token })
            .await
            .unwrap_err();
        assert!(replay.is_rejected_refresh());
    }

    #[tokio::test]
    async fn client_credentials_grant() {
        let (service, codec) = service_with(static_identity());
        let grant = service
            .grant(Grant::ClientCredentials {
                client_id: "svc".to_string(),
                client_secret: "s3cret".to_string(),
            })
            .await
            .unwrap();
        assert!(grant.refresh_token.is_none());
        assert_eq!(
            subject_of(&codec, &grant),
            Principal::Client(ClientId("svc".to_string()))
        );

        let err = service
            .grant(Grant::ClientCredentials {
                client_id: "svc".to_string(),
                client_secret: "nope".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InvalidClient));
    }
}
