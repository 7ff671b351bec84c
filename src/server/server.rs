use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::logger::*;
use crate::server::*;
use crate::settings::Settings;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Server {
    pub grant_service: Arc<dyn GrantService>,
    pub token_authority: Arc<dyn TokenAuthority>,
    pub token_codec: Arc<dyn TokenCodec>,
    pub clock: Arc<dyn Clock>,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let signing_material = SigningMaterial::from_settings(&settings.auth.jwt)?;
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtCodec::new(
            JwtConfig::from(&settings.auth.jwt),
            &signing_material,
        )?);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store: Arc<dyn RefreshTokenStore> = Arc::new(InMemoryRefreshTokenStore::new());

        let token_authority: Arc<dyn TokenAuthority> = Arc::new(RealTokenAuthority::new(
            store,
            token_codec.clone(),
            clock.clone(),
            TokenPolicy::from(&settings.auth),
        ));

        let identity_service: Arc<dyn IdentityService> =
            match settings.identity.backend.as_str() {
                "fake" => {
                    warn!("fake identity backend accepts any username and client id");
                    Arc::new(FakeIdentityService::new())
                }
                "static" => Arc::new(StaticIdentityService::try_new(&settings.identity)?),
                other => return Err(anyhow::anyhow!("Unknown identity backend: {}", other)),
            };

        let grant_service: Arc<dyn GrantService> = Arc::new(RealGrantService::new(
            identity_service,
            token_authority.clone(),
        ));

        // region runtime infra
        let cancel = CancellationToken::new();

        let sweeper = Sweeper::new(
            token_authority.clone(),
            Duration::from_secs(settings.auth.rotation.sweep_interval_secs),
            cancel.clone(),
        );
        let sweeper_handle = tokio::spawn(async move {
            let _ = sweeper.run().await;
        });

        // endregion

        info!("server started");

        Ok(Self {
            grant_service,
            token_authority,
            token_codec,
            clock,
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = match self.sweeper_handle.lock() {
            Ok(mut lock) => lock.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{TEST_SETTINGS, parse_settings_str};

    #[tokio::test]
    async fn builds_from_settings_and_shuts_down() {
        let settings = parse_settings_str(TEST_SETTINGS).unwrap();
        let server = Server::try_new(&settings).await.unwrap();

        let grant = server
            .token_authority
            .issue_for_client_credentials(crate::domain_model::ClientId("svc".to_string()), "")
            .await
            .unwrap();
        assert!(
            server
                .token_codec
                .verify_access_token(&grant.access_token.0, server.clock.now())
                .is_ok()
        );

        server.shutdown().await;
        // A second shutdown finds nothing left to join.
        server.shutdown().await;
    }

    #[tokio::test]
    async fn missing_signing_configuration_is_fatal() {
        let toml = TEST_SETTINGS.replace(
            "signing_symmetric_key = \"0123456789abcdef0123456789abcdef0123456789abcdef\"",
            "",
        );
        let settings = parse_settings_str(&toml).unwrap();
        let err = Server::try_new(&settings).await.err().unwrap();
        assert!(err.to_string().contains("signing"));
    }

    #[tokio::test]
    async fn unknown_identity_backend_is_fatal() {
        let toml = TEST_SETTINGS.replace("backend = \"fake\"", "backend = \"ldap\"");
        let settings = parse_settings_str(&toml).unwrap();
        assert!(Server::try_new(&settings).await.is_err());
    }
}
