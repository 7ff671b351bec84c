use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use token_authority::application_impl::*;
use token_authority::application_port::*;
use token_authority::domain_model::Grant;
use token_authority::domain_port::*;
use token_authority::infra_memory::*;
use token_authority::logger::*;

// Walks the rotation lifecycle in-process against a hand-driven clock.
// $ cargo run --bin authority_demo
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap();
    logger.reload_from_config(&LogConfig {
        filter: "debug".to_string(),
    })?;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    clock.set(Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now));

    let codec = Arc::new(JwtCodec::new(
        JwtConfig {
            issuer: "https://localhost:44352".to_string(),
            audience: "practical.jwt".to_string(),
            clock_skew: Duration::ZERO,
        },
        &SigningMaterial::Symmetric(b"authority-demo-signing-key".to_vec()),
    )?);
    let store = Arc::new(InMemoryRefreshTokenStore::new());
    let authority = Arc::new(RealTokenAuthority::new(
        store.clone(),
        codec.clone(),
        clock.clone(),
        TokenPolicy {
            resource_owner_access_ttl: Duration::from_secs(5 * 60),
            client_credentials_access_ttl: Duration::from_secs(60 * 60),
            refresh_ttl: Duration::from_secs(24 * 60 * 60),
            strict_rotation: true,
        },
    ));
    let grants = RealGrantService::new(Arc::new(FakeIdentityService::new()), authority.clone());

    let first = grants
        .grant(Grant::Password {
            username: "Test@ABC.com".to_string(),
            password: String::new(),
        })
        .await?;
    info!(expires = %first.access_token_expires_at, "password grant");
    let first_refresh = first
        .refresh_token
        .ok_or_else(|| anyhow::anyhow!("password grant returned no refresh token"))?;

    clock.advance(Duration::from_secs(4 * 60));
    let verified = codec.verify_access_token(&first.access_token.0, clock.now());
    info!(ok = verified.is_ok(), "access token after 4 minutes");
    clock.advance(Duration::from_secs(2 * 60));
    let verified = codec.verify_access_token(&first.access_token.0, clock.now());
    info!(ok = verified.is_ok(), "access token after 6 minutes");

    let second = authority.refresh(&first_refresh.0).await?;
    info!(rotated = second.refresh_token.is_some(), "refresh grant");

    match authority.refresh(&first_refresh.0).await {
        Ok(_) => warn!("replay unexpectedly succeeded"),
        Err(e) => info!("replay rejected: {}", e),
    }
    if let Some(descendant) = &second.refresh_token {
        match authority.refresh(&descendant.0).await {
            Ok(_) => warn!("revoked descendant unexpectedly succeeded"),
            Err(e) => info!("descendant rejected after replay: {}", e),
        }
    }

    let client = grants
        .grant(Grant::ClientCredentials {
            client_id: "svc".to_string(),
            client_secret: "secret".to_string(),
        })
        .await?;
    info!(
        refresh_token = client.refresh_token.is_some(),
        "client credentials grant"
    );

    info!(records = store.len().await?, "before expiry");
    clock.advance(Duration::from_secs(25 * 60 * 60));
    let removed = authority.expire_stale().await?;
    info!(removed, records = store.len().await?, "after expiry sweep");

    Ok(())
}
