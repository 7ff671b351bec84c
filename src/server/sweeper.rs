use crate::application_port::TokenAuthority;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Periodically drops expired refresh-token records.
pub struct Sweeper {
    token_authority: Arc<dyn TokenAuthority>,
    interval: Duration,
    cancellation_token: CancellationToken,
}

impl Sweeper {
    pub fn new(
        token_authority: Arc<dyn TokenAuthority>,
        interval: Duration,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            token_authority,
            interval,
            cancellation_token,
        }
    }

    async fn tick_once(&self) -> anyhow::Result<usize> {
        Ok(self.token_authority.expire_stale().await?)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nothing can have expired yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("Sweeper shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick_once().await {
                        Ok(0) => {}
                        Ok(removed) => tracing::debug!(removed, "Sweeper purged refresh tokens"),
                        Err(e) => tracing::error!("Sweeper error: {:#?}", e),
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_port::{TokenError, TokenGrant};
    use crate::domain_model::{ClientId, Subject};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingAuthority {
        sweeps: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TokenAuthority for CountingAuthority {
        async fn issue_for_credentials(&self, _: Subject) -> Result<TokenGrant, TokenError> {
            Err(TokenError::InternalError("unused".to_string()))
        }

        async fn issue_for_client_credentials(
            &self,
            _: ClientId,
            _: &str,
        ) -> Result<TokenGrant, TokenError> {
            Err(TokenError::InternalError("unused".to_string()))
        }

        async fn refresh(&self, _: &str) -> Result<TokenGrant, TokenError> {
            Err(TokenError::InternalError("unused".to_string()))
        }

        async fn expire_stale(&self) -> Result<usize, TokenError> {
            self.sweeps.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_interval_until_cancelled() {
        let authority = Arc::new(CountingAuthority::default());
        let cancel = CancellationToken::new();
        let sweeper = Sweeper::new(authority.clone(), Duration::from_secs(60), cancel.clone());
        let handle = tokio::spawn(async move { sweeper.run().await });

        tokio::time::sleep(Duration::from_secs(60 * 3 + 1)).await;
        assert_eq!(authority.sweeps.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(authority.sweeps.load(Ordering::SeqCst), 3);
    }
}
