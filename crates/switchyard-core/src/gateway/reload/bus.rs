//! Publish/subscribe transports for reload triggers.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use sqlx::postgres::{PgListener, PgPool};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::AppResult;

const LOCAL_BUS_CAPACITY: usize = 16;

/// Named-topic message bus. Payload content is opaque to subscribers.
#[async_trait]
pub trait ReloadBus: Send + Sync {
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()>;

    /// Messages published on `channel` after this call returns.
    async fn subscribe(&self, channel: &str) -> AppResult<BoxStream<'static, String>>;
}

/// In-process bus for single-binary deployments and tests.
#[derive(Debug, Default)]
pub struct LocalBus {
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.topics
            .lock()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(LOCAL_BUS_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl ReloadBus for LocalBus {
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        // No subscribers is not an error.
        let _ = self.sender(channel).send(payload.to_string());
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> AppResult<BoxStream<'static, String>> {
        let rx = self.sender(channel).subscribe();
        let messages = stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(payload) => Some((payload, rx)),
                // Missed triggers collapse into one.
                Err(broadcast::error::RecvError::Lagged(_)) => Some((String::from("lagged"), rx)),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        });
        Ok(messages.boxed())
    }
}

/// Cross-process bus over PostgreSQL `LISTEN`/`NOTIFY`.
#[derive(Debug, Clone)]
pub struct PgNotifyBus {
    pool: PgPool,
}

impl PgNotifyBus {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReloadBus for PgNotifyBus {
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(payload)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> AppResult<BoxStream<'static, String>> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(channel).await?;
        let messages = listener.into_stream().filter_map(|notification| async move {
            match notification {
                Ok(n) => Some(n.payload().to_string()),
                Err(e) => {
                    warn!(error = %e, "Reload listener error");
                    None
                },
            }
        });
        Ok(messages.boxed())
    }
}
