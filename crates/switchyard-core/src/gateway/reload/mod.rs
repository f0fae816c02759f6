//! Keeps the provider registry in step with the store.
//!
//! With a bus, every message on the reload channel triggers a full reload.
//! Without one (or if subscribing fails), the registry is reloaded on a fixed
//! interval instead.

mod bus;


pub use bus::{LocalBus, PgNotifyBus, ReloadBus};

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use switchyard_types::models::ReloadSettings;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::gateway::loader::ConfigLoader;
use crate::gateway::task::BackgroundTask;

/// Payload published by [`trigger_reload`].
pub const RELOAD_TRIGGER: &str = "trigger";

/// Ask every gateway listening on `channel` to reload its providers.
pub async fn trigger_reload(bus: &dyn ReloadBus, channel: &str) -> AppResult<()> {
    info!(channel = %channel, "Publishing provider reload trigger");
    bus.publish(channel, RELOAD_TRIGGER).await
}

pub struct ReloadNotifier {
    loader: Arc<ConfigLoader>,
    bus: Option<Arc<dyn ReloadBus>>,
    settings: ReloadSettings,
}

impl ReloadNotifier {
    pub fn new(
        loader: Arc<ConfigLoader>,
        bus: Option<Arc<dyn ReloadBus>>,
        settings: ReloadSettings,
    ) -> Self {
        Self { loader, bus, settings }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.poll_interval_secs.max(1))
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.reload_timeout_secs.max(1))
    }

    /// Subscribe to the reload channel, then spawn the listen-or-poll loop.
    ///
    /// The subscription exists once this returns, so a trigger published right
    /// afterwards is not missed.
    pub async fn start(self: &Arc<Self>, parent: &CancellationToken) -> BackgroundTask {
        let subscription = match &self.bus {
            Some(bus) => match bus.subscribe(&self.settings.channel).await {
                Ok(messages) => Some(messages),
                Err(e) => {
                    error!(error = %e, "Reload subscribe failed, falling back to polling");
                    None
                },
            },
            None => None,
        };

        let notifier = Arc::clone(self);
        BackgroundTask::spawn("reload-notifier", parent, move |cancel| async move {
            if let Some(messages) = subscription {
                if !notifier.listen(messages, &cancel).await {
                    info!("Reload notifier stopped");
                    return;
                }
                warn!(channel = %notifier.settings.channel, "Reload channel closed, falling back to polling");
            }
            notifier.poll(&cancel).await;
            info!("Reload notifier stopped");
        })
    }

    /// Reload once, bounded by the reload timeout and by `cancel`.
    pub async fn reload_now(&self, cancel: &CancellationToken) -> AppResult<usize> {
        let timeout = self.reload_timeout();
        match tokio::time::timeout(timeout, self.loader.reload(cancel)).await {
            Ok(Ok(count)) => Ok(count),
            Ok(Err(e)) => Err(AppError::Reload(e.to_string())),
            Err(_) => Err(AppError::Reload(format!("timed out after {}s", timeout.as_secs()))),
        }
    }

    /// Returns `false` when stopped by cancellation, `true` when the channel ended.
    async fn listen(
        &self,
        mut messages: futures::stream::BoxStream<'static, String>,
        cancel: &CancellationToken,
    ) -> bool {
        info!(channel = %self.settings.channel, "Reload subscriber started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => return false,
                message = messages.next() => {
                    let Some(payload) = message else {
                        return true;
                    };
                    info!(payload = %payload, "Reload trigger received");
                    self.reload_logged(cancel).await;
                },
            }
        }
    }

    async fn poll(&self, cancel: &CancellationToken) {
        let period = self.poll_interval();
        info!(interval_secs = period.as_secs(), "Periodic provider reload started");
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => self.reload_logged(cancel).await,
            }
        }
    }

    async fn reload_logged(&self, cancel: &CancellationToken) {
        match self.reload_now(cancel).await {
            Ok(count) => info!(providers = count, "Provider reload completed"),
            Err(_) if cancel.is_cancelled() => info!("Provider reload abandoned on shutdown"),
            Err(e) => error!(error = %e, "Provider reload failed"),
        }
    }
}
