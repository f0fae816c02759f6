//! Assembled gateway with its background loops.

use std::sync::Arc;
use std::time::Duration;
use switchyard_types::models::GatewayConfig;
use tokio_util::sync::CancellationToken;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::error::AppResult;
use crate::gateway::chat::ChatGateway;
use crate::gateway::health::HealthProber;
use crate::gateway::loader::ConfigLoader;
use crate::gateway::provider::ProviderFactories;
use crate::gateway::quota::QuotaChecker;
use crate::gateway::registry::ProviderRegistry;
use crate::gateway::reload::{trigger_reload, ReloadBus, ReloadNotifier};
use crate::gateway::task::BackgroundTask;
use crate::modules::repository::GatewayStore;

const RPM_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handle to a running gateway
#[derive(Clone)]
pub struct GatewayService {
    inner: Arc<ServiceInner>,
}

pub struct ServiceInner {
    pub gateway: Arc<ChatGateway>,
    pub loader: Arc<ConfigLoader>,
    pub prober: Option<Arc<HealthProber>>,
    pub notifier: Arc<ReloadNotifier>,
    bus: Option<Arc<dyn ReloadBus>>,
    shutdown: CancellationToken,
    tasks: Vec<BackgroundTask>,
}

impl GatewayService {
    /// Load providers and start the health prober and reload notifier.
    ///
    /// A failed initial load is logged; the notifier retries on its next
    /// trigger or poll.
    pub async fn start(
        config: GatewayConfig,
        store: Arc<dyn GatewayStore>,
        factories: ProviderFactories,
        bus: Option<Arc<dyn ReloadBus>>,
    ) -> Self {
        let factories = factories.with_default_vendor(config.default_vendor.clone());
        let registry = Arc::new(ProviderRegistry::new());
        let loader = Arc::new(ConfigLoader::from_config(
            Arc::clone(&store),
            Arc::clone(&registry),
            factories,
            &config,
        ));

        let shutdown = CancellationToken::new();
        match loader.load(&shutdown).await {
            Ok(count) => info!(providers = count, "Providers loaded"),
            Err(e) => error!(error = %e, "Initial provider load failed"),
        }

        let gateway = Arc::new(ChatGateway::new(config.clone(), store, Arc::clone(&registry)));
        let mut tasks = Vec::new();

        let prober = config.health.enabled.then(|| {
            Arc::new(
                HealthProber::new(Arc::clone(&registry), config.health.clone())
                    .with_breakers(Arc::clone(gateway.breakers())),
            )
        });
        if let Some(prober) = &prober {
            tasks.push(prober.start(&shutdown));
        }

        let notifier =
            Arc::new(ReloadNotifier::new(Arc::clone(&loader), bus.clone(), config.reload.clone()));
        tasks.push(notifier.start(&shutdown).await);

        if gateway.quota().enabled() {
            tasks.push(spawn_rpm_pruner(Arc::clone(gateway.quota()), &shutdown));
        }

        Self {
            inner: Arc::new(ServiceInner { gateway, loader, prober, notifier, bus, shutdown, tasks }),
        }
    }

    pub fn gateway(&self) -> &Arc<ChatGateway> {
        &self.inner.gateway
    }

    pub fn prober(&self) -> Option<&Arc<HealthProber>> {
        self.inner.prober.as_ref()
    }

    pub fn loader(&self) -> &Arc<ConfigLoader> {
        &self.inner.loader
    }

    /// Reload this instance now, and every other instance if a bus is configured.
    pub async fn trigger_reload(&self) -> AppResult<()> {
        match &self.inner.bus {
            Some(bus) => {
                trigger_reload(bus.as_ref(), &self.inner.gateway.config().reload.channel).await
            },
            None => self.inner.notifier.reload_now(&self.inner.shutdown).await.map(|_| ()),
        }
    }

    /// Stop background loops and wait for them. Idempotent.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        for task in &self.inner.tasks {
            task.stop().await;
        }
    }
}

/// Periodically drop rate-limit buckets of users that went quiet.
fn spawn_rpm_pruner(quota: Arc<QuotaChecker>, parent: &CancellationToken) -> BackgroundTask {
    BackgroundTask::spawn("rpm-pruner", parent, move |cancel| async move {
        let start = tokio::time::Instant::now() + RPM_PRUNE_INTERVAL;
        let mut ticker = tokio::time::interval_at(start, RPM_PRUNE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    quota.limiter().prune_idle();
                    debug!(tracked = quota.limiter().tracked_users(), "Pruned idle RPM buckets");
                },
            }
        }
    })
}
