//! Stream producer: relays upstream chunks to the caller and settles usage.

use std::sync::Arc;
use std::time::Instant;
use switchyard_types::GatewayError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::gateway::circuit_breaker::CircuitBreakerSet;
use crate::gateway::prometheus;
use crate::gateway::provider::Provider;
use crate::gateway::quota::QuotaChecker;
use crate::gateway::stream::{self, ChatStream, StreamSender};

pub(super) struct Forward {
    pub request_id: String,
    pub uid: String,
    pub model: String,
    pub provider: Arc<dyn Provider>,
    pub upstream: ChatStream,
    pub breakers: Arc<CircuitBreakerSet>,
    pub quota: Arc<QuotaChecker>,
    pub cancel: CancellationToken,
    pub buffer: usize,
}

/// How the relay ended.
enum Ending {
    Finished,
    Failed(GatewayError),
    Cancelled,
    /// Caller dropped or cancelled the returned stream
    Abandoned,
}

pub(super) fn spawn(forward: Forward) -> ChatStream {
    let (tx, rx) = stream::channel(forward.buffer);
    tokio::spawn(forward.run(tx));
    rx
}

impl Forward {
    async fn run(mut self, tx: StreamSender) {
        let started = Instant::now();
        let mut total_tokens: i64 = 0;

        let ending = loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Ending::Cancelled,
                () = tx.cancelled() => break Ending::Abandoned,
                next = self.upstream.recv() => next,
            };
            match next {
                Ok(chunk) => {
                    if let Some(usage) = &chunk.usage {
                        total_tokens = i64::from(usage.total_tokens);
                    }
                    if !tx.send(chunk).await {
                        break Ending::Abandoned;
                    }
                },
                Err(GatewayError::StreamClosed) => break Ending::Finished,
                Err(err) => break Ending::Failed(err),
            }
        };

        let ok = match ending {
            Ending::Finished => {
                tx.close();
                true
            },
            Ending::Failed(err) => {
                warn!(
                    request_id = %self.request_id,
                    provider = %self.provider.name(),
                    error = %err,
                    "Upstream stream failed"
                );
                self.breakers.get(self.provider.name()).record_failure(&err);
                tx.close_with_error(err);
                false
            },
            Ending::Cancelled => {
                debug!(request_id = %self.request_id, "Stream cancelled by request");
                self.upstream.cancel();
                tx.close_with_error(GatewayError::Cancelled);
                false
            },
            Ending::Abandoned => {
                debug!(request_id = %self.request_id, "Stream consumer went away");
                self.upstream.cancel();
                tx.close();
                false
            },
        };

        prometheus::record_request(
            self.provider.name(),
            &self.model,
            true,
            prometheus::status_label(ok),
            started.elapsed(),
        );
        if let Err(e) = self.quota.update_tpd(&self.uid, total_tokens).await {
            warn!(uid = %self.uid, tokens = total_tokens, error = %e, "Failed to record stream token usage");
        }
    }
}
