//! Bounded, closable chat chunk stream.
//!
//! A producer task owns a [`StreamSender`] and pushes chunks; the caller owns
//! the [`ChatStream`]. The stream ends in one of four ways:
//!
//! - normal close: buffered chunks drain, then reads yield `StreamClosed`
//! - close with error: buffered chunks drain, then the next read yields the error
//! - cancellation: the consumer cancels or drops the stream and sends stop
//! - abandonment: every sender drops unclosed and reads yield `Internal`

use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use switchyard_types::{GatewayError, StreamChunk};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_STREAM_BUFFER: usize = 100;

/// State visible to both halves.
#[derive(Debug)]
struct Shared {
    error: Mutex<Option<GatewayError>>,
    cancel: CancellationToken,
}

/// Producer state; the channel closes when the last [`StreamSender`] clone drops.
#[derive(Debug)]
struct Producer {
    sender: Mutex<Option<mpsc::Sender<StreamChunk>>>,
    shared: Arc<Shared>,
}

impl Drop for Producer {
    fn drop(&mut self) {
        if self.sender.get_mut().is_some() && !self.shared.cancel.is_cancelled() {
            *self.shared.error.lock() = Some(GatewayError::Internal {
                message: "stream producer ended without closing".to_string(),
            });
        }
    }
}

/// Create a connected sender/stream pair with room for `buffer` chunks.
pub fn channel(buffer: usize) -> (StreamSender, ChatStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let shared = Arc::new(Shared { error: Mutex::new(None), cancel: CancellationToken::new() });
    let producer = Producer { sender: Mutex::new(Some(tx)), shared: Arc::clone(&shared) };
    let sender = StreamSender { inner: Arc::new(producer) };
    let stream = ChatStream { rx, shared, drained: false };
    (sender, stream)
}

/// Producer half.
///
/// Dropping every clone without closing ends the stream with an `Internal`
/// error.
#[derive(Debug, Clone)]
pub struct StreamSender {
    inner: Arc<Producer>,
}

impl StreamSender {
    /// Push one chunk, waiting for buffer space.
    ///
    /// Returns `false` without blocking further once the stream is closed or
    /// cancelled.
    pub async fn send(&self, chunk: StreamChunk) -> bool {
        let Some(tx) = self.inner.sender.lock().clone() else {
            return false;
        };
        tokio::select! {
            biased;
            () = self.inner.shared.cancel.cancelled() => false,
            result = tx.send(chunk) => result.is_ok(),
        }
    }

    /// Finish normally. Idempotent.
    pub fn close(&self) {
        self.inner.sender.lock().take();
    }

    /// Finish with an error the consumer sees after draining. Only the first
    /// close of either kind takes effect.
    pub fn close_with_error(&self, err: GatewayError) {
        let mut sender = self.inner.sender.lock();
        if sender.is_some() {
            // Error must be visible before the channel can report closed.
            *self.inner.shared.error.lock() = Some(err);
            sender.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.sender.lock().is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.shared.cancel.is_cancelled()
    }

    /// Resolves once the consumer cancels or drops the stream.
    pub async fn cancelled(&self) {
        self.inner.shared.cancel.cancelled().await;
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct ChatStream {
    rx: mpsc::Receiver<StreamChunk>,
    shared: Arc<Shared>,
    drained: bool,
}

impl ChatStream {
    /// Next chunk, or the terminal condition once the buffer is empty.
    pub async fn recv(&mut self) -> Result<StreamChunk, GatewayError> {
        match self.rx.recv().await {
            Some(chunk) => Ok(chunk),
            None => Err(self.terminal_error()),
        }
    }

    /// Ask the producer to stop.
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Drain everything, returning the chunks and how the stream ended.
    pub async fn collect_all(mut self) -> (Vec<StreamChunk>, Option<GatewayError>) {
        let mut chunks = Vec::new();
        loop {
            match self.recv().await {
                Ok(chunk) => chunks.push(chunk),
                Err(GatewayError::StreamClosed) => return (chunks, None),
                Err(err) => return (chunks, Some(err)),
            }
        }
    }

    fn terminal_error(&mut self) -> GatewayError {
        self.drained = true;
        self.shared.error.lock().take().unwrap_or(GatewayError::StreamClosed)
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Stream for ChatStream {
    type Item = Result<StreamChunk, GatewayError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.drained {
            return Poll::Ready(None);
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => match self.terminal_error() {
                GatewayError::StreamClosed => Poll::Ready(None),
                err => Poll::Ready(Some(Err(err))),
            },
            Poll::Pending => Poll::Pending,
        }
    }
}
