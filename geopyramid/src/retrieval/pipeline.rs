//! Asynchronous tile retrieval.
//!
//! The [`RetrievalPipeline`] runs one tokio task per requested tile. Tasks
//! never touch coverage state: each one sends a [`RetrievalCompletion`] over
//! an unbounded channel, and the owning coverage drains the channel from its
//! own thread with [`RetrievalPipeline::try_next_completion`]. Issuing a
//! request never blocks the caller.
//!
//! # Task flow
//!
//! ```text
//! submit(key, descriptor)
//!        │
//!        ▼
//! ┌──────────────┐   cancelled    ┌──────────────────────────┐
//! │ acquire slot │───────────────►│ completion: Cancelled    │
//! └──────┬───────┘                └──────────────────────────┘
//!        ▼
//! ┌──────────────┐   hit, decodes ┌──────────────────────────┐
//! │ content cache│───────────────►│ completion: Ok(content)  │
//! └──────┬───────┘                └──────────────────────────┘
//!        │ miss
//!        ▼
//! ┌──────────────┐   error        ┌──────────────────────────┐
//! │  transport   │───────────────►│ completion: Err(..)      │
//! └──────┬───────┘                └──────────────────────────┘
//!        ▼
//! ┌──────────────┐
//! │ decode, post │──────────────► completion: Ok(content) / Err(..)
//! │   process    │
//! └──────────────┘
//! ```
//!
//! # Cancellation
//!
//! All tasks of one generation share a [`CancellationToken`].
//! [`RetrievalPipeline::cancel_all`] cancels that token, starts a new
//! generation and drops any completions already queued. The channel, the
//! runtime handle and the concurrency limit stay in place, so the pipeline
//! accepts new requests immediately. Completions from an old generation that
//! arrive later are discarded.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{ByteTransport, ContentDecoder, ContentDescriptor, FetchResponse, RetrievalError};
use crate::cache::{CachedContent, ContentCache};
use crate::tile::TileKey;

// =============================================================================
// Configuration
// =============================================================================

/// Default number of retrievals allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_RETRIEVALS: usize = 8;

// =============================================================================
// Completions and post-processing
// =============================================================================

/// Outcome of one retrieval.
#[derive(Debug)]
pub struct RetrievalCompletion<T> {
    pub key: TileKey,
    /// Pipeline generation the request was issued in.
    pub generation: u64,
    pub result: Result<T, RetrievalError>,
}

/// Hook run inside the retrieval task after a fetched body decoded
/// successfully. Not run for content served from the content cache.
pub trait RetrievalPostProcessor: Send + Sync {
    fn process<'a>(&'a self, key: TileKey, response: &'a FetchResponse) -> BoxFuture<'a, ()>;
}

/// Writes fetched bodies back to a [`ContentCache`].
pub struct ContentCacheWriteBack {
    cache: Arc<dyn ContentCache>,
}

impl ContentCacheWriteBack {
    pub fn new(cache: Arc<dyn ContentCache>) -> Self {
        Self { cache }
    }
}

impl RetrievalPostProcessor for ContentCacheWriteBack {
    fn process<'a>(&'a self, key: TileKey, response: &'a FetchResponse) -> BoxFuture<'a, ()> {
        async move {
            let content = CachedContent::new(response.content_type.clone(), response.body.clone());
            self.cache.put(&key.to_string(), content).await;
            trace!(key = %key, "wrote tile content to cache");
        }
        .boxed()
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Shared pieces every task needs.
struct TaskContext<D> {
    transport: Arc<dyn ByteTransport>,
    decoder: Arc<D>,
    content_cache: Option<Arc<dyn ContentCache>>,
    post_processor: Option<Arc<dyn RetrievalPostProcessor>>,
    permits: Arc<Semaphore>,
}

impl<D> Clone for TaskContext<D> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            decoder: Arc::clone(&self.decoder),
            content_cache: self.content_cache.clone(),
            post_processor: self.post_processor.clone(),
            permits: Arc::clone(&self.permits),
        }
    }
}

/// Decrements the in-flight counter however the task ends.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Spawns retrieval tasks and collects their completions.
pub struct RetrievalPipeline<D: ContentDecoder> {
    runtime: Handle,
    context: TaskContext<D>,
    max_concurrent: usize,
    cancel: CancellationToken,
    generation: u64,
    in_flight: Arc<AtomicUsize>,
    completions_tx: mpsc::UnboundedSender<RetrievalCompletion<D::Output>>,
    completions_rx: mpsc::UnboundedReceiver<RetrievalCompletion<D::Output>>,
}

impl<D: ContentDecoder> RetrievalPipeline<D> {
    /// Create a pipeline spawning tasks on `runtime`.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Handle of the tokio runtime tasks run on
    /// * `transport` - Fetches descriptor bytes
    /// * `decoder` - Turns successful responses into content
    /// * `max_concurrent` - Retrievals allowed to run at once (at least 1)
    pub fn new(
        runtime: Handle,
        transport: Arc<dyn ByteTransport>,
        decoder: D,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            context: TaskContext {
                transport,
                decoder: Arc::new(decoder),
                content_cache: None,
                post_processor: None,
                permits: Arc::new(Semaphore::new(max_concurrent)),
            },
            max_concurrent,
            cancel: CancellationToken::new(),
            generation: 0,
            in_flight: Arc::new(AtomicUsize::new(0)),
            completions_tx,
            completions_rx,
        }
    }

    /// Serve requests from `cache` when it holds decodable content.
    pub fn with_content_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.context.content_cache = Some(cache);
        self
    }

    /// Run `post_processor` after every successful fetch.
    pub fn with_post_processor(mut self, post_processor: Arc<dyn RetrievalPostProcessor>) -> Self {
        self.context.post_processor = Some(post_processor);
        self
    }

    /// Read through `cache` and write fetched content back to it.
    pub fn with_write_back_cache(self, cache: Arc<dyn ContentCache>) -> Self {
        let write_back = Arc::new(ContentCacheWriteBack::new(Arc::clone(&cache)));
        self.with_content_cache(cache).with_post_processor(write_back)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Tasks spawned and not yet finished, cancelled ones included until
    /// they observe the cancellation.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Start retrieving `descriptor` for `key`. Returns immediately.
    ///
    /// The caller is responsible for not submitting a key that is already in
    /// flight.
    pub fn submit(&self, key: TileKey, descriptor: ContentDescriptor) {
        let context = self.context.clone();
        let token = self.cancel.child_token();
        let tx = self.completions_tx.clone();
        let generation = self.generation;

        self.in_flight.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard(Arc::clone(&self.in_flight));

        debug!(key = %key, generation, descriptor = %descriptor, "retrieval submitted");
        self.runtime.spawn(async move {
            let _guard = guard;
            let result = tokio::select! {
                _ = token.cancelled() => Err(RetrievalError::Cancelled),
                result = retrieve(&context, key, &descriptor) => result,
            };
            // The receiver lives as long as the pipeline.
            let _ = tx.send(RetrievalCompletion {
                key,
                generation,
                result,
            });
        });
    }

    /// Next completion of the current generation, without waiting.
    pub fn try_next_completion(&mut self) -> Option<RetrievalCompletion<D::Output>> {
        while let Ok(completion) = self.completions_rx.try_recv() {
            if completion.generation == self.generation {
                return Some(completion);
            }
            trace!(key = %completion.key, "dropping completion from cancelled generation");
        }
        None
    }

    /// Next completion of the current generation, waiting for one.
    pub async fn next_completion(&mut self) -> Option<RetrievalCompletion<D::Output>> {
        while let Some(completion) = self.completions_rx.recv().await {
            if completion.generation == self.generation {
                return Some(completion);
            }
        }
        None
    }

    /// Cancel every outstanding retrieval and start a new generation.
    pub fn cancel_all(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
        while self.completions_rx.try_recv().is_ok() {}
        debug!(generation = self.generation, "cancelled outstanding retrievals");
    }
}

impl<D: ContentDecoder> Drop for RetrievalPipeline<D> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<D: ContentDecoder> fmt::Debug for RetrievalPipeline<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalPipeline")
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight())
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

async fn retrieve<D: ContentDecoder>(
    context: &TaskContext<D>,
    key: TileKey,
    descriptor: &ContentDescriptor,
) -> Result<D::Output, RetrievalError> {
    let _permit = Arc::clone(&context.permits)
        .acquire_owned()
        .await
        .map_err(|_| RetrievalError::Cancelled)?;

    let cache_key = key.to_string();
    if let Some(cache) = &context.content_cache {
        if let Some(cached) = cache.get(&cache_key).await {
            let response = FetchResponse::ok(cached.content_type, cached.body);
            match context.decoder.decode(&response) {
                Ok(content) => {
                    trace!(key = %key, "served from content cache");
                    return Ok(content);
                }
                Err(e) => {
                    debug!(key = %key, error = %e, "cached content unusable, fetching");
                    cache.remove(&cache_key).await;
                }
            }
        }
    }

    let response = match descriptor {
        ContentDescriptor::InMemory { content_type, body } => {
            FetchResponse::ok(content_type.clone(), body.clone())
        }
        _ => context.transport.fetch(descriptor).await?,
    };
    if !response.status_ok() {
        return Err(RetrievalError::Status {
            code: response.status_code,
        });
    }

    let content = context.decoder.decode(&response)?;
    if let Some(post_processor) = &context.post_processor {
        post_processor.process(key, &response).await;
    }
    Ok(content)
}
