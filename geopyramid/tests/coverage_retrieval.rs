//! Integration tests for coverages driving the retrieval pipeline.
//!
//! The transport used here counts fetches and can hold every fetch behind a
//! gate, so tests can observe tiles while they are pending.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use geopyramid::cache::{ContentCache, MemoryContentCache};
use geopyramid::geo::{Position, Sector};
use geopyramid::projection::Globe;
use geopyramid::render::{Camera, RenderContext, Viewport};
use geopyramid::retrieval::{
    ByteTransport, ContentDescriptor, ElevationDecoder, FetchResponse, RetrievalError,
    RetrievalPipeline, UrlTemplateSource,
};
use geopyramid::{PyramidConfig, TileKey, TileMatrixSet, TileState, TiledElevationCoverage};

const TEMPLATE: &str = "https://dem.test/{level}/{y}/{col}.bil";

/// Serves 2x2 elevation tiles, failing the URLs it is told to fail once.
struct GatedTransport {
    gate: Semaphore,
    /// Fetches started, including those still waiting at the gate.
    entered: AtomicUsize,
    fetches: AtomicUsize,
    fail_once: Mutex<HashSet<String>>,
}

impl GatedTransport {
    fn open() -> Self {
        Self {
            gate: Semaphore::new(Semaphore::MAX_PERMITS),
            entered: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            fail_once: Mutex::new(HashSet::new()),
        }
    }

    fn closed() -> Self {
        Self {
            gate: Semaphore::new(0),
            ..Self::open()
        }
    }

    fn release(&self) {
        self.gate.add_permits(1024);
    }

    fn fail_once(&self, url: &str) {
        self.fail_once.lock().unwrap().insert(url.to_string());
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

impl ByteTransport for GatedTransport {
    fn fetch<'a>(
        &'a self,
        descriptor: &'a ContentDescriptor,
    ) -> BoxFuture<'a, Result<FetchResponse, RetrievalError>> {
        async move {
            self.entered.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| RetrievalError::Cancelled)?;
            self.fetches.fetch_add(1, Ordering::SeqCst);

            let ContentDescriptor::Url(url) = descriptor else {
                return Err(RetrievalError::Transport("expected a URL".to_string()));
            };
            if self.fail_once.lock().unwrap().remove(url) {
                return Ok(FetchResponse {
                    status_code: 500,
                    content_type: "text/plain".to_string(),
                    body: Bytes::from_static(b"internal error"),
                });
            }
            let samples: Vec<u8> = [120i16, 140, 160, 180]
                .iter()
                .flat_map(|s| s.to_le_bytes())
                .collect();
            Ok(FetchResponse::ok("application/bil16", samples))
        }
        .boxed()
    }
}

/// Global pyramid: 2x1 tiles at level 0, doubling for three more levels.
fn matrix_set() -> TileMatrixSet {
    TileMatrixSet::from_tile_pyramid(Sector::full_sphere(), 2, 1, 2, 2, 4).unwrap()
}

fn pipeline(transport: &Arc<GatedTransport>) -> RetrievalPipeline<ElevationDecoder> {
    RetrievalPipeline::new(
        Handle::current(),
        Arc::clone(transport) as Arc<dyn ByteTransport>,
        ElevationDecoder::new(2, 2),
        8,
    )
}

fn coverage(transport: &Arc<GatedTransport>) -> TiledElevationCoverage {
    TiledElevationCoverage::new(
        matrix_set(),
        Arc::new(UrlTemplateSource::new(TEMPLATE)),
        pipeline(transport),
    )
}

fn distant_view() -> RenderContext {
    RenderContext::new(
        Globe::wgs84_mercator(),
        Camera::new(Position::new(0.0, 0.0, 1.0e9)),
        Viewport::new(800, 600),
    )
}

async fn settle(coverage: &mut TiledElevationCoverage) {
    while coverage.await_completion().await {}
}

#[tokio::test]
async fn test_failed_tile_becomes_requestable_again() {
    let transport = Arc::new(GatedTransport::open());
    transport.fail_once("https://dem.test/2/1/3.bil");
    let mut coverage = coverage(&transport);
    let key: TileKey = "2.1.3".parse().unwrap();

    assert_eq!(coverage.request(&[key]), 1);
    settle(&mut coverage).await;

    assert_eq!(coverage.state_of(key), TileState::Failed);
    assert!(coverage.state_of(key).is_requestable());
    assert_eq!(coverage.stats().pending, 0);

    assert_eq!(coverage.request(&[key]), 1);
    settle(&mut coverage).await;

    assert_eq!(coverage.state_of(key), TileState::Succeeded);
    assert_eq!(transport.fetches(), 2);
}

#[tokio::test]
async fn test_invalidate_with_pending_fetches() {
    let transport = Arc::new(GatedTransport::closed());
    let mut coverage = coverage(&transport);
    let keys = [
        TileKey::new(1, 0, 0),
        TileKey::new(1, 0, 1),
        TileKey::new(1, 1, 2),
    ];

    assert_eq!(coverage.request(&keys), 3);
    assert_eq!(coverage.stats().pending, 3);

    coverage.invalidate_tiles();
    assert_eq!(coverage.stats().pending, 0);
    for key in keys {
        assert_eq!(coverage.state_of(key), TileState::NotRequested);
    }

    assert_eq!(coverage.request(&keys), 3);
    assert_eq!(coverage.stats().pending, 3);

    transport.release();
    settle(&mut coverage).await;

    let stats = coverage.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.requests_issued, 6);
}

#[tokio::test]
async fn test_one_fetch_per_key_across_passes() {
    let transport = Arc::new(GatedTransport::closed());
    let mut coverage = coverage(&transport);
    let rc = distant_view();

    assert_eq!(coverage.request_for_view(&rc), 2);
    assert_eq!(coverage.process_completions(), 0);
    assert_eq!(coverage.request_for_view(&rc), 0);
    assert_eq!(coverage.stats().pending, 2);

    transport.release();
    settle(&mut coverage).await;

    assert_eq!(transport.fetches(), 2);
    assert_eq!(coverage.stats().succeeded, 2);
    assert_eq!(coverage.request_for_view(&rc), 0);
}

#[tokio::test]
async fn test_committed_tiles_change_timestamp() {
    let transport = Arc::new(GatedTransport::open());
    let mut coverage = coverage(&transport);
    let before = coverage.timestamp();

    coverage.request(&[TileKey::new(0, 0, 0)]);
    settle(&mut coverage).await;

    assert_ne!(coverage.timestamp(), before);
    let height = coverage.height_at(-45.0, -90.0).unwrap();
    assert!((120.0..=180.0).contains(&height));
}

#[tokio::test]
async fn test_configured_coverage_reads_through_content_cache() {
    let config = PyramidConfig::default().with_detail_control(8.0);
    let cache: Arc<dyn ContentCache> = Arc::new(config.content_cache());
    let key = TileKey::new(0, 0, 1);

    let first = Arc::new(GatedTransport::open());
    let mut warm = TiledElevationCoverage::new(
        matrix_set(),
        Arc::new(UrlTemplateSource::new(TEMPLATE)),
        pipeline(&first).with_write_back_cache(Arc::clone(&cache)),
    )
    .with_config(&config);
    assert_eq!(warm.detail_control(), 8.0);

    warm.request(&[key]);
    settle(&mut warm).await;
    assert_eq!(first.fetches(), 1);

    let second = Arc::new(GatedTransport::closed());
    let mut cold = TiledElevationCoverage::new(
        matrix_set(),
        Arc::new(UrlTemplateSource::new(TEMPLATE)),
        pipeline(&second).with_write_back_cache(Arc::clone(&cache)),
    );
    cold.request(&[key]);
    settle(&mut cold).await;

    assert_eq!(cold.state_of(key), TileState::Succeeded);
    assert_eq!(second.fetches(), 0);
    assert_eq!(cache.stats().hits, 1);
}

#[tokio::test]
async fn test_configured_concurrency_bounds_fetches_in_flight() {
    let config = PyramidConfig::from_ini_str("[retrieval]\nmax_concurrent = 2\n").unwrap();
    let transport = Arc::new(GatedTransport::closed());
    let pipeline = config.pipeline(
        Handle::current(),
        Arc::clone(&transport) as Arc<dyn ByteTransport>,
        ElevationDecoder::new(2, 2),
    );
    let mut coverage = TiledElevationCoverage::new(
        matrix_set(),
        Arc::new(UrlTemplateSource::new(TEMPLATE)),
        pipeline,
    )
    .with_config(&config);

    let keys: Vec<TileKey> = (0..5).map(|column| TileKey::new(2, 0, column)).collect();
    assert_eq!(coverage.request(&keys), 5);

    tokio::time::timeout(Duration::from_secs(5), async {
        while transport.entered() < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.entered(), 2);
    assert_eq!(coverage.stats().pending, 5);

    transport.release();
    settle(&mut coverage).await;
    assert_eq!(transport.entered(), 5);
    assert_eq!(coverage.stats().succeeded, 5);
}

#[tokio::test]
async fn test_configured_resident_capacity_bounds_coverage() {
    // Room for two 2x2 rasters.
    let config = PyramidConfig::default().with_resident_cache_capacity(16);
    let transport = Arc::new(GatedTransport::open());
    let mut coverage = coverage(&transport).with_config(&config);
    let keys = [
        TileKey::new(1, 0, 0),
        TileKey::new(1, 0, 1),
        TileKey::new(1, 0, 2),
    ];

    for key in keys {
        coverage.request(&[key]);
        settle(&mut coverage).await;
    }
    assert_eq!(coverage.resident_bytes(), 16);
    assert_eq!(coverage.state_of(keys[0]), TileState::NotRequested);

    assert_eq!(coverage.request(&keys), 1);
    settle(&mut coverage).await;
    assert_eq!(transport.fetches(), 4);
    assert_eq!(coverage.state_of(keys[1]), TileState::NotRequested);
}

#[test]
fn test_default_content_cache_capacity() {
    let cache = MemoryContentCache::new(1024);
    assert_eq!(cache.max_size_bytes(), 1024);
    assert_eq!(
        PyramidConfig::default().content_cache().max_size_bytes(),
        geopyramid::config::DEFAULT_CONTENT_CACHE_BYTES as u64
    );
}
