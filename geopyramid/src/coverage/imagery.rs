//! Tiled imagery coverage.

use std::sync::Arc;

use image::RgbaImage;
use tracing::error;

use super::tiled::TiledCoverage;
use super::{CoverageDescription, CoverageStats, ElevationModel, TileState};
use crate::config::PyramidConfig;
use crate::geo::Sector;
use crate::level::TileMatrixSet;
use crate::render::RenderContext;
use crate::retrieval::{ImageryDecoder, RetrievalPipeline, TileSource};
use crate::tile::TileKey;
use crate::timestamp::Timestamp;

/// Imagery streamed tile by tile and draped over an elevation model.
pub struct TiledImageryCoverage {
    core: TiledCoverage<ImageryDecoder>,
}

impl TiledImageryCoverage {
    pub fn new(
        matrix_set: TileMatrixSet,
        source: Arc<dyn TileSource>,
        pipeline: RetrievalPipeline<ImageryDecoder>,
    ) -> Self {
        Self {
            core: TiledCoverage::new("imagery", Some(matrix_set), source, pipeline),
        }
    }

    /// Create a coverage from a remote service description; an unusable one
    /// is logged and leaves the coverage empty.
    pub fn from_description(
        description: &CoverageDescription,
        source: Arc<dyn TileSource>,
        pipeline: RetrievalPipeline<ImageryDecoder>,
    ) -> Self {
        let matrix_set = match TileMatrixSet::from_description(description) {
            Ok(set) => Some(set),
            Err(e) => {
                error!(crs = %description.crs, error = %e, "imagery coverage not initialized");
                None
            }
        };
        Self {
            core: TiledCoverage::new("imagery", matrix_set, source, pipeline),
        }
    }

    pub fn with_config(mut self, config: &PyramidConfig) -> Self {
        self.core.set_detail_control(config.lod.detail_control);
        self.core
            .set_subdivision_cache_capacity(config.cache.reuse_capacity_bytes);
        self.core
            .set_resident_capacity(config.cache.resident_capacity_bytes);
        self
    }

    /// Bound the decoded images kept resident to `bytes`.
    pub fn with_resident_capacity(mut self, bytes: usize) -> Self {
        self.core.set_resident_capacity(bytes);
        self
    }

    pub fn with_detail_control(mut self, detail_control: f64) -> Self {
        self.core.set_detail_control(detail_control);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.core.layout.is_some()
    }

    pub fn sector(&self) -> Option<&Sector> {
        self.core.layout.as_ref().map(|l| l.level_set.sector())
    }

    /// Select the tiles `rc` needs over `elevation` and request the missing
    /// ones. Returns the number of retrievals issued.
    pub fn request_for_view(
        &mut self,
        rc: &RenderContext,
        elevation: &dyn ElevationModel,
    ) -> usize {
        self.core.request_for_view(rc, elevation)
    }

    pub fn request(&mut self, keys: &[TileKey]) -> usize {
        self.core.request(keys)
    }

    pub fn process_completions(&mut self) -> usize {
        self.core.process_completions()
    }

    pub async fn await_completion(&mut self) -> bool {
        self.core.await_completion().await
    }

    pub fn invalidate_tiles(&mut self) {
        self.core.invalidate_tiles();
    }

    pub fn state_of(&self, key: TileKey) -> TileState {
        self.core.state_of(key)
    }

    pub fn stats(&self) -> CoverageStats {
        self.core.stats()
    }

    /// Changes whenever resident imagery changes.
    pub fn timestamp(&self) -> Timestamp {
        self.core.timestamp
    }

    /// Decoded image of a resident tile.
    pub fn image_for(&self, key: TileKey) -> Option<&RgbaImage> {
        self.core.resident.peek(&key).map(|tile| &tile.content)
    }

    /// Sector of a resident tile.
    pub fn sector_for(&self, key: TileKey) -> Option<&Sector> {
        self.core.resident.peek(&key).map(|tile| &tile.sector)
    }

    /// Bytes of decoded images currently resident.
    pub fn resident_bytes(&self) -> usize {
        self.core.resident_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::coverage::FlatElevationModel;
    use crate::geo::Position;
    use crate::level::TileMatrix;
    use crate::projection::Globe;
    use crate::render::{Camera, Viewport};
    use crate::retrieval::{ByteTransport, ContentDescriptor, FetchResponse, RetrievalError};
    use bytes::Bytes;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use image::{ImageFormat, Rgba};
    use tokio::runtime::Handle;

    /// Serves a 4x4 PNG filled with the color of the requested level.
    struct PngTransport;

    impl ByteTransport for PngTransport {
        fn fetch<'a>(
            &'a self,
            descriptor: &'a ContentDescriptor,
        ) -> BoxFuture<'a, Result<FetchResponse, RetrievalError>> {
            async move {
                let ContentDescriptor::Url(url) = descriptor else {
                    return Err(RetrievalError::Transport("expected a URL".to_string()));
                };
                if url.ends_with("missing") {
                    return Ok(FetchResponse {
                        status_code: 404,
                        content_type: "text/plain".to_string(),
                        body: Bytes::new(),
                    });
                }
                let shade = if url.starts_with("https://imagery.test/0/") {
                    0
                } else {
                    255
                };
                let image = RgbaImage::from_pixel(4, 4, Rgba([shade, shade, shade, 255]));
                let mut png = Cursor::new(Vec::new());
                image
                    .write_to(&mut png, ImageFormat::Png)
                    .map_err(|e| RetrievalError::Decode(e.to_string()))?;
                Ok(FetchResponse::ok("image/png", Bytes::from(png.into_inner())))
            }
            .boxed()
        }
    }

    fn source(matrix: &TileMatrix, row: u32, column: u32) -> Option<ContentDescriptor> {
        let suffix = if matrix.ordinal() == 1 && row == 0 && column == 0 {
            "missing".to_string()
        } else {
            format!("{row}/{column}.png")
        };
        Some(ContentDescriptor::Url(format!(
            "https://imagery.test/{}/{}",
            matrix.ordinal(),
            suffix
        )))
    }

    fn coverage() -> TiledImageryCoverage {
        let set = TileMatrixSet::from_tile_pyramid(Sector::full_sphere(), 2, 1, 4, 4, 2).unwrap();
        let pipeline =
            RetrievalPipeline::new(Handle::current(), Arc::new(PngTransport), ImageryDecoder, 2);
        TiledImageryCoverage::new(set, Arc::new(source), pipeline)
    }

    #[tokio::test]
    async fn test_image_for_resident_tile() {
        let mut coverage = coverage();
        let key = TileKey::new(0, 0, 1);
        assert!(coverage.image_for(key).is_none());

        coverage.request(&[key]);
        while coverage.await_completion().await {}

        let image = coverage.image_for(key).unwrap();
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(coverage.sector_for(key).unwrap().min_longitude(), 0.0);
    }

    #[tokio::test]
    async fn test_not_found_marks_tile_failed() {
        let mut coverage = coverage();
        // South-origin row 1 is matrix row 0 at level 1.
        let key = TileKey::new(1, 1, 0);

        coverage.request(&[key]);
        while coverage.await_completion().await {}

        assert_eq!(coverage.state_of(key), TileState::Failed);
        assert!(coverage.image_for(key).is_none());
    }

    #[tokio::test]
    async fn test_view_request_over_flat_terrain() {
        let mut coverage = coverage();
        let rc = RenderContext::new(
            Globe::wgs84_mercator(),
            Camera::new(Position::new(0.0, 0.0, 1.0e9)),
            Viewport::new(800, 600),
        );

        assert_eq!(coverage.request_for_view(&rc, &FlatElevationModel), 2);
        while coverage.await_completion().await {}
        assert_eq!(coverage.stats().succeeded, 2);
    }
}
