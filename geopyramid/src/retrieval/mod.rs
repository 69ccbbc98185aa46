//! Fetching and decoding tile content.
//!
//! - [`ContentDescriptor`] / [`TileSource`]: where a tile's bytes live
//! - [`ByteTransport`]: HTTP, file and routing transports returning a
//!   [`FetchResponse`]
//! - [`SampleEncoding`] and the [`ContentDecoder`]s: bytes to elevation
//!   rasters or RGBA imagery
//! - [`RetrievalPipeline`]: bounded, cancellable tokio tasks delivering
//!   [`RetrievalCompletion`]s over a channel
//!
//! Every failure is a [`RetrievalError`]. Coverages log it and mark the tile
//! failed; nothing here panics on bad input.

mod content_type;
mod decode;
mod error;
mod pipeline;
mod source;
mod transport;

pub use content_type::SampleEncoding;
pub use decode::{
    decode_float32, decode_int16, decode_tiff, service_exception_message, ContentDecoder,
    ElevationDecoder, ElevationRaster, ImageryDecoder, ResidentSize,
};
pub use error::RetrievalError;
pub use pipeline::{
    ContentCacheWriteBack, RetrievalCompletion, RetrievalPipeline, RetrievalPostProcessor,
    DEFAULT_MAX_CONCURRENT_RETRIEVALS,
};
pub use source::{ContentDescriptor, FileTemplateSource, TileSource, UrlTemplateSource};
pub use transport::{
    ByteTransport, FetchResponse, FileTransport, HttpTransport, RoutingTransport,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};
