//! Tunables and the `config.ini` that overrides them.
//!
//! ```ini
//! [cache]
//! ; subdivision reuse cache, per coverage
//! reuse_size = 8MB
//! ; in-memory tile content cache
//! content_size = 64MB
//! ; decoded tiles held by each coverage
//! resident_size = 256MB
//!
//! [lod]
//! ; larger selects coarser tiles
//! detail_control = 4.0
//!
//! [retrieval]
//! ; seconds
//! http_timeout = 30
//! max_concurrent = 8
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ini::Ini;
use tokio::runtime::Handle;
use tracing::debug;

use crate::cache::MemoryContentCache;
use crate::error::ConfigurationError;
use crate::retrieval::{
    ByteTransport, ContentDecoder, RetrievalError, RetrievalPipeline, RoutingTransport,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_RETRIEVALS,
};

// =============================================================================
// Defaults
// =============================================================================

/// Default capacity of the subdivision reuse cache (8 MiB).
pub const DEFAULT_REUSE_CACHE_BYTES: usize = 8 * 1024 * 1024;

/// Default capacity of the in-memory content cache (64 MiB).
pub const DEFAULT_CONTENT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Default capacity of each coverage's decoded tile store (256 MiB).
pub const DEFAULT_RESIDENT_CACHE_BYTES: usize = 256 * 1024 * 1024;

/// Default detail control of the level-of-detail test.
pub const DEFAULT_DETAIL_CONTROL: f64 = 4.0;

/// File name of the configuration file inside [`config_directory`].
pub const CONFIG_FILE_NAME: &str = "config.ini";

// =============================================================================
// Settings
// =============================================================================

/// Cache capacities.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    /// Capacity of each coverage's subdivision reuse cache, in bytes.
    pub reuse_capacity_bytes: usize,
    /// Capacity of the shared tile content cache, in bytes.
    pub content_capacity_bytes: usize,
    /// Decoded tile content each coverage keeps resident, in bytes.
    pub resident_capacity_bytes: usize,
}

/// Level-of-detail selection.
#[derive(Debug, Clone, PartialEq)]
pub struct LodSettings {
    pub detail_control: f64,
}

/// Retrieval limits.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub http_timeout_secs: u64,
    pub max_concurrent: usize,
}

/// All tunables of a pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    pub cache: CacheSettings,
    pub lod: LodSettings,
    pub retrieval: RetrievalSettings,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                reuse_capacity_bytes: DEFAULT_REUSE_CACHE_BYTES,
                content_capacity_bytes: DEFAULT_CONTENT_CACHE_BYTES,
                resident_capacity_bytes: DEFAULT_RESIDENT_CACHE_BYTES,
            },
            lod: LodSettings {
                detail_control: DEFAULT_DETAIL_CONTROL,
            },
            retrieval: RetrievalSettings {
                http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
                max_concurrent: DEFAULT_MAX_CONCURRENT_RETRIEVALS,
            },
        }
    }
}

impl PyramidConfig {
    pub fn with_reuse_cache_capacity(mut self, bytes: usize) -> Self {
        self.cache.reuse_capacity_bytes = bytes;
        self
    }

    pub fn with_content_cache_capacity(mut self, bytes: usize) -> Self {
        self.cache.content_capacity_bytes = bytes;
        self
    }

    pub fn with_resident_cache_capacity(mut self, bytes: usize) -> Self {
        self.cache.resident_capacity_bytes = bytes;
        self
    }

    pub fn with_detail_control(mut self, detail_control: f64) -> Self {
        self.lod.detail_control = detail_control;
        self
    }

    pub fn with_http_timeout_secs(mut self, secs: u64) -> Self {
        self.retrieval.http_timeout_secs = secs;
        self
    }

    pub fn with_max_concurrent_retrievals(mut self, max_concurrent: usize) -> Self {
        self.retrieval.max_concurrent = max_concurrent;
        self
    }

    /// Parse INI text, overlaying its values on the defaults.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigurationError> {
        let ini =
            Ini::load_from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        parse_ini(&ini)
    }

    /// Routing transport honouring the configured HTTP timeout.
    pub fn transport(&self) -> Result<RoutingTransport, RetrievalError> {
        RoutingTransport::with_timeout_secs(self.retrieval.http_timeout_secs)
    }

    /// In-memory content cache of the configured capacity.
    pub fn content_cache(&self) -> MemoryContentCache {
        MemoryContentCache::new(self.cache.content_capacity_bytes as u64)
    }

    /// Retrieval pipeline running at most the configured number of
    /// retrievals at once.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Handle of the tokio runtime tasks run on
    /// * `transport` - Fetches descriptor bytes, usually [`Self::transport`]
    /// * `decoder` - Elevation or imagery decoder
    pub fn pipeline<D: ContentDecoder>(
        &self,
        runtime: Handle,
        transport: Arc<dyn ByteTransport>,
        decoder: D,
    ) -> RetrievalPipeline<D> {
        RetrievalPipeline::new(runtime, transport, decoder, self.retrieval.max_concurrent)
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Directory holding the configuration file, under the platform config dir.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("geopyramid")
}

/// Default path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Load configuration from `path`.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<PyramidConfig, ConfigurationError> {
    if !path.exists() {
        debug!(path = %path.display(), "no configuration file, using defaults");
        return Ok(PyramidConfig::default());
    }
    let text = std::fs::read_to_string(path)?;
    let config = PyramidConfig::from_ini_str(&text)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Parse a human-readable size such as `64MB`, `512 KB` or `1G` into bytes.
///
/// Suffixes are binary multiples and case-insensitive; a bare number is bytes.
pub fn parse_size(value: &str) -> Option<usize> {
    let upper = value.trim().to_ascii_uppercase();
    let suffixes: [(&str, usize); 7] = [
        ("GB", 1024 * 1024 * 1024),
        ("G", 1024 * 1024 * 1024),
        ("MB", 1024 * 1024),
        ("M", 1024 * 1024),
        ("KB", 1024),
        ("K", 1024),
        ("B", 1),
    ];
    let (number, multiplier) = suffixes
        .iter()
        .find_map(|&(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|number| (number.trim().to_string(), multiplier))
        })
        .unwrap_or((upper.clone(), 1));

    let number: usize = number.parse().ok()?;
    number.checked_mul(multiplier)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_ini(ini: &Ini) -> Result<PyramidConfig, ConfigurationError> {
    let mut config = PyramidConfig::default();
    const SIZE_FORMAT: &str = "expected a size like '64MB', '512KB' or '1GB'";

    // [cache]
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("reuse_size") {
            config.cache.reuse_capacity_bytes =
                parse_size(v).ok_or_else(|| invalid("cache", "reuse_size", v, SIZE_FORMAT))?;
        }
        if let Some(v) = section.get("content_size") {
            config.cache.content_capacity_bytes =
                parse_size(v).ok_or_else(|| invalid("cache", "content_size", v, SIZE_FORMAT))?;
        }
        if let Some(v) = section.get("resident_size") {
            config.cache.resident_capacity_bytes =
                parse_size(v).ok_or_else(|| invalid("cache", "resident_size", v, SIZE_FORMAT))?;
        }
    }

    // [lod]
    if let Some(section) = ini.section(Some("lod")) {
        if let Some(v) = section.get("detail_control") {
            let detail: f64 = v
                .trim()
                .parse()
                .map_err(|_| invalid("lod", "detail_control", v, "expected a number"))?;
            if !detail.is_finite() || detail <= 0.0 {
                return Err(invalid("lod", "detail_control", v, "must be greater than 0"));
            }
            config.lod.detail_control = detail;
        }
    }

    // [retrieval]
    if let Some(section) = ini.section(Some("retrieval")) {
        if let Some(v) = section.get("http_timeout") {
            let secs: u64 = v
                .trim()
                .parse()
                .map_err(|_| invalid("retrieval", "http_timeout", v, "expected whole seconds"))?;
            if secs == 0 {
                return Err(invalid("retrieval", "http_timeout", v, "must be at least 1"));
            }
            config.retrieval.http_timeout_secs = secs;
        }
        if let Some(v) = section.get("max_concurrent") {
            let max: usize = v
                .trim()
                .parse()
                .map_err(|_| invalid("retrieval", "max_concurrent", v, "expected an integer"))?;
            if max == 0 {
                return Err(invalid("retrieval", "max_concurrent", v, "must be at least 1"));
            }
            config.retrieval.max_concurrent = max;
        }
    }

    Ok(config)
}
