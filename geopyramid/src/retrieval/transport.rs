//! Byte transports: turn a content descriptor into a status, a content type
//! and a body.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::trace;

use super::{ContentDescriptor, RetrievalError};

/// User agent sent with every HTTP request.
pub const DEFAULT_USER_AGENT: &str = concat!("geopyramid/", env!("CARGO_PKG_VERSION"));

/// Default HTTP request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// What a transport got back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status_code: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl FetchResponse {
    /// A successful response.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status_code: 200,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn status_ok(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Fetches the bytes behind a descriptor.
///
/// Implementations are shared between retrieval tasks and must not block.
pub trait ByteTransport: Send + Sync {
    fn fetch<'a>(
        &'a self,
        descriptor: &'a ContentDescriptor,
    ) -> BoxFuture<'a, Result<FetchResponse, RetrievalError>>;
}

/// HTTP(S) transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self, RetrievalError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    /// Create a transport whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| {
                RetrievalError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<FetchResponse, RetrievalError> {
        trace!(url, "HTTP GET");
        let response = self.client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await?;
        Ok(FetchResponse {
            status_code,
            content_type,
            body,
        })
    }
}

impl ByteTransport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        descriptor: &'a ContentDescriptor,
    ) -> BoxFuture<'a, Result<FetchResponse, RetrievalError>> {
        async move {
            match descriptor {
                ContentDescriptor::Url(url) => self.get(url).await,
                other => Err(RetrievalError::Transport(format!(
                    "HTTP transport cannot fetch {}",
                    other
                ))),
            }
        }
        .boxed()
    }
}

/// Local file transport. The content type is inferred from the extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    pub fn new() -> Self {
        Self
    }

    /// MIME label for a tile file, by extension.
    pub fn content_type_for(path: &Path) -> &'static str {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("bil") | Some("bil16") => "application/bil16",
            Some("bil32") => "application/bil32",
            Some("tif") | Some("tiff") => "image/tiff",
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("xml") => "text/xml",
            _ => "application/octet-stream",
        }
    }
}

impl ByteTransport for FileTransport {
    fn fetch<'a>(
        &'a self,
        descriptor: &'a ContentDescriptor,
    ) -> BoxFuture<'a, Result<FetchResponse, RetrievalError>> {
        async move {
            match descriptor {
                ContentDescriptor::File(path) => {
                    trace!(path = %path.display(), "reading tile file");
                    let body = tokio::fs::read(path).await?;
                    Ok(FetchResponse::ok(Self::content_type_for(path), body))
                }
                other => Err(RetrievalError::Transport(format!(
                    "File transport cannot fetch {}",
                    other
                ))),
            }
        }
        .boxed()
    }
}

/// Dispatches URLs to HTTP, paths to the file system and serves in-memory
/// descriptors directly.
#[derive(Debug, Clone)]
pub struct RoutingTransport {
    http: HttpTransport,
    file: FileTransport,
}

impl RoutingTransport {
    pub fn new(http: HttpTransport) -> Self {
        Self {
            http,
            file: FileTransport,
        }
    }

    /// Build with an HTTP timeout of `timeout_secs`.
    pub fn with_timeout_secs(timeout_secs: u64) -> Result<Self, RetrievalError> {
        Ok(Self::new(HttpTransport::with_timeout(Duration::from_secs(
            timeout_secs,
        ))?))
    }
}

impl ByteTransport for RoutingTransport {
    fn fetch<'a>(
        &'a self,
        descriptor: &'a ContentDescriptor,
    ) -> BoxFuture<'a, Result<FetchResponse, RetrievalError>> {
        match descriptor {
            ContentDescriptor::Url(_) => self.http.fetch(descriptor),
            ContentDescriptor::File(_) => self.file.fetch(descriptor),
            ContentDescriptor::InMemory { content_type, body } => {
                let response = FetchResponse::ok(content_type.clone(), body.clone());
                async move { Ok(response) }.boxed()
            }
        }
    }
}
