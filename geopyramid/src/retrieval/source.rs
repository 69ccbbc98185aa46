//! Content descriptors and the tile sources that produce them.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;

use crate::level::TileMatrix;

/// Where the content of one tile can be found.
///
/// The pipeline treats descriptors as opaque apart from telling URLs from
/// everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentDescriptor {
    /// Fetched over the network.
    Url(String),
    /// Read from local storage.
    File(PathBuf),
    /// Already in memory; served without touching a transport.
    InMemory { content_type: String, body: Bytes },
}

impl ContentDescriptor {
    pub fn is_url(&self) -> bool {
        matches!(self, ContentDescriptor::Url(_))
    }
}

impl fmt::Display for ContentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentDescriptor::Url(url) => write!(f, "{}", url),
            ContentDescriptor::File(path) => write!(f, "file:{}", path.display()),
            ContentDescriptor::InMemory { content_type, body } => {
                write!(f, "memory:{} ({} bytes)", content_type, body.len())
            }
        }
    }
}

/// Maps a tile matrix cell to its content.
///
/// `row` counts from the matrix's north edge. Returning `None` means the
/// source has nothing for that cell and the tile is never requested.
pub trait TileSource: Send + Sync {
    fn descriptor(&self, matrix: &TileMatrix, row: u32, column: u32)
        -> Option<ContentDescriptor>;
}

impl<F> TileSource for F
where
    F: Fn(&TileMatrix, u32, u32) -> Option<ContentDescriptor> + Send + Sync,
{
    fn descriptor(&self, matrix: &TileMatrix, row: u32, column: u32) -> Option<ContentDescriptor> {
        self(matrix, row, column)
    }
}

/// Substitute the address placeholders of a template.
///
/// `{level}` is the matrix ordinal, `{row}` and `{col}` the cell counted from
/// the north-west corner and `{y}` the row counted from the south.
fn expand_template(template: &str, matrix: &TileMatrix, row: u32, column: u32) -> String {
    template
        .replace("{level}", &matrix.ordinal().to_string())
        .replace("{row}", &row.to_string())
        .replace("{col}", &column.to_string())
        .replace("{y}", &matrix.flip_row(row).to_string())
}

/// Builds URLs from a template such as
/// `https://tiles.example.com/{level}/{row}/{col}.bil`.
#[derive(Debug, Clone)]
pub struct UrlTemplateSource {
    template: String,
}

impl UrlTemplateSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl TileSource for UrlTemplateSource {
    fn descriptor(&self, matrix: &TileMatrix, row: u32, column: u32) -> Option<ContentDescriptor> {
        Some(ContentDescriptor::Url(expand_template(
            &self.template,
            matrix,
            row,
            column,
        )))
    }
}

/// Builds paths below a root directory from a relative template such as
/// `{level}/{row}/{col}.bil`.
#[derive(Debug, Clone)]
pub struct FileTemplateSource {
    root: PathBuf,
    template: String,
}

impl FileTemplateSource {
    pub fn new(root: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            template: template.into(),
        }
    }
}

impl TileSource for FileTemplateSource {
    fn descriptor(&self, matrix: &TileMatrix, row: u32, column: u32) -> Option<ContentDescriptor> {
        let relative = expand_template(&self.template, matrix, row, column);
        Some(ContentDescriptor::File(self.root.join(relative)))
    }
}
