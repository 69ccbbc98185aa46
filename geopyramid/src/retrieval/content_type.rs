//! Content types accepted for tile samples.

use std::fmt;

/// Sample encodings a coverage can decode, parsed from a MIME label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleEncoding {
    /// Little-endian signed 16-bit samples (`application/bil16`).
    Int16,
    /// Little-endian 32-bit float samples (`application/bil32`).
    Float32,
    /// Tagged image file (`image/tiff`).
    Tiff,
    /// An XML body, which for a tile request is always an exception report.
    Xml,
    /// Anything else; carries the label for diagnostics.
    Unknown(String),
}

impl SampleEncoding {
    /// Classify a MIME label. Parameters such as `; charset=utf-8` and case
    /// are ignored.
    pub fn from_mime(label: &str) -> Self {
        let essence = label
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/bil16" => SampleEncoding::Int16,
            "application/bil32" => SampleEncoding::Float32,
            "image/tiff" => SampleEncoding::Tiff,
            "text/xml" | "application/xml" | "application/vnd.ogc.se_xml" => SampleEncoding::Xml,
            _ => SampleEncoding::Unknown(label.to_string()),
        }
    }

    /// True for XML bodies, which report service errors rather than data.
    pub fn is_xml(&self) -> bool {
        matches!(self, SampleEncoding::Xml)
    }
}

impl fmt::Display for SampleEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleEncoding::Int16 => write!(f, "application/bil16"),
            SampleEncoding::Float32 => write!(f, "application/bil32"),
            SampleEncoding::Tiff => write!(f, "image/tiff"),
            SampleEncoding::Xml => write!(f, "text/xml"),
            SampleEncoding::Unknown(label) => write!(f, "{}", label),
        }
    }
}
