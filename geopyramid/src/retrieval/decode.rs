//! Decoding fetched bodies into tile content.
//!
//! Elevation bodies become [`ElevationRaster`]s of signed 16-bit samples:
//!
//! | Content type                   | Handling                              |
//! |--------------------------------|---------------------------------------|
//! | `application/bil16`            | little-endian `i16`, used as is       |
//! | `application/bil32`            | little-endian `f32`, rounded to `i16` |
//! | `image/tiff`                   | first channel, rounded to `i16`       |
//! | `text/xml`, `application/xml`… | service exception, message extracted  |
//! | anything else                  | unsupported content                   |
//!
//! Imagery bodies are decoded to RGBA with the `image` crate.

use std::io::Cursor;

use image::RgbaImage;
use tiff::decoder::{Decoder, DecodingResult};

use super::{FetchResponse, RetrievalError, SampleEncoding};

/// Memory held by decoded tile content, charged against a coverage's
/// resident capacity.
pub trait ResidentSize {
    fn resident_size(&self) -> usize;
}

impl ResidentSize for RgbaImage {
    fn resident_size(&self) -> usize {
        self.as_raw().len()
    }
}

/// Turns a successful response into tile content.
///
/// Runs inside retrieval tasks, off the render loop.
pub trait ContentDecoder: Send + Sync + 'static {
    type Output: ResidentSize + Send + 'static;

    fn decode(&self, response: &FetchResponse) -> Result<Self::Output, RetrievalError>;
}

/// A grid of elevation samples covering one tile, row-major from the
/// north-west corner. Samples sit on the tile edges: the first column lies on
/// the west edge and the last on the east edge.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationRaster {
    width: u32,
    height: u32,
    samples: Vec<i16>,
    min: i16,
    max: i16,
}

impl ElevationRaster {
    /// Wrap `samples`. Returns `None` unless there are exactly
    /// `width * height` of them and the grid is non-empty.
    pub fn new(width: u32, height: u32, samples: Vec<i16>) -> Option<Self> {
        if width == 0 || height == 0 || samples.len() != width as usize * height as usize {
            return None;
        }
        let min = samples.iter().copied().min()?;
        let max = samples.iter().copied().max()?;
        Some(Self {
            width,
            height,
            samples,
            min,
            max,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Lowest and highest sample.
    pub fn height_limits(&self) -> (f32, f32) {
        (self.min as f32, self.max as f32)
    }

    pub fn sample(&self, x: u32, y: u32) -> i16 {
        self.samples[(y * self.width + x) as usize]
    }

    /// Bilinear interpolation at fractional grid coordinates, clamped to the
    /// grid. `fx` runs east and `fy` south.
    pub fn interpolate(&self, fx: f64, fy: f64) -> f64 {
        let max_x = (self.width - 1) as f64;
        let max_y = (self.height - 1) as f64;
        let fx = fx.clamp(0.0, max_x);
        let fy = fy.clamp(0.0, max_y);

        let x0 = fx.floor() as u32;
        let y0 = fy.floor() as u32;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let top = self.sample(x0, y0) as f64 * (1.0 - tx) + self.sample(x1, y0) as f64 * tx;
        let bottom = self.sample(x0, y1) as f64 * (1.0 - tx) + self.sample(x1, y1) as f64 * tx;
        top * (1.0 - ty) + bottom * ty
    }

    /// Approximate resident size.
    pub fn size_in_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }
}

impl ResidentSize for ElevationRaster {
    fn resident_size(&self) -> usize {
        self.size_in_bytes()
    }
}

/// Decodes elevation tiles of a fixed sample grid size.
#[derive(Debug, Clone, Copy)]
pub struct ElevationDecoder {
    width: u32,
    height: u32,
}

impl ElevationDecoder {
    /// Raw sample bodies must hold `width * height` samples. TIFF bodies carry
    /// their own dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn raster(&self, samples: Vec<i16>) -> Result<ElevationRaster, RetrievalError> {
        let count = samples.len();
        ElevationRaster::new(self.width, self.height, samples).ok_or_else(|| {
            RetrievalError::Decode(format!(
                "expected {}x{} samples, got {}",
                self.width, self.height, count
            ))
        })
    }
}

impl ContentDecoder for ElevationDecoder {
    type Output = ElevationRaster;

    fn decode(&self, response: &FetchResponse) -> Result<ElevationRaster, RetrievalError> {
        match SampleEncoding::from_mime(&response.content_type) {
            SampleEncoding::Int16 => self.raster(decode_int16(&response.body)?),
            SampleEncoding::Float32 => self.raster(decode_float32(&response.body)?),
            SampleEncoding::Tiff => decode_tiff(&response.body),
            SampleEncoding::Xml => Err(RetrievalError::ServiceException {
                message: service_exception_message(&response.body),
            }),
            SampleEncoding::Unknown(content_type) => {
                Err(RetrievalError::UnsupportedContent { content_type })
            }
        }
    }
}

/// Decodes imagery tiles to RGBA.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageryDecoder;

impl ContentDecoder for ImageryDecoder {
    type Output = RgbaImage;

    fn decode(&self, response: &FetchResponse) -> Result<RgbaImage, RetrievalError> {
        let encoding = SampleEncoding::from_mime(&response.content_type);
        if encoding.is_xml() {
            return Err(RetrievalError::ServiceException {
                message: service_exception_message(&response.body),
            });
        }
        if !response.content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(RetrievalError::UnsupportedContent {
                content_type: response.content_type.clone(),
            });
        }
        let image = image::load_from_memory(&response.body)?;
        Ok(image.to_rgba8())
    }
}

/// Little-endian signed 16-bit samples.
pub fn decode_int16(body: &[u8]) -> Result<Vec<i16>, RetrievalError> {
    if body.len() % 2 != 0 {
        return Err(RetrievalError::Decode(format!(
            "16-bit sample body has odd length {}",
            body.len()
        )));
    }
    Ok(body
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Little-endian 32-bit float samples, rounded to the nearest `i16`.
///
/// Values outside the `i16` range saturate and NaN becomes 0.
pub fn decode_float32(body: &[u8]) -> Result<Vec<i16>, RetrievalError> {
    if body.len() % 4 != 0 {
        return Err(RetrievalError::Decode(format!(
            "32-bit sample body length {} is not a multiple of 4",
            body.len()
        )));
    }
    Ok(body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]).round() as i16)
        .collect())
}

/// Elevation TIFF to samples.
///
/// Reads the first channel of every pixel. Integer samples saturate to the
/// `i16` range and float samples are rounded the way [`decode_float32`]
/// rounds them.
pub fn decode_tiff(body: &[u8]) -> Result<ElevationRaster, RetrievalError> {
    let mut decoder = Decoder::new(Cursor::new(body))?;
    let (width, height) = decoder.dimensions()?;
    let pixels = width as usize * height as usize;

    let samples: Vec<i16> = match decoder.read_image()? {
        DecodingResult::I16(data) => first_channel(data, pixels)?,
        DecodingResult::U16(data) => first_channel(data, pixels)?
            .into_iter()
            .map(|v| v.min(i16::MAX as u16) as i16)
            .collect(),
        DecodingResult::F32(data) => first_channel(data, pixels)?
            .into_iter()
            .map(|v| v.round() as i16)
            .collect(),
        DecodingResult::F64(data) => first_channel(data, pixels)?
            .into_iter()
            .map(|v| v.round() as i16)
            .collect(),
        DecodingResult::I32(data) => first_channel(data, pixels)?
            .into_iter()
            .map(|v| v.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
            .collect(),
        DecodingResult::U32(data) => first_channel(data, pixels)?
            .into_iter()
            .map(|v| v.min(i16::MAX as u32) as i16)
            .collect(),
        DecodingResult::U8(data) => first_channel(data, pixels)?
            .into_iter()
            .map(i16::from)
            .collect(),
        DecodingResult::I8(data) => first_channel(data, pixels)?
            .into_iter()
            .map(i16::from)
            .collect(),
        _ => {
            return Err(RetrievalError::Decode(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    ElevationRaster::new(width, height, samples)
        .ok_or_else(|| RetrievalError::Decode("empty TIFF image".to_string()))
}

/// Keep the first of the interleaved channels of `pixels` pixels.
fn first_channel<T: Copy>(data: Vec<T>, pixels: usize) -> Result<Vec<T>, RetrievalError> {
    if pixels == 0 || data.len() < pixels {
        return Err(RetrievalError::Decode(format!(
            "TIFF holds {} samples for {} pixels",
            data.len(),
            pixels
        )));
    }
    let channels = data.len() / pixels;
    if channels == 1 {
        return Ok(data);
    }
    Ok(data.into_iter().step_by(channels).take(pixels).collect())
}

/// Human readable message of an OGC exception report.
///
/// Prefers the text of `<ExceptionText>`, then `<ServiceException>`, with or
/// without a namespace prefix, and falls back to the whole trimmed body.
pub fn service_exception_message(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let message = element_text(&text, "ExceptionText")
        .or_else(|| element_text(&text, "ServiceException"))
        .unwrap_or(text.trim());
    if message.is_empty() {
        "empty exception report".to_string()
    } else {
        message.to_string()
    }
}

/// Trimmed text of the first `name` element, ignoring namespace prefixes.
fn element_text<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;
    let content_start = loop {
        let open = search_from + xml[search_from..].find('<')?;
        let tag_end = open + xml[open..].find('>')?;
        let tag = &xml[open + 1..tag_end];
        search_from = tag_end;
        if tag.starts_with('/') || tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }
        let qualified = tag.split(|c: char| c.is_whitespace() || c == '/').next()?;
        let local = qualified.rsplit(':').next()?;
        if local == name {
            if tag.ends_with('/') {
                return None;
            }
            break tag_end + 1;
        }
    };

    let mut search_from = content_start;
    loop {
        let close = search_from + xml[search_from..].find("</")?;
        let tag_end = close + xml[close..].find('>')?;
        let qualified = xml[close + 2..tag_end].trim();
        if qualified.rsplit(':').next() == Some(name) {
            return Some(xml[content_start..close].trim());
        }
        search_from = tag_end;
    }
}
