//! Codec contract and the process-wide registry keyed by content type.
//!
//! The registry is built once and never mutated afterwards, so it can be
//! shared freely between the enumeration, open and loader threads.

mod exif_data;
mod generic;
mod jpeg;

pub use generic::Generic;
pub use jpeg::Jpeg;

use chrono::NaiveDateTime;
use image::ImageFormat;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::CodecError;
use crate::orientation::Orientation;

pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Focus point rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusPoint {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    pub timestamp: Option<NaiveDateTime>,
    pub iso_speed: Option<u32>,
    pub aperture: Option<f64>,
    pub focal_length: Option<f64>,
    pub exposure_time: Option<f64>,
    pub flash: Option<bool>,
    pub rating: Option<i32>,
    pub focus_points: Vec<FocusPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodecMetadata {
    pub dimensions: Dimensions,
    pub orientation: Orientation,
    pub properties: Properties,
}

/// A decoded surface, RGBA with 4 bytes per pixel.
pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    pub fn mem_size(&self) -> u64 {
        self.rgba_bytes.len() as u64
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Decoder for one family of content types.
///
/// Implementations must be callable from any thread and must only read the
/// bytes they are given.
pub trait Codec: Send + Sync + fmt::Debug {
    fn metadata(&self, data: &[u8]) -> Result<CodecMetadata, CodecError>;

    fn primary(&self, data: &[u8], metadata: &CodecMetadata) -> Result<DecodedImage, CodecError>;

    /// Bytes of an embedded thumbnail, to be opened as an item of its own.
    fn thumbnail(&self, _data: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        Ok(None)
    }
}

/// Sniff the content type from the leading bytes.
pub fn identify(data: &[u8]) -> &'static str {
    image::guess_format(data)
        .map(|format| format.to_mime_type())
        .unwrap_or(UNKNOWN_CONTENT_TYPE)
}

#[derive(Debug, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

static STANDARD: LazyLock<Arc<CodecRegistry>> = LazyLock::new(|| {
    let generic: Arc<dyn Codec> = Arc::new(Generic);
    let mut registry = CodecRegistry::new();

    for format in ImageFormat::all().filter(|format| format.reading_enabled()) {
        // Formats without a MIME type of their own (farbfeld) would claim
        // every unrecognized file
        if format.to_mime_type() == UNKNOWN_CONTENT_TYPE {
            continue;
        }
        let codec = if format == ImageFormat::Jpeg {
            Arc::new(Jpeg) as Arc<dyn Codec>
        } else {
            Arc::clone(&generic)
        };
        registry = registry.with(format.to_mime_type(), codec);
    }

    log::debug!("Registered codecs for {} content types", registry.codecs.len());
    Arc::new(registry)
});

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every format the `image` crate can read.
    pub fn standard() -> Arc<CodecRegistry> {
        Arc::clone(&STANDARD)
    }

    pub fn with(mut self, content_type: impl Into<String>, codec: Arc<dyn Codec>) -> Self {
        self.codecs.insert(content_type.into(), codec);
        self
    }

    pub fn get(&self, content_type: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(content_type).cloned()
    }

    pub fn supports(&self, content_type: &str) -> bool {
        self.codecs.contains_key(content_type)
    }
}
