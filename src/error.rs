use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::codecs::Dimensions;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{name}: unsupported type {content_type}")]
    Unsupported { name: String, content_type: String },

    #[error("{name}: {source}")]
    Codec {
        name: String,
        #[source]
        source: CodecError,
    },

    #[error("{name}: no embedded thumbnail")]
    NoThumbnail { name: String },

    #[error("{name}: byte source is not loaded")]
    NotLoaded { name: String },

    #[error("no mark directory configured")]
    MarkNotConfigured,

    #[error("{name}: not backed by a file")]
    NotAFile { name: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures reported by a codec while identifying or decoding an item.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("image dimensions have changed: {actual} != {expected}")]
    DimensionsChanged {
        actual: Dimensions,
        expected: Dimensions,
    },

    #[error("{0}")]
    Other(String),
}
