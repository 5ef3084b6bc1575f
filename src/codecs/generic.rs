use image::ImageReader;
use std::io::Cursor;

use super::{Codec, CodecMetadata, DecodedImage, Dimensions, exif_data};
use crate::error::CodecError;

/// Any format the `image` crate can read.
#[derive(Debug, Default, Clone, Copy)]
pub struct Generic;

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, CodecError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Image(image::ImageError::IoError(e)))
}

impl Codec for Generic {
    fn metadata(&self, data: &[u8]) -> Result<CodecMetadata, CodecError> {
        let dimensions: Dimensions = reader(data)?.into_dimensions()?.into();
        let exif = exif_data::read(data);

        Ok(CodecMetadata {
            dimensions,
            orientation: exif_data::orientation(exif.as_ref()),
            properties: exif_data::properties(exif.as_ref()),
        })
    }

    fn primary(&self, data: &[u8], metadata: &CodecMetadata) -> Result<DecodedImage, CodecError> {
        let image = reader(data)?.decode()?;
        let dimensions = Dimensions::new(image.width(), image.height());

        if dimensions != metadata.dimensions {
            return Err(CodecError::DimensionsChanged {
                actual: dimensions,
                expected: metadata.dimensions,
            });
        }

        Ok(DecodedImage {
            rgba_bytes: image.into_rgba8().into_raw(),
            width: dimensions.width,
            height: dimensions.height,
        })
    }
}
