use super::{Codec, CodecMetadata, DecodedImage, Generic, exif_data};
use crate::error::CodecError;

/// JPEG: decodes like [`Generic`] and also exposes the EXIF thumbnail.
#[derive(Debug, Default, Clone, Copy)]
pub struct Jpeg;

impl Codec for Jpeg {
    fn metadata(&self, data: &[u8]) -> Result<CodecMetadata, CodecError> {
        Generic.metadata(data)
    }

    fn primary(&self, data: &[u8], metadata: &CodecMetadata) -> Result<DecodedImage, CodecError> {
        Generic.primary(data, metadata)
    }

    fn thumbnail(&self, data: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        Ok(exif_data::read(data).and_then(|exif| exif_data::thumbnail(&exif)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_without_exif_has_no_thumbnail() {
        let mut data = Vec::new();
        image::RgbImage::new(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut data), image::ImageFormat::Jpeg)
            .unwrap();

        let metadata = Jpeg.metadata(&data).unwrap();
        assert_eq!(metadata.dimensions.width, 2);
        assert!(Jpeg.thumbnail(&data).unwrap().is_none());
    }
}
