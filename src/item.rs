//! One entry of the collection: a byte source plus its decoded surfaces.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use crate::buffer::{ByteSource, Bytes, MemoryBuffer};
use crate::codecs::{self, Codec, CodecMetadata, CodecRegistry, DecodedImage, Dimensions, Properties};
use crate::error::{Error, Result};
use crate::orientation::Orientation;
use crate::slot::{Slot, SlotStatus};

/// What `open()` learned about the bytes. Set once, never changes.
#[derive(Debug)]
struct Identity {
    content_type: &'static str,
    codec: Arc<dyn Codec>,
    metadata: CodecMetadata,
}

#[derive(Debug)]
pub struct Item {
    name: String,
    source: Box<dyn ByteSource>,
    registry: Arc<CodecRegistry>,
    identity: OnceLock<Identity>,
    orientation: Mutex<Orientation>,
    primary: Slot<DecodedImage>,
    thumbnail: Slot<Item>,
}

impl Item {
    pub fn new(
        name: impl Into<String>,
        source: Box<dyn ByteSource>,
        registry: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            registry,
            identity: OnceLock::new(),
            orientation: Mutex::new(Orientation::NORMAL),
            primary: Slot::new(),
            thumbnail: Slot::new(),
        }
    }

    /// Map the bytes, sniff the content type and read the codec metadata.
    ///
    /// Idempotent. On the first successful open the codec's orientation
    /// becomes the base and any changes made before are composed onto it.
    pub fn open(&self) -> Result<()> {
        if self.identity.get().is_some() {
            return Ok(());
        }

        let data = self.bytes()?;
        let content_type = codecs::identify(&data);
        let codec = self
            .registry
            .get(content_type)
            .ok_or_else(|| Error::Unsupported {
                name: self.name.clone(),
                content_type: content_type.to_string(),
            })?;
        let metadata = codec.metadata(&data).map_err(|source| self.codec_error(source))?;
        let orientation = metadata.orientation;

        let identity = Identity {
            content_type,
            codec,
            metadata,
        };
        if self.identity.set(identity).is_ok() {
            let mut current = self.orientation.lock().unwrap();
            *current = orientation.compose(*current);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.identity.get().is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> Option<&Path> {
        self.source.filename()
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.identity.get().map(|identity| identity.content_type)
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.identity.get().map(|identity| identity.metadata.dimensions)
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.identity.get().map(|identity| &identity.metadata.properties)
    }

    pub fn orientation(&self) -> Orientation {
        *self.orientation.lock().unwrap()
    }

    /// Compose `modify` onto the current orientation, thumbnail included.
    pub fn set_orientation(&self, modify: Orientation) {
        {
            let mut orientation = self.orientation.lock().unwrap();
            *orientation = orientation.compose(modify);
        }
        if let Some(thumbnail) = self.thumbnail.get() {
            thumbnail.set_orientation(modify);
        }
    }

    /// Decode the primary surface unless it is loaded, failed or already
    /// being decoded by another thread. Never waits on another decoder.
    pub fn load_primary(&self) -> bool {
        match self.primary.load(|| self.decode_primary()) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }

    pub fn get_primary(&self) -> Option<Arc<DecodedImage>> {
        self.primary.get()
    }

    pub fn unload_primary(&self) {
        self.primary.unload();
    }

    pub fn primary_status(&self) -> SlotStatus {
        self.primary.status()
    }

    /// Open and decode the embedded thumbnail as an item of its own.
    pub fn load_thumbnail(&self) -> bool {
        match self.thumbnail.load(|| self.decode_thumbnail()) {
            Ok(loaded) => loaded,
            Err(e @ Error::NoThumbnail { .. }) => {
                log::debug!("{e}");
                false
            }
            Err(e) => {
                log::warn!("{e}");
                false
            }
        }
    }

    pub fn get_thumbnail(&self) -> Option<Arc<Item>> {
        self.thumbnail.get()
    }

    pub fn unload_thumbnail(&self) {
        self.thumbnail.unload();
    }

    pub fn thumbnail_status(&self) -> SlotStatus {
        self.thumbnail.status()
    }

    fn bytes(&self) -> Result<Bytes> {
        self.source.load()?;
        self.source.data().ok_or_else(|| Error::NotLoaded {
            name: self.name.clone(),
        })
    }

    fn identity(&self) -> Result<&Identity> {
        self.open()?;
        self.identity.get().ok_or_else(|| Error::NotLoaded {
            name: self.name.clone(),
        })
    }

    fn codec_error(&self, source: crate::error::CodecError) -> Error {
        Error::Codec {
            name: self.name.clone(),
            source,
        }
    }

    fn decode_primary(&self) -> Result<DecodedImage> {
        let start_time = Instant::now();
        let identity = self.identity()?;
        let data = self.bytes()?;

        let image = identity
            .codec
            .primary(&data, &identity.metadata)
            .map_err(|source| self.codec_error(source))?;

        log::debug!(
            "Decoded {} ({}) in {:.1}ms",
            self.name,
            image.dimensions(),
            start_time.elapsed().as_secs_f64() * 1000.0
        );
        Ok(image)
    }

    fn decode_thumbnail(&self) -> Result<Item> {
        let identity = self.identity()?;
        let data = self.bytes()?;

        let thumbnail_data = identity
            .codec
            .thumbnail(&data)
            .map_err(|source| self.codec_error(source))?
            .ok_or_else(|| Error::NoThumbnail {
                name: self.name.clone(),
            })?;

        let thumbnail = Item::new(
            format!("{} [thumbnail]", self.name),
            Box::new(MemoryBuffer::new(thumbnail_data)),
            Arc::clone(&self.registry),
        );
        thumbnail.open()?;
        *thumbnail.orientation.lock().unwrap() = self.orientation();
        thumbnail.primary.load(|| thumbnail.decode_primary())?;

        Ok(thumbnail)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.content_type() {
            Some(content_type) => write!(f, "{} ({content_type})", self.name),
            None => f.write_str(&self.name),
        }
    }
}
