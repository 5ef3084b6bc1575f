//! Fakes and fixtures shared by the unit tests.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::buffer::MemoryBuffer;
use crate::codecs::{Codec, CodecMetadata, CodecRegistry, DecodedImage, Dimensions, Properties};
use crate::error::CodecError;
use crate::item::Item;
use crate::orientation::Orientation;

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    image::RgbaImage::new(width, height)
        .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap();
    data
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

pub fn write_png(dir: &Path, name: &str) -> PathBuf {
    write_file(dir, name, &png_bytes(2, 2))
}

/// Registry that routes PNG content to `codec`.
pub fn registry(codec: Arc<dyn Codec>) -> Arc<CodecRegistry> {
    Arc::new(CodecRegistry::new().with("image/png", codec))
}

/// An in-memory item whose bytes sniff as PNG.
pub fn memory_item(name: &str, codec: Arc<dyn Codec>) -> Arc<Item> {
    Arc::new(Item::new(
        name,
        Box::new(MemoryBuffer::new(PNG_SIGNATURE.to_vec())),
        registry(codec),
    ))
}

/// Poll `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Accepts any bytes as a 1x1 image and counts decodes.
#[derive(Debug, Default)]
pub struct CountingCodec {
    primary_calls: AtomicUsize,
    fail: bool,
    orientation: Orientation,
    thumbnail: Option<Vec<u8>>,
}

impl CountingCodec {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn with_thumbnail(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            thumbnail: Some(data),
            ..Self::default()
        })
    }

    pub fn with_orientation(orientation: Orientation) -> Arc<Self> {
        Arc::new(Self {
            orientation,
            ..Self::default()
        })
    }

    pub fn primary_calls(&self) -> usize {
        self.primary_calls.load(Ordering::SeqCst)
    }
}

impl Codec for CountingCodec {
    fn metadata(&self, _data: &[u8]) -> Result<CodecMetadata, CodecError> {
        Ok(CodecMetadata {
            dimensions: Dimensions::new(1, 1),
            orientation: self.orientation,
            properties: Properties::default(),
        })
    }

    fn primary(&self, _data: &[u8], _metadata: &CodecMetadata) -> Result<DecodedImage, CodecError> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CodecError::Other("corrupt image data".into()));
        }
        Ok(DecodedImage {
            rgba_bytes: vec![0; 4],
            width: 1,
            height: 1,
        })
    }

    fn thumbnail(&self, _data: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        Ok(self.thumbnail.clone())
    }
}

/// Like [`CountingCodec`] but calls block until the gate is opened.
///
/// By default only decodes are held; [`GatedCodec::opens_after`] holds
/// metadata reads instead, letting the first few through.
#[derive(Debug, Default)]
pub struct GatedCodec {
    inner: CountingCodec,
    gate_opens: bool,
    state: Mutex<GateState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    free: usize,
    entered: usize,
}

impl GatedCodec {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opens_after(free: usize) -> Arc<Self> {
        Arc::new(Self {
            gate_opens: true,
            state: Mutex::new(GateState {
                free,
                ..GateState::default()
            }),
            ..Self::default()
        })
    }

    /// Block until `count` calls are held at the gate.
    pub fn wait_entered(&self, count: usize) {
        let state = self.state.lock().unwrap();
        let (_state, timeout) = self
            .changed
            .wait_timeout_while(state, Duration::from_secs(5), |s| s.entered < count)
            .unwrap();
        assert!(!timeout.timed_out(), "gate never reached");
    }

    pub fn open(&self) {
        self.state.lock().unwrap().open = true;
        self.changed.notify_all();
    }

    pub fn primary_calls(&self) -> usize {
        self.inner.primary_calls()
    }

    fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        if state.free > 0 {
            state.free -= 1;
            return;
        }
        state.entered += 1;
        self.changed.notify_all();
        let _state = self.changed.wait_while(state, |s| !s.open).unwrap();
    }
}

impl Codec for GatedCodec {
    fn metadata(&self, data: &[u8]) -> Result<CodecMetadata, CodecError> {
        if self.gate_opens {
            self.pass();
        }
        self.inner.metadata(data)
    }

    fn primary(&self, data: &[u8], metadata: &CodecMetadata) -> Result<DecodedImage, CodecError> {
        if !self.gate_opens {
            self.pass();
        }
        self.inner.primary(data, metadata)
    }
}
