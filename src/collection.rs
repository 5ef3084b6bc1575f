//! The ordered collection of items, its cursor and background machinery.
//!
//! Lock order is `sequence` before the prefetch state, never the reverse.
//! Listener callbacks never run with either held.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::codecs::CodecRegistry;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{Listener, Listeners};
use crate::files;
use crate::item::Item;
use crate::loader;
use crate::marks::MarkDirectory;
use crate::orientation::Orientation;
use crate::preload::Prefetch;

/// "Item added" notifications are sent for the first item and then in
/// batches of this size; completion always sends one more.
const ADDED_BATCH: usize = 100;

/// Consistent snapshot of where the cursor is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// 1-based, 0 while the collection is empty.
    pub index: usize,
    pub total: usize,
    pub complete: bool,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Sequence {
    items: Vec<Arc<Item>>,
    cursor: Option<usize>,
    complete: bool,
}

pub(crate) struct Inner {
    config: Config,
    registry: Arc<CodecRegistry>,
    marks: Option<MarkDirectory>,
    sequence: Mutex<Sequence>,
    item_added: Condvar,
    prefetch: Arc<Prefetch>,
    pub(crate) listeners: Listeners,
    stop: AtomicBool,
}

impl Inner {
    pub(crate) fn is_current(&self, index: usize) -> bool {
        self.sequence.lock().unwrap().cursor == Some(index)
    }

    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn append(&self, item: Arc<Item>) {
        let count = {
            let mut seq = self.sequence.lock().unwrap();
            seq.items.push(item);

            let cursor = match seq.cursor {
                Some(_) if !self.prefetch.is_starved() => None,
                Some(cursor) => Some(cursor),
                None => {
                    seq.cursor = Some(0);
                    Some(0)
                }
            };
            if let Some(cursor) = cursor {
                self.prefetch.recompute(&seq.items, cursor, self.config.preload);
            }

            self.item_added.notify_all();
            seq.items.len()
        };

        if count == 1 || count % ADDED_BATCH == 0 {
            self.listeners.added_item();
        }
    }

    fn finish(&self) {
        {
            let mut seq = self.sequence.lock().unwrap();
            seq.complete = true;
            self.item_added.notify_all();
        }
        self.listeners.added_item();
    }

    // Runs from `Drop` too, so a poisoned lock must not panic again
    fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        let _seq = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        self.item_added.notify_all();
    }

    fn enumerate(&self) {
        files::enumerate(
            &self.config.files,
            &self.registry,
            self.config.open_concurrency,
            &self.stop,
            |item| self.append(item),
        );
        self.finish();
    }
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

pub struct Collection {
    inner: Arc<Inner>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Collection {
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, CodecRegistry::standard())
    }

    pub fn with_registry(config: Config, registry: Arc<CodecRegistry>) -> Self {
        let marks = config.mark_directory.as_ref().map(MarkDirectory::new);
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                marks,
                sequence: Mutex::new(Sequence::default()),
                item_added: Condvar::new(),
                prefetch: Arc::new(Prefetch::new()),
                listeners: Listeners::default(),
                stop: AtomicBool::new(false),
            }),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Start the loaders and the enumeration thread, then block until the
    /// first item is available or enumeration ends. Returns whether the
    /// collection has at least one item.
    pub fn start(&self) -> bool {
        {
            let mut threads = self.threads.lock().unwrap();
            if threads.is_empty() {
                threads.extend(loader::spawn_loaders(
                    &self.inner.prefetch,
                    Arc::downgrade(&self.inner),
                    self.inner.config.loader_threads,
                ));

                let inner = Arc::clone(&self.inner);
                match thread::Builder::new()
                    .name("fiv-enumerate".into())
                    .spawn(move || inner.enumerate())
                {
                    Ok(handle) => threads.push(handle),
                    Err(e) => {
                        log::error!("Failed to spawn enumeration thread: {e}");
                        self.inner.finish();
                    }
                }
            }
        }

        let seq = self.inner.sequence.lock().unwrap();
        let seq = self
            .inner
            .item_added
            .wait_while(seq, |seq| {
                seq.items.is_empty() && !seq.complete && !self.inner.is_stopped()
            })
            .unwrap();
        !seq.items.is_empty()
    }

    /// Block until enumeration has finished or was stopped.
    pub fn wait_complete(&self) {
        let seq = self.inner.sequence.lock().unwrap();
        let _seq = self
            .inner
            .item_added
            .wait_while(seq, |seq| !seq.complete && !self.inner.is_stopped())
            .unwrap();
    }

    pub fn add_listener<L: Listener + 'static>(&self, listener: &Arc<L>) {
        self.inner.listeners.add(listener);
    }

    fn move_cursor(&self, step: impl FnOnce(usize, usize) -> Option<usize>) -> bool {
        let mut seq = self.inner.sequence.lock().unwrap();
        let Some(cursor) = seq.cursor else {
            return false;
        };
        match step(cursor, seq.items.len()) {
            Some(next) if next != cursor => {
                seq.cursor = Some(next);
                self.inner
                    .prefetch
                    .recompute(&seq.items, next, self.inner.config.preload);
                true
            }
            _ => false,
        }
    }

    pub fn first(&self) -> bool {
        self.move_cursor(|_, _| Some(0))
    }

    pub fn previous(&self) -> bool {
        self.move_cursor(|cursor, _| cursor.checked_sub(1))
    }

    pub fn next(&self) -> bool {
        self.move_cursor(|cursor, len| (cursor + 1 < len).then_some(cursor + 1))
    }

    pub fn last(&self) -> bool {
        self.move_cursor(|_, len| len.checked_sub(1))
    }

    /// The item at the cursor.
    ///
    /// # Panics
    ///
    /// If the collection is empty. Only call after `start()` returned true.
    pub fn current(&self) -> Arc<Item> {
        let item = {
            let seq = self.inner.sequence.lock().unwrap();
            seq.cursor.map(|cursor| Arc::clone(&seq.items[cursor]))
        };
        match item {
            Some(item) => item,
            None => panic!("current() called on an empty collection"),
        }
    }

    pub fn position(&self) -> Position {
        let seq = self.inner.sequence.lock().unwrap();
        Position {
            index: seq.cursor.map_or(0, |cursor| cursor + 1),
            total: seq.items.len(),
            complete: seq.complete,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.sequence.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the current item on the calling thread.
    pub fn load_current(&self) -> bool {
        let (index, item) = {
            let seq = self.inner.sequence.lock().unwrap();
            let Some(cursor) = seq.cursor else {
                return false;
            };
            (cursor, Arc::clone(&seq.items[cursor]))
        };

        let loaded = item.load_primary();
        if loaded {
            self.inner.prefetch.settle(index, &item);
        }
        loaded
    }

    /// Indices whose primary surface the scheduler keeps decoded.
    pub fn resident(&self) -> Vec<usize> {
        self.inner.prefetch.resident()
    }

    pub fn set_orientation(&self, modify: Orientation) {
        self.current().set_orientation(modify);
    }

    pub fn rotate_left(&self) {
        self.set_orientation(Orientation::ROTATE_LEFT);
    }

    pub fn rotate_right(&self) {
        self.set_orientation(Orientation::ROTATE_RIGHT);
    }

    pub fn flip_horizontal(&self) {
        self.set_orientation(Orientation::FLIP_HORIZONTAL);
    }

    pub fn flip_vertical(&self) {
        self.set_orientation(Orientation::FLIP_VERTICAL);
    }

    fn marked_file(&self) -> Result<(&MarkDirectory, PathBuf)> {
        let marks = self.inner.marks.as_ref().ok_or(Error::MarkNotConfigured)?;
        let item = self.current();
        let path = item.filename().ok_or_else(|| Error::NotAFile {
            name: item.name().to_string(),
        })?;
        Ok((marks, path.to_path_buf()))
    }

    pub fn mark(&self) -> Result<()> {
        let (marks, path) = self.marked_file()?;
        marks.mark(&path)
    }

    pub fn unmark(&self) -> Result<()> {
        let (marks, path) = self.marked_file()?;
        marks.unmark(&path)
    }

    /// Returns whether the current file is marked afterwards.
    pub fn toggle_mark(&self) -> Result<bool> {
        let (marks, path) = self.marked_file()?;
        marks.toggle(&path)
    }

    pub fn is_marked(&self) -> bool {
        self.marked_file()
            .is_ok_and(|(marks, path)| marks.is_marked(&path))
    }

    /// Stop enumerating further inputs and release anyone blocked in
    /// `start()`. Loaded items stay usable.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Stop everything and wait for all background threads to exit.
    pub fn shutdown(&self) {
        self.inner.stop();
        self.inner.prefetch.shutdown();

        let threads = std::mem::take(&mut *self.threads.lock().unwrap());
        for handle in threads {
            if handle.join().is_err() {
                log::error!("Background thread panicked");
            }
        }
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.inner.stop();
        self.inner.prefetch.shutdown();
    }
}
