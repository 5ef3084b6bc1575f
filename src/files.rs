//! Enumeration of the input paths into opened items, in discovery order.
//!
//! Opening (mapping, sniffing, reading metadata) runs on a bounded rayon
//! pool, but items are handed to the sink strictly in the order they were
//! discovered: the oldest in-flight open is always awaited first.

use rayon::ThreadPool;
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use crate::buffer::FileBuffer;
use crate::codecs::CodecRegistry;
use crate::item::Item;

// ---------------------------------------------------------------------------
// Directory listing
// ---------------------------------------------------------------------------

/// Regular files and symlinks to regular files in `dir`, sorted by name.
pub fn sorted_dir_list(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                log::warn!("{}: {e}", dir.display());
                continue;
            }
        };

        // fs::metadata follows symlinks
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("{}: {e}", path.display()),
        }
    }

    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Bounded parallel open, in-order append
// ---------------------------------------------------------------------------

struct Opener<'a, F> {
    pool: Option<ThreadPool>,
    registry: &'a Arc<CodecRegistry>,
    pending: VecDeque<mpsc::Receiver<Option<Arc<Item>>>>,
    limit: usize,
    append: F,
    count: usize,
}

impl<F: FnMut(Arc<Item>)> Opener<'_, F> {
    fn submit(&mut self, path: PathBuf) {
        if self.pending.len() >= self.limit {
            self.complete_one();
        }

        let item = Item::new(
            path.display().to_string(),
            Box::new(FileBuffer::new(path)),
            Arc::clone(self.registry),
        );
        let (tx, rx) = mpsc::sync_channel(1);
        let job = move || {
            let opened = match item.open() {
                Ok(()) => Some(Arc::new(item)),
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            };
            let _ = tx.send(opened);
        };

        match &self.pool {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
        self.pending.push_back(rx);
        self.collect_ready();
    }

    fn accept(&mut self, opened: Option<Arc<Item>>) {
        if let Some(item) = opened {
            (self.append)(item);
            self.count += 1;
        }
    }

    /// Append the leading opens that have already finished, without waiting.
    fn collect_ready(&mut self) {
        while let Some(rx) = self.pending.front() {
            match rx.try_recv() {
                Ok(opened) => {
                    self.pending.pop_front();
                    self.accept(opened);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.pending.pop_front();
                }
            }
        }
    }

    fn complete_one(&mut self) {
        let Some(rx) = self.pending.pop_front() else {
            return;
        };
        if let Ok(opened) = rx.recv() {
            self.accept(opened);
        }
    }

    fn drain(&mut self) {
        while !self.pending.is_empty() {
            self.complete_one();
        }
    }
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// The current directory stands in for an empty input list.
fn inputs(paths: &[PathBuf]) -> Cow<'_, [PathBuf]> {
    if paths.is_empty() {
        Cow::Owned(vec![PathBuf::from(".")])
    } else {
        Cow::Borrowed(paths)
    }
}

/// Enumerate `paths`, open every file and pass the successfully opened
/// items to `append` in order. Returns the number of items appended.
///
/// An empty `paths` means the current directory. Unreadable paths and
/// files that fail to open are logged and skipped.
/// Setting `stop` ends the scan; opens already in flight are discarded.
pub fn enumerate(
    paths: &[PathBuf],
    registry: &Arc<CodecRegistry>,
    open_concurrency: usize,
    stop: &AtomicBool,
    append: impl FnMut(Arc<Item>),
) -> usize {
    log::info!("Starting background image scan...");
    let start_time = Instant::now();
    let limit = open_concurrency.max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(limit)
        .thread_name(|i| format!("fiv-open-{i}"))
        .build()
        .inspect_err(|e| log::warn!("Falling back to the global thread pool: {e}"))
        .ok();

    let mut opener = Opener {
        pool,
        registry,
        pending: VecDeque::with_capacity(limit),
        limit,
        append,
        count: 0,
    };

    let paths = inputs(paths);
    'inputs: for path in paths.iter() {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("{}: {e}", path.display());
                continue;
            }
        };

        if meta.is_dir() {
            // Earlier files must not wait behind a slow listing
            opener.drain();
            let files = match sorted_dir_list(path) {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("{}: {e}", path.display());
                    continue;
                }
            };
            log::info!("Scanning {:?}... ({} files)", path, files.len());
            for file in files {
                if stop.load(Ordering::Relaxed) {
                    break 'inputs;
                }
                opener.submit(file);
            }
        } else if meta.is_file() {
            opener.submit(path.clone());
        } else {
            log::warn!("{}: not a regular file", path.display());
        }
    }

    if stop.load(Ordering::Relaxed) {
        opener.pending.clear();
    } else {
        opener.drain();
    }

    log::info!(
        "Scan complete in {:.2}s. Found {} images.",
        start_time.elapsed().as_secs_f64(),
        opener.count
    );
    opener.count
}
