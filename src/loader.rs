//! Background loader pool draining the prefetch queue.

use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crate::collection::Inner;
use crate::preload::Prefetch;

/// Spawn `num_threads` workers. Each holds the collection only weakly, so
/// dropping the collection is enough for them to wind down once woken.
pub(crate) fn spawn_loaders(
    prefetch: &Arc<Prefetch>,
    collection: Weak<Inner>,
    num_threads: usize,
) -> Vec<JoinHandle<()>> {
    (0..num_threads.max(1))
        .filter_map(|i| {
            let prefetch = Arc::clone(prefetch);
            let collection = collection.clone();
            thread::Builder::new()
                .name(format!("fiv-loader-{i}"))
                .spawn(move || run_loader(&prefetch, &collection))
                .inspect_err(|e| log::warn!("Failed to spawn loader thread: {e}"))
                .ok()
        })
        .collect()
}

fn run_loader(prefetch: &Prefetch, collection: &Weak<Inner>) {
    log::trace!("Loader thread started");

    while let Some(job) = prefetch.next_job() {
        let loaded = job.item.load_primary();
        prefetch.finish(&job, loaded);

        if !loaded {
            continue;
        }
        let Some(collection) = collection.upgrade() else {
            break;
        };
        collection.listeners.loaded_item(&job.item);
        if collection.is_current(job.index) {
            collection.listeners.loaded_current();
        }
    }

    log::trace!("Loader thread exiting");
}
