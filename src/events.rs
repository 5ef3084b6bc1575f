//! Observers of the collection. Held weakly and pruned once dropped.

use std::sync::{Arc, Mutex, Weak};

use crate::item::Item;

/// Called from background threads; implementations dispatch to their own
/// thread if they need to.
pub trait Listener: Send + Sync {
    /// The sequence grew or enumeration completed.
    fn added_item(&self) {}

    /// A background decode of `item` finished.
    fn loaded_item(&self, _item: &Arc<Item>) {}

    /// The item at the cursor finished decoding.
    fn loaded_current(&self) {}
}

#[derive(Default)]
pub struct Listeners {
    listeners: Mutex<Vec<Weak<dyn Listener>>>,
}

impl Listeners {
    pub fn add<L: Listener + 'static>(&self, listener: &Arc<L>) {
        let listener: Weak<L> = Arc::downgrade(listener);
        self.listeners.lock().unwrap().push(listener);
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn added_item(&self) {
        for listener in self.live() {
            listener.added_item();
        }
    }

    pub fn loaded_item(&self, item: &Arc<Item>) {
        for listener in self.live() {
            listener.loaded_item(item);
        }
    }

    pub fn loaded_current(&self) {
        for listener in self.live() {
            listener.loaded_current();
        }
    }

    // Callbacks run outside the lock so a listener may register another
    fn live(&self) -> Vec<Arc<dyn Listener>> {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}
