//! Single-flight cache slot for one decoded surface of an item.
//!
//! State machine: `Empty -> Loading -> {Loaded, Failed}`, `Loaded -> Empty`
//! on unload. An unload while `Loading` is remembered and the decode result
//! is discarded when it completes. `Failed` is terminal.
//!
//! The decode itself runs without holding the lock, so readers and the
//! scheduler never wait on a decoder.

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Empty,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug)]
enum State<T> {
    Empty,
    Loading { unload_requested: bool },
    Loaded(Arc<T>),
    Failed,
}

#[derive(Debug)]
pub struct Slot<T> {
    state: Mutex<State<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::Empty),
        }
    }
}

// Marks the slot failed if the decoder unwinds, so it can't stay Loading
struct LoadingGuard<'a, T> {
    slot: &'a Slot<T>,
    armed: bool,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            if let Ok(mut state) = self.slot.state.lock() {
                *state = State::Failed;
            }
        }
    }
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load with `decode` unless already loaded, failed or in progress.
    ///
    /// Returns whether the slot holds a value when this call returns. A
    /// caller that finds a decode already running gets `false` immediately.
    pub fn load<E>(&self, decode: impl FnOnce() -> Result<T, E>) -> Result<bool, E> {
        {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Loaded(_) => return Ok(true),
                State::Failed => return Ok(false),
                State::Loading { unload_requested } => {
                    // A newer request supersedes the pending unload
                    *unload_requested = false;
                    return Ok(false);
                }
                State::Empty => *state = State::Loading { unload_requested: false },
            }
        }

        let mut guard = LoadingGuard {
            slot: self,
            armed: true,
        };
        let result = decode();
        guard.armed = false;

        let mut state = self.state.lock().unwrap();
        let unload_requested = matches!(
            *state,
            State::Loading {
                unload_requested: true
            }
        );

        match result {
            Ok(value) if unload_requested => {
                drop(value);
                *state = State::Empty;
                Ok(false)
            }
            Ok(value) => {
                *state = State::Loaded(Arc::new(value));
                Ok(true)
            }
            Err(err) => {
                *state = State::Failed;
                Err(err)
            }
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        match &*self.state.lock().unwrap() {
            State::Loaded(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Drop the value, or ask an in-flight decode to discard its result.
    pub fn unload(&self) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Loaded(_) => *state = State::Empty,
            State::Loading { unload_requested } => *unload_requested = true,
            State::Empty | State::Failed => {}
        }
    }

    pub fn status(&self) -> SlotStatus {
        match &*self.state.lock().unwrap() {
            State::Empty => SlotStatus::Empty,
            State::Loading { .. } => SlotStatus::Loading,
            State::Loaded(_) => SlotStatus::Loaded,
            State::Failed => SlotStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, mpsc};
    use std::thread;

    #[test]
    fn load_get_unload() {
        let slot = Slot::new();
        assert_eq!(slot.status(), SlotStatus::Empty);
        assert!(slot.get().is_none());

        assert_eq!(slot.load(|| Ok::<_, ()>(7)), Ok(true));
        assert_eq!(slot.status(), SlotStatus::Loaded);
        assert_eq!(*slot.get().unwrap(), 7);

        // Already loaded: decode is not called again
        assert_eq!(slot.load(|| -> Result<i32, ()> { panic!("decoded twice") }), Ok(true));

        slot.unload();
        assert_eq!(slot.status(), SlotStatus::Empty);
        assert!(slot.get().is_none());
        assert_eq!(slot.load(|| Ok::<_, ()>(8)), Ok(true));
        assert_eq!(*slot.get().unwrap(), 8);
    }

    #[test]
    fn failure_is_sticky() {
        let slot = Slot::<i32>::new();
        let calls = AtomicUsize::new(0);
        let decode = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("corrupt")
        };

        assert_eq!(slot.load(decode), Err("corrupt"));
        assert_eq!(slot.status(), SlotStatus::Failed);
        assert_eq!(slot.load(decode), Ok(false));
        slot.unload();
        assert_eq!(slot.status(), SlotStatus::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unload_during_decode_discards_result() {
        let slot = Arc::new(Slot::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let loader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                slot.load(|| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<_, ()>(1)
                })
            })
        };

        started_rx.recv().unwrap();
        assert_eq!(slot.status(), SlotStatus::Loading);
        assert!(slot.get().is_none());
        slot.unload();
        release_tx.send(()).unwrap();

        assert_eq!(loader.join().unwrap(), Ok(false));
        assert_eq!(slot.status(), SlotStatus::Empty);
        assert!(slot.get().is_none());
    }

    #[test]
    fn reload_request_cancels_pending_unload() {
        let slot = Arc::new(Slot::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let loader = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                slot.load(|| {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<_, ()>(1)
                })
            })
        };

        started_rx.recv().unwrap();
        slot.unload();
        assert_eq!(slot.load(|| Ok::<_, ()>(2)), Ok(false));
        release_tx.send(()).unwrap();

        assert_eq!(loader.join().unwrap(), Ok(true));
        assert_eq!(*slot.get().unwrap(), 1);
    }

    #[test]
    fn concurrent_loads_decode_once() {
        const THREADS: usize = 8;
        let slot = Arc::new(Slot::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slot.load(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(std::time::Duration::from_millis(50));
                        Ok::<_, ()>(42)
                    })
                })
            })
            .collect();

        let loaded = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .filter(|&loaded| loaded)
            .count();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(loaded, 1);
        assert_eq!(*slot.get().unwrap(), 42);
    }

    #[test]
    fn panicking_decoder_marks_slot_failed() {
        let slot = Arc::new(Slot::<i32>::new());
        let result = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.load(|| -> Result<i32, ()> { panic!("decoder bug") })).join()
        };
        assert!(result.is_err());
        assert_eq!(slot.status(), SlotStatus::Failed);
    }
}
