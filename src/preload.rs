//! Preload scheduler: which items to keep decoded around the cursor.
//!
//! The window is computed by stepping alternately forward and backward from
//! the cursor. Near a boundary the unused budget of the exhausted side goes
//! to the other one, so up to `2 * window` neighbours are kept either way.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

use crate::item::Item;

// ---------------------------------------------------------------------------
// Window planning
// ---------------------------------------------------------------------------

/// Target set for one cursor position, in load priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub indices: Vec<usize>,
    /// The forward side ran into the end of the sequence before claiming
    /// its share, so appending items would change the window.
    pub starved: bool,
}

pub fn plan(len: usize, cursor: usize, window: usize) -> Window {
    if cursor >= len {
        return Window {
            indices: Vec::new(),
            starved: true,
        };
    }

    let budget = window.saturating_mul(2);
    let mut indices = vec![cursor];
    let mut forward = cursor + 1;
    let mut backward = cursor;
    let mut claimed = 0;
    let mut claimed_forward = 0;

    while claimed < budget {
        let mut progressed = false;
        if forward < len {
            indices.push(forward);
            forward += 1;
            claimed += 1;
            claimed_forward += 1;
            progressed = true;
        }
        if backward > 0 && claimed < budget {
            backward -= 1;
            indices.push(backward);
            claimed += 1;
            progressed = true;
        }
        if !progressed {
            break;
        }
    }

    Window {
        indices,
        starved: claimed_forward < window || claimed < budget,
    }
}

// ---------------------------------------------------------------------------
// Shared queue and resident set
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PreloadState {
    queue: VecDeque<(usize, Arc<Item>)>,
    resident: BTreeMap<usize, Arc<Item>>,
    in_flight: HashMap<usize, Arc<Item>>,
    target: HashSet<usize>,
    starved: bool,
    shutdown: bool,
}

/// A popped queue entry. `owner` is false when another worker already has
/// the same index in flight.
#[derive(Debug)]
pub struct Job {
    pub index: usize,
    pub item: Arc<Item>,
    owner: bool,
}

/// Queue and resident set shared by the collection and the loader pool.
#[derive(Debug, Default)]
pub struct Prefetch {
    state: Mutex<PreloadState>,
    loading_required: Condvar,
}

impl Prefetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the target window, evict what fell out of it and queue
    /// what is missing.
    pub fn recompute(&self, items: &[Arc<Item>], cursor: usize, window: usize) {
        let start_time = Instant::now();
        let plan = plan(items.len(), cursor, window);

        let mut state = self.state.lock().unwrap();
        let state = &mut *state;
        state.target = plan.indices.iter().copied().collect();
        state.starved = plan.starved;

        let target = &state.target;
        let mut evicted = 0;
        state.resident.retain(|index, item| {
            let keep = target.contains(index);
            if !keep {
                item.unload_primary();
                evicted += 1;
            }
            keep
        });
        for (index, item) in &state.in_flight {
            if !target.contains(index) {
                item.unload_primary();
            }
        }

        state.queue = plan
            .indices
            .iter()
            .filter(|&index| !state.resident.contains_key(index))
            .map(|&index| (index, Arc::clone(&items[index])))
            .collect();

        if !state.queue.is_empty() {
            self.loading_required.notify_all();
        }

        log::debug!(
            "Preload at {}: {} targets, {} resident, {} queued, {} evicted in {:.1}us",
            cursor,
            plan.indices.len(),
            state.resident.len(),
            state.queue.len(),
            evicted,
            start_time.elapsed().as_secs_f64() * 1e6
        );
    }

    pub fn is_starved(&self) -> bool {
        self.state.lock().unwrap().starved
    }

    /// Block until there is something to load. `None` once shut down.
    pub fn next_job(&self) -> Option<Job> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some((index, item)) = state.queue.pop_front() {
                let owner = !state.in_flight.contains_key(&index);
                if owner {
                    state.in_flight.insert(index, Arc::clone(&item));
                }
                return Some(Job { index, item, owner });
            }
            state = self.loading_required.wait(state).unwrap();
        }
    }

    /// Record the outcome of a job and keep the item only if still wanted.
    pub fn finish(&self, job: &Job, loaded: bool) {
        let mut state = self.state.lock().unwrap();
        if job.owner {
            state.in_flight.remove(&job.index);
        }
        if loaded {
            settle(&mut state, job.index, &job.item);
        }
    }

    /// Register an item loaded outside the pool.
    pub fn settle(&self, index: usize, item: &Arc<Item>) {
        settle(&mut self.state.lock().unwrap(), index, item);
    }

    pub fn resident(&self) -> Vec<usize> {
        self.state.lock().unwrap().resident.keys().copied().collect()
    }

    pub fn queued(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state.queue.iter().map(|(index, _)| *index).collect()
    }

    /// Wake every worker so it sees the shutdown flag. Also runs from
    /// `Drop`, so a poisoned lock is taken over rather than unwrapped.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.shutdown = true;
        state.queue.clear();
        self.loading_required.notify_all();
    }
}

fn settle(state: &mut PreloadState, index: usize, item: &Arc<Item>) {
    if state.target.contains(&index) {
        state.resident.insert(index, Arc::clone(item));
    } else {
        item.unload_primary();
    }
}
