//! Outer work queue with claim tracking.
//!
//! Pending units and claimed (in-flight) units live under one mutex so a
//! refresh can never enqueue a unit a worker has just taken.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct QueueState<U> {
    pending: VecDeque<U>,
    queued: HashSet<U>,
    claimed: HashSet<U>,
}

/// FIFO of units awaiting a worker plus the set of units being processed.
#[derive(Debug)]
pub struct WorkQueue<U> {
    state: Mutex<QueueState<U>>,
}

impl<U: Clone + Eq + Hash> Default for WorkQueue<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Clone + Eq + Hash> WorkQueue<U> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                queued: HashSet::new(),
                claimed: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<U>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append every unit that is neither pending nor claimed. Returns how
    /// many were added.
    pub fn extend_new(&self, units: impl IntoIterator<Item = U>) -> usize {
        let mut state = self.lock();
        let mut added = 0;
        for unit in units {
            if state.claimed.contains(&unit) || state.queued.contains(&unit) {
                continue;
            }
            state.queued.insert(unit.clone());
            state.pending.push_back(unit);
            added += 1;
        }
        added
    }

    /// Take the next pending unit and mark it claimed. `None` means the
    /// queue is exhausted.
    pub fn claim_next(&self) -> Option<U> {
        let mut state = self.lock();
        let unit = state.pending.pop_front()?;
        state.queued.remove(&unit);
        state.claimed.insert(unit.clone());
        Some(unit)
    }

    /// Forget a claimed unit once its worker is done with it.
    pub fn release(&self, unit: &U) {
        self.lock().claimed.remove(unit);
    }

    /// Remove and return every pending unit.
    pub fn drain_pending(&self) -> Vec<U> {
        let mut state = self.lock();
        state.queued.clear();
        state.pending.drain(..).collect()
    }

    /// Number of pending units.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    #[cfg(test)]
    fn claimed(&self) -> Vec<U> {
        self.lock().claimed.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_and_claims() {
        let q = WorkQueue::new();
        assert_eq!(q.extend_new([3, 1, 2]), 3);
        assert_eq!(q.claim_next(), Some(3));
        assert_eq!(q.claimed(), vec![3]);
        assert_eq!(q.pending_len(), 2);
        q.release(&3);
        assert!(q.claimed().is_empty());
    }

    #[test]
    fn refresh_skips_pending_and_claimed() {
        let q = WorkQueue::new();
        q.extend_new([1, 2, 3]);
        let claimed = q.claim_next().unwrap();
        assert_eq!(claimed, 1);

        let added = q.extend_new([1, 2, 3, 4, 4]);
        assert_eq!(added, 1);
        assert_eq!(q.drain_pending(), vec![2, 3, 4]);
        assert_eq!(q.claim_next(), None);
    }

    #[test]
    fn released_unit_can_be_requeued() {
        let q = WorkQueue::new();
        q.extend_new(["a"]);
        let unit = q.claim_next().unwrap();
        q.release(&unit);
        assert_eq!(q.extend_new(["a"]), 1);
    }
}
