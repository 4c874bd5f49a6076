//! Pending-operation queue and ready-set resolution.
//!
//! Descriptors wait here until their dependencies are satisfied. Dispatch
//! order among ready descriptors is descending priority, with submission
//! order breaking ties (earlier submission wins), so the ordering is stable
//! for equal priorities.

use std::collections::HashSet;

use super::operation::OperationDescriptor;

/// A pending descriptor tagged with its submission sequence number.
#[derive(Debug, Clone)]
struct PendingEntry {
    seq: u64,
    descriptor: OperationDescriptor,
}

/// Priority/dependency-aware queue of not-yet-started operations.
///
/// The queue never inspects running state: readiness is decided purely
/// against the completed and failed name sets the caller passes in. A
/// descriptor with a dependency in the failed set can never become ready
/// and stays queued until the caller drains it.
#[derive(Debug, Default)]
pub struct OperationQueue {
    entries: Vec<PendingEntry>,
    next_seq: u64,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor, assigning it the next submission sequence.
    pub fn push(&mut self, descriptor: OperationDescriptor) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(PendingEntry { seq, descriptor });
    }

    /// Number of pending descriptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns the highest-priority ready descriptor.
    ///
    /// A descriptor is ready when every dependency name is in `completed`.
    /// `failed` and `completed` are disjoint, so a failed dependency keeps
    /// its dependents queued. Returns `None` when nothing is dispatchable;
    /// the caller then either waits for more completions or concludes the
    /// batch is deadlocked.
    pub fn next_ready(
        &mut self,
        completed: &HashSet<String>,
        failed: &HashSet<String>,
    ) -> Option<OperationDescriptor> {
        debug_assert!(completed.is_disjoint(failed));

        let mut best: Option<usize> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let ready = entry
                .descriptor
                .dependencies
                .iter()
                .all(|dep| completed.contains(dep));
            if !ready {
                continue;
            }

            best = match best {
                None => Some(index),
                Some(current) => {
                    let chosen = &self.entries[current];
                    let candidate_wins = entry.descriptor.priority > chosen.descriptor.priority
                        || (entry.descriptor.priority == chosen.descriptor.priority
                            && entry.seq < chosen.seq);
                    if candidate_wins {
                        Some(index)
                    } else {
                        Some(current)
                    }
                }
            };
        }

        best.map(|index| self.entries.remove(index).descriptor)
    }

    /// Removes every pending descriptor, in submission order.
    ///
    /// Used when the batch terminates with work still queued (deadlock or
    /// cancellation) so each stranded descriptor can be reported.
    pub fn drain(&mut self) -> Vec<OperationDescriptor> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.descriptor).collect()
    }
}
