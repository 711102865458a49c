//! Thread-safe ordered store of recorded actions.

use crate::Action;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Canonical owner of the recorded sequence.
///
/// Every read hands out an independent copy, so a snapshot taken for playback
/// is unaffected by appends coming from the capture thread.
#[derive(Debug, Default)]
pub struct ActionRepository {
    actions: Mutex<Vec<Action>>,
}

pub type SharedRepository = Arc<ActionRepository>;

impl ActionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRepository {
        Arc::new(Self::new())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Action>> {
        // Pushes and clears never leave the Vec half-written.
        self.actions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one action at the end of the sequence.
    pub fn add(&self, action: Action) {
        self.lock().push(action);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the current sequence in insertion order.
    pub fn snapshot(&self) -> Vec<Action> {
        self.lock().clone()
    }

    /// Replace the whole sequence (used by load).
    pub fn replace(&self, actions: &[Action]) {
        let mut guard = self.lock();
        guard.clear();
        guard.extend_from_slice(actions);
        debug!(count = guard.len(), "repository replaced");
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Span between the first and the last recorded action.
    pub fn duration(&self) -> Duration {
        crate::sequence_duration(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MouseButton;
    use std::thread;

    #[test]
    fn test_snapshot_is_independent_copy() {
        let repo = ActionRepository::new();
        repo.add(Action::keyboard(Duration::ZERO, 0x41, true));

        let mut snapshot = repo.snapshot();
        snapshot.clear();
        repo.add(Action::keyboard(Duration::from_millis(5), 0x41, false));

        assert!(snapshot.is_empty());
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_replace_and_duration() {
        let repo = ActionRepository::new();
        assert_eq!(repo.duration(), Duration::ZERO);

        repo.replace(&[
            Action::mouse(Duration::from_millis(100), 1, 1, MouseButton::Move, false, 0),
            Action::mouse(Duration::from_millis(350), 2, 2, MouseButton::Left, true, 0),
        ]);
        assert_eq!(repo.len(), 2);
        assert_eq!(repo.duration(), Duration::from_millis(250));

        repo.clear();
        assert!(repo.is_empty());
    }

    #[test]
    fn test_concurrent_appends_preserve_every_action() {
        let repo = ActionRepository::shared();
        let writers: Vec<_> = (0..4)
            .map(|n| {
                let repo = repo.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        repo.add(Action::keyboard(Duration::from_micros(i), n, true));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(repo.len(), 1000);
    }
}
