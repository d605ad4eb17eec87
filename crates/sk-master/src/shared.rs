//! A pattern shared between editors and readers.
//!
//! Edits go to a locked working copy. When an edit finishes, the result is
//! published as an immutable snapshot that exporters and other readers
//! load without taking the lock.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use sk_ir::Sequence;

pub struct SharedSequence {
    working: Mutex<Sequence>,
    snapshot: ArcSwap<Sequence>,
}

impl SharedSequence {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(sequence.clone()),
            working: Mutex::new(sequence),
        }
    }

    /// Run `f` on the working copy and publish the result.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Sequence) -> R) -> R {
        let mut working = self.working.lock();
        let result = f(&mut working);
        self.snapshot.store(Arc::new(working.clone()));
        result
    }

    /// Read the working copy under the lock without publishing.
    pub fn read<R>(&self, f: impl FnOnce(&Sequence) -> R) -> R {
        f(&self.working.lock())
    }

    /// The last published state.
    pub fn snapshot(&self) -> Arc<Sequence> {
        self.snapshot.load_full()
    }

    pub fn is_modified(&self) -> bool {
        self.working.lock().events.is_modified()
    }
}

impl std::fmt::Debug for SharedSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("SharedSequence")
            .field("name", &snapshot.info.name)
            .field("events", &snapshot.events.len())
            .field("triggers", &snapshot.triggers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_follows_finished_edits() {
        let shared = SharedSequence::new(Sequence::new("a", 1));
        let before = shared.snapshot();
        let added = shared.edit(|seq| seq.add_note(0, 96, 60, 100));
        assert!(added);
        assert!(before.events.is_empty());
        assert_eq!(shared.snapshot().events.len(), 2);
        assert!(shared.is_modified());
    }

    #[test]
    fn readers_never_see_half_an_edit() {
        let shared = Arc::new(SharedSequence::new(Sequence::new("a", 4)));
        std::thread::scope(|s| {
            let writer = Arc::clone(&shared);
            s.spawn(move || {
                for i in 0..100 {
                    writer.edit(|seq| seq.add_note(i * 16, 8, 60, 100));
                }
            });
            for _ in 0..100 {
                let snap = shared.snapshot();
                assert_eq!(snap.events.len() % 2, 0);
            }
        });
        assert_eq!(shared.snapshot().events.len(), 200);
    }
}
