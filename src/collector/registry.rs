use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::container::ContainerID;

/// Concurrency-safe set of container ids that currently have an active
/// monitor cycle.
///
/// An id is present exactly between a successful [`register`] and the
/// matching [`unregister`]. The check-and-insert is a single atomic step per
/// id, so two triggers observing the same container near-simultaneously (the
/// startup enumeration and a lifecycle event) cannot both win; attempts for
/// different ids do not contend.
///
/// [`register`]: Registry::register
/// [`unregister`]: Registry::unregister
#[derive(Debug, Default)]
pub struct Registry {
    active: DashMap<ContainerID, ()>,
}

impl Registry {
    /// Marks the given container as being monitored.
    ///
    /// Returns `false` without any other effect if the id is already
    /// registered.
    pub fn register(&self, id: &ContainerID) -> bool {
        match self.active.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(());
                true
            }
        }
    }

    /// Removes the given container unconditionally.
    ///
    /// Removing an absent id is a no-op.
    pub fn unregister(&self, id: &ContainerID) {
        self.active.remove(id.as_str());
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn id(raw: &str) -> ContainerID {
        ContainerID::new(raw).unwrap()
    }

    #[test]
    fn test_register_is_exclusive() {
        let registry = Registry::default();
        assert!(registry.register(&id("abc")));
        assert!(!registry.register(&id("abc")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_absent_id_is_noop() {
        let registry = Registry::default();
        registry.unregister(&id("missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_after_unregister_succeeds() {
        let registry = Registry::default();
        assert!(registry.register(&id("abc")));
        registry.unregister(&id("abc"));
        assert!(registry.register(&id("abc")));
    }

    #[test]
    fn test_independent_ids_do_not_collide() {
        let registry = Registry::default();
        assert!(registry.register(&id("abc")));
        assert!(registry.register(&id("def")));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_registration_has_one_winner() {
        let registry = Arc::new(Registry::default());
        let wins = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let wins = Arc::clone(&wins);
                std::thread::spawn(move || {
                    if registry.register(&id("contested")) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }
}
