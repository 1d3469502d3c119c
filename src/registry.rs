use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;

use crate::{AppointmentId, Status};

/// What a member needs from the parallel it reports to.
pub(crate) trait Appointed: Send + Sync {
    fn member_settled(&self, status: Status);
}

type Table = Mutex<HashMap<AppointmentId, Arc<dyn Appointed>>>;

/// Context object routing member outcomes to their pending [`Parallel`].
///
/// A parallel is registered when created and removed once it settles. The
/// registry keeps pending parallels alive, so dropping every handle to a
/// registry releases whatever is still waiting in it.
///
/// [`Parallel`]: crate::Parallel
#[derive(Clone, Default)]
pub struct Registry {
    table: Arc<Table>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.lock();
        let mut pending: Vec<_> = table.keys().copied().collect();
        pending.sort();
        f.debug_struct("Registry").field("pending", &pending).finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parallels still waiting on their members.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: AppointmentId) -> bool {
        self.lock().contains_key(&id)
    }

    /// The route members of parallel `id` use to reach it.
    pub(crate) fn appointment(&self, id: AppointmentId) -> Appointment {
        Appointment {
            id,
            table: Arc::downgrade(&self.table),
        }
    }

    pub(crate) fn insert(&self, id: AppointmentId, parallel: Arc<dyn Appointed>) {
        self.lock().insert(id, parallel);
        trace!(appointment = %id, "registered");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AppointmentId, Arc<dyn Appointed>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A member's weak route back to its parallel.
#[derive(Clone)]
pub(crate) struct Appointment {
    id: AppointmentId,
    table: Weak<Table>,
}

impl Appointment {
    pub(crate) fn id(&self) -> AppointmentId {
        self.id
    }

    pub(crate) fn lookup(&self) -> Option<Arc<dyn Appointed>> {
        let table = self.table.upgrade()?;
        let table = table.lock().unwrap_or_else(PoisonError::into_inner);
        table.get(&self.id).cloned()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.lookup().is_some()
    }

    /// Drop the registry entry. Returns whether this call removed it.
    pub(crate) fn release(&self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let removed = table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        removed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Appointed for Counter {
        fn member_settled(&self, _status: Status) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_lookup_and_release() {
        let registry = Registry::new();
        let counter = Arc::new(Counter::default());
        let id = AppointmentId::next();
        let appointment = registry.appointment(id);
        assert!(!appointment.is_live());
        registry.insert(id, counter.clone());
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        appointment.lookup().unwrap().member_settled(Status::Success);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert!(appointment.release());
        assert!(!appointment.release());
        assert!(!appointment.is_live());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dropped_registry_degrades_silently() {
        let registry = Registry::new();
        let id = AppointmentId::next();
        registry.insert(id, Arc::new(Counter::default()));
        let appointment = registry.appointment(id);
        drop(registry);
        assert!(appointment.lookup().is_none());
        assert!(!appointment.release());
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = Registry::new();
        let b = Registry::new();
        let id = AppointmentId::next();
        a.insert(id, Arc::new(Counter::default()));
        assert!(a.contains(id));
        assert!(!b.contains(id));
        assert_eq!(format!("{b:?}"), "Registry { pending: [] }");
    }
}
