//! # Change Listener Bus
//!
//! Fan-out of commit notifications. A listener registered with
//! [`ChangeBus::on_change`] receives `(source, new_clock)` for every
//! transaction that advanced the room clock, and for nothing else: no-op
//! transactions and rolled-back transactions are silent.
//!
//! ## Delivery contract
//!
//! - Delivery is synchronous, inside the committing `transaction` call,
//!   after the mutations are durable.
//! - Listeners run in registration order.
//! - Disposing is idempotent; a dispose issued while a notification is being
//!   delivered takes effect for subsequent notifications, never the
//!   in-flight one.
//! - Dropping a [`ListenerGuard`] does not unsubscribe; only
//!   [`ListenerGuard::dispose`] does.
//!
//! The whole store is single-threaded by contract (the host serializes all
//! access to a room), so the bus shares its state through `Rc<RefCell<…>>`
//! rather than locks.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::types::Clock;

/// What listeners receive: the committing transaction's source tag and the
/// clock it advanced the room to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    /// Caller-supplied tag identifying the logical origin of the
    /// transaction, passed through for routing.
    pub source: String,

    /// The room clock after the commit.
    pub new_clock: Clock,
}

type Listener = Box<dyn FnMut(&ChangeNotification)>;

struct ListenerSlot {
    id: u64,
    /// `None` while the callback is checked out for an in-flight delivery.
    callback: Option<Listener>,
}

#[derive(Default)]
struct BusInner {
    slots: Vec<ListenerSlot>,
    next_id: u64,
    delivering: bool,
    pending_removals: Vec<u64>,
}

impl BusInner {
    fn slot_index(&self, id: u64) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    fn remove(&mut self, id: u64) {
        if let Some(index) = self.slot_index(id) {
            self.slots.remove(index);
        }
    }
}

/// The set of registered listeners, in registration order.
#[derive(Default)]
pub(crate) struct ChangeBus {
    inner: Rc<RefCell<BusInner>>,
}

impl ChangeBus {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its disposer.
    pub(crate) fn on_change(&self, callback: impl FnMut(&ChangeNotification) + 'static) -> ListenerGuard {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.slots.push(ListenerSlot {
            id,
            callback: Some(Box::new(callback)),
        });
        ListenerGuard {
            inner: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Delivers one notification to every listener registered at the time
    /// the delivery starts.
    ///
    /// Each callback is checked out of its slot while it runs, so the bus is
    /// never borrowed during user code; listeners may register or dispose
    /// freely from inside a callback.
    pub(crate) fn notify(&self, notification: &ChangeNotification) {
        let ids: Vec<u64> = {
            let mut inner = self.inner.borrow_mut();
            inner.delivering = true;
            inner.slots.iter().map(|slot| slot.id).collect()
        };

        for id in ids {
            let checked_out = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .slot_index(id)
                    .and_then(|index| inner.slots[index].callback.take())
            };
            if let Some(mut callback) = checked_out {
                callback(notification);
                let mut inner = self.inner.borrow_mut();
                if let Some(index) = inner.slot_index(id) {
                    inner.slots[index].callback = Some(callback);
                }
            }
        }

        let mut inner = self.inner.borrow_mut();
        inner.delivering = false;
        let removals = std::mem::take(&mut inner.pending_removals);
        for id in removals {
            inner.remove(id);
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.inner.borrow().slots.len()
    }
}

/// Disposer for a registered listener.
///
/// Holds only a weak handle to the bus: disposing after the store is gone is
/// a quiet no-op, and dropping the guard leaves the listener registered.
pub struct ListenerGuard {
    inner: Weak<RefCell<BusInner>>,
    id: u64,
}

impl ListenerGuard {
    /// Unsubscribes the listener. Idempotent; double-dispose is a no-op.
    pub fn dispose(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let mut inner = inner.borrow_mut();
        if inner.delivering {
            inner.pending_removals.push(self.id);
        } else {
            inner.remove(self.id);
        }
    }
}
