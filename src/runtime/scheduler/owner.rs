//! Owner liveness tokens
//!
//! An owner (an editor window, a scene object, a session) holds an
//! [`OwnerToken`] and passes it to `start_owned`. The scheduler keeps only a
//! weak reference. The owner counts as dead once every clone of its token is
//! dropped, or as soon as [`OwnerToken::invalidate`] is called. Owners whose
//! token outlives their logical lifetime must call `invalidate` on teardown;
//! nothing else tells the scheduler they are gone.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique owner identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

impl std::fmt::Display for OwnerId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "Owner({})", self.0)
    }
}

#[derive(Debug)]
struct OwnerState {
    id: OwnerId,
    label: String,
    alive: Cell<bool>,
}

/// Liveness token held by a task owner.
#[derive(Debug, Clone)]
pub struct OwnerToken {
    state: Rc<OwnerState>,
}

impl OwnerToken {
    /// Create a live token. `label` only shows up in logs and errors.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            state: Rc::new(OwnerState {
                id: OwnerId(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed)),
                label: label.into(),
                alive: Cell::new(true),
            }),
        }
    }

    /// Get the owner ID.
    #[inline]
    pub fn id(&self) -> OwnerId {
        self.state.id
    }

    /// Get the owner label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.state.label
    }

    /// Whether the owner is still alive.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state.alive.get()
    }

    /// Mark the owner dead. Tasks started for it are dropped on the next tick.
    #[inline]
    pub fn invalidate(&self) {
        self.state.alive.set(false);
    }

    pub(crate) fn downgrade(&self) -> OwnerRef {
        OwnerRef {
            id: self.state.id,
            state: Rc::downgrade(&self.state),
        }
    }
}

/// Non-owning reference the scheduler keeps per owned task.
#[derive(Debug, Clone)]
pub(crate) struct OwnerRef {
    id: OwnerId,
    state: Weak<OwnerState>,
}

impl OwnerRef {
    #[inline]
    pub(crate) fn id(&self) -> OwnerId {
        self.id
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.state
            .upgrade()
            .map_or(false, |state| state.alive.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_ids_are_unique() {
        let a = OwnerToken::new("a");
        let b = OwnerToken::new("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_owner_ref_dies_with_last_token() {
        let token = OwnerToken::new("window");
        let clone = token.clone();
        let weak = token.downgrade();
        drop(token);
        assert!(weak.is_alive());
        drop(clone);
        assert!(!weak.is_alive());
    }

    #[test]
    fn test_owner_ref_dies_on_invalidate() {
        let token = OwnerToken::new("window");
        let weak = token.downgrade();
        token.invalidate();
        assert!(!token.is_alive());
        assert!(!weak.is_alive());
        assert_eq!(weak.id(), token.id());
    }
}
