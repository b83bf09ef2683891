//! Shared ownership of the native objects that back array storage.
//!
//! Host arrays and native views hold an [`OwnerHandle`] to whatever owns their memory. The
//! handle is atomically reference counted, so views released on different threads never
//! race on the owner's liveness.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Reference-counted handle to the native object that owns some storage.
#[derive(Clone)]
pub struct OwnerHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl OwnerHandle {
    /// Take ownership of `value`.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self { inner: Arc::new(value) }
    }

    /// Share an object that is already reference counted.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self { inner: value }
    }

    /// The owner as its concrete type, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    /// Number of live handles (and other `Arc`s) keeping the owner alive.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles keep the same object alive.
    pub fn ptr_eq(&self, other: &OwnerHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakOwner {
        WeakOwner { inner: Arc::downgrade(&self.inner) }
    }
}

impl fmt::Debug for OwnerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerHandle")
            .field("strong_count", &self.strong_count())
            .finish()
    }
}

/// Non-owning reference to an owner.
#[derive(Clone)]
pub struct WeakOwner {
    inner: Weak<dyn Any + Send + Sync>,
}

impl WeakOwner {
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Re-acquire the owner.
    ///
    /// # Panics
    /// Panics if the owner has been released. Continuing would read freed memory, so this is
    /// a fatal programming error rather than a recoverable one.
    pub fn upgrade(&self) -> OwnerHandle {
        match self.inner.upgrade() {
            Some(inner) => OwnerHandle { inner },
            None => released_owner(),
        }
    }
}

impl fmt::Debug for WeakOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakOwner").field("alive", &self.is_alive()).finish()
    }
}

#[cold]
fn released_owner() -> ! {
    panic!("UseOfReleasedOwner: storage owner was released while a view still referenced it")
}

/// Things that can be tied to an owner: host arrays and native views.
pub trait Owned {
    fn owner(&self) -> Option<&OwnerHandle>;
    fn set_owner(&mut self, owner: OwnerHandle);
}

/// Tie `target` to `owner`, so the owner lives at least as long as `target`.
pub fn bind<V: Owned>(target: &mut V, owner: &OwnerHandle) -> OwnerHandle {
    target.set_owner(owner.clone());
    owner.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Holder(Option<OwnerHandle>);

    impl Owned for Holder {
        fn owner(&self) -> Option<&OwnerHandle> { self.0.as_ref() }
        fn set_owner(&mut self, owner: OwnerHandle) { self.0 = Some(owner); }
    }

    #[test]
    fn bind_keeps_owner_alive() {
        let owner = OwnerHandle::new(vec![1.0f64; 4]);
        let weak = owner.downgrade();
        let mut holder = Holder(None);
        let returned = bind(&mut holder, &owner);
        assert!(returned.ptr_eq(&owner));
        assert_eq!(owner.strong_count(), 3);
        drop(owner);
        drop(returned);
        assert!(weak.is_alive());
        assert!(holder.owner().is_some());
        drop(holder);
        assert!(!weak.is_alive());
    }

    #[test]
    fn downcast_recovers_concrete_type() {
        let owner = OwnerHandle::new(String::from("member"));
        assert_eq!(owner.downcast::<String>().as_deref().map(String::as_str), Some("member"));
        assert!(owner.downcast::<u32>().is_none());
    }

    #[test]
    #[should_panic(expected = "UseOfReleasedOwner")]
    fn upgrading_released_owner_is_fatal() {
        let owner = OwnerHandle::new(0u8);
        let weak = owner.downgrade();
        drop(owner);
        let _ = weak.upgrade();
    }

    #[test]
    fn counts_are_shared_across_threads() {
        let owner = OwnerHandle::new([0u64; 8]);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let h = owner.clone();
                std::thread::spawn(move || drop(h))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(owner.strong_count(), 1);
    }
}
