//! Ordered callback registry with caller-held subscription handles.
//!
//! A [`CallbackRegistry`] keeps interested parties in registration order and
//! notifies them synchronously on the thread that produced the event. It is
//! used by the card decoder (notifying with a
//! [`CardIdentifier`](crate::CardIdentifier)) and by the messaging client's
//! per-topic handler lists.
//!
//! # Semantics
//!
//! - Registering the same closure twice creates two independent
//!   registrations; both are notified.
//! - [`Subscription::unregister`] removes exactly the registration it was
//!   returned for. Removing an already-removed registration is a no-op.
//! - A callback that returns `Err` or panics is logged and skipped; the
//!   remaining callbacks still run.
//! - Notification iterates over a snapshot taken under the lock, so callbacks
//!   may register or unregister (even themselves) without deadlocking.
//!
//! # Examples
//!
//! ```
//! use consultease_core::registry::CallbackRegistry;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let registry: CallbackRegistry<String> = CallbackRegistry::new("scans");
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = seen.clone();
//! let subscription = registry.register(move |_uid: &String| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok(())
//! });
//!
//! registry.notify(&"04ABCDEF".to_string());
//! subscription.unregister();
//! registry.notify(&"04ABCDEF".to_string());
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::Mutex;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{error, trace};

/// Boxed subscriber callable.
pub type Callback<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

/// Opaque identifier of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of one notification round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Callbacks that were invoked.
    pub invoked: usize,

    /// Callbacks that returned an error or panicked.
    pub failed: usize,
}

impl NotifyReport {
    /// Returns `true` if every invoked callback succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

struct Entry<T> {
    id: SubscriptionId,
    callback: Callback<T>,
}

struct RegistryInner<T> {
    label: &'static str,
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry<T>>>,
}

/// Type-erased removal, so a [`Subscription`] does not carry the event type.
trait Detach: Send + Sync {
    fn detach(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

impl<T: 'static> Detach for RegistryInner<T> {
    fn detach(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                entries.remove(index);
                trace!(registry = self.label, subscription = %id, "Callback unregistered");
                true
            }
            None => false,
        }
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.lock().iter().any(|entry| entry.id == id)
    }
}

/// Ordered set of subscribers notified synchronously.
///
/// Cloning is cheap and yields a handle to the same registry.
pub struct CallbackRegistry<T> {
    inner: Arc<RegistryInner<T>>,
}

impl<T> Clone for CallbackRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for CallbackRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("label", &self.inner.label)
            .field("len", &self.inner.entries.lock().len())
            .finish()
    }
}

impl<T: 'static> CallbackRegistry<T> {
    /// Create an empty registry. The label only appears in log records.
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                label,
                next_id: AtomicU64::new(1),
                entries: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append a callback and return the handle that removes it again.
    pub fn register<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register_arc(Arc::new(callback))
    }

    /// Append an already shared callback.
    ///
    /// The same `Arc` may be registered several times; each call yields its
    /// own registration.
    pub fn register_arc(&self, callback: Callback<T>) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.entries.lock().push(Entry { id, callback });
        trace!(registry = self.inner.label, subscription = %id, "Callback registered");

        let weak: Weak<RegistryInner<T>> = Arc::downgrade(&self.inner);
        let registry: Weak<dyn Detach> = weak;
        Subscription { id, registry }
    }

    /// Remove a registration by id. Unknown ids are ignored.
    ///
    /// Returns `true` if a registration was removed.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        self.inner.detach(id)
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Invoke every callback in registration order on the current thread.
    ///
    /// Failures are logged per callback and never stop the round.
    pub fn notify(&self, value: &T) -> NotifyReport {
        let snapshot: Vec<(SubscriptionId, Callback<T>)> = self
            .inner
            .entries
            .lock()
            .iter()
            .map(|entry| (entry.id, Arc::clone(&entry.callback)))
            .collect();

        let mut report = NotifyReport::default();

        for (id, callback) in snapshot {
            report.invoked += 1;

            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(
                        registry = self.inner.label,
                        subscription = %id,
                        error = %e,
                        "Callback failed"
                    );
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(
                        registry = self.inner.label,
                        subscription = %id,
                        panic = panic_message(&*panic),
                        "Callback panicked"
                    );
                }
            }
        }

        report
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Caller-held handle for one registration.
///
/// Dropping the handle keeps the registration alive; call
/// [`unregister`](Subscription::unregister) to remove it. The handle does not
/// keep the registry alive.
#[must_use = "dropping a Subscription leaves the callback registered with no way to remove it"]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<dyn Detach>,
}

impl Subscription {
    /// Identifier of this registration.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns `true` while the registration is still present.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.contains(self.id))
    }

    /// Remove exactly this registration.
    ///
    /// Returns `true` if it was still registered.
    pub fn unregister(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.detach(self.id),
            None => false,
        }
    }

    /// Forget the handle; the callback stays registered for the registry's
    /// lifetime.
    pub fn detach(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
