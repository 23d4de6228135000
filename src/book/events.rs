//! Event fan-out.
//!
//! A [`EventBus`] is a generic per-entity subscriber registry: callbacks are
//! registered against a handle, and `notify` invokes every live callback
//! synchronously, in registration order, passing the emitting entity alongside
//! the event. A callback that panics is isolated: the panic is logged and the
//! remaining subscribers still receive the event.
//!
//! The registry is snapshot-iterated, so a callback may unsubscribe (itself or
//! another subscriber) in the middle of a delivery pass; an unsubscribed
//! callback is never invoked again, including later in the same pass.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::page::Page;

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<S, E> = Arc<dyn Fn(&S, &E) + Send + Sync>;

/// Generic subscribe/unsubscribe/notify fan-out for one entity
pub struct EventBus<S, E> {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback<S, E>)>>,
}

impl<S, E> EventBus<S, E> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback; the returned handle is the only way to remove it
    pub fn subscribe(
        &self,
        callback: impl Fn(&S, &E) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription. No-op if the handle is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|(sid, _)| *sid != id);
    }

    /// Deliver an event to every live subscriber, in registration order
    pub fn notify(&self, entity: &S, event: &E) {
        let snapshot: Vec<(SubscriptionId, Callback<S, E>)> =
            self.subscribers.lock().unwrap().clone();

        for (id, callback) in snapshot {
            // Re-check membership: a previous callback may have removed this one
            let live = self
                .subscribers
                .lock()
                .unwrap()
                .iter()
                .any(|(sid, _)| *sid == id);
            if !live {
                continue;
            }

            if catch_unwind(AssertUnwindSafe(|| callback(entity, event))).is_err() {
                tracing::warn!("subscriber callback panicked during event delivery");
            }
        }
    }
}

impl<S, E> Default for EventBus<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a book reports to its subscribers
#[derive(Debug, Clone)]
pub enum BookEvent {
    /// A load or unarchive percentage changed
    Progress { loading: f64, unarchiving: f64 },
    /// A buffer is available and extraction is about to start
    ReadyToExtract,
    /// One page is ready, in final sorted order; `sequence` is 1-based
    PageReady { page: Arc<Page>, sequence: usize },
    /// Some entries failed page construction and were dropped (non-fatal)
    PagesDropped { count: usize },
    /// The load attempt is complete; always the last event
    ExtractionComplete { page_count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBus = EventBus<String, u32>;

    #[test]
    fn delivers_in_registration_order() {
        let bus = TestBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.subscribe(move |_, event| seen.lock().unwrap().push((tag, *event)));
        }

        bus.notify(&"book".to_string(), &7);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 7), ("second", 7), ("third", 7)]
        );
    }

    #[test]
    fn unsubscribe_is_a_noop_for_unknown_handles() {
        let bus = TestBus::new();
        let id = bus.subscribe(|_, _| {});
        bus.unsubscribe(id);
        bus.unsubscribe(id);
        bus.notify(&String::new(), &0);
    }

    #[test]
    fn unsubscribed_callback_gets_no_further_events() {
        let bus = Arc::new(TestBus::new());
        let calls = Arc::new(Mutex::new(0u32));
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let id = {
            let bus = bus.clone();
            let calls = calls.clone();
            let slot = slot.clone();
            bus.clone().subscribe(move |_, _| {
                *calls.lock().unwrap() += 1;
                // Drop ourselves mid-delivery
                if let Some(id) = *slot.lock().unwrap() {
                    bus.unsubscribe(id);
                }
            })
        };
        *slot.lock().unwrap() = Some(id);

        bus.notify(&String::new(), &1);
        bus.notify(&String::new(), &2);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn earlier_callback_can_remove_a_later_one_within_the_same_pass() {
        let bus = Arc::new(TestBus::new());
        let second_calls = Arc::new(Mutex::new(0u32));
        let victim: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        {
            let bus = bus.clone();
            let victim = victim.clone();
            bus.clone().subscribe(move |_, _| {
                if let Some(id) = *victim.lock().unwrap() {
                    bus.unsubscribe(id);
                }
            });
        }
        let second = {
            let second_calls = second_calls.clone();
            bus.subscribe(move |_, _| *second_calls.lock().unwrap() += 1)
        };
        *victim.lock().unwrap() = Some(second);

        bus.notify(&String::new(), &1);
        assert_eq!(*second_calls.lock().unwrap(), 0);
    }

    #[test]
    fn a_panicking_callback_does_not_block_the_rest() {
        let bus = TestBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.subscribe(|_, _| panic!("subscriber bug"));
        {
            let reached = reached.clone();
            bus.subscribe(move |_, _| *reached.lock().unwrap() = true);
        }

        bus.notify(&String::new(), &1);
        assert!(*reached.lock().unwrap());
    }
}
