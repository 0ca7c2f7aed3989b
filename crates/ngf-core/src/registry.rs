//! Registry of pending events and their completion timers.
//!
//! The registry owns the mapping from [`EventId`] to [`PendingEvent`]. An
//! entry exists for id `X` exactly while a completion timer for `X` is
//! scheduled (or about to be bound) and has neither fired nor been
//! cancelled. Each entry leaves the registry through exactly one of two
//! doors:
//!
//! - [`EventRegistry::cancel`] -- the `Stop` path; aborts the timer.
//! - [`EventRegistry::remove`] -- the completion path, called by the timer
//!   itself when it fires.
//!
//! The registry is a plain single-writer structure. Callers that share it
//! across tasks wrap it in a mutex, which makes the four operations atomic
//! with respect to each other: when `cancel` and `remove` race on the same
//! id, exactly one of them receives the entry.
//!
//! The timer token type is generic so the registry can be exercised without
//! a runtime.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ngf_types::{EventId, EventState, RequesterId};

/// Errors returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Every `u32` event id has been handed out. Ids are never reused.
    #[error("event id space exhausted after id {last}")]
    IdSpaceExhausted {
        /// The last id that was allocated.
        last: EventId,
    },

    /// The id is not pending (never allocated, already fired or cancelled).
    #[error("event {id} is not pending")]
    UnknownEvent {
        /// The id that was looked up.
        id: EventId,
    },

    /// A timer is already bound to the id.
    #[error("event {id} already has a timer bound")]
    AlreadyBound {
        /// The id that was looked up.
        id: EventId,
    },
}

/// A scheduler token that can abort the timer it refers to.
pub trait TimerHandle {
    /// Abort the timer. Must be a no-op if the timer already finished.
    fn abort(&self);
}

impl TimerHandle for tokio::task::AbortHandle {
    fn abort(&self) {
        Self::abort(self);
    }
}

/// An event that has been played and has not yet completed or been stopped.
#[derive(Debug)]
pub struct PendingEvent<T> {
    /// The id handed back to the requester.
    pub id: EventId,
    /// The caller that issued the `Play`.
    pub requester: RequesterId,
    /// The event name given to `Play`.
    pub event: String,
    /// When the id was allocated.
    pub requested_at: DateTime<Utc>,
    /// Completion timer, bound right after allocation.
    timer: Option<T>,
}

impl<T> PendingEvent<T> {
    /// Lifecycle state of this entry.
    pub const fn state(&self) -> EventState {
        if self.timer.is_some() {
            EventState::Scheduled
        } else {
            EventState::Requested
        }
    }

    /// Whether a timer has been bound.
    pub const fn is_bound(&self) -> bool {
        self.timer.is_some()
    }
}

impl<T: TimerHandle> PendingEvent<T> {
    /// Abort the bound timer, if any.
    fn abort_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

/// Mapping from event id to pending event.
#[derive(Debug)]
pub struct EventRegistry<T> {
    /// Last id handed out; `0` means none yet.
    last_id: u32,
    /// Live entries keyed by id.
    events: BTreeMap<EventId, PendingEvent<T>>,
}

impl<T> Default for EventRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventRegistry<T> {
    /// Create an empty registry. The first allocated id is `1`.
    pub const fn new() -> Self {
        Self {
            last_id: 0,
            events: BTreeMap::new(),
        }
    }

    /// Allocate a fresh id and record a pending event with no timer yet.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::IdSpaceExhausted`] once `u32::MAX` has been
    /// handed out.
    pub fn allocate(
        &mut self,
        requester: RequesterId,
        event: &str,
    ) -> Result<EventId, RegistryError> {
        let next = self
            .last_id
            .checked_add(1)
            .ok_or(RegistryError::IdSpaceExhausted {
                last: EventId(self.last_id),
            })?;
        self.last_id = next;

        let id = EventId(next);
        self.events.insert(
            id,
            PendingEvent {
                id,
                requester,
                event: event.to_owned(),
                requested_at: Utc::now(),
                timer: None,
            },
        );
        Ok(id)
    }

    /// Remove the entry for `id` on the completion path.
    ///
    /// Returns `None` if the entry is already gone, i.e. a `Stop` won the
    /// race against the timer.
    pub fn remove(&mut self, id: EventId) -> Option<PendingEvent<T>> {
        self.events.remove(&id)
    }

    /// Whether `id` is currently pending.
    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains_key(&id)
    }

    /// Look up a pending event.
    pub fn get(&self, id: EventId) -> Option<&PendingEvent<T>> {
        self.events.get(&id)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events are pending.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The most recently allocated id, or [`EventId::NONE`].
    pub const fn last_id(&self) -> EventId {
        EventId(self.last_id)
    }
}

impl<T: TimerHandle> EventRegistry<T> {
    /// Attach the completion timer to a freshly allocated event.
    ///
    /// On error the timer is aborted before returning, so the caller never
    /// has to clean up a timer the registry refused.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownEvent`] if `id` is not pending (a
    /// `Stop` arrived between allocation and binding) or
    /// [`RegistryError::AlreadyBound`] if a timer is already attached.
    pub fn bind(&mut self, id: EventId, timer: T) -> Result<(), RegistryError> {
        let Some(entry) = self.events.get_mut(&id) else {
            timer.abort();
            return Err(RegistryError::UnknownEvent { id });
        };
        if entry.timer.is_some() {
            timer.abort();
            return Err(RegistryError::AlreadyBound { id });
        }
        entry.timer = Some(timer);
        Ok(())
    }

    /// Cancel the pending event `id`, aborting its timer.
    ///
    /// Returns `true` if an entry was removed. A miss (unknown, fired or
    /// already cancelled id) returns `false` and changes nothing.
    pub fn cancel(&mut self, id: EventId) -> bool {
        match self.events.remove(&id) {
            Some(entry) => {
                entry.abort_timer();
                true
            }
            None => false,
        }
    }

    /// Remove every pending event, aborting all timers.
    ///
    /// Returns the removed entries in id order.
    pub fn drain(&mut self) -> Vec<PendingEvent<T>> {
        let drained = std::mem::take(&mut self.events);
        drained
            .into_values()
            .inspect(PendingEvent::abort_timer)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// Timer stand-in that records whether it was aborted.
    #[derive(Debug, Clone, Default)]
    struct FakeTimer {
        aborted: Arc<AtomicBool>,
    }

    impl FakeTimer {
        fn is_aborted(&self) -> bool {
            self.aborted.load(Ordering::SeqCst)
        }
    }

    impl TimerHandle for FakeTimer {
        fn abort(&self) {
            self.aborted.store(true, Ordering::SeqCst);
        }
    }

    fn requester() -> RequesterId {
        RequesterId::new("client-1")
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut registry = EventRegistry::<FakeTimer>::new();
        let ids: Vec<EventId> = (0..5)
            .filter_map(|_| registry.allocate(requester(), "event.test").ok())
            .collect();
        assert_eq!(
            ids,
            vec![EventId(1), EventId(2), EventId(3), EventId(4), EventId(5)]
        );
        assert_eq!(registry.last_id(), EventId(5));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut registry = EventRegistry::<FakeTimer>::new();
        let first = registry.allocate(requester(), "a");
        assert_eq!(first, Ok(EventId(1)));
        assert!(registry.cancel(EventId(1)));
        assert_eq!(registry.allocate(requester(), "b"), Ok(EventId(2)));
    }

    #[test]
    fn exhausted_id_space_is_an_error() {
        let mut registry = EventRegistry::<FakeTimer> {
            last_id: u32::MAX,
            events: BTreeMap::new(),
        };
        assert_eq!(
            registry.allocate(requester(), "a"),
            Err(RegistryError::IdSpaceExhausted {
                last: EventId(u32::MAX)
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn bind_moves_entry_to_scheduled() {
        let mut registry = EventRegistry::new();
        let id = registry.allocate(requester(), "a").unwrap_or(EventId::NONE);
        assert_eq!(registry.get(id).map(PendingEvent::state), Some(EventState::Requested));

        assert!(registry.bind(id, FakeTimer::default()).is_ok());
        assert_eq!(registry.get(id).map(PendingEvent::state), Some(EventState::Scheduled));
    }

    #[test]
    fn bind_to_unknown_id_aborts_timer() {
        let mut registry = EventRegistry::new();
        let timer = FakeTimer::default();
        assert_eq!(
            registry.bind(EventId(9), timer.clone()),
            Err(RegistryError::UnknownEvent { id: EventId(9) })
        );
        assert!(timer.is_aborted());
    }

    #[test]
    fn double_bind_is_rejected() {
        let mut registry = EventRegistry::new();
        let id = registry.allocate(requester(), "a").unwrap_or(EventId::NONE);
        let first = FakeTimer::default();
        let second = FakeTimer::default();
        assert!(registry.bind(id, first.clone()).is_ok());
        assert_eq!(
            registry.bind(id, second.clone()),
            Err(RegistryError::AlreadyBound { id })
        );
        assert!(second.is_aborted());
        assert!(!first.is_aborted());
    }

    #[test]
    fn cancel_aborts_timer_and_is_idempotent() {
        let mut registry = EventRegistry::new();
        let id = registry.allocate(requester(), "a").unwrap_or(EventId::NONE);
        let timer = FakeTimer::default();
        assert!(registry.bind(id, timer.clone()).is_ok());

        assert!(registry.cancel(id));
        assert!(timer.is_aborted());
        assert!(!registry.contains(id));

        assert!(!registry.cancel(id));
        assert!(!registry.cancel(EventId(42)));
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_and_remove_exactly_one_wins() {
        let mut registry = EventRegistry::new();
        let id = registry.allocate(requester(), "a").unwrap_or(EventId::NONE);
        assert!(registry.bind(id, FakeTimer::default()).is_ok());

        let removed = registry.remove(id);
        assert!(removed.is_some());
        assert!(!registry.cancel(id));

        let other = registry.allocate(requester(), "b").unwrap_or(EventId::NONE);
        assert!(registry.bind(other, FakeTimer::default()).is_ok());
        assert!(registry.cancel(other));
        assert!(registry.remove(other).is_none());
    }

    #[test]
    fn removed_entry_keeps_requester_and_event() {
        let mut registry = EventRegistry::<FakeTimer>::new();
        let id = registry.allocate(requester(), "event.test").unwrap_or(EventId::NONE);
        let entry = registry.remove(id);
        assert_eq!(entry.as_ref().map(|e| e.id), Some(id));
        assert_eq!(entry.as_ref().map(|e| e.requester.clone()), Some(requester()));
        assert_eq!(entry.map(|e| e.event), Some("event.test".to_owned()));
    }

    #[test]
    fn cancel_does_not_touch_other_entries() {
        let mut registry = EventRegistry::new();
        let one = registry.allocate(requester(), "a").unwrap_or(EventId::NONE);
        let two = registry.allocate(requester(), "b").unwrap_or(EventId::NONE);
        let timer_two = FakeTimer::default();
        assert!(registry.bind(one, FakeTimer::default()).is_ok());
        assert!(registry.bind(two, timer_two.clone()).is_ok());

        assert!(registry.cancel(one));
        assert!(registry.contains(two));
        assert!(!timer_two.is_aborted());
    }

    #[test]
    fn drain_aborts_everything() {
        let mut registry = EventRegistry::new();
        let timers: Vec<FakeTimer> = (0..3).map(|_| FakeTimer::default()).collect();
        for timer in &timers {
            let id = registry.allocate(requester(), "a").unwrap_or(EventId::NONE);
            assert!(registry.bind(id, timer.clone()).is_ok());
        }

        let drained = registry.drain();
        assert_eq!(drained.len(), 3);
        assert!(registry.is_empty());
        assert!(timers.iter().all(FakeTimer::is_aborted));
        assert_eq!(registry.last_id(), EventId(3));
    }
}
