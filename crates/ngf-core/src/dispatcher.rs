//! Event dispatcher: `Play`, `Stop` and completion delivery.
//!
//! The [`EventDispatcher`] is the only component the transport talks to.
//! It owns a single [`EventRegistry`] and drives every event through
//!
//! ```text
//! Requested --> Scheduled --> Completed   (timer fired)
//!                         \-> Cancelled   (Stop won)
//! ```
//!
//! # Timers
//!
//! Each `Play` spawns a tokio task that sleeps for the configured completion
//! delay and then calls back into the dispatcher. The task's
//! [`AbortHandle`] is bound into the registry as the timer token, so a
//! successful `Stop` aborts the sleep before it can fire. The task captures
//! an immutable [`CompletionRecord`] and a handle to the shared state, never
//! a borrow of the dispatcher.
//!
//! # Concurrency
//!
//! The registry sits behind a mutex shared by the dispatcher and all timer
//! tasks. Allocation and binding happen under one lock acquisition, and a
//! firing timer removes its entry under the same lock a `Stop` uses to
//! cancel it, so exactly one of the two wins. Notifications are delivered
//! after the lock is released.
//!
//! All methods that schedule timers must be called from within a tokio
//! runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use ngf_types::{EventId, Notification, PropertyList, RequesterId};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::notifier::Notifier;
use crate::registry::{EventRegistry, RegistryError};

/// Default delay between `Play` and the `Completed` notification.
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_secs(2);

/// Errors returned by dispatcher operations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The registry refused the operation.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: RegistryError,
    },
}

/// Runtime parameters of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Delay between `Play` and completion.
    pub completion_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            completion_delay: DEFAULT_COMPLETION_DELAY,
        }
    }
}

/// Counters describing what the dispatcher has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Successful `Play` calls.
    pub played: u64,
    /// `Stop` calls that cancelled a pending event.
    pub stopped: u64,
    /// `Stop` calls for unknown or already-resolved ids.
    pub stop_misses: u64,
    /// Completion notifications emitted.
    pub completed: u64,
    /// Events dropped by [`EventDispatcher::cancel_all`].
    pub dropped: u64,
    /// Events currently pending.
    pub pending: usize,
}

/// Immutable description of an event, captured by its completion timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    /// The event id.
    pub id: EventId,
    /// The caller that issued the `Play`.
    pub requester: RequesterId,
    /// The event name.
    pub event: String,
}

/// Mutable state protected by the dispatcher mutex.
#[derive(Debug, Default)]
struct DispatchState {
    registry: EventRegistry<AbortHandle>,
    stats: DispatcherStats,
}

/// State shared between the dispatcher handle and its timer tasks.
#[derive(Debug)]
struct Shared<N> {
    state: Mutex<DispatchState>,
    notifier: N,
    config: DispatcherConfig,
}

impl<N: Notifier> Shared<N> {
    /// Lock the dispatch state. Poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Timer callback: remove the entry and notify the requester.
    fn emit_completed(&self, record: CompletionRecord) {
        let removed = {
            let mut state = self.lock();
            let removed = state.registry.remove(record.id);
            if removed.is_some() {
                state.stats.completed = state.stats.completed.saturating_add(1);
            }
            removed
        };

        if removed.is_none() {
            debug!(event_id = %record.id, "timer fired after stop, nothing to emit");
            return;
        }

        let notification = Notification::Completed {
            id: record.id,
            requester: record.requester,
            event: record.event,
            completed_at: Utc::now(),
        };
        info!(
            event_id = %notification.id(),
            requester = %notification.requester(),
            "event completed"
        );
        if let Err(e) = self.notifier.deliver(&notification) {
            warn!(
                event_id = %notification.id(),
                error = %e,
                "failed to deliver completion notification"
            );
        }
    }
}

/// Accepts `Play`/`Stop` calls and emits completion notifications.
///
/// Cloning the dispatcher yields another handle to the same registry.
#[derive(Debug)]
pub struct EventDispatcher<N> {
    shared: Arc<Shared<N>>,
}

impl<N> Clone for EventDispatcher<N> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<N: Notifier> EventDispatcher<N> {
    /// Create a dispatcher delivering through `notifier`.
    pub fn new(config: DispatcherConfig, notifier: N) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DispatchState::default()),
                notifier,
                config,
            }),
        }
    }

    /// The notifier this dispatcher delivers through.
    pub fn notifier(&self) -> &N {
        &self.shared.notifier
    }

    /// The configuration this dispatcher was created with.
    pub fn config(&self) -> DispatcherConfig {
        self.shared.config
    }

    /// Start the named event and return its id.
    ///
    /// Any event name and property set is accepted. A one-shot completion
    /// timer is scheduled with the configured delay; when it fires a
    /// `Completed` notification is sent to `requester` unless the event was
    /// stopped first.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Registry`] only when the id space is
    /// exhausted.
    pub fn play(
        &self,
        event: &str,
        properties: &PropertyList,
        requester: RequesterId,
    ) -> Result<EventId, DispatchError> {
        info!(
            event = event,
            requester = %requester,
            property_count = properties.len(),
            "play requested"
        );
        for (key, value) in properties.iter() {
            debug!(key = key, value = %value, value_type = ?value.value_type(), "play property");
        }

        let delay = self.shared.config.completion_delay;
        let id = {
            let mut state = self.shared.lock();
            let id = state.registry.allocate(requester.clone(), event)?;

            let record = CompletionRecord {
                id,
                requester,
                event: event.to_owned(),
            };
            let shared = Arc::clone(&self.shared);
            let timer = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shared.emit_completed(record);
            });

            state.registry.bind(id, timer.abort_handle())?;
            state.stats.played = state.stats.played.saturating_add(1);
            id
        };

        info!(
            event_id = %id,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "event scheduled"
        );
        Ok(id)
    }

    /// Stop a pending event.
    ///
    /// Returns `true` if the event was cancelled before its timer fired.
    /// Unknown or already-resolved ids are a silent no-op that returns
    /// `false`; callers are not told about misses.
    pub fn stop(&self, id: EventId, requester: &RequesterId) -> bool {
        let cancelled = {
            let mut state = self.shared.lock();
            let cancelled = state.registry.cancel(id);
            if cancelled {
                state.stats.stopped = state.stats.stopped.saturating_add(1);
            } else {
                state.stats.stop_misses = state.stats.stop_misses.saturating_add(1);
            }
            cancelled
        };

        if cancelled {
            info!(event_id = %id, requester = %requester, "event stopped");
        } else {
            debug!(event_id = %id, requester = %requester, "stop for unknown or resolved event ignored");
        }
        cancelled
    }

    /// Cancel every pending event without notifying anyone.
    ///
    /// Used at shutdown. Returns the number of events dropped.
    pub fn cancel_all(&self) -> usize {
        let drained = {
            let mut state = self.shared.lock();
            let drained = state.registry.drain();
            let count = u64::try_from(drained.len()).unwrap_or(u64::MAX);
            state.stats.dropped = state.stats.dropped.saturating_add(count);
            drained
        };

        for entry in &drained {
            debug!(event_id = %entry.id, requester = %entry.requester, "pending event dropped");
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "pending events dropped");
        }
        drained.len()
    }

    /// Whether `id` is still pending.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.shared.lock().registry.contains(id)
    }

    /// Number of events currently pending.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().registry.len()
    }

    /// Snapshot of the dispatcher counters.
    pub fn stats(&self) -> DispatcherStats {
        let state = self.shared.lock();
        DispatcherStats {
            pending: state.registry.len(),
            ..state.stats
        }
    }
}
