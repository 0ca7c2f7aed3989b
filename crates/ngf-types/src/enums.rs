//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Event lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a single played event on the service side.
///
/// ```text
/// Requested --> Scheduled --> Completed
///                         \-> Cancelled
/// ```
///
/// `Completed` and `Cancelled` are terminal. No other transitions exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    /// An id has been allocated but no timer is bound yet.
    Requested,
    /// A one-shot completion timer is pending.
    Scheduled,
    /// The timer fired and a `Completed` notification was emitted.
    Completed,
    /// A `Stop` removed the event before its timer fired.
    Cancelled,
}

impl EventState {
    /// Whether no further transitions are possible from this state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Scheduled)
                | (Self::Scheduled, Self::Completed | Self::Cancelled)
        )
    }
}

impl core::fmt::Display for EventState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::Requested => "requested",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EventState; 4] = [
        EventState::Requested,
        EventState::Scheduled,
        EventState::Completed,
        EventState::Cancelled,
    ];

    #[test]
    fn only_documented_transitions_are_legal() {
        let mut legal = Vec::new();
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) {
                    legal.push((from, to));
                }
            }
        }
        assert_eq!(
            legal,
            vec![
                (EventState::Requested, EventState::Scheduled),
                (EventState::Scheduled, EventState::Completed),
                (EventState::Scheduled, EventState::Cancelled),
            ]
        );
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for state in ALL.into_iter().filter(|s| s.is_terminal()) {
            assert!(ALL.iter().all(|next| !state.can_transition_to(*next)));
        }
    }
}
