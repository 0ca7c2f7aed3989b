//! Wire messages exchanged between clients and the feedback service.
//!
//! Every message is JSON-encoded. Inbound calls (`Play`, `Stop`) carry the
//! requester identity explicitly; outbound notifications (`Completed`,
//! `Failed`) echo it back so a broadcast listener can filter by requester.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::{EventId, RequesterId};
use crate::properties::PropertyList;

// ---------------------------------------------------------------------------
// Inbound calls
// ---------------------------------------------------------------------------

/// A `Play` call: start the named event with optional properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PlayRequest {
    /// Identity of the caller; notifications are addressed to it.
    pub requester: RequesterId,
    /// Name of the event to play (e.g. `"event.test"`).
    pub event: String,
    /// Arbitrary typed properties for the event.
    #[serde(default)]
    pub properties: PropertyList,
}

/// The service's answer to a [`PlayRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayReply {
    /// The event was scheduled under `id`.
    Accepted {
        /// Server-assigned event id.
        id: EventId,
    },
    /// The request could not be decoded or scheduled.
    Rejected {
        /// Human-readable reason.
        reason: String,
    },
}

impl PlayReply {
    /// The accepted id, or [`EventId::NONE`] for a rejection.
    pub const fn id(&self) -> EventId {
        match self {
            Self::Accepted { id } => *id,
            Self::Rejected { .. } => EventId::NONE,
        }
    }
}

/// A `Stop` call: cancel a pending event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StopRequest {
    /// Identity of the caller.
    pub requester: RequesterId,
    /// The id returned by the earlier `Play`.
    pub id: EventId,
}

// ---------------------------------------------------------------------------
// Outbound notifications
// ---------------------------------------------------------------------------

/// A notification emitted by the service about a played event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The event ran to completion.
    Completed {
        /// The event id returned from `Play`.
        id: EventId,
        /// The caller that issued the `Play`.
        requester: RequesterId,
        /// The event name given to `Play`.
        event: String,
        /// When the completion timer fired.
        completed_at: DateTime<Utc>,
    },
    /// The event could not be played.
    Failed {
        /// The event id returned from `Play`.
        id: EventId,
        /// The caller that issued the `Play`.
        requester: RequesterId,
        /// The event name given to `Play`.
        event: String,
        /// Human-readable reason.
        reason: String,
    },
}

impl Notification {
    /// The event id this notification refers to.
    pub const fn id(&self) -> EventId {
        match self {
            Self::Completed { id, .. } | Self::Failed { id, .. } => *id,
        }
    }

    /// The requester this notification is addressed to.
    pub const fn requester(&self) -> &RequesterId {
        match self {
            Self::Completed { requester, .. } | Self::Failed { requester, .. } => requester,
        }
    }

    /// Short label for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Name ownership
// ---------------------------------------------------------------------------

/// Answer to an ownership probe, sent by the instance that holds the
/// well-known service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OwnerInfo {
    /// The well-known name held by the responding instance.
    pub service_name: String,
    /// When the responding instance claimed the name.
    pub claimed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode a message as a JSON payload.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

/// Decode a message from a JSON payload.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(payload)
}
