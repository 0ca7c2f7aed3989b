//! Type-safe identifier wrappers.
//!
//! [`EventId`] is the server-assigned identifier handed back from `Play`.
//! It is a `u32` on the wire. The value `0` is never allocated and is
//! reserved as the "no event" marker that clients interpret as failure.
//!
//! [`RequesterId`] is the opaque identity of a caller. The transport carries
//! no sender identity of its own, so every request names its requester and
//! notifications are addressed back to it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Identifier of a played event, unique within one service process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(transparent)]
pub struct EventId(pub u32);

impl EventId {
    /// The reserved "no event" value. Never returned by a successful `Play`.
    pub const NONE: Self = Self(0);

    /// Return the inner `u32` value.
    pub const fn into_inner(self) -> u32 {
        self.0
    }

    /// Whether this id refers to an actual event (i.e. is not [`EventId::NONE`]).
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for EventId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<EventId> for u32 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Opaque identity of the caller that issued a request.
///
/// Requester ids are used as the last token of the directed notification
/// subject, so [`RequesterId::is_subject_safe`] must hold for them to be
/// routable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl RequesterId {
    /// Create a requester id from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random requester id (UUID v4, simple form).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be used as a single NATS subject token.
    ///
    /// Tokens must be non-empty and may not contain `.`, whitespace or the
    /// wildcard characters `*` and `>`.
    pub fn is_subject_safe(&self) -> bool {
        !self.0.is_empty()
            && !self
                .0
                .chars()
                .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
    }
}

impl core::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequesterId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_id_is_reserved() {
        assert!(!EventId::NONE.is_some());
        assert!(EventId(1).is_some());
    }

    #[test]
    fn event_id_serializes_as_bare_number() {
        let json = serde_json::to_string(&EventId(7)).ok();
        assert_eq!(json.as_deref(), Some("7"));
    }

    #[test]
    fn generated_requesters_are_distinct_and_routable() {
        let a = RequesterId::generate();
        let b = RequesterId::generate();
        assert_ne!(a, b);
        assert!(a.is_subject_safe());
        assert!(b.is_subject_safe());
    }

    #[test]
    fn requester_with_subject_separators_is_not_routable() {
        assert!(!RequesterId::new("a.b").is_subject_safe());
        assert!(!RequesterId::new("a*").is_subject_safe());
        assert!(!RequesterId::new("a>").is_subject_safe());
        assert!(!RequesterId::new("a b").is_subject_safe());
        assert!(!RequesterId::new("").is_subject_safe());
        assert!(!RequesterId::new(":1.42").is_subject_safe());
        assert!(RequesterId::new("client-1").is_subject_safe());
    }
}
