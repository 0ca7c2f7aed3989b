//! NATS subject naming for the feedback service.
//!
//! All subjects share a configurable prefix (default `ngf`):
//!
//! | Subject | Use |
//! |---------|-----|
//! | `{prefix}.play` | `Play` request/reply |
//! | `{prefix}.stop` | `Stop` request |
//! | `{prefix}.owner` | well-known name ownership probe |
//! | `{prefix}.notify.{requester}` | notification directed at one requester |
//! | `{prefix}.signal` | notification broadcast to every listener |

use crate::ids::RequesterId;

/// Default subject prefix.
pub const DEFAULT_PREFIX: &str = "ngf";

/// Subject builder bound to one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subjects {
    prefix: String,
}

impl Subjects {
    /// Create a subject builder for `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The prefix all subjects start with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Subject for `Play` requests.
    pub fn play(&self) -> String {
        format!("{}.play", self.prefix)
    }

    /// Subject for `Stop` requests.
    pub fn stop(&self) -> String {
        format!("{}.stop", self.prefix)
    }

    /// Subject for name ownership probes.
    pub fn owner(&self) -> String {
        format!("{}.owner", self.prefix)
    }

    /// Subject for notifications directed at `requester`.
    pub fn notify(&self, requester: &RequesterId) -> String {
        format!("{}.notify.{requester}", self.prefix)
    }

    /// Subject for broadcast notifications.
    pub fn signal(&self) -> String {
        format!("{}.signal", self.prefix)
    }
}

impl Default for Subjects {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Whether `prefix` is usable as the leading part of a subject.
///
/// The prefix may contain `.`-separated tokens but no empty token,
/// whitespace or wildcard.
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.split('.').all(|token| {
            !token.is_empty()
                && !token
                    .chars()
                    .any(|c| c == '*' || c == '>' || c.is_whitespace())
        })
}
