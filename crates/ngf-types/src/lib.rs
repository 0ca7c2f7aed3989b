//! Shared type definitions for the non-graphic feedback service.
//!
//! This crate is the single source of truth for the wire contract between
//! feedback clients and the service. Types defined here flow downstream to
//! `TypeScript` via `ts-rs` for non-Rust clients.
//!
//! # Modules
//!
//! - [`ids`] -- Event and requester identifiers
//! - [`enums`] -- Event lifecycle state
//! - [`properties`] -- Typed property lists attached to `Play`
//! - [`messages`] -- Request, reply and notification payloads plus codec
//! - [`subjects`] -- NATS subject naming

pub mod enums;
pub mod ids;
pub mod messages;
pub mod properties;
pub mod subjects;

// Re-export all public types at crate root for convenience.
pub use enums::EventState;
pub use ids::{EventId, RequesterId};
pub use messages::{Notification, OwnerInfo, PlayReply, PlayRequest, StopRequest};
pub use properties::{PropertyList, PropertyType, PropertyValue};
pub use subjects::Subjects;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the wire contract.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are used. The files are written to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::EventId::export_all();
        let _ = crate::ids::RequesterId::export_all();
        let _ = crate::enums::EventState::export_all();
        let _ = crate::properties::PropertyType::export_all();
        let _ = crate::properties::PropertyValue::export_all();
        let _ = crate::properties::PropertyList::export_all();
        let _ = crate::messages::PlayRequest::export_all();
        let _ = crate::messages::PlayReply::export_all();
        let _ = crate::messages::StopRequest::export_all();
        let _ = crate::messages::Notification::export_all();
        let _ = crate::messages::OwnerInfo::export_all();
    }
}
