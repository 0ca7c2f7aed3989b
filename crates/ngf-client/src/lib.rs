//! Client library for the non-graphic feedback service.
//!
//! A [`FeedbackClient`] sends `Play` and `Stop` requests on behalf of one
//! requester and reports what happened to each play on a channel of
//! [`ClientEvent`]s. Plays are identified by client-local
//! [`ClientEventId`]s that exist before the service has replied, so a play
//! can be stopped at any time.
//!
//! ```no_run
//! # async fn demo() -> Result<(), ngf_client::ClientError> {
//! use ngf_client::FeedbackClient;
//! use ngf_types::PropertyList;
//!
//! let (client, mut events) = FeedbackClient::connect("nats://localhost:4222", "ngf").await?;
//! let id = client.play("event.ringtone", PropertyList::default())?;
//! if let Some(event) = events.recv().await {
//!     println!("{} -> {:?}", event.id, event.state);
//! }
//! client.stop(id).await?;
//! client.close().await
//! # }
//! ```

pub mod client;
pub mod error;
pub mod state;

pub use client::FeedbackClient;
pub use error::ClientError;
pub use state::{ClientEvent, ClientEventId, ClientEventState, ClientState};
