//! Round trips against a running `ngfd` and NATS server.
//!
//! Run with:
//!
//! ```bash
//! nats-server &
//! cargo run -p ngf-daemon &
//! cargo test -p ngf-client -- --ignored
//! ```
//!
//! All tests are marked `#[ignore]` so they are skipped during normal
//! `cargo test` runs.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use ngf_client::{ClientEventState, FeedbackClient};
use ngf_types::PropertyList;

const NATS_URL: &str = "nats://localhost:4222";

#[tokio::test]
#[ignore]
async fn play_reports_completion() {
    let (client, mut events) = FeedbackClient::connect(NATS_URL, "ngf")
        .await
        .expect("Failed to connect to NATS -- is nats-server running?");

    let mut properties = PropertyList::new();
    properties.set_string("sound.filename", "ring.wav");
    let id = client.play("event.ringtone", properties).unwrap();

    let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("no event within 10s")
        .expect("event channel closed");
    assert_eq!(event.id, id);
    assert_eq!(event.state, ClientEventState::Completed);

    client.close().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn stopped_play_reports_nothing() {
    let (client, mut events) = FeedbackClient::connect(NATS_URL, "ngf")
        .await
        .expect("Failed to connect to NATS -- is nats-server running?");

    let id = client.play("event.click", PropertyList::new()).unwrap();
    client.stop(id).await.unwrap();

    let waited = tokio::time::timeout(Duration::from_secs(4), events.recv()).await;
    assert!(waited.is_err(), "stopped play produced {waited:?}");

    client.close().await.unwrap();
}
