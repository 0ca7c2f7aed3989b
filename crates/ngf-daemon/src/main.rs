//! Entry point for the non-graphic feedback daemon.
//!
//! The daemon claims the well-known service name on the bus, then serves
//! `Play` and `Stop` requests. Each accepted event completes after a fixed
//! delay unless stopped first; the completion is published back to the
//! requester.
//!
//! # Architecture
//!
//! ```text
//! NATS (play/stop) --> RequestHandler --> EventDispatcher --> NatsNotifier --> NATS (notify)
//! ```
//!
//! Configuration is read from the YAML file named by `NGF_CONFIG`, or
//! `ngf-config.yaml` in the working directory. Without a file the
//! built-in defaults apply. Environment overrides apply in both cases.

mod error;
mod nats;
mod service;

use std::path::PathBuf;
use std::time::Duration;

use ngf_core::config::FeedbackConfig;
use ngf_core::dispatcher::EventDispatcher;
use ngf_types::Subjects;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;
use crate::nats::{NatsClient, NatsNotifier};
use crate::service::{FeedbackService, RequestHandler};

/// Config file used when `NGF_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "ngf-config.yaml";

/// Application entry point.
///
/// Loads configuration, initializes logging, connects to NATS, claims the
/// service name and serves requests until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration, the NATS connection or the name
/// claim fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, config_source) = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("ngfd starting");
    info!(
        source = config_source,
        service = config.service.name,
        nats_url = config.infrastructure.nats_url,
        subject_prefix = config.service.subject_prefix,
        completion_delay_ms = config.service.completion_delay_ms,
        notify_mode = %config.service.notify_mode,
        "configuration loaded"
    );

    let subjects = Subjects::new(config.service.subject_prefix.clone());
    let nats = NatsClient::connect(&config.infrastructure.nats_url).await?;

    let owner = match nats
        .claim_name(
            &subjects,
            &config.service.name,
            Duration::from_millis(config.service.owner_probe_timeout_ms),
        )
        .await
    {
        Ok(owner) => owner,
        Err(e) => {
            error!(error = %e, "unable to register service name");
            return Err(e.into());
        }
    };

    let notifier = NatsNotifier::new(nats.client(), subjects.clone(), config.service.notify_mode);
    let dispatcher = EventDispatcher::new(config.dispatcher_config(), notifier);
    let handler = RequestHandler::new(dispatcher, config.service.notify_mode);
    let service = FeedbackService::new(nats, subjects, owner, handler);

    service.run(shutdown_signal()).await?;

    info!("ngfd shutdown complete");
    Ok(())
}

/// Resolve and load the configuration file.
///
/// Returns the config and a description of where it came from.
fn load_config() -> Result<(FeedbackConfig, String), DaemonError> {
    if let Ok(path) = std::env::var("NGF_CONFIG") {
        let path = PathBuf::from(path);
        let config = FeedbackConfig::from_file(&path)?;
        return Ok((config, path.display().to_string()));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = FeedbackConfig::from_file(&path)?;
        return Ok((config, path.display().to_string()));
    }

    Ok((FeedbackConfig::from_env_defaults()?, "defaults".to_owned()))
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
