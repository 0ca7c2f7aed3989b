//! Event registry, dispatcher and configuration for the feedback service.
//!
//! This crate is transport-agnostic. The daemon feeds it decoded `Play` and
//! `Stop` calls and hands it a [`Notifier`] for the way back out.
//!
//! # Modules
//!
//! - [`registry`] -- [`EventRegistry`]: id allocation and pending timers.
//! - [`dispatcher`] -- [`EventDispatcher`]: `Play`/`Stop` and completion.
//! - [`notifier`] -- [`Notifier`] trait and [`RecordingNotifier`].
//! - [`config`] -- Configuration loading from `ngf-config.yaml`.
//!
//! [`EventRegistry`]: registry::EventRegistry
//! [`EventDispatcher`]: dispatcher::EventDispatcher
//! [`Notifier`]: notifier::Notifier
//! [`RecordingNotifier`]: notifier::RecordingNotifier

pub mod config;
pub mod dispatcher;
pub mod notifier;
pub mod registry;
