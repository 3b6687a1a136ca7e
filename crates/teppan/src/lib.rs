//! # Teppan
//!
//! Bounded-concurrency dispatch of inference requests onto a single
//! exclusive model instance.
//!
//! ## Overview
//!
//! A mounted model is one resource that cannot be entered twice at once:
//! a GPU context, a non-reentrant runtime, a model with interior state.
//! Teppan puts that resource behind a small dispatch layer that lets many
//! concurrent callers share it safely and reports where each request spent
//! its time.
//!
//! Key components include:
//!
//! - An admission gate that bounds how many requests are in flight
//! - An exclusive handle that serializes access to the resource
//! - A dispatcher that runs single requests and batches and measures them
//! - A burst coordinator that fans one input out `n` times
//! - Latency summaries and session records over the results
//!
//! ## Architecture
//!
//! ### Two-Level Control
//!
//! Every request first takes a permit from the [`AdmissionGate`](gate::AdmissionGate).
//! At most `max_inflight` requests hold a permit at once, which bounds the
//! backlog. A permit holder then waits for the [`Exclusive`](resource::Exclusive)
//! handle, of which there is exactly one. Raising `max_inflight` therefore
//! deepens the queue without adding compute parallelism.
//!
//! ### Resource Trait
//!
//! The [`ExclusiveResource`](resource::ExclusiveResource) trait is the only
//! thing the dispatcher knows about the model. A resource reports its input
//! shape and execution path and turns one input into class scores.
//!
//! ### Outcomes
//!
//! Precondition failures (wrong shape, bad burst size) are returned as errors
//! before anything is admitted. Everything after admission, including resource
//! failures and admission timeouts, is reported as the
//! [`Outcome`](dispatch::Outcome) of an otherwise normal result, so a burst
//! always comes back with one result per slot.
//!
//! ## Features
//!
//! - **candle** - Enables the candle backend
//!
//! ## Logging
//!
//! Teppan emits [`tracing`] events and never installs a subscriber.

pub mod burst;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod health;
pub mod metrics;
pub mod resource;
pub mod session;
pub mod tensor;
mod time;

pub use burst::{BurstCoordinator, BurstJob};
pub use config::DispatchConfig;
pub use dispatch::{Dispatcher, DispatchResult, Outcome};
pub use metrics::{summarize, LatencySummary};
pub use tensor::{InputTensor, ModelShape};
pub use time::millis;
