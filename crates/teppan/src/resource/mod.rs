//! # Exclusive Resource
//!
//! The mounted model and the single handle through which it is reached.
//!
//! ## Feature Flags
//!
//! - `candle`: an [`ExclusiveResource`] over any `candle_core::Module`
//!
//! The dispatcher is written against the [`ExclusiveResource`] trait only, so a
//! different backend plugs in without touching admission or burst logic.

mod core_trait;
mod exclusive;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle backend.
///
/// This module is only available when the `candle` feature flag is enabled.
/// The wrapped module is mounted on the first CUDA device when one is present
/// and on the CPU otherwise.
pub mod candle;

pub use core_trait::*;
pub use exclusive::Exclusive;

#[cfg(test)]
/// Mock resource.
///
/// Sleeps for a configurable time per call and records when each call held
/// the resource.
pub(crate) mod mock;
