//! # Dispatch
//!
//! Per-request orchestration: admission, serialization on the exclusive
//! resource, timing, and arg-max classification.
//!
//! * [`Dispatcher`] - owns the resource, the admission gate and the inflight counter
//! * [`DispatchResult`] - what one request produced and where its time went
//! * [`BatchResult`] - several tensors served under one permit
//! * [`Outcome`] / [`Prediction`] - per-request success or failure

mod dispatcher;
mod prediction;
mod result;

pub use dispatcher::Dispatcher;
pub(crate) use dispatcher::panic_message;
pub use prediction::{argmax, Outcome, Prediction};
pub use result::{BatchResult, DispatchResult};
