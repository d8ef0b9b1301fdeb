//! Signal-safe deferred dispatch.
//!
//! Asynchronous signal notifications are captured into a bounded queue by an async-signal-safe
//! handler and replayed to user callbacks when the host reaches a safe point.
#[macro_use]
mod macros;
pub mod common;
pub(crate) mod cutils;
pub mod engine;
pub mod log;
pub mod system;

mod sigwatch;

pub use common::Error;
pub use engine::{
    Action, Callback, DispatchReport, EngineConfig, Flow, InterruptPolicy, SignalEngine,
    DEFAULT_POLL_INTERVAL, IGNORE_MARKER, QUEUE_CAPACITY,
};
pub use sigwatch::main as sigwatch_main;
pub use system::signal::{consts, SignalNumber};
