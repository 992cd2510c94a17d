//! The buffer-rotation engine.
//!
//! Everything shared between the two execution domains lives in one
//! [`PipelineContext`] built at initialization: the transaction pool under a
//! short mutex, the synchronization counter, the mode flag, statistics, and
//! the fault latch. [`StreamPort`] is the hardware-facing face of that
//! context (the three completion callbacks); [`TreatmentWorker`] is the
//! schedulable consumer.

mod context;
mod handlers;
mod worker;

pub(crate) use context::{PipelineContext, PipelineStats};
pub use handlers::StreamPort;
pub use worker::TreatmentWorker;
