//! Tower middleware layers for the dispatch pipeline.
//!
//! - [`trace`]: Per-dispatch `tracing` span with duration and outcome
//! - [`pipeline`]: Runs discovery and composes the layers around the dispatcher

pub mod pipeline;
pub mod trace;

pub use pipeline::build_dispatch_pipeline;
pub use trace::TraceLayer;
