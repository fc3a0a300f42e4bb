//! Run orchestration
//!
//! This module wires one ingestion run together:
//! - `IngestContext`: every shared resource, built at run start and torn
//!   down at run end
//! - `RunMode` and `RunOptions`: what a run discovers and how much it takes
//! - `Orchestrator`: discover, filter, triage, extract and persist per source

mod context;
mod mode;
mod runner;

pub use context::IngestContext;
pub use mode::{RunMode, RunOptions};
pub use runner::Orchestrator;
