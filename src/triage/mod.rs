//! Relevance triage
//!
//! Scores discovered metadata, assigns a priority by threshold and routes
//! records: high priority is extracted now, medium is queued for a backlog
//! run, low is ignored.

mod route;
mod score;
mod status;

pub use route::{route_by_priority, Routed};
pub use score::{ScoreResult, TriageEngine};
pub use status::{Priority, TriageRecord, TriageStatus};
