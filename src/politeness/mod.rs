//! Per-host politeness pacing
//!
//! This module provides the scheduling primitive every fetch goes through:
//!
//! - `RateState`: per-host bookkeeping (last request, failure streak, batch count)
//! - `HostPolicy`: the pacing parameters resolved for one host
//! - `PolitenessLimiter`: `wait(host)` suspends until the host may be contacted

mod limiter;
mod rate_state;

pub use limiter::{PolitePermit, PolitenessLimiter};
pub use rate_state::{HostPolicy, RateState};
