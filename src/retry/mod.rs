//! Failure classification and retry policy
//!
//! Every fetch failure is turned into an [`ErrorKind`] and wrapped in an
//! [`IngestError`] whose variant says whether it is worth retrying. The
//! [`RetryPolicy`] re-invokes an operation with kind-aware exponential
//! backoff, so site adapters never decide retry behaviour themselves.

mod classify;
mod outcome;
mod policy;

pub use classify::{classify, detect_challenge, FailureSignal};
pub use outcome::{ErrorKind, IngestError};
pub use policy::{delay_for, RetryPolicy};
