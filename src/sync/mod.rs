//! Background reconciliation scheduling and the sync worker boundary.
//!
//! # Responsibility
//! - Deduplicate background sync jobs by stable key.
//! - Gate dispatch on network reachability.
//!
//! # Invariants
//! - One job per key; `Keep` policy never resets an existing timer.
//! - The scheduler never retries on its own; retry policy belongs to the
//!   worker.

pub mod scheduler;
pub mod worker;
