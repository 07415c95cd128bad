//! Application layer containing the presale's use cases.
//!
//! Each service receives its stores and the payment processor at construction
//! and holds no mutable state of its own; every invariant about concurrent
//! requests is carried by the atomic store operations.

pub mod purchase;
pub mod query;
pub mod reconciliation;
pub mod sweeper;
