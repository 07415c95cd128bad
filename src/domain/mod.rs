//! Domain layer: ledger entities, processor payloads, and the ports the
//! application layer talks to.

pub mod payment;
pub mod ports;
pub mod stage;
pub mod stats;
pub mod transaction;
