//! Runcast domain logic.
//!
//! Everything here is free of HTTP types so it can be exercised directly in
//! tests: request parameters and argument building, the relay event model,
//! and the process relay itself (subscriber slot, job registry, supervisor).

pub mod error;
pub mod event;
pub mod params;
pub mod relay;
pub mod types;
