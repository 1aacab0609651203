//! Domain types and pure logic for fitness plan generation.
//!
//! Nothing in this crate performs I/O. The API server, the database layer and
//! the polling client all depend on it for the shared job model.

pub mod display;
pub mod error;
pub mod plan_generation;
pub mod types;
