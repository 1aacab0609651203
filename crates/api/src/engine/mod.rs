//! Plan generation engine.
//!
//! Contains the job controller and the seams it is built on: the per-owner
//! job store, the persisted-plan store and the step-wise plan generator.

pub mod controller;
pub mod generator;
pub mod plans;
pub mod store;

pub use controller::JobController;
