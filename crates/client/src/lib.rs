//! Client side of the plan generation protocol.
//!
//! [`api::PlanGenerationClient`] talks to the `/plan-generation` endpoints;
//! [`poller::subscribe`] drives a cancellable polling loop on top of any
//! [`poller::ProgressSource`].

pub mod api;
pub mod poller;
