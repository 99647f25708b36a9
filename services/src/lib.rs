//! Domain core for the review activity: submission lifecycle, marking
//! workflow, grading, marker allocation, blind-marking identity mapping and
//! date overrides.
//!
//! All operations take a [`context::RequestContext`] carrying the acting
//! identity, the persistence handle and the request clock. Nothing in this
//! crate reads ambient globals.

pub mod allocation;
pub mod context;
pub mod error;
pub mod grading;
pub mod identity;
pub mod lifecycle;
pub mod overrides;
pub mod plugins;
pub mod sinks;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;
