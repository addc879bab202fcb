//! Capability seams for the reconciliation engine.
//!
//! These traits define the interfaces that callers implement to supply
//! string similarity, cluster interpretation, media adjudication and
//! checkpoint storage.

pub mod adjudicator;
pub mod interpreter;
pub mod similarity;
pub mod store;
