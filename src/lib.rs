//! Filtering algorithms for resource-scheduling constraints: disjunctive
//! (unary resource, at most one task active at a time) and cumulative
//! (renewable resource with a shared capacity).
//!
//! The crate is split the way the solver it was extracted from is split:
//! [`engine`] provides the trailed domain store that propagators read and
//! write, and [`propagators`] contains the constraint filtering itself.
//! [`factory`] exposes the constructors a modeling layer would call to
//! post a disjunctive or cumulative constraint.

pub mod basic_types;
pub mod engine;
pub mod factory;
pub mod propagators;
pub mod variables;

pub use basic_types::EmptyDomain;
pub use basic_types::ResourceConstraintError;
