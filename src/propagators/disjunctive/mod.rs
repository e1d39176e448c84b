//! The n-ary disjunctive propagator (spec.md §4.9). The two-task case has its own closed-form
//! filter in [`crate::propagators::two_task_disjunctive`]; the factory layer chooses between the
//! two by task count (spec.md §6).

mod nary;

pub use nary::Disjunctive;
