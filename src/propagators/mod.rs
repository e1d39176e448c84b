//! The resource-scheduling constraint core (spec.md §3/§4): task bound consistency, shared
//! filtering primitives, the theta-tree and ascendant-set search tree, and the propagators built
//! on top of them (capacity, two-task and n-ary disjunctive, n-ary cumulative).

mod ascendant_set_tree;
mod capacity;
mod cumulative;
mod disjunctive;
mod int_queue_set;
mod profile;
mod resource_utils;
mod task;
mod theta_tree;
mod two_task_disjunctive;

pub use ascendant_set_tree::AscendantEntry;
pub use ascendant_set_tree::AscendantSetTree;
pub use capacity::Capacity;
pub use capacity::CapacityEntry;
pub use cumulative::Cumulative;
pub use cumulative::CumulativeOptions;
pub use cumulative::CumulativeVariant;
pub use disjunctive::Disjunctive;
pub use int_queue_set::IntQueueSet;
pub use profile::BacktrackableProfile;
pub use profile::Event;
pub use profile::EventKind;
pub use profile::EventPointSeries;
pub use profile::Profile;
pub use profile::Rectangle;
pub use resource_utils::Entailment;
pub use task::Mirror;
pub use task::Task;
pub use task::TaskView;
pub use task::SENTINEL_MAX;
pub use task::SENTINEL_MIN;
pub use theta_tree::ThetaEntry;
pub use theta_tree::ThetaTree;

pub mod two_task {
    pub use crate::propagators::two_task_disjunctive::entailment;
    pub use crate::propagators::two_task_disjunctive::propagate;
}
