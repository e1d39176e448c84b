/// A domain became empty (`lower_bound > upper_bound`). This is spec.md §7's "Failure": always
/// search-recoverable, always propagated upward through `Result`, never locally retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EmptyDomain;

impl std::fmt::Display for EmptyDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "domain became empty")
    }
}

impl std::error::Error for EmptyDomain {}

/// Contract violations: mistakes a caller makes when *constructing* a constraint, as opposed to
/// infeasibilities discovered while propagating one. Spec.md §7 calls these fatal; we surface
/// them as a normal `Result` so a modeling layer can report them, rather than panicking.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ResourceConstraintError {
    #[error("tasks and heights have different lengths ({num_tasks} tasks vs {num_heights} heights)")]
    MismatchedLengths { num_tasks: usize, num_heights: usize },

    #[error("cannot force task {task_index} to be optional: it has no presence variable")]
    TaskIsNotOptional { task_index: usize },

    #[error("capacity must have a non-negative upper bound, got {capacity_ub}")]
    InvalidCapacity { capacity_ub: i32 },
}

/// The status returned by a propagation pass: `Ok(())` on a clean fixpoint, `Err(EmptyDomain)`
/// on a detected infeasibility.
pub type PropagationStatusCP = Result<(), EmptyDomain>;
