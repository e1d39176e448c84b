//! The task factory interface exposed to a modeling layer (spec.md §6): posting a disjunctive or
//! cumulative constraint picks, once, which internal propagator combination actually does the
//! filtering. The partition decisions below read bounds only at post-time and never again.

use std::rc::Rc;

use crate::basic_types::PropagationStatusCP;
use crate::basic_types::ResourceConstraintError;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::propagators::two_task;
use crate::propagators::Capacity;
use crate::propagators::CapacityEntry;
use crate::propagators::Cumulative;
use crate::propagators::CumulativeOptions;
use crate::propagators::Disjunctive;
use crate::propagators::Entailment;
use crate::propagators::Task;
use crate::propagators::TaskView;
use crate::variables::DomainId;

/// A posted constraint, dispatching to whichever internal combination the factory chose. Every
/// variant implements the same propagate/entailment contract (spec.md §6's propagator contract),
/// collapsed here into one enum rather than a trait object since the factory is the only caller
/// that needs to hold onto one of these uniformly.
pub enum Constraint {
    /// `|tasks| < 2`: always satisfied, nothing to filter.
    Trivial,
    TwoTask(TwoTaskEntry),
    NaryDisjunctive(Disjunctive<DomainId>),
    /// One surviving task in a `cumulative` posting: plain arithmetic `height <= capacity`.
    HeightBound { height: DomainId, capacity: DomainId },
    /// `capacity.ub <= 1`: a capacity propagator riding alongside the disjunctive core, so height
    /// bounds still get tightened the way `Capacity` does it even though the disjunctive engine
    /// itself reasons only over task presence.
    CapacitatedDisjunctive {
        capacity: Capacity<Task<DomainId>, DomainId, DomainId>,
        core: Box<Constraint>,
    },
    /// The general cumulative posting: capacity propagator, an optional disjunctive propagator
    /// over the high-demand subset, and a cumulative propagator over the rest.
    Combined {
        capacity: Capacity<Task<DomainId>, DomainId, DomainId>,
        disjunctive: Option<Disjunctive<DomainId>>,
        cumulative: Cumulative<Task<DomainId>, DomainId, DomainId>,
    },
}

pub struct TwoTaskEntry {
    a: Task<DomainId>,
    height_a: Option<DomainId>,
    b: Task<DomainId>,
    height_b: Option<DomainId>,
}

impl Constraint {
    pub fn propagate(&mut self, context: &mut PropagationContextMut) -> PropagationStatusCP {
        match self {
            Constraint::Trivial => Ok(()),
            Constraint::TwoTask(entry) => {
                loop {
                    let changed = two_task::propagate(
                        &entry.a,
                        entry.height_a.as_ref(),
                        &entry.b,
                        entry.height_b.as_ref(),
                        context,
                    )?;
                    if !changed {
                        break;
                    }
                }
                Ok(())
            }
            Constraint::NaryDisjunctive(disjunctive) => {
                loop {
                    if !disjunctive.propagate(context)? {
                        break;
                    }
                }
                Ok(())
            }
            Constraint::HeightBound { height, capacity } => {
                let capacity_ub = context.upper_bound(capacity);
                context.set_upper_bound(height, capacity_ub)?;
                let height_lb = context.lower_bound(height);
                context.set_lower_bound(capacity, height_lb)?;
                Ok(())
            }
            Constraint::CapacitatedDisjunctive { capacity, core } => {
                capacity.propagate(context)?;
                core.propagate(context)
            }
            Constraint::Combined {
                capacity,
                disjunctive,
                cumulative,
            } => {
                capacity.propagate(context)?;
                if let Some(disjunctive) = disjunctive {
                    loop {
                        if !disjunctive.propagate(context)? {
                            break;
                        }
                    }
                }
                cumulative.propagate(context)
            }
        }
    }

    pub fn is_entailed(&self, context: PropagationContext) -> Entailment {
        match self {
            Constraint::Trivial => Entailment::True,
            Constraint::TwoTask(entry) => two_task::entailment(
                &entry.a,
                entry.height_a.as_ref(),
                &entry.b,
                entry.height_b.as_ref(),
                context,
            ),
            Constraint::NaryDisjunctive(disjunctive) => disjunctive.entailment(context),
            Constraint::HeightBound { height, capacity } => {
                if context.upper_bound(height) <= context.lower_bound(capacity) {
                    Entailment::True
                } else if context.lower_bound(height) > context.upper_bound(capacity) {
                    Entailment::False
                } else {
                    Entailment::Undefined
                }
            }
            Constraint::CapacitatedDisjunctive { core, .. } => core.is_entailed(context),
            // A combined posting is only entailed once every branch it delegates to agrees; since
            // the disjunctive branch only covers a subset, we cannot derive FALSE from it alone,
            // so entailment is reported conservatively through the cumulative branch, which sees
            // every task.
            Constraint::Combined { cumulative, .. } => cumulative.is_entailed(context),
        }
    }
}

fn build_disjunctive_core(tasks: Vec<Task<DomainId>>) -> Constraint {
    if tasks.len() < 2 {
        return Constraint::Trivial;
    }
    if tasks.len() == 2 {
        let mut iter = tasks.into_iter();
        let a = iter.next().unwrap();
        let b = iter.next().unwrap();
        return Constraint::TwoTask(TwoTaskEntry {
            a,
            height_a: None,
            b,
            height_b: None,
        });
    }
    let rcs: Vec<Rc<Task<DomainId>>> = tasks.into_iter().map(Rc::new).collect();
    Constraint::NaryDisjunctive(Disjunctive::new(rcs))
}

/// `disjunctive(tasks)` of spec.md §6: no heights, no shared capacity variable.
pub fn disjunctive(tasks: Vec<Task<DomainId>>, context: PropagationContext) -> Constraint {
    let tasks = passivate_tasks(tasks, context);
    build_disjunctive_core(tasks)
}

/// Detects, once at post time, which tasks already have a fixed duration so their fixpoint can
/// passivate (spec.md §6) instead of re-deriving `end` from `start`/`duration` on every write.
fn passivate_tasks(
    tasks: Vec<Task<DomainId>>,
    context: PropagationContext,
) -> Vec<Task<DomainId>> {
    tasks
        .into_iter()
        .map(|task| task.passivate_if_fixed_duration(context))
        .collect()
}

/// `disjunctive(tasks, heights, capacity)` of spec.md §6. The disjunctive engine itself only
/// reasons over task presence, so the heights ride alongside it on an independent [`Capacity`]
/// propagator that tightens them and forces tasks off when they cannot fit.
pub fn disjunctive_with_capacity(
    tasks: Vec<Task<DomainId>>,
    heights: Vec<Option<DomainId>>,
    capacity: DomainId,
    context: PropagationContext,
) -> Result<Constraint, ResourceConstraintError> {
    if tasks.len() != heights.len() {
        return Err(ResourceConstraintError::MismatchedLengths {
            num_tasks: tasks.len(),
            num_heights: heights.len(),
        });
    }
    let capacity_ub = context.upper_bound(&capacity);
    if capacity_ub < 0 {
        return Err(ResourceConstraintError::InvalidCapacity { capacity_ub });
    }

    let tasks = passivate_tasks(tasks, context);
    let entries: Vec<CapacityEntry<Task<DomainId>, DomainId>> = tasks
        .iter()
        .cloned()
        .zip(heights.iter().cloned())
        .map(|(task, height)| CapacityEntry { task, height })
        .collect();
    let capacity_prop = Capacity::new(entries, capacity, capacity_ub);
    let core = build_disjunctive_core(tasks);
    Ok(Constraint::CapacitatedDisjunctive {
        capacity: capacity_prop,
        core: Box::new(core),
    })
}

/// `cumulative(tasks, heights, capacity)` of spec.md §6.
pub fn cumulative(
    tasks: Vec<Task<DomainId>>,
    heights: Vec<Option<DomainId>>,
    capacity: DomainId,
    context: PropagationContext,
) -> Result<Constraint, ResourceConstraintError> {
    if tasks.len() != heights.len() {
        return Err(ResourceConstraintError::MismatchedLengths {
            num_tasks: tasks.len(),
            num_heights: heights.len(),
        });
    }
    let capacity_ub = context.upper_bound(&capacity);
    if capacity_ub < 0 {
        return Err(ResourceConstraintError::InvalidCapacity { capacity_ub });
    }

    let tasks = passivate_tasks(tasks, context);

    // Drop tasks that can never occupy the resource: a fixed zero height, or a duration that can
    // never exceed zero.
    let mut surviving_tasks = Vec::new();
    let mut surviving_heights = Vec::new();
    for (task, height) in tasks.into_iter().zip(heights.into_iter()) {
        let height_ub = height.as_ref().map_or(1, |h| context.upper_bound(h));
        if height_ub == 0 || task.max_duration(context) == 0 {
            continue;
        }
        surviving_tasks.push(task);
        surviving_heights.push(height);
    }

    if surviving_tasks.is_empty() {
        return Ok(Constraint::Trivial);
    }

    if surviving_tasks.len() == 1 {
        let task = surviving_tasks.into_iter().next().unwrap();
        let height = surviving_heights.into_iter().next().unwrap();
        return Ok(match height {
            Some(height) => Constraint::HeightBound { height, capacity },
            // No explicit height means a fixed demand of 1; the only way a single such task could
            // still be here is capacity.ub >= 1, which is never violated on its own.
            None => Constraint::Trivial,
        });
    }

    if capacity_ub <= 1 {
        let entries: Vec<CapacityEntry<Task<DomainId>, DomainId>> = surviving_tasks
            .iter()
            .cloned()
            .zip(surviving_heights.iter().cloned())
            .map(|(task, height)| CapacityEntry { task, height })
            .collect();
        let capacity_prop = Capacity::new(entries, capacity, capacity_ub);
        let core = build_disjunctive_core(surviving_tasks);
        return Ok(Constraint::CapacitatedDisjunctive {
            capacity: capacity_prop,
            core: Box::new(core),
        });
    }

    // Combined posting: partition by minimum positive height against capacity.ub / 2, computed
    // once here and never revisited (spec.md §6).
    let high_demand_threshold = capacity_ub / 2;
    let mut high_demand: Vec<(Task<DomainId>, Option<DomainId>)> = Vec::new();
    let mut low_demand = Vec::new();
    let mut low_demand_heights = Vec::new();
    for (task, height) in surviving_tasks.into_iter().zip(surviving_heights.into_iter()) {
        let min_positive_height = height.as_ref().map_or(1, |h| context.lower_bound(h).max(1));
        if min_positive_height > high_demand_threshold {
            high_demand.push((task, height));
        } else {
            low_demand.push(task);
            low_demand_heights.push(height);
        }
    }

    let all_entries: Vec<CapacityEntry<Task<DomainId>, DomainId>> = high_demand
        .iter()
        .cloned()
        .map(|(task, height)| CapacityEntry { task, height })
        .chain(
            low_demand
                .iter()
                .cloned()
                .zip(low_demand_heights.iter().cloned())
                .map(|(task, height)| CapacityEntry { task, height }),
        )
        .collect();
    let capacity_prop = Capacity::new(all_entries, capacity, capacity_ub);

    let disjunctive = if high_demand.len() >= 2 {
        let rcs: Vec<Rc<Task<DomainId>>> = high_demand
            .into_iter()
            .map(|(task, _height)| Rc::new(task))
            .collect();
        Some(Disjunctive::new(rcs))
    } else {
        None
    };

    let cumulative_prop = Cumulative::new(
        low_demand,
        low_demand_heights,
        capacity,
        CumulativeOptions::default(),
    );

    Ok(Constraint::Combined {
        capacity: capacity_prop,
        disjunctive,
        cumulative: cumulative_prop,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Assignments;
    use crate::propagators::Task as TaskCtor;

    #[test]
    fn two_task_posting_dispatches_to_the_closed_form_filter() {
        let mut assignments = Assignments::default();
        let a = TaskCtor::new(
            assignments.grow(0, 0),
            assignments.grow(3, 3),
            assignments.grow(3, 3),
        );
        let start_b = assignments.grow(0, 10);
        let duration_b = assignments.grow(2, 2);
        let end_b = assignments.grow(2, 12);
        let b = TaskCtor::new(start_b, duration_b, end_b);

        let ro = PropagationContext::new(&assignments);
        let mut constraint = disjunctive(vec![a, b], ro);
        let mut ctx = PropagationContextMut::new(&mut assignments);
        constraint.propagate(&mut ctx).unwrap();
        assert_eq!(assignments.get_lower_bound(start_b), 3);
    }

    #[test]
    fn single_surviving_task_becomes_a_height_bound() {
        let mut assignments = Assignments::default();
        let task = TaskCtor::new(
            assignments.grow(0, 0),
            assignments.grow(2, 2),
            assignments.grow(2, 2),
        );
        let height = assignments.grow(3, 8);
        let capacity = assignments.grow(0, 5);

        let ctx = PropagationContext::new(&assignments);
        let mut constraint = cumulative(vec![task], vec![Some(height)], capacity, ctx).unwrap();

        let mut ctx_mut = PropagationContextMut::new(&mut assignments);
        constraint.propagate(&mut ctx_mut).unwrap();
        assert_eq!(assignments.get_upper_bound(height), 5);
    }

    #[test]
    fn zero_duration_task_is_dropped_before_posting() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(8, 8);
        let duration = assignments.grow(0, 0);
        let end = assignments.grow(8, 8);
        let task = TaskCtor::new(start, duration, end);
        let height = assignments.grow(1, 1);
        let capacity = assignments.grow(1, 1);

        let ctx = PropagationContext::new(&assignments);
        let constraint = cumulative(vec![task], vec![Some(height)], capacity, ctx).unwrap();
        assert!(matches!(constraint, Constraint::Trivial));
    }

    #[test]
    fn low_capacity_cumulative_posting_reduces_to_disjunctive() {
        let mut assignments = Assignments::default();
        let mut tasks = Vec::new();
        let mut heights = Vec::new();
        for i in 0..3 {
            let start = assignments.grow(0, 10);
            let duration = assignments.grow(2, 2);
            let end = assignments.grow(2, 12);
            tasks.push(TaskCtor::new(start, duration, end));
            heights.push(Some(assignments.grow(1, 1)));
        }
        let capacity = assignments.grow(1, 1);

        let ctx = PropagationContext::new(&assignments);
        let constraint = cumulative(tasks, heights, capacity, ctx).unwrap();
        assert!(matches!(constraint, Constraint::CapacitatedDisjunctive { .. }));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut assignments = Assignments::default();
        let task = TaskCtor::new(
            assignments.grow(0, 0),
            assignments.grow(2, 2),
            assignments.grow(2, 2),
        );
        let capacity = assignments.grow(0, 5);
        let ctx = PropagationContext::new(&assignments);
        let result = cumulative(vec![task], vec![], capacity, ctx);
        assert!(matches!(
            result,
            Err(ResourceConstraintError::MismatchedLengths { .. })
        ));
    }
}
