//! Shared filtering primitives used by every resource propagator (spec.md §4.2). These are free
//! functions rather than methods on [`Task`] because a height variable is a plain
//! [`IntegerVariable`], not part of the task itself — a task's demand on the resource is supplied
//! alongside it by the propagator that owns both.
//!
//! [`Task`]: super::task::Task

use crate::basic_types::EmptyDomain;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::propagators::task::TaskView;
use crate::variables::IntegerVariable;

/// The three-valued entailment status of spec.md §7.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entailment {
    True,
    False,
    Undefined,
}

pub fn may_be_performed<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    context: PropagationContext,
) -> bool {
    height.map_or(true, |h| context.upper_bound(h) > 0) && task.may_be_performed(context)
}

pub fn must_be_performed<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    context: PropagationContext,
) -> bool {
    height.map_or(true, |h| context.lower_bound(h) > 0) && task.must_be_performed(context)
}

/// Forces `task` out of the resource: either the height is driven to 0, or — when no height
/// applies — the task itself is forced optional. Fails if neither is possible.
pub fn filter_optional_task<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match height {
        Some(h) => context.set_upper_bound(h, 0),
        None => task.force_to_be_optional(context).map(|()| true),
    }
}

/// When a bound update would fail and the task is not already committed to the resource
/// (`height.lb == 0`), excludes the task from the resource instead of propagating the failure.
fn recover_by_excluding<H: IntegerVariable>(
    height: Option<&H>,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match height {
        Some(h) if context.lower_bound(h) == 0 && context.upper_bound(h) > 0 => {
            context.set_upper_bound(h, 0)
        }
        _ => Err(EmptyDomain),
    }
}

pub fn filter_est<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    value: i32,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match task.update_est(context, value) {
        Ok(changed) => Ok(changed),
        Err(EmptyDomain) => recover_by_excluding(height, context),
    }
}

pub fn filter_lst<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    value: i32,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match task.update_lst(context, value) {
        Ok(changed) => Ok(changed),
        Err(EmptyDomain) => recover_by_excluding(height, context),
    }
}

pub fn filter_ect<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    value: i32,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match task.update_ect(context, value) {
        Ok(changed) => Ok(changed),
        Err(EmptyDomain) => recover_by_excluding(height, context),
    }
}

pub fn filter_lct<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    value: i32,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match task.update_lct(context, value) {
        Ok(changed) => Ok(changed),
        Err(EmptyDomain) => recover_by_excluding(height, context),
    }
}

pub fn filter_duration<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    min_value: i32,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    match task.update_min_duration(context, min_value) {
        Ok(changed) => Ok(changed),
        Err(EmptyDomain) => recover_by_excluding(height, context),
    }
}

/// True iff both tasks may be performed and their start windows interleave: `b.lst < a.ect` and
/// `a.lst < b.ect` (spec.md §4.2). Used by the two-task disjunctive propagator and by the overlap
/// graph maintained by the graph-partitioned cumulative variant (spec.md §4.6).
pub fn intersect<A: TaskView, B: TaskView>(a: &A, b: &B, context: PropagationContext) -> bool {
    a.may_be_performed(context)
        && b.may_be_performed(context)
        && b.lst(context) < a.ect(context)
        && a.lst(context) < b.ect(context)
}

/// `isEntailed(isDisjunctive, tasks, heights, capacity)` of spec.md §4.2 / §7.
pub fn is_entailed<T: TaskView, H: IntegerVariable, Cap: IntegerVariable>(
    is_disjunctive: bool,
    tasks: &[T],
    heights: &[Option<H>],
    capacity: &Cap,
    context: PropagationContext,
) -> Entailment {
    let mut all_fixed = context.is_fixed(capacity);

    for task in tasks {
        if task.may_be_performed(context) && task.est(context) + task.min_duration(context) > task.lct(context) {
            return Entailment::False;
        }
        all_fixed &= task.is_fixed(context);
    }
    for height in heights.iter().flatten() {
        all_fixed &= context.is_fixed(height);
    }

    if is_disjunctive {
        for i in 0..tasks.len() {
            let height_i_mandatory = heights
                .get(i)
                .and_then(|h| h.as_ref())
                .map_or(true, |h| context.lower_bound(h) > 0);
            if !height_i_mandatory || !tasks[i].must_be_performed(context) {
                continue;
            }
            for j in (i + 1)..tasks.len() {
                let height_j_mandatory = heights
                    .get(j)
                    .and_then(|h| h.as_ref())
                    .map_or(true, |h| context.lower_bound(h) > 0);
                if !height_j_mandatory || !tasks[j].must_be_performed(context) {
                    continue;
                }
                if intersect(&tasks[i], &tasks[j], context) {
                    return Entailment::False;
                }
            }
        }
    } else {
        let capacity_ub = context.upper_bound(capacity);
        let max_height = mandatory_profile_height(tasks, heights, context);
        if max_height > capacity_ub {
            return Entailment::False;
        }
    }

    if all_fixed {
        Entailment::True
    } else {
        Entailment::Undefined
    }
}

/// The maximum number of resource units simultaneously committed by tasks with a compulsory
/// part, sampled at every `lst`/`ect` of a mandatory task. Shared by [`is_entailed`] and the
/// overload check (spec.md §4.6), which both need "worst instant" reasoning without building a
/// full profile.
pub fn mandatory_profile_height<T: TaskView, H: IntegerVariable>(
    tasks: &[T],
    heights: &[Option<H>],
    context: PropagationContext,
) -> i32 {
    let mut sample_points = Vec::new();
    for task in tasks {
        if task.has_compulsory_part(context) {
            sample_points.push(task.lst(context));
        }
    }

    let mut max_height = 0;
    for &t in &sample_points {
        let mut height_at_t = 0;
        for (index, task) in tasks.iter().enumerate() {
            if task.has_compulsory_part(context) && task.lst(context) <= t && t < task.ect(context) {
                let demand = heights
                    .get(index)
                    .and_then(|h| h.as_ref())
                    .map_or(1, |h| context.lower_bound(h));
                height_at_t += demand;
            }
        }
        max_height = max_height.max(height_at_t);
    }
    max_height
}
