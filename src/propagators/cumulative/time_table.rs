//! Time-table filtering and the height update (spec.md §4.6 (a) and (b)): the two profile-driven
//! filters the n-ary cumulative propagator runs to a local fixpoint alongside the overload check.

use crate::basic_types::EmptyDomain;
use crate::engine::PropagationContextMut;
use crate::propagators::profile::Profile;
use crate::propagators::resource_utils;
use crate::propagators::task::TaskView;
use crate::variables::IntegerVariable;

/// Sweeps each task's window against the rebuilt profile, pushing `est` forward (or `lct`
/// backward) past any rectangle that would overflow the capacity if the task were scheduled
/// there (spec.md §4.6(a)). Rebuilds the profile and repeats until a pass makes no change.
pub fn filter<T: TaskView, H: IntegerVariable, Cap: IntegerVariable>(
    tasks: &[T],
    heights: &[Option<H>],
    capacity: &Cap,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let mut any_change = false;
    loop {
        let (profile, _) = Profile::build(tasks, heights, context.as_readonly());
        let mut changed_this_pass = false;

        for (index, task) in tasks.iter().enumerate() {
            let ro = context.as_readonly();
            if !task.may_be_performed(ro) {
                continue;
            }
            let height = heights.get(index).and_then(|h| h.as_ref());
            let demand = height.map_or(1, |h| context.lower_bound(h));
            let capacity_ub = context.upper_bound(capacity);

            if push_est_forward(task, height, demand, capacity_ub, &profile, context)? {
                changed_this_pass = true;
                continue;
            }
            if push_lct_backward(task, height, demand, capacity_ub, &profile, context)? {
                changed_this_pass = true;
            }
        }

        any_change |= changed_this_pass;
        if !changed_this_pass {
            break;
        }
    }
    Ok(any_change)
}

fn push_est_forward<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    demand: i32,
    capacity_ub: i32,
    profile: &Profile,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let ro = context.as_readonly();
    let est = task.est(ro);
    let window_end = task.ect(ro).min(task.lst(ro));
    if est >= window_end {
        return Ok(false);
    }

    let rects = profile.rectangles();
    let mut index = profile.find(est);
    while index < rects.len() && rects[index].start < window_end {
        let rect = rects[index];
        if capacity_ub - demand < rect.height {
            let new_est = task.lst(ro).min(rect.end);
            return resource_utils::filter_est(task, height, new_est, context);
        }
        index += 1;
    }
    Ok(false)
}

fn push_lct_backward<T: TaskView, H: IntegerVariable>(
    task: &T,
    height: Option<&H>,
    demand: i32,
    capacity_ub: i32,
    profile: &Profile,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let ro = context.as_readonly();
    let lct = task.lct(ro);
    let window_start = task.ect(ro).max(task.lst(ro));
    if lct <= window_start {
        return Ok(false);
    }

    let rects = profile.rectangles();
    let mut index = profile.find(lct - 1);
    loop {
        let rect = rects[index];
        if rect.end <= window_start {
            break;
        }
        if capacity_ub - demand < rect.height {
            let new_lct = rect.start.max(task.ect(ro));
            return resource_utils::filter_lct(task, height, new_lct, context);
        }
        if index == 0 {
            break;
        }
        index -= 1;
    }
    Ok(false)
}

/// Tightens `height.ub` for every task with a compulsory part against every profile rectangle it
/// overlaps, subtracting the task's own contribution (spec.md §4.6(b)).
pub fn height_update<T: TaskView, H: IntegerVariable, Cap: IntegerVariable>(
    tasks: &[T],
    heights: &[Option<H>],
    capacity: &Cap,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let (profile, _) = Profile::build(tasks, heights, context.as_readonly());
    let mut changed = false;

    for (index, task) in tasks.iter().enumerate() {
        let ro = context.as_readonly();
        if !task.has_compulsory_part(ro) {
            continue;
        }
        let Some(height) = heights.get(index).and_then(|h| h.as_ref()) else {
            continue;
        };
        let demand = context.lower_bound(height);
        let capacity_ub = context.upper_bound(capacity);
        let lst = task.lst(ro);
        let ect = task.ect(ro);

        let rects = profile.rectangles();
        let mut index_in_profile = profile.find(lst);
        while index_in_profile < rects.len() && rects[index_in_profile].start < ect {
            let rect = rects[index_in_profile];
            let bound = capacity_ub - (rect.height - demand);
            changed |= context.set_upper_bound(height, bound)?;
            index_in_profile += 1;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Assignments;
    use crate::engine::PropagationContext;
    use crate::propagators::task::Task;

    #[test]
    fn time_table_pushes_est_past_an_overloaded_rectangle() {
        // t1 = (9, 6, 15) fixed, height 1, capacity 1. t2's window [10, 22) overlaps t1's
        // compulsory part, so it must be pushed to start no earlier than t1 finishes.
        let mut assignments = Assignments::default();
        let t1 = Task::new(
            assignments.grow(9, 9),
            assignments.grow(6, 6),
            assignments.grow(15, 15),
        );
        let start2 = assignments.grow(10, 20);
        let duration2 = assignments.grow(2, 2);
        let end2 = assignments.grow(12, 22);
        let t2 = Task::new(start2, duration2, end2);
        let capacity = assignments.grow(1, 1);
        let tasks = vec![t1, t2];
        let heights: Vec<Option<crate::variables::DomainId>> = vec![None, None];

        let mut ctx = PropagationContextMut::new(&mut assignments);
        filter(&tasks, &heights, &capacity, &mut ctx).unwrap();
        assert_eq!(assignments.get_lower_bound(start2), 15);
    }

    #[test]
    fn height_update_caps_demand_against_shared_rectangle() {
        let mut assignments = Assignments::default();
        let t1 = Task::new(
            assignments.grow(0, 0),
            assignments.grow(5, 5),
            assignments.grow(5, 5),
        );
        let t2 = Task::new(
            assignments.grow(2, 2),
            assignments.grow(3, 3),
            assignments.grow(5, 5),
        );
        let capacity = assignments.grow(4, 4);
        let height2 = assignments.grow(1, 4);
        let tasks = vec![t1, t2];
        let heights: Vec<Option<crate::variables::DomainId>> = vec![None, Some(height2)];

        let mut ctx = PropagationContextMut::new(&mut assignments);
        height_update(&tasks, &heights, &capacity, &mut ctx).unwrap();
        // t1 contributes demand 1 on [2, 5); t2's own height is excluded from the cap so it may
        // use up to capacity(4) - (profile height there (1 + t2's own lb=1) - t2's lb=1) = 3.
        let ro = PropagationContext::new(&assignments);
        assert!(ro.upper_bound(&height2) <= 3);
    }
}
