//! The two-task disjunctive propagator of spec.md §4.4: a closed-form filter for the pair case,
//! avoiding the theta-tree machinery the n-ary propagator needs.

use crate::basic_types::EmptyDomain;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::propagators::resource_utils;
use crate::propagators::resource_utils::Entailment;
use crate::propagators::task::TaskView;
use crate::variables::IntegerVariable;

pub fn propagate<A: TaskView, B: TaskView, HA: IntegerVariable, HB: IntegerVariable>(
    a: &A,
    height_a: Option<&HA>,
    b: &B,
    height_b: Option<&HB>,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let ro = context.as_readonly();
    if !resource_utils::may_be_performed(a, height_a, ro) || !resource_utils::may_be_performed(b, height_b, ro) {
        return Ok(false);
    }

    if resource_utils::intersect(a, b, ro) && a.has_compulsory_part(ro) && b.has_compulsory_part(ro) {
        // Both mandatory parts overlap: one of the two must leave the resource. Prefer forcing
        // the task that is not already committed (optional) before giving up and failing.
        if !resource_utils::must_be_performed(b, height_b, ro) {
            return resource_utils::filter_optional_task(b, height_b, context);
        }
        if !resource_utils::must_be_performed(a, height_a, ro) {
            return resource_utils::filter_optional_task(a, height_a, context);
        }
        return Err(EmptyDomain);
    }

    let mut changed = false;

    // `a` cannot be last: b cannot finish before a even starts, so a must precede b.
    if a.lst(context.as_readonly()) < b.ect(context.as_readonly()) {
        if resource_utils::must_be_performed(a, height_a, context.as_readonly()) {
            let bound = a.ect(context.as_readonly());
            changed |= resource_utils::filter_est(b, height_b, bound, context)?;
        }
        if resource_utils::must_be_performed(b, height_b, context.as_readonly()) {
            let bound = b.lst(context.as_readonly());
            changed |= resource_utils::filter_lct(a, height_a, bound, context)?;
        }
    }

    // Symmetric rule: b must precede a.
    if b.lst(context.as_readonly()) < a.ect(context.as_readonly()) {
        if resource_utils::must_be_performed(b, height_b, context.as_readonly()) {
            let bound = b.ect(context.as_readonly());
            changed |= resource_utils::filter_est(a, height_a, bound, context)?;
        }
        if resource_utils::must_be_performed(a, height_a, context.as_readonly()) {
            let bound = a.lst(context.as_readonly());
            changed |= resource_utils::filter_lct(b, height_b, bound, context)?;
        }
    }

    Ok(changed)
}

pub fn entailment<A: TaskView, B: TaskView, HA: IntegerVariable, HB: IntegerVariable>(
    a: &A,
    height_a: Option<&HA>,
    b: &B,
    height_b: Option<&HB>,
    context: PropagationContext,
) -> Entailment {
    if !resource_utils::may_be_performed(a, height_a, context) || !resource_utils::may_be_performed(b, height_b, context) {
        return Entailment::True;
    }
    let both_mandatory = resource_utils::must_be_performed(a, height_a, context)
        && resource_utils::must_be_performed(b, height_b, context);
    let overlapping_compulsory_parts = resource_utils::intersect(a, b, context)
        && a.has_compulsory_part(context)
        && b.has_compulsory_part(context);
    if both_mandatory && overlapping_compulsory_parts {
        return Entailment::False;
    }
    if !resource_utils::intersect(a, b, context) {
        return Entailment::True;
    }
    Entailment::Undefined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Assignments;
    use crate::propagators::task::Task;

    fn no_height() -> Option<&'static crate::variables::DomainId> {
        None
    }

    #[test]
    fn impossible_placement_fails() {
        // t1 = (0, 9, 9) fixed; t2 = start=8, duration in {0,6}, end in [8,14].
        let mut assignments = Assignments::default();
        let t1 = Task::new(
            assignments.grow(0, 0),
            assignments.grow(9, 9),
            assignments.grow(9, 9),
        );
        let start2 = assignments.grow(8, 8);
        let duration2 = assignments.grow(0, 6);
        let end2 = assignments.grow(8, 14);
        let t2 = Task::new(start2, duration2, end2);

        let mut ctx = PropagationContextMut::new(&mut assignments);
        let mut last = Ok(false);
        for _ in 0..20 {
            last = propagate(&t1, no_height(), &t2, no_height(), &mut ctx);
            if last.is_err() || last == Ok(false) {
                break;
            }
        }
        assert!(last.is_err());
    }

    #[test]
    fn disjoint_windows_are_entailed_true() {
        let mut assignments = Assignments::default();
        let a = Task::new(
            assignments.grow(0, 0),
            assignments.grow(5, 5),
            assignments.grow(5, 5),
        );
        let b = Task::new(
            assignments.grow(5, 5),
            assignments.grow(3, 3),
            assignments.grow(8, 8),
        );
        let ctx = PropagationContext::new(&assignments);
        assert_eq!(entailment(&a, no_height(), &b, no_height(), ctx), Entailment::True);
    }

    #[test]
    fn mandatory_push_when_a_must_precede_b() {
        let mut assignments = Assignments::default();
        let a = Task::new(
            assignments.grow(0, 0),
            assignments.grow(3, 3),
            assignments.grow(3, 3),
        );
        let start_b = assignments.grow(0, 10);
        let duration_b = assignments.grow(2, 2);
        // end's lower bound already reflects start.lb + duration.lb, as the task propagator
        // of spec.md §4.1 would have established before this filter ever runs.
        let end_b = assignments.grow(2, 12);
        let b = Task::new(start_b, duration_b, end_b);

        let mut ctx = PropagationContextMut::new(&mut assignments);
        propagate(&a, no_height(), &b, no_height(), &mut ctx).unwrap();
        assert_eq!(assignments.get_lower_bound(start_b), 3);
    }
}
