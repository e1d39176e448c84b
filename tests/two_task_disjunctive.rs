//! End-to-end scenarios of spec.md §8 for the two-task closed-form disjunctive filter.

use resource_scheduling_core::engine::Assignments;
use resource_scheduling_core::engine::PropagationContext;
use resource_scheduling_core::engine::PropagationContextMut;
use resource_scheduling_core::factory;
use resource_scheduling_core::propagators::Entailment;
use resource_scheduling_core::propagators::Task;

#[test]
fn two_tasks_impossible_placement_fails() {
    // t1 = (0, 9, 9) fixed; t2 = start=8, duration in {0,6}, end in [8,14]: t2 cannot avoid
    // overlapping t1 regardless of which of the two duration values it takes.
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

    let ro = PropagationContext::new(&assignments);
    let mut constraint = factory::disjunctive(vec![t1, t2], ro);
    let mut ctx = PropagationContextMut::new(&mut assignments);
    let result = constraint.propagate(&mut ctx);
    assert!(result.is_err());
}

#[test]
fn detectable_precedence_entailment_stays_undefined_until_fixed() {
    // A=(0,3,5), B=(4,3,10): A could finish as late as its own lct, so B cannot yet be shown to
    // need to start after A; the pair is undetermined rather than provably disjoint or
    // provably overlapping.
    let mut assignments = Assignments::default();
    let start_a = assignments.grow(0, 2);
    let duration_a = assignments.grow(3, 3);
    let end_a = assignments.grow(3, 5);
    let a = Task::new(start_a, duration_a, end_a);

    let start_b = assignments.grow(4, 7);
    let duration_b = assignments.grow(3, 3);
    let end_b = assignments.grow(7, 10);
    let b = Task::new(start_b, duration_b, end_b);

    let ro = PropagationContext::new(&assignments);
    let mut constraint = factory::disjunctive(vec![a, b], ro);
    let mut ctx = PropagationContextMut::new(&mut assignments);
    constraint.propagate(&mut ctx).unwrap();

    // B's est does not move: A cannot be shown to finish before B could possibly start.
    assert_eq!(assignments.get_lower_bound(start_b), 4);

    let ro = PropagationContext::new(&assignments);
    assert_eq!(constraint.is_entailed(ro), Entailment::Undefined);
}

#[test]
fn disjoint_windows_are_entailed_true() {
    let mut assignments = Assignments::default();
    let a = Task::new(
        assignments.grow(0, 0),
        assignments.grow(3, 3),
        assignments.grow(3, 3),
    );
    let b = Task::new(
        assignments.grow(5, 5),
        assignments.grow(3, 3),
        assignments.grow(8, 8),
    );

    let ro = PropagationContext::new(&assignments);
    let constraint = factory::disjunctive(vec![a, b], ro);
    let ro = PropagationContext::new(&assignments);
    assert_eq!(constraint.is_entailed(ro), Entailment::True);
}
