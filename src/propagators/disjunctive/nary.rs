//! The n-ary disjunctive propagator (spec.md §4.9): composes overload checking, detectable
//! precedences, not-first/not-last, edge-finding, and immediate selections into a fixpoint, run
//! on both the tasks and their mirrors to cover every symmetric rule.

use std::rc::Rc;

use crate::basic_types::EmptyDomain;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::propagators::ascendant_set_tree::AscendantEntry;
use crate::propagators::ascendant_set_tree::AscendantSetTree;
use crate::propagators::resource_utils;
use crate::propagators::resource_utils::Entailment;
use crate::propagators::task::Mirror;
use crate::propagators::task::Task;
use crate::propagators::task::TaskView;
use crate::propagators::theta_tree::ThetaEntry;
use crate::propagators::theta_tree::ThetaTree;
use crate::variables::IntegerVariable;

/// Owns the tasks of one disjunctive (unary resource) constraint and their lazily-built mirrors.
pub struct Disjunctive<Var> {
    tasks: Vec<Rc<Task<Var>>>,
}

impl<Var: IntegerVariable> Disjunctive<Var> {
    pub fn new(tasks: Vec<Rc<Task<Var>>>) -> Self {
        Disjunctive { tasks }
    }

    /// Runs the full fixpoint of spec.md §4.9 on the tasks, then on their mirrors, repeating
    /// until neither pass produces a change.
    pub fn propagate(&self, context: &mut PropagationContextMut) -> Result<bool, EmptyDomain> {
        let mirrors: Vec<Mirror<Var>> = self.tasks.iter().map(Task::mirror).collect();
        let mut any_change = false;
        loop {
            let forward_changed = run_pass(&self.tasks, context)?;
            let mirror_changed = run_pass(&mirrors, context)?;
            any_change |= forward_changed || mirror_changed;
            if !forward_changed && !mirror_changed {
                break;
            }
        }
        Ok(any_change)
    }

    /// UNDEFINED until every task is fixed, then TRUE iff no two mandatory tasks intersect
    /// (spec.md §4.9).
    pub fn entailment(&self, context: PropagationContext) -> Entailment {
        if !self.tasks.iter().all(|t| t.is_fixed(context)) {
            return Entailment::Undefined;
        }
        for i in 0..self.tasks.len() {
            if !self.tasks[i].must_be_performed(context) {
                continue;
            }
            for j in (i + 1)..self.tasks.len() {
                if !self.tasks[j].must_be_performed(context) {
                    continue;
                }
                if resource_utils::intersect(&self.tasks[i], &self.tasks[j], context) {
                    return Entailment::False;
                }
            }
        }
        Entailment::True
    }
}

/// One fixpoint pass of steps 1-5, restarted from the top whenever any step changes a bound
/// (spec.md §4.9's "restart the innermost loop").
fn run_pass<T: TaskView>(tasks: &[T], context: &mut PropagationContextMut) -> Result<bool, EmptyDomain> {
    let mut any_change = false;
    loop {
        overload_check(tasks, context.as_readonly())?;

        let mut changed = false;
        changed |= detectable_precedences(tasks, context)?;
        changed |= not_first_not_last(tasks, context)?;
        changed |= edge_finding(tasks, context)?;
        changed |= immediate_selections(tasks, context)?;

        any_change |= changed;
        if !changed {
            break;
        }
    }
    Ok(any_change)
}

fn mandatory_indices<T: TaskView>(tasks: &[T], context: PropagationContext) -> Vec<usize> {
    (0..tasks.len()).filter(|&i| tasks[i].must_be_performed(context)).collect()
}

fn may_be_performed_indices<T: TaskView>(tasks: &[T], context: PropagationContext) -> Vec<usize> {
    (0..tasks.len()).filter(|&i| tasks[i].may_be_performed(context)).collect()
}

/// Step 1: sorts mandatory tasks by `lct`, adds them to a theta-tree in that order, and fails as
/// soon as the tree's `ect` overtakes the task just added.
fn overload_check<T: TaskView>(tasks: &[T], context: PropagationContext) -> Result<(), EmptyDomain> {
    let indices = mandatory_indices(tasks, context);
    if indices.len() < 2 {
        return Ok(());
    }

    let entries: Vec<ThetaEntry> = indices
        .iter()
        .map(|&i| ThetaEntry {
            est: tasks[i].est(context),
            proc: tasks[i].min_duration(context),
        })
        .collect();
    let mut tree = ThetaTree::init(&entries);

    let mut order: Vec<usize> = (0..indices.len()).collect();
    order.sort_by_key(|&local| tasks[indices[local]].lct(context));

    for &local in &order {
        tree.add(local);
        if tree.get_ect() > tasks[indices[local]].lct(context) {
            return Err(EmptyDomain);
        }
    }
    Ok(())
}

/// Step 2: admits tasks whose `lst` precedes the current task's `ect` into a theta-tree, then
/// pushes `est` to the envelope's earliest completion time without that task's own contribution.
fn detectable_precedences<T: TaskView>(
    tasks: &[T],
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let indices = may_be_performed_indices(tasks, context.as_readonly());
    if indices.len() < 2 {
        return Ok(false);
    }

    let entries: Vec<ThetaEntry> = indices
        .iter()
        .map(|&i| ThetaEntry {
            est: tasks[i].est(context.as_readonly()),
            proc: tasks[i].min_duration(context.as_readonly()),
        })
        .collect();
    let mut tree = ThetaTree::init(&entries);

    let mut by_ect: Vec<usize> = (0..indices.len()).collect();
    by_ect.sort_by_key(|&local| tasks[indices[local]].ect(context.as_readonly()));
    let mut by_lst: Vec<usize> = (0..indices.len()).collect();
    by_lst.sort_by_key(|&local| tasks[indices[local]].lst(context.as_readonly()));

    let mut add_cursor = 0usize;
    let mut changed = false;
    for &local in &by_ect {
        let global = indices[local];
        let current_ect = tasks[global].ect(context.as_readonly());
        while add_cursor < by_lst.len()
            && tasks[indices[by_lst[add_cursor]]].lst(context.as_readonly()) < current_ect
        {
            tree.add(by_lst[add_cursor]);
            add_cursor += 1;
        }

        let new_est = if tree.is_present(local) {
            tree.get_ect_without(local)
        } else {
            tree.get_ect()
        };
        changed |= tasks[global].update_est(context, new_est)?;
    }
    Ok(changed)
}

/// Step 3: the dual of detectable precedences on `lct` — admits tasks whose `lst` precedes the
/// current task's `lct`, and when the envelope without the current task still exceeds the last
/// admitted task's `lst`, pulls the current task's `lct` down to that `lst`.
fn not_first_not_last<T: TaskView>(
    tasks: &[T],
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let indices = may_be_performed_indices(tasks, context.as_readonly());
    if indices.len() < 2 {
        return Ok(false);
    }

    let entries: Vec<ThetaEntry> = indices
        .iter()
        .map(|&i| ThetaEntry {
            est: tasks[i].est(context.as_readonly()),
            proc: tasks[i].min_duration(context.as_readonly()),
        })
        .collect();
    let mut tree = ThetaTree::init(&entries);

    let mut by_lct: Vec<usize> = (0..indices.len()).collect();
    by_lct.sort_by_key(|&local| tasks[indices[local]].lct(context.as_readonly()));
    let mut by_lst: Vec<usize> = (0..indices.len()).collect();
    by_lst.sort_by_key(|&local| tasks[indices[local]].lst(context.as_readonly()));

    let mut add_cursor = 0usize;
    let mut last_added: Option<usize> = None;
    let mut changed = false;

    for &local in &by_lct {
        let global = indices[local];
        let current_lct = tasks[global].lct(context.as_readonly());
        while add_cursor < by_lst.len()
            && tasks[indices[by_lst[add_cursor]]].lst(context.as_readonly()) < current_lct
        {
            tree.add(by_lst[add_cursor]);
            last_added = Some(by_lst[add_cursor]);
            add_cursor += 1;
        }

        if let Some(last) = last_added {
            let ect_without = if tree.is_present(local) {
                tree.get_ect_without(local)
            } else {
                tree.get_ect()
            };
            let lst_id = tasks[global].lst(context.as_readonly());
            if ect_without > lst_id {
                let new_lct = tasks[indices[last]].lst(context.as_readonly());
                changed |= tasks[global].update_lct(context, new_lct)?;
            }
        }
    }
    Ok(changed)
}

/// Step 4: Carlier-Pinson edge-finding (spec.md §4.8's `adjust`) over mandatory tasks. Keeps the
/// bookkeeping sets `U`/`A`/`S`/`D` as plain vectors with linear scans rather than the heap/queue
/// structures a production implementation would use for asymptotic complexity — the deductions
/// made are the same either way, only the constant factor differs. A task re-enters `A`'s
/// consideration on every iteration it stays there (rather than being requeued through a priority
/// structure keyed on updated slack), so this trades completeness for simplicity: every push it
/// makes is sound, but it will not always find every deduction a fully queue-driven `adjust` would.
fn edge_finding<T: TaskView>(tasks: &[T], context: &mut PropagationContextMut) -> Result<bool, EmptyDomain> {
    let indices = mandatory_indices(tasks, context.as_readonly());
    if indices.len() < 2 {
        return Ok(false);
    }

    let entries: Vec<AscendantEntry> = indices
        .iter()
        .map(|&i| AscendantEntry {
            lct: tasks[i].lct(context.as_readonly()),
            p: tasks[i].min_duration(context.as_readonly()),
        })
        .collect();
    let mut tree = AscendantSetTree::init(&entries);

    // U: local ids sorted by decreasing est; we pop from the tail (smallest est) as tasks are
    // admitted into A.
    let mut u_order: Vec<usize> = (0..indices.len()).collect();
    u_order.sort_by_key(|&local| std::cmp::Reverse(tasks[indices[local]].est(context.as_readonly())));

    let mut still_in_s = vec![true; indices.len()];
    let mut a: Vec<usize> = Vec::new();
    let mut d_known = vec![false; indices.len()];
    let mut sc_of: Vec<Option<usize>> = vec![None; indices.len()];

    let mut t = tasks[indices[*u_order.last().unwrap()]].est(context.as_readonly());
    let mut changed = false;

    loop {
        // Step 6 (of the previous iteration) / initial seed: admit U's smallest-est tasks once
        // their est matches the current time.
        while let Some(&local) = u_order.last() {
            if tasks[indices[local]].est(context.as_readonly()) == t {
                a.push(local);
                u_order.pop();
            } else {
                break;
            }
        }

        // Step 1. A task only moves from `A` to `D` once `findSc` actually locates a
        // super-critical witness; otherwise it stays in `A` so step 3 can keep consuming its
        // processing time as `t` advances.
        let mut i = 0;
        while i < a.len() {
            let local = a[i];
            if tasks[indices[local]].est(context.as_readonly()) == t {
                let p = tasks[indices[local]].min_duration(context.as_readonly());
                let leaf = tree.leaf_of(local);
                if let Some(sc_leaf) = tree.find_sc(leaf, t, p) {
                    sc_of[local] = Some(sc_leaf);
                    d_known[local] = true;
                    a.remove(i);
                } else {
                    i += 1;
                }
            } else {
                i += 1;
            }
        }

        if still_in_s.iter().all(|&present| !present) {
            break;
        }
        if t >= tree.ub() {
            return Err(EmptyDomain);
        }

        // Step 3.
        let i_task = a
            .iter()
            .copied()
            .min_by_key(|&local| tasks[indices[local]].lct(context.as_readonly()));
        let t_prime = u_order.last().map(|&local| tasks[indices[local]].est(context.as_readonly()));

        let epsilon = match (i_task, t_prime) {
            (Some(local), Some(tp)) => (tree.remaining(tree.leaf_of(local)) as i64).min((tp - t) as i64),
            (Some(local), None) => tree.remaining(tree.leaf_of(local)) as i64,
            (None, Some(tp)) => (tp - t) as i64,
            (None, None) => break,
        };
        if epsilon <= 0 {
            break;
        }

        // Step 4.
        t += epsilon as i32;
        if let Some(local) = i_task {
            let leaf = tree.leaf_of(local);
            tree.update(leaf, epsilon);
            if tree.remaining(leaf) == 0 {
                still_in_s[local] = false;
                a.retain(|&x| x != local);
            }
        }

        // Step 5.
        let nu_lct = indices
            .iter()
            .enumerate()
            .filter(|&(local, _)| still_in_s[local])
            .map(|(local, _)| tasks[indices[local]].lct(context.as_readonly()))
            .min();
        for local in 0..indices.len() {
            if !d_known[local] {
                continue;
            }
            if let Some(sc_leaf) = sc_of[local] {
                let sc_lct = tree.lct_of_leaf(sc_leaf);
                let consumed = tree.remaining(sc_leaf) == 0;
                let stale = consumed || nu_lct.map_or(false, |nl| nl > sc_lct);
                if stale {
                    d_known[local] = false;
                    sc_of[local] = None;
                    let global = indices[local];
                    changed |= tasks[global].update_est(context, t)?;
                }
            }
        }
    }

    Ok(changed)
}

/// Step 5: a single pairwise sweep over tasks ordered by decreasing `ect` and decreasing `lst`
/// (spec.md §4.9's "immediate selections"). This applies each qualifying push as soon as it's
/// found rather than recording a batch first — the net effect is the same, since the task
/// propagator's own fixpoint (spec.md §4.1) re-runs after every write regardless of whether pushes
/// are applied eagerly or all at once.
fn immediate_selections<T: TaskView>(
    tasks: &[T],
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let indices = may_be_performed_indices(tasks, context.as_readonly());
    if indices.len() < 2 {
        return Ok(false);
    }

    let mut by_ect_desc = indices.clone();
    by_ect_desc.sort_by_key(|&i| std::cmp::Reverse(tasks[i].ect(context.as_readonly())));
    let mut by_lst_desc = indices.clone();
    by_lst_desc.sort_by_key(|&i| std::cmp::Reverse(tasks[i].lst(context.as_readonly())));

    let mut changed = false;
    for &i2 in &by_lst_desc {
        let lst_i2 = tasks[i2].lst(context.as_readonly());
        let ect_i2 = tasks[i2].ect(context.as_readonly());
        let mut max_ect_of_blockers = i32::MIN;

        for &i1 in &by_ect_desc {
            if i1 == i2 {
                continue;
            }
            let ect_i1 = tasks[i1].ect(context.as_readonly());
            if ect_i1 <= lst_i2 {
                break;
            }
            max_ect_of_blockers = max_ect_of_blockers.max(ect_i1);

            let lst_i1 = tasks[i1].lst(context.as_readonly());
            if lst_i1 >= ect_i2 {
                // i1 cannot start before i2 finishes either: i1 must follow i2.
                changed |= tasks[i1].update_lct(context, lst_i2)?;
            }
        }

        if max_ect_of_blockers != i32::MIN {
            changed |= tasks[i2].update_est(context, max_ect_of_blockers)?;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Assignments;

    #[test]
    fn overload_check_fails_on_three_mutually_overlapping_tasks() {
        let mut assignments = Assignments::default();
        let tasks: Vec<Rc<Task<crate::variables::DomainId>>> = (0..3)
            .map(|_| {
                Rc::new(Task::new(
                    assignments.grow(0, 0),
                    assignments.grow(5, 5),
                    assignments.grow(5, 5),
                ))
            })
            .collect();
        let disjunctive = Disjunctive::new(tasks);
        let mut ctx = PropagationContextMut::new(&mut assignments);
        assert!(disjunctive.propagate(&mut ctx).is_err());
    }

    #[test]
    fn edge_finding_pushes_est_past_a_tightly_packed_predecessor() {
        // A=(est=0,p=3,lct=6), B=(est=1,p=3,lct=6): together they exactly fill the window
        // [0, 6) with no slack, so once the tree has fully accounted for A's processing time,
        // B cannot have started any earlier than A's own completion.
        let mut assignments = Assignments::default();
        let start_a = assignments.grow(0, 3);
        let duration_a = assignments.grow(3, 3);
        let end_a = assignments.grow(3, 6);
        let a = Task::new(start_a, duration_a, end_a);

        let start_b = assignments.grow(1, 3);
        let duration_b = assignments.grow(3, 3);
        let end_b = assignments.grow(4, 6);
        let b = Task::new(start_b, duration_b, end_b);

        let tasks = vec![a, b];
        let mut ctx = PropagationContextMut::new(&mut assignments);
        edge_finding(&tasks, &mut ctx).unwrap();
        assert!(assignments.get_lower_bound(start_b) >= 3);
    }

    #[test]
    fn disjoint_tasks_entail_true_once_fixed() {
        let mut assignments = Assignments::default();
        let a = Rc::new(Task::new(
            assignments.grow(0, 0),
            assignments.grow(5, 5),
            assignments.grow(5, 5),
        ));
        let b = Rc::new(Task::new(
            assignments.grow(5, 5),
            assignments.grow(3, 3),
            assignments.grow(8, 8),
        ));
        let disjunctive = Disjunctive::new(vec![a, b]);
        let ctx = PropagationContext::new(&assignments);
        assert_eq!(disjunctive.entailment(ctx), Entailment::True);
    }
}
