use std::rc::Rc;

use crate::basic_types::EmptyDomain;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::variables::AffineView;
use crate::variables::IntegerVariable;

/// `i32::MIN / 2` / `i32::MAX / 2`: the sentinel pair spec.md §9 asks implementations to settle
/// on for an absent optional task's bounds, chosen over `i32::MIN`/`i32::MAX` so that differences
/// such as `ect - lst` computed throughout the profile and theta-tree arithmetic cannot overflow.
pub const SENTINEL_MIN: i32 = i32::MIN / 2;
pub const SENTINEL_MAX: i32 = i32::MAX / 2;

/// The capability every filtering algorithm in this crate is written against (spec.md §9's
/// design note): a task's bounds and the updates that can be applied to them. Implemented by
/// [`Task`] directly and by [`Mirror`], its time-reversed view.
pub trait TaskView {
    fn est(&self, context: PropagationContext) -> i32;
    fn lst(&self, context: PropagationContext) -> i32;
    fn ect(&self, context: PropagationContext) -> i32;
    fn lct(&self, context: PropagationContext) -> i32;
    fn min_duration(&self, context: PropagationContext) -> i32;
    fn max_duration(&self, context: PropagationContext) -> i32;

    fn may_be_performed(&self, context: PropagationContext) -> bool;
    fn must_be_performed(&self, context: PropagationContext) -> bool;

    fn has_compulsory_part(&self, context: PropagationContext) -> bool {
        self.may_be_performed(context) && self.lst(context) < self.ect(context)
    }

    fn is_fixed(&self, context: PropagationContext) -> bool {
        self.est(context) == self.lst(context)
            && self.ect(context) == self.lct(context)
            && self.min_duration(context) == self.max_duration(context)
    }

    fn update_est(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain>;
    fn update_lst(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain>;
    fn update_ect(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain>;
    fn update_lct(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain>;
    fn update_min_duration(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain>;
    fn update_max_duration(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain>;

    /// Forces the task's presence to false. Fails if the task has no presence variable (it is
    /// unconditionally mandatory) or if presence is already fixed to true.
    fn force_to_be_optional(&self, context: &mut PropagationContextMut) -> Result<(), EmptyDomain>;
}

/// A task `(start, duration, end)` with `start + duration = end`, optionally gated by a
/// `presence` Boolean. `presence: None` is a plain mandatory task; `presence: Some(_)` is
/// spec.md's `OptionalTask`, folded into one type per the design note in spec.md §9 rather than
/// kept as two parallel implementations.
///
/// `passive_end`, once set by [`Task::passivate_if_fixed_duration`], caches the offset view
/// `start + duration` (spec.md §6): the fixpoint then only needs to keep `end` synced to it
/// instead of running the general six-step loop.
#[derive(Clone, Debug)]
pub struct Task<Var> {
    pub start: Var,
    pub duration: Var,
    pub end: Var,
    pub presence: Option<Var>,
    passive_end: Option<AffineView<Var>>,
}

impl<Var: IntegerVariable> Task<Var> {
    pub fn new(start: Var, duration: Var, end: Var) -> Self {
        Task {
            start,
            duration,
            end,
            presence: None,
            passive_end: None,
        }
    }

    pub fn new_optional(start: Var, duration: Var, end: Var, presence: Var) -> Self {
        Task {
            start,
            duration,
            end,
            presence: Some(presence),
            passive_end: None,
        }
    }

    /// Builds the time-reversed view used to run a "forward" filtering rule as a "backward"
    /// rule (spec.md §3, §9). Cheap to construct; callers that need it throughout one filtering
    /// pass should hold onto the returned value rather than calling this repeatedly.
    pub fn mirror(self: &Rc<Self>) -> Mirror<Var> {
        Mirror {
            inner: Rc::clone(self),
        }
    }

    fn conflict_to_presence_flip(
        &self,
        context: &mut PropagationContextMut,
    ) -> Result<bool, EmptyDomain> {
        match &self.presence {
            None => Err(EmptyDomain),
            Some(presence) => {
                if context.lower_bound(presence) >= 1 {
                    // Already mandatory: the conflict is genuine, re-raise it.
                    Err(EmptyDomain)
                } else {
                    context.set_upper_bound(presence, 0)?;
                    Ok(true)
                }
            }
        }
    }
}

impl<Var: IntegerVariable + PartialEq> Task<Var> {
    /// Detects, once at post time, whether `duration` is already fixed; if so the `start +
    /// duration = end` equality is maintained structurally through a cached offset view of
    /// `start` (spec.md §6) instead of by re-running the fixpoint on every write. A no-op when
    /// `duration` still has more than one value.
    pub fn passivate_if_fixed_duration(mut self, context: PropagationContext) -> Self {
        if context.is_fixed(&self.duration) {
            let offset = context.lower_bound(&self.duration);
            let view = AffineView::offset(self.start.clone(), offset);
            debug_assert!(view.is_offset_view_of(&self.start));
            self.passive_end = Some(view);
        }
        self
    }
}

impl<Var: IntegerVariable> TaskView for Task<Var> {
    fn est(&self, context: PropagationContext) -> i32 {
        if self.may_be_performed(context) {
            context.lower_bound(&self.start)
        } else {
            SENTINEL_MIN
        }
    }

    fn lst(&self, context: PropagationContext) -> i32 {
        if self.may_be_performed(context) {
            context.upper_bound(&self.start)
        } else {
            SENTINEL_MIN
        }
    }

    fn ect(&self, context: PropagationContext) -> i32 {
        if self.may_be_performed(context) {
            context.lower_bound(&self.end)
        } else {
            SENTINEL_MAX
        }
    }

    fn lct(&self, context: PropagationContext) -> i32 {
        if self.may_be_performed(context) {
            context.upper_bound(&self.end)
        } else {
            SENTINEL_MAX
        }
    }

    fn min_duration(&self, context: PropagationContext) -> i32 {
        if self.may_be_performed(context) {
            context.lower_bound(&self.duration)
        } else {
            0
        }
    }

    fn max_duration(&self, context: PropagationContext) -> i32 {
        if self.may_be_performed(context) {
            context.upper_bound(&self.duration)
        } else {
            SENTINEL_MAX
        }
    }

    fn may_be_performed(&self, context: PropagationContext) -> bool {
        match &self.presence {
            None => true,
            Some(presence) => context.upper_bound(presence) >= 1,
        }
    }

    fn must_be_performed(&self, context: PropagationContext) -> bool {
        match &self.presence {
            None => true,
            Some(presence) => context.lower_bound(presence) >= 1,
        }
    }

    fn update_est(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.may_be_performed(context.as_readonly()) {
            return Ok(false);
        }
        match context.set_lower_bound(&self.start, value) {
            Ok(changed) => {
                let changed = changed || run_task_fixpoint(self, context)?;
                Ok(changed)
            }
            Err(EmptyDomain) => self.conflict_to_presence_flip(context),
        }
    }

    fn update_lst(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.may_be_performed(context.as_readonly()) {
            return Ok(false);
        }
        match context.set_upper_bound(&self.start, value) {
            Ok(changed) => {
                let changed = changed || run_task_fixpoint(self, context)?;
                Ok(changed)
            }
            Err(EmptyDomain) => self.conflict_to_presence_flip(context),
        }
    }

    fn update_ect(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.may_be_performed(context.as_readonly()) {
            return Ok(false);
        }
        // Passivated tasks route the write through the cached view instead of `end` directly, so
        // it lands on `start` (the only variable the view actually stores).
        let result = match &self.passive_end {
            Some(view) => context.set_lower_bound(view, value),
            None => context.set_lower_bound(&self.end, value),
        };
        match result {
            Ok(changed) => {
                let changed = changed || run_task_fixpoint(self, context)?;
                Ok(changed)
            }
            Err(EmptyDomain) => self.conflict_to_presence_flip(context),
        }
    }

    fn update_lct(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.may_be_performed(context.as_readonly()) {
            return Ok(false);
        }
        let result = match &self.passive_end {
            Some(view) => context.set_upper_bound(view, value),
            None => context.set_upper_bound(&self.end, value),
        };
        match result {
            Ok(changed) => {
                let changed = changed || run_task_fixpoint(self, context)?;
                Ok(changed)
            }
            Err(EmptyDomain) => self.conflict_to_presence_flip(context),
        }
    }

    fn update_min_duration(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.may_be_performed(context.as_readonly()) {
            return Ok(false);
        }
        match context.set_lower_bound(&self.duration, value) {
            Ok(changed) => {
                let changed = changed || run_task_fixpoint(self, context)?;
                Ok(changed)
            }
            Err(EmptyDomain) => self.conflict_to_presence_flip(context),
        }
    }

    fn update_max_duration(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.may_be_performed(context.as_readonly()) {
            return Ok(false);
        }
        match context.set_upper_bound(&self.duration, value) {
            Ok(changed) => {
                let changed = changed || run_task_fixpoint(self, context)?;
                Ok(changed)
            }
            Err(EmptyDomain) => self.conflict_to_presence_flip(context),
        }
    }

    fn force_to_be_optional(&self, context: &mut PropagationContextMut) -> Result<(), EmptyDomain> {
        self.conflict_to_presence_flip(context).map(|_| ())
    }
}

/// Bound consistency for `start + duration = end` (spec.md §4.1): a six-update fixpoint loop run
/// after every write to one of the three variables. Passivated tasks (`passive_end.is_some()`)
/// skip the loop entirely and just resync `end` to the cached view.
fn run_task_fixpoint<Var: IntegerVariable>(
    task: &Task<Var>,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    if let Some(view) = &task.passive_end {
        // `end` is redundant by construction; just keep it synced to the view instead of
        // re-deriving start/duration/end from each other.
        let view_lb = context.lower_bound(view);
        let view_ub = context.upper_bound(view);
        let mut changed = context.set_lower_bound(&task.end, view_lb)?;
        changed |= context.set_upper_bound(&task.end, view_ub)?;
        return Ok(changed);
    }

    let mut any_change = false;
    loop {
        let mut changed = false;

        let start_ub = context.upper_bound(&task.start);
        let start_lb = context.lower_bound(&task.start);
        let end_ub = context.upper_bound(&task.end);
        let end_lb = context.lower_bound(&task.end);
        let dur_lb = context.lower_bound(&task.duration);
        let dur_ub = context.upper_bound(&task.duration);

        changed |= context.set_upper_bound(&task.start, end_ub.saturating_sub(dur_lb))?;
        changed |= context.set_lower_bound(&task.start, end_lb.saturating_sub(dur_ub))?;

        let start_lb = context.lower_bound(&task.start).max(start_lb);
        let start_ub = context.upper_bound(&task.start).min(start_ub);
        let _ = (start_lb, start_ub);

        changed |= context.set_lower_bound(
            &task.end,
            context.lower_bound(&task.start) + context.lower_bound(&task.duration),
        )?;
        changed |= context.set_upper_bound(
            &task.end,
            context.upper_bound(&task.start) + context.upper_bound(&task.duration),
        )?;

        changed |= context.set_lower_bound(
            &task.duration,
            context.lower_bound(&task.end) - context.upper_bound(&task.start),
        )?;
        changed |= context.set_upper_bound(
            &task.duration,
            context.upper_bound(&task.end) - context.lower_bound(&task.start),
        )?;

        any_change |= changed;
        if !changed {
            break;
        }
    }
    Ok(any_change)
}

/// Delegates to the pointee so the n-ary disjunctive propagator, which needs to hold tasks behind
/// an `Rc` in order to build their mirrors, can still pass `Vec<Rc<Task<Var>>>` anywhere a
/// `&[impl TaskView]` is expected.
impl<Var: IntegerVariable> TaskView for Rc<Task<Var>> {
    fn est(&self, context: PropagationContext) -> i32 {
        self.as_ref().est(context)
    }

    fn lst(&self, context: PropagationContext) -> i32 {
        self.as_ref().lst(context)
    }

    fn ect(&self, context: PropagationContext) -> i32 {
        self.as_ref().ect(context)
    }

    fn lct(&self, context: PropagationContext) -> i32 {
        self.as_ref().lct(context)
    }

    fn min_duration(&self, context: PropagationContext) -> i32 {
        self.as_ref().min_duration(context)
    }

    fn max_duration(&self, context: PropagationContext) -> i32 {
        self.as_ref().max_duration(context)
    }

    fn may_be_performed(&self, context: PropagationContext) -> bool {
        self.as_ref().may_be_performed(context)
    }

    fn must_be_performed(&self, context: PropagationContext) -> bool {
        self.as_ref().must_be_performed(context)
    }

    fn update_est(&self, context: &mut PropagationContextMut, value: i32) -> Result<bool, EmptyDomain> {
        self.as_ref().update_est(context, value)
    }

    fn update_lst(&self, context: &mut PropagationContextMut, value: i32) -> Result<bool, EmptyDomain> {
        self.as_ref().update_lst(context, value)
    }

    fn update_ect(&self, context: &mut PropagationContextMut, value: i32) -> Result<bool, EmptyDomain> {
        self.as_ref().update_ect(context, value)
    }

    fn update_lct(&self, context: &mut PropagationContextMut, value: i32) -> Result<bool, EmptyDomain> {
        self.as_ref().update_lct(context, value)
    }

    fn update_min_duration(&self, context: &mut PropagationContextMut, value: i32) -> Result<bool, EmptyDomain> {
        self.as_ref().update_min_duration(context, value)
    }

    fn update_max_duration(&self, context: &mut PropagationContextMut, value: i32) -> Result<bool, EmptyDomain> {
        self.as_ref().update_max_duration(context, value)
    }

    fn force_to_be_optional(&self, context: &mut PropagationContextMut) -> Result<(), EmptyDomain> {
        self.as_ref().force_to_be_optional(context)
    }
}

/// The time-reversed view of a [`Task`]: `est(mirror) = -lct(task)`, and so on, used to run a
/// rule written for one direction of time as the dual rule in the other (spec.md §3, §9).
/// Writes on the mirror translate to writes on the corresponding bound of the original task.
#[derive(Clone, Debug)]
pub struct Mirror<Var> {
    inner: Rc<Task<Var>>,
}

impl<Var: IntegerVariable> TaskView for Mirror<Var> {
    fn est(&self, context: PropagationContext) -> i32 {
        negate(self.inner.lct(context))
    }

    fn lst(&self, context: PropagationContext) -> i32 {
        negate(self.inner.ect(context))
    }

    fn ect(&self, context: PropagationContext) -> i32 {
        negate(self.inner.lst(context))
    }

    fn lct(&self, context: PropagationContext) -> i32 {
        negate(self.inner.est(context))
    }

    fn min_duration(&self, context: PropagationContext) -> i32 {
        self.inner.min_duration(context)
    }

    fn max_duration(&self, context: PropagationContext) -> i32 {
        self.inner.max_duration(context)
    }

    fn may_be_performed(&self, context: PropagationContext) -> bool {
        self.inner.may_be_performed(context)
    }

    fn must_be_performed(&self, context: PropagationContext) -> bool {
        self.inner.must_be_performed(context)
    }

    fn update_est(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        self.inner.update_lct(context, negate(value))
    }

    fn update_lst(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        self.inner.update_ect(context, negate(value))
    }

    fn update_ect(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        self.inner.update_lst(context, negate(value))
    }

    fn update_lct(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        self.inner.update_est(context, negate(value))
    }

    fn update_min_duration(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        self.inner.update_min_duration(context, value)
    }

    fn update_max_duration(
        &self,
        context: &mut PropagationContextMut,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        self.inner.update_max_duration(context, value)
    }

    fn force_to_be_optional(&self, context: &mut PropagationContextMut) -> Result<(), EmptyDomain> {
        self.inner.force_to_be_optional(context)
    }
}

/// Negation that saturates at the sentinel bounds instead of overflowing, so mirroring a sentinel
/// value yields the opposite sentinel rather than panicking.
fn negate(value: i32) -> i32 {
    if value <= SENTINEL_MIN {
        SENTINEL_MAX
    } else if value >= SENTINEL_MAX {
        SENTINEL_MIN
    } else {
        -value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Assignments;

    fn context(assignments: &Assignments) -> PropagationContext {
        PropagationContext::new(assignments)
    }

    #[test]
    fn fixpoint_tightens_start_from_end_and_duration() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 20);
        let duration = assignments.grow(3, 3);
        let end = assignments.grow(0, 20);
        let task = Task::new(start, duration, end);

        let mut ctx = PropagationContextMut::new(&mut assignments);
        task.update_lct(&mut ctx, 10).unwrap();

        assert_eq!(assignments.get_upper_bound(start), 7);
    }

    #[test]
    fn optional_task_absorbs_would_be_failure_as_presence_flip() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 5);
        let duration = assignments.grow(2, 2);
        let end = assignments.grow(0, 5);
        let presence = assignments.grow(0, 1);
        let task = Task::new_optional(start, duration, end, presence);

        let mut ctx = PropagationContextMut::new(&mut assignments);
        // Pushing est to 10 would empty start's domain; the task should become optional instead.
        task.update_est(&mut ctx, 10).unwrap();

        assert_eq!(assignments.get_upper_bound(presence), 0);
        assert!(!task.may_be_performed(context(&assignments)));
    }

    #[test]
    fn mandatory_task_conflict_is_not_absorbed() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 5);
        let duration = assignments.grow(2, 2);
        let end = assignments.grow(0, 5);
        let task = Task::new(start, duration, end);

        let mut ctx = PropagationContextMut::new(&mut assignments);
        assert!(task.update_est(&mut ctx, 10).is_err());
    }

    #[test]
    fn sentinel_bounds_apply_once_a_task_cannot_be_performed() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 5);
        let duration = assignments.grow(2, 2);
        let end = assignments.grow(0, 5);
        let presence = assignments.grow(0, 1);
        let task = Task::new_optional(start, duration, end, presence);
        assignments.fix(presence, 0).unwrap();

        let ctx = context(&assignments);
        assert_eq!(task.est(ctx), SENTINEL_MIN);
        assert_eq!(task.lct(ctx), SENTINEL_MAX);
        assert!(!task.has_compulsory_part(ctx));
    }

    #[test]
    fn mirror_reverses_bounds() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 10);
        let duration = assignments.grow(2, 2);
        let end = assignments.grow(0, 10);
        assignments.fix(start, 3).unwrap();
        assignments.fix(end, 5).unwrap();

        let task = Rc::new(Task::new(start, duration, end));
        let mirror = task.mirror();

        let ctx = context(&assignments);
        assert_eq!(mirror.est(ctx), -5);
        assert_eq!(mirror.ect(ctx), -3);
    }

    #[test]
    fn fixed_duration_task_is_passivated_and_stays_in_sync() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 10);
        let duration = assignments.grow(4, 4);
        let end = assignments.grow(4, 14);
        let task = Task::new(start, duration, end).passivate_if_fixed_duration(context(&assignments));

        let mut ctx = PropagationContextMut::new(&mut assignments);
        // Tightening start should resync end through the cached view rather than the six-step
        // loop.
        task.update_lst(&mut ctx, 6).unwrap();
        assert_eq!(assignments.get_upper_bound(end), 10);

        // Tightening lct routes through the view, landing back on start.
        task.update_lct(&mut ctx, 8).unwrap();
        assert_eq!(assignments.get_upper_bound(start), 4);
    }

    #[test]
    fn non_fixed_duration_task_is_not_passivated() {
        let mut assignments = Assignments::default();
        let start = assignments.grow(0, 10);
        let duration = assignments.grow(2, 4);
        let end = assignments.grow(2, 14);
        let task = Task::new(start, duration, end).passivate_if_fixed_duration(context(&assignments));

        let mut ctx = PropagationContextMut::new(&mut assignments);
        task.update_lct(&mut ctx, 8).unwrap();
        // The general fixpoint still runs: start's upper bound narrows from the tightened end.
        assert_eq!(assignments.get_upper_bound(start), 6);
    }
}
