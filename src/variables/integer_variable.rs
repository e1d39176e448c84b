use crate::basic_types::EmptyDomain;
use crate::engine::Assignments;

/// Capability trait for anything that behaves like an integer domain: a plain [`super::DomainId`]
/// or an [`super::AffineView`] over one. Every filtering algorithm in [`crate::propagators`] is
/// written against this trait alone, per spec.md §9's design note.
///
/// Write operations return `Ok(true)` iff the domain actually changed (spec.md §6: "each returns
/// `true` iff the domain changed").
pub trait IntegerVariable: Clone + std::fmt::Debug {
    fn lower_bound(&self, assignments: &Assignments) -> i32;

    fn upper_bound(&self, assignments: &Assignments) -> i32;

    fn is_fixed(&self, assignments: &Assignments) -> bool {
        self.lower_bound(assignments) == self.upper_bound(assignments)
    }

    fn tighten_lower_bound(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<bool, EmptyDomain>;

    fn tighten_upper_bound(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<bool, EmptyDomain>;

    fn fix(&self, assignments: &mut Assignments, value: i32) -> Result<bool, EmptyDomain> {
        let lower_changed = if value > self.lower_bound(assignments) {
            self.tighten_lower_bound(assignments, value)?
        } else {
            false
        };
        let upper_changed = if value < self.upper_bound(assignments) {
            self.tighten_upper_bound(assignments, value)?
        } else {
            false
        };
        Ok(lower_changed || upper_changed)
    }
}

impl IntegerVariable for crate::variables::DomainId {
    fn lower_bound(&self, assignments: &Assignments) -> i32 {
        assignments.get_lower_bound(*self)
    }

    fn upper_bound(&self, assignments: &Assignments) -> i32 {
        assignments.get_upper_bound(*self)
    }

    fn tighten_lower_bound(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        assignments.tighten_lower_bound(*self, value)
    }

    fn tighten_upper_bound(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        assignments.tighten_upper_bound(*self, value)
    }
}
