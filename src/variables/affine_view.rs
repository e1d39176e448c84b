use crate::basic_types::EmptyDomain;
use crate::engine::Assignments;
use crate::variables::IntegerVariable;

/// A virtual variable whose domain is `scale * inner + offset`. With `scale == 1` this is the
/// `offset(var, d)` view of spec.md §6: structurally equal to `start + d`, which lets the task
/// propagator passivate itself instead of maintaining the equality at runtime.
///
/// Only positive `scale` is supported, which is all the task propagator needs (it never mirrors
/// through a negative-scale view; mirroring is handled separately by [`crate::propagators::Task::mirror`]).
#[derive(Clone, Debug)]
pub struct AffineView<Var> {
    inner: Var,
    scale: i32,
    offset: i32,
}

impl<Var: IntegerVariable> AffineView<Var> {
    pub fn new(inner: Var, scale: i32, offset: i32) -> Self {
        assert!(scale > 0, "AffineView only supports a positive scale");
        AffineView {
            inner,
            scale,
            offset,
        }
    }

    pub fn offset(inner: Var, offset: i32) -> Self {
        AffineView::new(inner, 1, offset)
    }

    /// True iff this view is a pure `inner + offset` view of `other`, i.e. `scale == 1` and the
    /// wrapped variable is `other`. Used to detect when the task propagator's `end = start +
    /// duration` equality is already maintained structurally.
    pub fn is_offset_view_of(&self, other: &Var) -> bool
    where
        Var: PartialEq,
    {
        self.scale == 1 && self.inner == *other
    }

    pub fn offset_value(&self) -> i32 {
        self.offset
    }
}

impl<Var: IntegerVariable> IntegerVariable for AffineView<Var> {
    fn lower_bound(&self, assignments: &Assignments) -> i32 {
        self.scale * self.inner.lower_bound(assignments) + self.offset
    }

    fn upper_bound(&self, assignments: &Assignments) -> i32 {
        self.scale * self.inner.upper_bound(assignments) + self.offset
    }

    fn tighten_lower_bound(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        let inner_bound = div_ceil(value - self.offset, self.scale);
        self.inner.tighten_lower_bound(assignments, inner_bound)
    }

    fn tighten_upper_bound(
        &self,
        assignments: &mut Assignments,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        let inner_bound = div_floor(value - self.offset, self.scale);
        self.inner.tighten_upper_bound(assignments, inner_bound)
    }
}

fn div_ceil(a: i32, b: i32) -> i32 {
    debug_assert!(b > 0);
    (a as f64 / b as f64).ceil() as i32
}

fn div_floor(a: i32, b: i32) -> i32 {
    debug_assert!(b > 0);
    (a as f64 / b as f64).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Assignments;

    #[test]
    fn offset_view_reads_shifted_bounds() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        let view = AffineView::offset(x, 5);
        assert_eq!(view.lower_bound(&assignments), 5);
        assert_eq!(view.upper_bound(&assignments), 15);
    }

    #[test]
    fn tightening_the_view_tightens_the_inner_variable() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        let view = AffineView::offset(x, 5);
        view.tighten_lower_bound(&mut assignments, 8).unwrap();
        assert_eq!(assignments.get_lower_bound(x), 3);
    }

    #[test]
    fn is_offset_view_of_detects_structural_equality() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        let y = assignments.grow(0, 10);
        let view = AffineView::offset(x, 5);
        assert!(view.is_offset_view_of(&x));
        assert!(!view.is_offset_view_of(&y));
    }
}
