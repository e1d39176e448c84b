use crate::basic_types::EmptyDomain;
use crate::engine::Assignments;
use crate::variables::DomainId;
use crate::variables::IntegerVariable;

/// A read-only view onto the domain store, handed to the parts of a propagator that only need to
/// query bounds (e.g. `isEntailed`, or a filter's initial feasibility check).
#[derive(Clone, Copy)]
pub struct PropagationContext<'a> {
    assignments: &'a Assignments,
}

impl<'a> PropagationContext<'a> {
    pub fn new(assignments: &'a Assignments) -> Self {
        PropagationContext { assignments }
    }

    pub fn lower_bound(&self, var: &impl IntegerVariable) -> i32 {
        var.lower_bound(self.assignments)
    }

    pub fn upper_bound(&self, var: &impl IntegerVariable) -> i32 {
        var.upper_bound(self.assignments)
    }

    pub fn is_fixed(&self, var: &impl IntegerVariable) -> bool {
        var.is_fixed(self.assignments)
    }

    pub fn contains(&self, var: DomainId, value: i32) -> bool {
        self.assignments.contains(var, value)
    }

    pub fn assignments(&self) -> &Assignments {
        self.assignments
    }
}

/// A read-write view onto the domain store, handed to `propagate`. Every mutator returns whether
/// the domain actually changed, matching spec.md §6.
pub struct PropagationContextMut<'a> {
    assignments: &'a mut Assignments,
}

impl<'a> PropagationContextMut<'a> {
    pub fn new(assignments: &'a mut Assignments) -> Self {
        PropagationContextMut { assignments }
    }

    pub fn as_readonly(&self) -> PropagationContext<'_> {
        PropagationContext::new(self.assignments)
    }

    pub fn lower_bound(&self, var: &impl IntegerVariable) -> i32 {
        var.lower_bound(self.assignments)
    }

    pub fn upper_bound(&self, var: &impl IntegerVariable) -> i32 {
        var.upper_bound(self.assignments)
    }

    pub fn is_fixed(&self, var: &impl IntegerVariable) -> bool {
        var.is_fixed(self.assignments)
    }

    pub fn set_lower_bound(
        &mut self,
        var: &impl IntegerVariable,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        var.tighten_lower_bound(self.assignments, value)
    }

    pub fn set_upper_bound(
        &mut self,
        var: &impl IntegerVariable,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        var.tighten_upper_bound(self.assignments, value)
    }

    pub fn fix(&mut self, var: &impl IntegerVariable, value: i32) -> Result<bool, EmptyDomain> {
        var.fix(self.assignments, value)
    }

    pub fn remove_value(&mut self, var: DomainId, value: i32) -> Result<bool, EmptyDomain> {
        self.assignments.remove_value_from_domain(var, value)
    }

    pub fn assignments(&self) -> &Assignments {
        self.assignments
    }

    pub fn assignments_mut(&mut self) -> &mut Assignments {
        self.assignments
    }
}
