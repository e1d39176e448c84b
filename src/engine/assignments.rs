use crate::basic_types::EmptyDomain;
use crate::basic_types::HashMap;
use crate::basic_types::KeyedVec;
use crate::basic_types::Trail;
use crate::engine::event_sink::DomainEvent;
use crate::engine::event_sink::EventSink;
use crate::variables::DomainId;

/// The trailed domain store: the concrete host-engine contract of spec.md §6. Owns every
/// integer domain's bounds and holes, journals every change onto a [`Trail`], and restores them
/// on backtrack. Mirrors the teacher crate's `engine::cp::assignments::Assignments`, pared down
/// to what the resource-scheduling filters need (no predicate trail, no lazy-explanation trail
/// positions — those support conflict analysis, which spec.md places outside this core).
#[derive(Clone, Debug, Default)]
pub struct Assignments {
    trail: Trail<TrailEntry>,
    domains: KeyedVec<DomainId, IntegerDomain>,
    events: EventSink,
}

#[derive(Clone, Debug)]
struct TrailEntry {
    domain_id: DomainId,
    old_lower_bound: i32,
    old_upper_bound: i32,
    /// `Some(value)` iff this entry is a hole punched into the domain (possibly also moving a
    /// bound, which `old_lower_bound`/`old_upper_bound` already capture).
    removed_hole: Option<i32>,
}

#[derive(Clone, Debug)]
struct IntegerDomain {
    lower_bound: i32,
    upper_bound: i32,
    holes: HashMap<i32, ()>,
}

impl IntegerDomain {
    fn contains(&self, value: i32) -> bool {
        self.lower_bound <= value && value <= self.upper_bound && !self.holes.contains_key(&value)
    }
}

impl Assignments {
    pub fn increase_decision_level(&mut self) {
        self.trail.increase_decision_level();
    }

    pub fn get_decision_level(&self) -> usize {
        self.trail.get_decision_level()
    }

    pub fn num_domains(&self) -> u32 {
        self.domains.len() as u32
    }

    /// Registers a new integer domain and returns a handle to it.
    pub fn grow(&mut self, lower_bound: i32, upper_bound: i32) -> DomainId {
        assert!(
            lower_bound <= upper_bound,
            "cannot create an already-empty domain"
        );
        self.domains.push(IntegerDomain {
            lower_bound,
            upper_bound,
            holes: HashMap::default(),
        })
    }

    pub fn drain_domain_events(&mut self) -> impl Iterator<Item = (DomainEvent, DomainId)> + '_ {
        self.events.drain()
    }

    pub fn get_lower_bound(&self, domain_id: DomainId) -> i32 {
        self.domains[domain_id].lower_bound
    }

    pub fn get_upper_bound(&self, domain_id: DomainId) -> i32 {
        self.domains[domain_id].upper_bound
    }

    pub fn is_fixed(&self, domain_id: DomainId) -> bool {
        self.get_lower_bound(domain_id) == self.get_upper_bound(domain_id)
    }

    pub fn get_assigned_value(&self, domain_id: DomainId) -> Option<i32> {
        self.is_fixed(domain_id)
            .then(|| self.get_lower_bound(domain_id))
    }

    pub fn contains(&self, domain_id: DomainId, value: i32) -> bool {
        self.domains[domain_id].contains(value)
    }

    pub fn tighten_lower_bound(
        &mut self,
        domain_id: DomainId,
        new_lower_bound: i32,
    ) -> Result<bool, EmptyDomain> {
        let domain = &self.domains[domain_id];
        if new_lower_bound <= domain.lower_bound {
            return Ok(false);
        }

        let old_lower_bound = domain.lower_bound;
        let old_upper_bound = domain.upper_bound;

        self.trail.push(TrailEntry {
            domain_id,
            old_lower_bound,
            old_upper_bound,
            removed_hole: None,
        });

        let domain = &mut self.domains[domain_id];
        domain.lower_bound = new_lower_bound;
        self.events
            .event_occurred(DomainEvent::LowerBound, domain_id);
        self.catch_up_lower_bound(domain_id);
        self.fire_assign_if_fixed(domain_id);

        self.verify_consistency(domain_id)?;
        Ok(true)
    }

    pub fn tighten_upper_bound(
        &mut self,
        domain_id: DomainId,
        new_upper_bound: i32,
    ) -> Result<bool, EmptyDomain> {
        let domain = &self.domains[domain_id];
        if new_upper_bound >= domain.upper_bound {
            return Ok(false);
        }

        let old_lower_bound = domain.lower_bound;
        let old_upper_bound = domain.upper_bound;

        self.trail.push(TrailEntry {
            domain_id,
            old_lower_bound,
            old_upper_bound,
            removed_hole: None,
        });

        let domain = &mut self.domains[domain_id];
        domain.upper_bound = new_upper_bound;
        self.events
            .event_occurred(DomainEvent::UpperBound, domain_id);
        self.catch_up_upper_bound(domain_id);
        self.fire_assign_if_fixed(domain_id);

        self.verify_consistency(domain_id)?;
        Ok(true)
    }

    pub fn fix(&mut self, domain_id: DomainId, value: i32) -> Result<bool, EmptyDomain> {
        let mut changed = false;
        if self.get_lower_bound(domain_id) < value {
            changed |= self.tighten_lower_bound(domain_id, value)?;
        }
        if self.get_upper_bound(domain_id) > value {
            changed |= self.tighten_upper_bound(domain_id, value)?;
        }
        Ok(changed)
    }

    pub fn remove_value_from_domain(
        &mut self,
        domain_id: DomainId,
        value: i32,
    ) -> Result<bool, EmptyDomain> {
        if !self.domains[domain_id].contains(value) {
            return Ok(false);
        }

        let domain = &self.domains[domain_id];
        let old_lower_bound = domain.lower_bound;
        let old_upper_bound = domain.upper_bound;

        self.trail.push(TrailEntry {
            domain_id,
            old_lower_bound,
            old_upper_bound,
            removed_hole: Some(value),
        });

        let domain = &mut self.domains[domain_id];
        domain.holes.insert(value, ());
        self.events.event_occurred(DomainEvent::Removal, domain_id);

        self.catch_up_lower_bound(domain_id);
        self.catch_up_upper_bound(domain_id);
        self.fire_assign_if_fixed(domain_id);

        self.verify_consistency(domain_id)?;
        Ok(true)
    }

    fn catch_up_lower_bound(&mut self, domain_id: DomainId) {
        let domain = &mut self.domains[domain_id];
        while domain.lower_bound <= domain.upper_bound && domain.holes.contains_key(&domain.lower_bound) {
            domain.lower_bound += 1;
        }
    }

    fn catch_up_upper_bound(&mut self, domain_id: DomainId) {
        let domain = &mut self.domains[domain_id];
        while domain.lower_bound <= domain.upper_bound && domain.holes.contains_key(&domain.upper_bound) {
            domain.upper_bound -= 1;
        }
    }

    fn fire_assign_if_fixed(&mut self, domain_id: DomainId) {
        if self.is_fixed(domain_id) {
            self.events.event_occurred(DomainEvent::Assign, domain_id);
        }
    }

    fn verify_consistency(&self, domain_id: DomainId) -> Result<(), EmptyDomain> {
        let domain = &self.domains[domain_id];
        if domain.lower_bound > domain.upper_bound {
            Err(EmptyDomain)
        } else {
            Ok(())
        }
    }

    /// Backtracks every domain to its state as of `new_decision_level`.
    pub fn synchronise(&mut self, new_decision_level: usize) {
        let domains = &mut self.domains;
        self.trail.synchronise(new_decision_level).for_each(|entry| {
            let domain = &mut domains[entry.domain_id];
            if let Some(removed_value) = entry.removed_hole {
                let _ = domain.holes.remove(&removed_value);
            }
            domain.lower_bound = entry.old_lower_bound;
            domain.upper_bound = entry.old_upper_bound;
        });
        let _ = self.events.drain().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tighten_lower_bound_reports_change_and_fires_event() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        assert!(assignments.tighten_lower_bound(x, 3).unwrap());
        assert_eq!(assignments.get_lower_bound(x), 3);
        let events: Vec<_> = assignments.drain_domain_events().collect();
        assert_eq!(events, vec![(DomainEvent::LowerBound, x)]);
    }

    #[test]
    fn weaker_bound_is_a_no_op() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        assert!(!assignments.tighten_lower_bound(x, -5).unwrap());
        assert_eq!(assignments.get_lower_bound(x), 0);
    }

    #[test]
    fn fixing_to_a_value_fires_assign_event() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        assignments.fix(x, 4).unwrap();
        let events: Vec<_> = assignments.drain_domain_events().collect();
        assert!(events.contains(&(DomainEvent::Assign, x)));
        assert!(assignments.is_fixed(x));
    }

    #[test]
    fn tightening_past_the_opposite_bound_is_an_empty_domain() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        assert!(assignments.tighten_lower_bound(x, 11).is_err());
    }

    #[test]
    fn removing_the_current_bound_catches_up_to_the_next_value() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);
        assignments.remove_value_from_domain(x, 0).unwrap();
        assert_eq!(assignments.get_lower_bound(x), 1);
    }

    #[test]
    fn backtracking_restores_bounds_and_holes() {
        let mut assignments = Assignments::default();
        let x = assignments.grow(0, 10);

        assignments.increase_decision_level();
        assignments.tighten_lower_bound(x, 5).unwrap();
        assignments.remove_value_from_domain(x, 7).unwrap();

        assignments.increase_decision_level();
        assignments.tighten_upper_bound(x, 6).unwrap();

        assignments.synchronise(1);
        assert_eq!(assignments.get_upper_bound(x), 10);
        assert!(assignments.contains(x, 7));

        assignments.synchronise(0);
        assert_eq!(assignments.get_lower_bound(x), 0);
    }
}
