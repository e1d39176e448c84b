//! The capacity propagator of spec.md §4.3: per-task sanity checking against the resource's
//! capacity upper bound, with passivation once no task can possibly exceed it.

use crate::basic_types::Trailed;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::propagators::resource_utils;
use crate::propagators::task::TaskView;
use crate::variables::IntegerVariable;

/// One task plus the height variable it demands on the resource (`None` means a fixed demand
/// of 1, as for a disjunctive without explicit heights).
pub struct CapacityEntry<T, H> {
    pub task: T,
    pub height: Option<H>,
}

/// Trailed state for [`Capacity`]: the last `capacity.ub` seen, so the linear scan over tasks
/// only runs again when the capacity's upper bound actually moved (spec.md §4.3).
pub struct Capacity<T, H, Cap> {
    entries: Vec<CapacityEntry<T, H>>,
    capacity: Cap,
    last_capa_max: Trailed<i32>,
    passive: bool,
}

impl<T: TaskView, H: IntegerVariable, Cap: IntegerVariable> Capacity<T, H, Cap> {
    pub fn new(entries: Vec<CapacityEntry<T, H>>, capacity: Cap, initial_capacity_ub: i32) -> Self {
        Capacity {
            entries,
            capacity,
            last_capa_max: Trailed::new(initial_capacity_ub),
            passive: false,
        }
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    pub fn propagate(
        &mut self,
        context: &mut PropagationContextMut,
    ) -> crate::basic_types::PropagationStatusCP {
        if self.passive {
            return Ok(());
        }

        let capacity_ub = context.upper_bound(&self.capacity);
        if capacity_ub == *self.last_capa_max.get() {
            return Ok(());
        }

        for entry in &self.entries {
            let height_lb = entry
                .height
                .as_ref()
                .map_or(1, |h| context.lower_bound(h));
            if capacity_ub < height_lb {
                if entry.task.must_be_performed(context.as_readonly()) {
                    entry.task.update_max_duration(context, 0)?;
                } else {
                    resource_utils::filter_optional_task(&entry.task, entry.height.as_ref(), context)?;
                }
                continue;
            }

            if entry.task.must_be_performed(context.as_readonly())
                && entry.task.min_duration(context.as_readonly()) > 0
            {
                if let Some(height) = &entry.height {
                    context.set_upper_bound(height, capacity_ub)?;
                    let height_lb_now = context.lower_bound(height);
                    context.set_lower_bound(&self.capacity, height_lb_now)?;
                }
            }
        }

        self.last_capa_max
            .set(capacity_ub, context.assignments().get_decision_level());

        let sum_of_upper_heights: i32 = self
            .entries
            .iter()
            .map(|entry| {
                entry
                    .height
                    .as_ref()
                    .map_or(1, |h| context.upper_bound(h))
            })
            .sum();
        if sum_of_upper_heights <= context.lower_bound(&self.capacity) {
            self.passive = true;
        }

        Ok(())
    }

    pub fn synchronise(&mut self, new_decision_level: usize) {
        self.last_capa_max.synchronise(new_decision_level);
    }
}
