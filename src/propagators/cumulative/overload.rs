//! The Vilím (2011) overload check of spec.md §4.6(c): a profile-driven sweep that detects a
//! time window whose mandatory energy demand exceeds what the capacity can deliver across its
//! width, independent of any single task's own bounds.

use crate::basic_types::EmptyDomain;
use crate::engine::PropagationContext;
use crate::engine::PropagationContextMut;
use crate::propagators::profile::Profile;
use crate::propagators::resource_utils;
use crate::propagators::task::TaskView;
use crate::variables::IntegerVariable;

fn free_duration<T: TaskView>(task: &T, context: PropagationContext) -> i32 {
    (task.min_duration(context) - (task.ect(context) - task.lst(context)).max(0)).max(0)
}

/// Total profile area strictly to the right of `t` (spec.md §4.6(c)'s `ttAfter`), computed with a
/// single scan over the rectangles from `t` onward.
fn tt_after(profile: &Profile, t: i32) -> i64 {
    let rects = profile.rectangles();
    let start_index = profile.find(t);
    let mut total: i64 = 0;
    for (offset, rect) in rects[start_index..].iter().enumerate() {
        let left = if offset == 0 { t.max(rect.start) } else { rect.start };
        if rect.end <= left {
            continue;
        }
        total += rect.height as i64 * (rect.end as i64 - left as i64);
    }
    total
}

/// Returns `Ok(true)` if a candidate task was forced optional to resolve an overload, `Ok(false)`
/// if no overload was found, or `Err(EmptyDomain)` if a mandatory task witnesses a genuine
/// infeasibility.
pub fn check<T: TaskView, H: IntegerVariable, Cap: IntegerVariable>(
    tasks: &[T],
    heights: &[Option<H>],
    capacity: &Cap,
    context: &mut PropagationContextMut,
) -> Result<bool, EmptyDomain> {
    let ro = context.as_readonly();
    let (profile, _) = Profile::build(tasks, heights, ro);
    let capacity_ub = context.upper_bound(capacity);

    let mut candidates: Vec<usize> = (0..tasks.len())
        .filter(|&i| tasks[i].may_be_performed(ro) && free_duration(&tasks[i], ro) > 0)
        .collect();
    candidates.sort_by_key(|&i| (tasks[i].est(ro), tasks[i].est(ro) + free_duration(&tasks[i], ro)));

    for &b_index in &candidates {
        let lct_b = tasks[b_index].lct(ro);

        let mut contributors: Vec<usize> = (0..tasks.len())
            .filter(|&i| tasks[i].may_be_performed(ro) && tasks[i].lct(ro) <= lct_b)
            .collect();
        contributors.sort_by_key(|&i| std::cmp::Reverse(tasks[i].est(ro)));

        let mut e_ef: i64 = 0;
        for &a_index in &contributors {
            let est_a = tasks[a_index].est(ro);
            let free_dur_a = free_duration(&tasks[a_index], ro) as i64;
            let demand_a = heights
                .get(a_index)
                .and_then(|h| h.as_ref())
                .map_or(1, |h| context.lower_bound(h)) as i64;
            e_ef += free_dur_a * demand_a;

            let lhs = capacity_ub as i64 * (lct_b as i64 - est_a as i64);
            let rhs = e_ef + tt_after(&profile, est_a) - tt_after(&profile, lct_b);
            if lhs < rhs {
                let b = &tasks[b_index];
                if b.must_be_performed(ro) {
                    return Err(EmptyDomain);
                }
                return resource_utils::filter_optional_task(
                    b,
                    heights.get(b_index).and_then(|h| h.as_ref()),
                    context,
                );
            }
        }
    }
    Ok(false)
}
