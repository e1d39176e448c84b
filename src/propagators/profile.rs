//! The compulsory-part profile and its event-point series (spec.md §4.5): a step function over
//! time built from every mandatory task's compulsory part, used by the time-table filter and by
//! the overload check's `ttAfter` sweep.

use crate::basic_types::Trailed;
use crate::engine::PropagationContext;
use crate::propagators::task::SENTINEL_MAX;
use crate::propagators::task::SENTINEL_MIN;
use crate::propagators::task::TaskView;
use crate::variables::IntegerVariable;

/// One step of the profile: height `height` over `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rectangle {
    pub start: i32,
    pub end: i32,
    pub height: i32,
}

/// A profile event: the start or end of a task's compulsory part. `Ccp`/`Pr` round out the event
/// vocabulary spec.md §3 allows for a caller that tracks conditional compulsory parts or
/// profile-reduction markers; this crate's own filters only ever emit `Scp`/`Ecp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    Scp,
    Ecp,
    Ccp,
    Pr,
}

#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub kind: EventKind,
    pub task_index: usize,
    pub date: i32,
}

/// An ordered list of profile events, sorted by `(date, kind)` (spec.md §3). Rebuilt per profile
/// construction; exposes the in-place operations a caller needs to track optional or
/// profile-reduction events without losing the sort invariant.
#[derive(Clone, Debug, Default)]
pub struct EventPointSeries {
    events: Vec<Event>,
}

impl EventPointSeries {
    pub fn new() -> Self {
        EventPointSeries { events: Vec::new() }
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn order_key(event: &Event) -> (i32, EventKind) {
        (event.date, event.kind)
    }

    /// Inserts `event` at the position that keeps the series sorted.
    pub fn add_event(&mut self, event: Event) {
        let position = self
            .events
            .partition_point(|existing| Self::order_key(existing) <= Self::order_key(&event));
        self.events.insert(position, event);
    }

    /// Replaces the event at `index` and re-sorts it into place.
    pub fn update_event(&mut self, index: usize, event: Event) {
        self.events.remove(index);
        self.add_event(event);
    }

    pub fn swap(&mut self, i: usize, j: usize) {
        self.events.swap(i, j);
    }

    pub fn sort(&mut self) {
        self.events.sort_by_key(Self::order_key);
    }
}

/// A step function over `(-inf, +inf)` (spec.md §3): rectangles ordered and contiguous by
/// construction, bracketed by sentinel rectangles of height 0.
#[derive(Clone, Debug)]
pub struct Profile {
    rectangles: Vec<Rectangle>,
}

impl Profile {
    pub fn rectangles(&self) -> &[Rectangle] {
        &self.rectangles
    }

    pub fn max_height(&self) -> i32 {
        self.rectangles.iter().map(|r| r.height).max().unwrap_or(0)
    }

    /// Returns the index of the rectangle containing `date`. The outer sentinels guarantee a
    /// hit for every finite `date`.
    pub fn find(&self, date: i32) -> usize {
        match self
            .rectangles
            .binary_search_by(|rect| rect.start.cmp(&date))
        {
            Ok(index) => index,
            Err(insertion_point) => insertion_point - 1,
        }
    }

    /// Builds the event-point series for `tasks`/`heights` (spec.md §4.5 step 1).
    pub fn build_events<T: TaskView, H: IntegerVariable>(
        tasks: &[T],
        heights: &[Option<H>],
        context: PropagationContext,
    ) -> EventPointSeries {
        let mut series = EventPointSeries::new();
        for (index, task) in tasks.iter().enumerate() {
            if task.has_compulsory_part(context) {
                series.add_event(Event {
                    kind: EventKind::Scp,
                    task_index: index,
                    date: task.lst(context),
                });
                series.add_event(Event {
                    kind: EventKind::Ecp,
                    task_index: index,
                    date: task.ect(context),
                });
            }
        }
        series
    }

    /// Sweeps `events` into a profile and returns `(profile, max interior height)` (spec.md §4.5
    /// steps 2-4).
    pub fn build<T: TaskView, H: IntegerVariable>(
        tasks: &[T],
        heights: &[Option<H>],
        context: PropagationContext,
    ) -> (Profile, i32) {
        let series = Self::build_events(tasks, heights, context);
        Self::sweep(series.as_slice(), tasks, heights, context)
    }

    fn sweep<T: TaskView, H: IntegerVariable>(
        events: &[Event],
        tasks: &[T],
        heights: &[Option<H>],
        context: PropagationContext,
    ) -> (Profile, i32) {
        if events.is_empty() {
            return (
                Profile {
                    rectangles: vec![Rectangle {
                        start: SENTINEL_MIN,
                        end: SENTINEL_MAX,
                        height: 0,
                    }],
                },
                0,
            );
        }

        let demand_of = |task_index: usize| -> i32 {
            heights
                .get(task_index)
                .and_then(|h| h.as_ref())
                .map_or(1, |h| context.lower_bound(h))
        };
        // Suppresses an unused-parameter warning when `tasks` is only needed for its length.
        let _ = tasks.len();

        let mut rectangles = Vec::new();
        let mut height = 0;
        let mut prev_date = SENTINEL_MIN;
        let mut max_height = 0;
        let mut index = 0;
        while index < events.len() {
            let date = events[index].date;
            if date > prev_date {
                rectangles.push(Rectangle {
                    start: prev_date,
                    end: date,
                    height,
                });
            }
            while index < events.len() && events[index].date == date {
                let event = events[index];
                match event.kind {
                    EventKind::Scp => height += demand_of(event.task_index),
                    EventKind::Ecp => height -= demand_of(event.task_index),
                    EventKind::Ccp | EventKind::Pr => {}
                }
                index += 1;
            }
            max_height = max_height.max(height);
            prev_date = date;
        }
        rectangles.push(Rectangle {
            start: prev_date,
            end: SENTINEL_MAX,
            height,
        });

        (Profile { rectangles }, max_height)
    }
}

/// A profile whose rectangle array is stored in the trailed environment (spec.md §3, §4.5): on
/// backtrack it returns to its prior state with no recomputation.
#[derive(Clone, Debug)]
pub struct BacktrackableProfile {
    rectangles: Trailed<Vec<Rectangle>>,
}

impl Default for BacktrackableProfile {
    fn default() -> Self {
        BacktrackableProfile {
            rectangles: Trailed::new(vec![Rectangle {
                start: SENTINEL_MIN,
                end: SENTINEL_MAX,
                height: 0,
            }]),
        }
    }
}

impl BacktrackableProfile {
    pub fn current(&self) -> Profile {
        Profile {
            rectangles: self.rectangles.get().clone(),
        }
    }

    /// Rebuilds the profile and writes it into the trailed cell at the current decision level.
    pub fn rebuild<T: TaskView, H: IntegerVariable>(
        &mut self,
        tasks: &[T],
        heights: &[Option<H>],
        context: PropagationContext,
    ) -> i32 {
        let (profile, max_height) = Profile::build(tasks, heights, context);
        self.rectangles
            .set(profile.rectangles, context.assignments().get_decision_level());
        max_height
    }

    pub fn synchronise(&mut self, new_decision_level: usize) {
        self.rectangles.synchronise(new_decision_level);
    }
}
