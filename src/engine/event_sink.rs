use enumset::EnumSetType;

use crate::variables::DomainId;

/// The fine-grained domain events of spec.md §6: `{lowerBound, upperBound, instantiate, remove}`.
#[derive(EnumSetType, Debug)]
pub enum DomainEvent {
    LowerBound,
    UpperBound,
    Assign,
    Removal,
}

/// Records domain events as they happen during a propagation pass, in the order they occurred,
/// for propagators (or the surrounding engine) to drain afterwards. Kept as a flat log rather than
/// a per-domain dedup set: the filtering algorithms in this crate re-read bounds from
/// [`crate::engine::Assignments`] directly and treat the event stream only as a wake-up signal.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    events: Vec<(DomainEvent, DomainId)>,
}

impl EventSink {
    pub fn event_occurred(&mut self, event: DomainEvent, domain_id: DomainId) {
        self.events.push((event, domain_id));
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (DomainEvent, DomainId)> + '_ {
        self.events.drain(..)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
