//! Structural changes requested while the world is being iterated.

use shardline_common::{EntityKey, Point, RegionId};
use std::collections::BTreeMap;

/// A membership change to apply once the tick's iteration is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayedEvent {
    Remove,
    Insert,
    Warp { region: RegionId, pos: Point },
}

impl DelayedEvent {
    /// Result of requesting `incoming` when `self` is already pending.
    ///
    /// Remove absorbs everything and is never replaced. Between two
    /// placements the first request stands.
    fn merge(self, incoming: Self) -> Self {
        match (self, incoming) {
            (_, Self::Remove) => Self::Remove,
            (pending, _) => pending,
        }
    }
}

/// At most one pending event per entity, drained in key order.
#[derive(Debug, Default)]
pub struct DelayedEvents {
    pending: BTreeMap<EntityKey, DelayedEvent>,
}

impl DelayedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, key: EntityKey, event: DelayedEvent) {
        self.pending
            .entry(key)
            .and_modify(|pending| *pending = pending.merge(event))
            .or_insert(event);
    }

    pub fn get(&self, key: EntityKey) -> Option<DelayedEvent> {
        self.pending.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes every pending event, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<(EntityKey, DelayedEvent)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<EntityKey> {
        let mut arena: SlotMap<EntityKey, ()> = SlotMap::with_key();
        (0..n).map(|_| arena.insert(())).collect()
    }

    fn warp(region: u16) -> DelayedEvent {
        DelayedEvent::Warp { region: RegionId(region), pos: Point::new(1, 2) }
    }

    #[test]
    fn remove_overrides_and_sticks() {
        let k = keys(1)[0];
        let mut q = DelayedEvents::new();
        q.enqueue(k, DelayedEvent::Insert);
        q.enqueue(k, DelayedEvent::Remove);
        q.enqueue(k, warp(3));
        q.enqueue(k, DelayedEvent::Insert);
        assert_eq!(q.drain(), vec![(k, DelayedEvent::Remove)]);
        assert!(q.is_empty());
    }

    #[test]
    fn first_placement_wins() {
        let k = keys(1)[0];
        let mut q = DelayedEvents::new();
        q.enqueue(k, warp(2));
        q.enqueue(k, warp(3));
        q.enqueue(k, DelayedEvent::Insert);
        assert_eq!(q.get(k), Some(warp(2)));
    }

    #[test]
    fn drain_is_ordered_by_key() {
        let ks = keys(3);
        let mut q = DelayedEvents::new();
        q.enqueue(ks[2], DelayedEvent::Insert);
        q.enqueue(ks[0], DelayedEvent::Remove);
        q.enqueue(ks[1], warp(1));
        let order: Vec<_> = q.drain().into_iter().map(|(k, _)| k).collect();
        assert_eq!(order, ks);
    }

    fn event() -> impl Strategy<Value = DelayedEvent> {
        prop_oneof![
            Just(DelayedEvent::Remove),
            Just(DelayedEvent::Insert),
            (0u16..4).prop_map(warp),
        ]
    }

    proptest! {
        #[test]
        fn any_remove_yields_exactly_one_remove(events in prop::collection::vec(event(), 1..12)) {
            let k = keys(1)[0];
            let mut q = DelayedEvents::new();
            for e in &events {
                q.enqueue(k, *e);
            }
            let drained = q.drain();
            prop_assert_eq!(drained.len(), 1);
            let expected = if events.contains(&DelayedEvent::Remove) {
                DelayedEvent::Remove
            } else {
                events[0]
            };
            prop_assert_eq!(drained[0].1, expected);
        }
    }
}
