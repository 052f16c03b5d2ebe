//! Ordered event timeline
//!
//! A `Timeline` is a tick-ordered multi-map: events are kept sorted by tick,
//! several events may share a tick, and among equal ticks the insertion order
//! is preserved. Each specialised map builds its own rules on top of it:
//! - `ChangeMap` allows one fix and one ramp per tick after normalisation
//! - `TempoMap` and `VeloList` keep one event per tick (`replace`)

use ag_core::Tick;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an event does at its tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Asserts a value at a single tick
    Fixed,
    /// Changes the value over `length` ticks
    Ramp,
    /// Carries no value
    Invalid,
}

/// An event that can live on a [`Timeline`]
pub trait TimelineEvent: Clone + fmt::Debug {
    /// Value type the event produces
    type Value: Copy + fmt::Debug;

    fn tick(&self) -> Tick;

    fn kind(&self) -> EventKind;

    /// Span in ticks; zero for anything but ramps
    fn length(&self) -> i64;

    /// Value at the start of the event, as computed by the owning map
    fn cached_start(&self) -> Self::Value;

    /// Value at the end of the event, as computed by the owning map
    fn cached_end(&self) -> Self::Value;

    fn end_tick(&self) -> Tick {
        self.tick() + self.length()
    }

    fn is_ramp(&self) -> bool {
        self.kind() == EventKind::Ramp
    }

    fn is_fixed(&self) -> bool {
        self.kind() == EventKind::Fixed
    }
}

/// Tick-ordered multi-map of events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "Vec<E>",
    into = "Vec<E>",
    bound(
        serialize = "E: TimelineEvent + Serialize",
        deserialize = "E: TimelineEvent + Deserialize<'de>"
    )
)]
pub struct Timeline<E: TimelineEvent> {
    events: Vec<E>,
}

impl<E: TimelineEvent> Default for Timeline<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TimelineEvent> From<Vec<E>> for Timeline<E> {
    fn from(mut events: Vec<E>) -> Self {
        // stable: equal ticks keep their order
        events.sort_by_key(|e| e.tick());
        Self { events }
    }
}

impl<E: TimelineEvent> From<Timeline<E>> for Vec<E> {
    fn from(timeline: Timeline<E>) -> Self {
        timeline.events
    }
}

impl<E: TimelineEvent> FromIterator<E> for Timeline<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a, E: TimelineEvent> IntoIterator for &'a Timeline<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl<E: TimelineEvent> Timeline<E> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[E] {
        &self.events
    }

    /// Mutable access to the events. Callers must not move events to another tick.
    pub(crate) fn events_mut(&mut self) -> &mut [E] {
        &mut self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Insert after any events already at the same tick
    pub fn insert(&mut self, event: E) {
        let idx = self.upper_bound(event.tick());
        self.events.insert(idx, event);
    }

    /// Insert, replacing every event already at the same tick.
    /// Returns the first replaced event.
    pub fn replace(&mut self, event: E) -> Option<E> {
        let tick = event.tick();
        let (start, end) = (self.lower_bound(tick), self.upper_bound(tick));
        let mut replaced = self.events.splice(start..end, std::iter::once(event));
        replaced.next()
    }

    /// Index of the first event at or after `tick`
    pub fn lower_bound(&self, tick: Tick) -> usize {
        self.events.partition_point(|e| e.tick() < tick)
    }

    /// Index of the first event after `tick`
    pub fn upper_bound(&self, tick: Tick) -> usize {
        self.events.partition_point(|e| e.tick() <= tick)
    }

    /// All events at exactly `tick`, in insertion order
    pub fn at(&self, tick: Tick) -> &[E] {
        &self.events[self.lower_bound(tick)..self.upper_bound(tick)]
    }

    pub fn contains_tick(&self, tick: Tick) -> bool {
        !self.at(tick).is_empty()
    }

    pub fn first_at(&self, tick: Tick) -> Option<&E> {
        self.at(tick).first()
    }

    pub fn first_at_mut(&mut self, tick: Tick) -> Option<&mut E> {
        let idx = self.lower_bound(tick);
        self.events.get_mut(idx).filter(|e| e.tick() == tick)
    }

    pub fn remove_first_at(&mut self, tick: Tick) -> Option<E> {
        let idx = self.lower_bound(tick);
        if self.events.get(idx).is_some_and(|e| e.tick() == tick) {
            Some(self.events.remove(idx))
        } else {
            None
        }
    }

    pub fn remove_all_at(&mut self, tick: Tick) -> Vec<E> {
        let (start, end) = (self.lower_bound(tick), self.upper_bound(tick));
        self.events.drain(start..end).collect()
    }

    /// Remove events in `[start, end)`. Returns how many were removed.
    pub fn clear_range(&mut self, start: Tick, end: Tick) -> usize {
        let (first, last) = (self.lower_bound(start), self.lower_bound(end));
        if first >= last {
            return 0;
        }
        self.events.drain(first..last).count()
    }

    /// Index of the last event at or before `tick`
    pub fn last_at_or_before(&self, tick: Tick) -> Option<usize> {
        self.upper_bound(tick).checked_sub(1)
    }

    /// First event strictly after `tick`
    pub fn first_after(&self, tick: Tick) -> Option<&E> {
        self.events.get(self.upper_bound(tick))
    }

    /// Events with `start <= tick <= end`
    pub fn range(&self, start: Tick, end: Tick) -> &[E] {
        let first = self.lower_bound(start);
        let last = self.upper_bound(end).max(first);
        &self.events[first..last]
    }

    /// Distinct ticks, ascending
    pub fn ticks(&self) -> impl Iterator<Item = Tick> + '_ {
        let mut last = None;
        self.events.iter().filter_map(move |e| {
            let tick = e.tick();
            if last == Some(tick) {
                None
            } else {
                last = Some(tick);
                Some(tick)
            }
        })
    }

    /// Events grouped by tick, ascending
    pub fn groups(&self) -> impl Iterator<Item = &[E]> + '_ {
        self.events.chunk_by(|a, b| a.tick() == b.tick())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Mark {
        tick: Tick,
        id: u32,
    }

    impl TimelineEvent for Mark {
        type Value = u32;

        fn tick(&self) -> Tick {
            self.tick
        }
        fn kind(&self) -> EventKind {
            EventKind::Fixed
        }
        fn length(&self) -> i64 {
            0
        }
        fn cached_start(&self) -> u32 {
            self.id
        }
        fn cached_end(&self) -> u32 {
            self.id
        }
    }

    fn mark(tick: i64, id: u32) -> Mark {
        Mark {
            tick: Tick(tick),
            id,
        }
    }

    fn ids(events: &[Mark]) -> Vec<u32> {
        events.iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_insert_keeps_order_and_ties() {
        let mut tl = Timeline::new();
        tl.insert(mark(480, 1));
        tl.insert(mark(0, 2));
        tl.insert(mark(480, 3));
        tl.insert(mark(240, 4));
        assert_eq!(ids(tl.as_slice()), vec![2, 4, 1, 3]);
        assert_eq!(ids(tl.at(Tick(480))), vec![1, 3]);
        assert_eq!(tl.ticks().collect::<Vec<_>>(), vec![Tick(0), Tick(240), Tick(480)]);
        assert_eq!(tl.groups().count(), 3);
    }

    #[test]
    fn test_bounds() {
        let tl: Timeline<_> = vec![mark(0, 1), mark(100, 2), mark(100, 3), mark(200, 4)].into();
        assert_eq!(tl.lower_bound(Tick(100)), 1);
        assert_eq!(tl.upper_bound(Tick(100)), 3);
        assert_eq!(tl.last_at_or_before(Tick(150)), Some(2));
        assert_eq!(tl.last_at_or_before(Tick(-1)), None);
        assert_eq!(tl.first_after(Tick(100)).map(|m| m.id), Some(4));
        assert!(tl.first_after(Tick(200)).is_none());
        assert_eq!(ids(tl.range(Tick(50), Tick(200))), vec![2, 3, 4]);
        assert!(tl.range(Tick(300), Tick(100)).is_empty());
    }

    #[test]
    fn test_replace_and_remove() {
        let mut tl: Timeline<_> = vec![mark(0, 1), mark(100, 2), mark(100, 3)].into();
        let old = tl.replace(mark(100, 9));
        assert_eq!(old.map(|m| m.id), Some(2));
        assert_eq!(ids(tl.as_slice()), vec![1, 9]);
        assert!(tl.replace(mark(50, 5)).is_none());
        assert_eq!(tl.remove_first_at(Tick(50)).map(|m| m.id), Some(5));
        assert!(tl.remove_first_at(Tick(50)).is_none());
        tl.insert(mark(100, 10));
        assert_eq!(ids(&tl.remove_all_at(Tick(100))), vec![9, 10]);
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn test_clear_range_excludes_end() {
        let mut tl: Timeline<_> = (0..5).map(|i| mark(i * 100, i as u32)).collect();
        assert_eq!(tl.clear_range(Tick(100), Tick(300)), 2);
        assert_eq!(ids(tl.as_slice()), vec![0, 3, 4]);
        assert_eq!(tl.clear_range(Tick(300), Tick(300)), 0);
    }

    #[test]
    fn test_deserialize_restores_order() {
        let json = r#"[{"tick":300,"id":1},{"tick":100,"id":2},{"tick":300,"id":3}]"#;
        let tl: Timeline<Mark> = serde_json::from_str(json).unwrap();
        assert_eq!(ids(tl.as_slice()), vec![2, 1, 3]);
        let back = serde_json::to_string(&tl).unwrap();
        assert!(back.starts_with(r#"[{"tick":100"#));
    }
}
