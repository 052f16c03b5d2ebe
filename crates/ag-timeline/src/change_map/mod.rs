//! Change map
//!
//! Sparse fixed values and ramps over ticks. Edits only append; the map is
//! normalised lazily (see [`cleanup`]) before it is read. Reads go through a
//! [`Normalized`] view, which can only be obtained from [`ChangeMap::normalize`].

mod cleanup;

use crate::config::{DEFAULT_VALUE, TimelineConfig};
use crate::timeline::{EventKind, Timeline, TimelineEvent};
use ag_core::{ChangeDirection, ChangeMethod, Tick, TickSpan, interpolate};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════

/// An event that a [`ChangeMap`] can hold
pub trait ChangeMapEvent: TimelineEvent<Value = i32> {
    fn fixed(tick: Tick, value: i32) -> Self;

    fn ramp(
        tick: Tick,
        length: i64,
        delta: i32,
        method: ChangeMethod,
        direction: ChangeDirection,
    ) -> Self;

    /// Absolute value for fixes, signed delta for ramps
    fn value(&self) -> i32;

    fn method(&self) -> ChangeMethod;

    fn direction(&self) -> ChangeDirection;

    fn set_cached(&mut self, start: i32, end: i32);

    /// Move the start of a ramp, keeping its end tick
    fn move_start(&mut self, tick: Tick);
}

/// Fixed value or ramp in a change map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    tick: Tick,
    kind: EventKind,
    value: i32,
    #[serde(default)]
    length: i64,
    #[serde(default)]
    method: ChangeMethod,
    #[serde(default)]
    direction: ChangeDirection,
    #[serde(skip)]
    cached_start: i32,
    #[serde(skip)]
    cached_end: i32,
}

/// Cached values are derived, so they take no part in equality
impl PartialEq for ChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        self.tick == other.tick
            && self.kind == other.kind
            && self.value == other.value
            && self.length == other.length
            && self.method == other.method
            && self.direction == other.direction
    }
}

impl TimelineEvent for ChangeEvent {
    type Value = i32;

    fn tick(&self) -> Tick {
        self.tick
    }

    fn kind(&self) -> EventKind {
        self.kind
    }

    fn length(&self) -> i64 {
        self.length
    }

    fn cached_start(&self) -> i32 {
        self.cached_start
    }

    fn cached_end(&self) -> i32 {
        self.cached_end
    }
}

impl ChangeMapEvent for ChangeEvent {
    fn fixed(tick: Tick, value: i32) -> Self {
        Self {
            tick,
            kind: EventKind::Fixed,
            value,
            length: 0,
            method: ChangeMethod::Normal,
            direction: ChangeDirection::Increasing,
            cached_start: value,
            cached_end: value,
        }
    }

    fn ramp(
        tick: Tick,
        length: i64,
        delta: i32,
        method: ChangeMethod,
        direction: ChangeDirection,
    ) -> Self {
        Self {
            tick,
            kind: EventKind::Ramp,
            value: delta,
            length,
            method,
            direction,
            cached_start: 0,
            cached_end: 0,
        }
    }

    fn value(&self) -> i32 {
        self.value
    }

    fn method(&self) -> ChangeMethod {
        self.method
    }

    fn direction(&self) -> ChangeDirection {
        self.direction
    }

    fn set_cached(&mut self, start: i32, end: i32) {
        self.cached_start = start;
        self.cached_end = end;
    }

    fn move_start(&mut self, tick: Tick) {
        let end = self.end_tick();
        self.tick = tick;
        self.length = end.since(tick).max(0);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CHANGE MAP
// ═══════════════════════════════════════════════════════════════════════════

fn dirty_on_load() -> bool {
    true
}

/// Fixed values and ramps over ticks, normalised on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "E: ChangeMapEvent + Serialize",
    deserialize = "E: ChangeMapEvent + Deserialize<'de>"
))]
pub struct ChangeMap<E: ChangeMapEvent = ChangeEvent> {
    events: Timeline<E>,
    default_value: i32,
    #[serde(skip, default = "dirty_on_load")]
    dirty: bool,
    #[serde(skip)]
    clamped: usize,
}

impl<E: ChangeMapEvent> Default for ChangeMap<E> {
    fn default() -> Self {
        Self::with_default(DEFAULT_VALUE)
    }
}

impl<E: ChangeMapEvent> ChangeMap<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty map reporting `default_value` before its first event
    pub fn with_default(default_value: i32) -> Self {
        Self {
            events: Timeline::new(),
            default_value,
            dirty: false,
            clamped: 0,
        }
    }

    pub fn with_config(config: &TimelineConfig) -> Self {
        Self::with_default(config.default_value)
    }

    pub fn default_value(&self) -> i32 {
        self.default_value
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether an edit happened since the last normalisation
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Raw events; cached values are only meaningful when not dirty
    pub fn events(&self) -> &Timeline<E> {
        &self.events
    }

    /// Assert `value` from `tick` on
    pub fn add_fixed(&mut self, tick: Tick, value: i32) {
        log::debug!("change map: fix {value} at {tick}");
        self.events.insert(E::fixed(tick, value));
        self.dirty = true;
    }

    /// Change the value by `delta` between `start` and `end`.
    ///
    /// The sign of `delta` follows `direction`. A zero delta makes the ramp
    /// aim at the next fixed value instead.
    pub fn add_ramp(
        &mut self,
        start: Tick,
        end: Tick,
        delta: i32,
        method: ChangeMethod,
        direction: ChangeDirection,
    ) {
        let length = end.since(start);
        if length < 0 {
            log::warn!("change map: ramp {start}..{end} ends before it starts, treating as empty");
        }
        let delta = delta.abs() * direction.sign();
        log::debug!("change map: {method} ramp {start}..{end} by {delta}");
        self.events
            .insert(E::ramp(start, length.max(0), delta, method, direction));
        self.dirty = true;
    }

    /// Remove every event at `tick`. Returns how many were removed.
    pub fn remove_at(&mut self, tick: Tick) -> usize {
        let removed = self.events.remove_all_at(tick).len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.clamped = 0;
        self.dirty = false;
    }

    /// Restore the map invariants if needed and return a read view.
    pub fn normalize(&mut self) -> Normalized<'_, E> {
        if self.dirty {
            let events: Vec<E> = std::mem::take(&mut self.events).into();
            let before = events.len();
            let cleaned = cleanup::run(events, self.default_value);
            log::trace!(
                "change map: normalised {before} events to {}, {} clamped",
                cleaned.events.len(),
                cleaned.clamped
            );
            self.events = Timeline::from(cleaned.events);
            self.clamped = cleaned.clamped;
            self.dirty = false;
        }
        Normalized {
            events: &self.events,
            default_value: self.default_value,
            clamped: self.clamped,
        }
    }

    pub fn value_at(&mut self, tick: Tick) -> i32 {
        self.normalize().value_at(tick)
    }

    pub fn changes_in_range(&mut self, start: Tick, end: Tick) -> Vec<TickSpan> {
        self.normalize().changes_in_range(start, end)
    }

    /// Log the normalised map at debug level
    pub fn dump(&mut self) {
        self.normalize().dump();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// NORMALISED VIEW
// ═══════════════════════════════════════════════════════════════════════════

/// Read access to a normalised change map
#[derive(Debug, Clone)]
pub struct Normalized<'a, E: ChangeMapEvent> {
    events: &'a Timeline<E>,
    default_value: i32,
    clamped: usize,
}

impl<'a, E: ChangeMapEvent> Normalized<'a, E> {
    pub fn events(&self) -> &'a Timeline<E> {
        self.events
    }

    /// Ramps whose end value was clamped to keep their direction
    pub fn clamped_ramps(&self) -> usize {
        self.clamped
    }

    pub fn value_at(&self, tick: Tick) -> i32 {
        let Some(idx) = self.events.last_at_or_before(tick) else {
            return self.default_value;
        };
        let group = self.events.at(self.events.as_slice()[idx].tick());

        match group.iter().find(|e| e.is_ramp()) {
            Some(ramp) if tick >= ramp.end_tick() => ramp.cached_end(),
            Some(ramp) => interpolate(
                tick.since(ramp.tick()),
                ramp.length(),
                ramp.cached_start(),
                ramp.cached_end(),
                ramp.method(),
            ),
            None => group
                .iter()
                .find(|e| e.is_fixed())
                .map_or(self.default_value, |e| e.value()),
        }
    }

    /// Spans within `[start, end]` where the value may change.
    ///
    /// Always starts with an empty span at `start`. Fixes give empty spans,
    /// ramps give their extent clipped to `end`, and a ramp begun before
    /// `start` that is still running gives the part from `start` on.
    pub fn changes_in_range(&self, start: Tick, end: Tick) -> Vec<TickSpan> {
        let mut spans = vec![TickSpan::instant(start)];

        for event in self.events.range(start, end) {
            match event.kind() {
                EventKind::Fixed => spans.push(TickSpan::instant(event.tick())),
                EventKind::Ramp => spans.push(TickSpan::new(event.tick(), event.end_tick().min(end))),
                EventKind::Invalid => {}
            }
        }

        if let Some(prev) = self.events.lower_bound(start).checked_sub(1) {
            let prev_tick = self.events.as_slice()[prev].tick();
            for ramp in self.events.at(prev_tick).iter().filter(|e| e.is_ramp()) {
                if ramp.end_tick() > start {
                    spans.push(TickSpan::new(start, ramp.end_tick().min(end)));
                }
            }
        }

        spans
    }

    pub fn dump(&self) {
        log::debug!(
            "change map: {} events, default {}, {} clamped",
            self.events.len(),
            self.default_value,
            self.clamped
        );
        for event in self.events {
            match event.kind() {
                EventKind::Fixed => log::debug!("  {}: fixed {}", event.tick(), event.value()),
                EventKind::Ramp => log::debug!(
                    "  {}: {} ramp to {} by {} ({} -> {})",
                    event.tick(),
                    event.method(),
                    event.end_tick(),
                    event.value(),
                    event.cached_start(),
                    event.cached_end()
                ),
                EventKind::Invalid => log::debug!("  {}: invalid", event.tick()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    const UP: ChangeDirection = ChangeDirection::Increasing;
    const DOWN: ChangeDirection = ChangeDirection::Decreasing;

    fn map() -> ChangeMap {
        ChangeMap::new()
    }

    #[test]
    fn test_fixed_then_linear_ramp() {
        let mut m = map();
        m.add_fixed(Tick(0), 80);
        m.add_ramp(Tick(480), Tick(960), 40, ChangeMethod::Normal, UP);
        assert_eq!(m.value_at(Tick(480)), 80);
        assert_eq!(m.value_at(Tick(720)), 100);
        assert_eq!(m.value_at(Tick(960)), 120);
        assert_eq!(m.value_at(Tick(5000)), 120);
        assert_eq!(m.value_at(Tick(100)), 80);
    }

    #[test]
    fn test_empty_map_reports_default() {
        let mut m: ChangeMap = ChangeMap::with_default(64);
        assert_eq!(m.value_at(Tick(0)), 64);
        m.add_fixed(Tick(480), 100);
        assert_eq!(m.value_at(Tick(479)), 64);
        assert_eq!(m.value_at(Tick(480)), 100);
    }

    #[test]
    fn test_lazy_normalisation() {
        let mut m = map();
        assert!(!m.is_dirty());
        m.add_fixed(Tick(0), 50);
        assert!(m.is_dirty());
        m.value_at(Tick(0));
        assert!(!m.is_dirty());
        // a second normalisation is a no-op
        let before: Vec<ChangeEvent> = m.events().iter().cloned().collect();
        m.normalize();
        assert_eq!(m.events().as_slice(), before.as_slice());
    }

    #[test]
    fn test_delta_sign_follows_direction() {
        let mut m = map();
        m.add_fixed(Tick(0), 100);
        m.add_ramp(Tick(0), Tick(480), 30, ChangeMethod::Normal, DOWN);
        assert_eq!(m.value_at(Tick(480)), 70);
        let view = m.normalize();
        let ramp = view.events().iter().find(|e| e.is_ramp()).unwrap();
        assert_eq!(ramp.value(), -30);
    }

    #[test]
    fn test_ramp_without_delta_targets_next_fix() {
        let mut m = map();
        m.add_fixed(Tick(0), 60);
        m.add_ramp(Tick(0), Tick(480), 0, ChangeMethod::Normal, UP);
        m.add_fixed(Tick(480), 100);
        assert_eq!(m.value_at(Tick(240)), 80);
        assert_eq!(m.value_at(Tick(480)), 100);
    }

    #[test]
    fn test_ramp_without_target_is_flat() {
        let mut m = map();
        m.add_fixed(Tick(0), 60);
        m.add_ramp(Tick(0), Tick(480), 0, ChangeMethod::EaseIn, UP);
        m.add_ramp(Tick(480), Tick(960), 20, ChangeMethod::Normal, UP);
        assert_eq!(m.value_at(Tick(240)), 60);
        assert_eq!(m.value_at(Tick(960)), 80);
    }

    #[test]
    fn test_reversed_target_is_clamped_and_counted() {
        let mut m = map();
        m.add_fixed(Tick(0), 90);
        m.add_ramp(Tick(0), Tick(480), 0, ChangeMethod::Normal, UP);
        m.add_fixed(Tick(480), 50);
        assert_eq!(m.value_at(Tick(240)), 90);
        assert_eq!(m.normalize().clamped_ramps(), 1);
        // the fix still applies from its own tick
        assert_eq!(m.value_at(Tick(480)), 50);
    }

    #[test]
    fn test_latest_fix_at_tick_wins() {
        let mut m = map();
        m.add_fixed(Tick(0), 40);
        m.add_fixed(Tick(0), 70);
        assert_eq!(m.value_at(Tick(0)), 70);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_enclosed_ramp_and_fix_are_pruned() {
        let mut m = map();
        m.add_fixed(Tick(0), 50);
        m.add_ramp(Tick(0), Tick(960), 40, ChangeMethod::Normal, UP);
        m.add_ramp(Tick(240), Tick(480), 10, ChangeMethod::Normal, UP);
        m.add_fixed(Tick(300), 10);
        assert_eq!(m.value_at(Tick(480)), 70);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_overlapping_ramp_starts_where_previous_ends() {
        let mut m = map();
        m.add_fixed(Tick(0), 50);
        m.add_ramp(Tick(0), Tick(480), 20, ChangeMethod::Normal, UP);
        m.add_ramp(Tick(240), Tick(960), 20, ChangeMethod::Normal, UP);
        assert_eq!(m.value_at(Tick(480)), 70);
        assert_eq!(m.value_at(Tick(720)), 80);
        assert_eq!(m.value_at(Tick(960)), 90);
        let view = m.normalize();
        let second = view.events().iter().filter(|e| e.is_ramp()).nth(1).unwrap();
        assert_eq!(second.tick(), Tick(480));
        assert_eq!(second.end_tick(), Tick(960));
    }

    #[test]
    fn test_boundaries_exact_for_every_method() {
        for method in ChangeMethod::ALL {
            let mut m = map();
            m.add_fixed(Tick(0), 40);
            m.add_ramp(Tick(100), Tick(580), 0, method, UP);
            m.add_fixed(Tick(580), 110);
            let view = m.normalize();
            let ramp = view.events().iter().find(|e| e.is_ramp()).unwrap();
            assert_eq!(view.value_at(Tick(100)), ramp.cached_start(), "{method}");
            assert_eq!(view.value_at(Tick(580)), 110, "{method}");
        }
    }

    #[test]
    fn test_flat_ramp_holds_value() {
        let mut m = map();
        m.add_fixed(Tick(0), 75);
        m.add_ramp(Tick(0), Tick(480), 0, ChangeMethod::Exponential, UP);
        m.add_fixed(Tick(480), 75);
        for t in (0..=480).step_by(16) {
            assert_eq!(m.value_at(Tick(t)), 75);
        }
    }

    #[test]
    fn test_changes_in_range() {
        let mut m = map();
        m.add_fixed(Tick(0), 60);
        m.add_ramp(Tick(0), Tick(960), 20, ChangeMethod::Normal, UP);
        m.add_fixed(Tick(1200), 90);
        m.add_ramp(Tick(1440), Tick(2400), 10, ChangeMethod::Normal, UP);

        let spans = m.changes_in_range(Tick(480), Tick(1920));
        assert_eq!(
            spans,
            vec![
                TickSpan::instant(Tick(480)),
                TickSpan::instant(Tick(1200)),
                TickSpan::new(Tick(1440), Tick(1920)),
                TickSpan::new(Tick(480), Tick(960)),
            ]
        );

        let spans = m.changes_in_range(Tick(0), Tick(100));
        assert!(spans.contains(&TickSpan::instant(Tick(0))));
        assert!(spans.contains(&TickSpan::new(Tick(0), Tick(100))));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut m = map();
        m.add_fixed(Tick(0), 60);
        m.add_fixed(Tick(480), 90);
        assert_eq!(m.remove_at(Tick(480)), 1);
        assert_eq!(m.remove_at(Tick(480)), 0);
        assert_eq!(m.value_at(Tick(600)), 60);
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.value_at(Tick(600)), 80);
    }

    #[test]
    fn test_serde_reload_renormalises() {
        let mut m = map();
        m.add_fixed(Tick(0), 80);
        m.add_ramp(Tick(480), Tick(960), 40, ChangeMethod::EaseOut, UP);
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"ease-out\""));

        let mut loaded: ChangeMap = serde_json::from_str(&json).unwrap();
        assert!(loaded.is_dirty());
        for t in [0, 480, 600, 720, 960] {
            assert_eq!(loaded.value_at(Tick(t)), m.value_at(Tick(t)));
        }
    }

    #[test]
    fn test_random_edits_keep_invariants() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xA605);
        for _ in 0..50 {
            let mut m = map();
            for _ in 0..40 {
                let tick = Tick(rng.random_range(0..40i64) * 120);
                if rng.random_bool(0.4) {
                    m.add_fixed(tick, rng.random_range(0..128));
                } else {
                    let len: i64 = rng.random_range(1..12) * 120;
                    let direction = if rng.random() { UP } else { DOWN };
                    let method = ChangeMethod::ALL[rng.random_range(0..5)];
                    m.add_ramp(tick, tick + len, rng.random_range(0..30), method, direction);
                }
            }

            let view = m.normalize();
            for group in view.events().groups() {
                assert!(group.iter().filter(|e| e.is_fixed()).count() <= 1);
                assert!(group.iter().filter(|e| e.is_ramp()).count() <= 1);
            }
            let ramps: Vec<_> = view.events().iter().filter(|e| e.is_ramp()).collect();
            for pair in ramps.windows(2) {
                assert!(pair[0].end_tick() <= pair[1].tick(), "overlap {pair:?}");
            }
            for ramp in &ramps {
                assert!(!ramp.direction().is_reversed_by(ramp.cached_start(), ramp.cached_end()));
                assert_eq!(view.value_at(ramp.tick()), ramp.cached_start());
            }
        }
    }
}
