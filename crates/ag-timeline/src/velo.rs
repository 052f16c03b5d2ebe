//! Velocity list
//!
//! Note velocities from dynamics and hairpins. Unlike the change map, at most
//! one event lives at a tick and overlaps are settled when an edit is made:
//! each edit runs against a draft of the list and either commits or is
//! rejected with a [`VeloRejection`], leaving the list untouched.
//!
//! Events may leave their start or end velocity open. After every committed
//! edit those placeholders are resolved in two passes: open ends take the
//! next explicit start velocity, open starts take the velocity in effect
//! just before the event.

use crate::config::{DEFAULT_VALUE, TimelineConfig};
use crate::timeline::{EventKind, Timeline, TimelineEvent};
use ag_core::{ChangeMethod, Tick, interpolate, interpolate_dynamic};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VeloKind {
    /// A dynamic marking: one velocity from its tick on
    Fixed,
    /// A hairpin
    Ramp(ChangeMethod),
    /// A changing dynamic: holds, then moves linearly
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeloEvent {
    tick: Tick,
    kind: VeloKind,
    /// Start velocity; `None` takes it from the context
    start: Option<i32>,
    /// End velocity; `None` takes it from the context
    end: Option<i32>,
    #[serde(default)]
    duration: i64,
    #[serde(skip)]
    cached_start: i32,
    #[serde(skip)]
    cached_end: i32,
}

impl VeloEvent {
    pub fn fixed(tick: Tick, velocity: i32) -> Self {
        Self {
            tick,
            kind: VeloKind::Fixed,
            start: Some(velocity),
            end: Some(velocity),
            duration: 0,
            cached_start: velocity,
            cached_end: velocity,
        }
    }

    pub fn dynamic(tick: Tick, duration: i64, start: i32, end: i32) -> Self {
        Self {
            tick,
            kind: VeloKind::Dynamic,
            start: Some(start),
            end: Some(end),
            duration,
            cached_start: start,
            cached_end: end,
        }
    }

    pub fn hairpin(
        tick: Tick,
        duration: i64,
        method: ChangeMethod,
        start: Option<i32>,
        end: Option<i32>,
    ) -> Self {
        Self {
            tick,
            kind: VeloKind::Ramp(method),
            start,
            end,
            duration,
            cached_start: 0,
            cached_end: 0,
        }
    }

    pub fn velo_kind(&self) -> VeloKind {
        self.kind
    }

    pub fn start(&self) -> Option<i32> {
        self.start
    }

    pub fn end(&self) -> Option<i32> {
        self.end
    }

    pub fn duration(&self) -> i64 {
        self.duration
    }

    /// Velocity at `tick`, which must not precede the event
    fn velocity_at(&self, tick: Tick) -> i32 {
        let elapsed = tick.since(self.tick);
        match self.kind {
            VeloKind::Fixed => self.cached_start,
            _ if elapsed >= self.duration => self.cached_end,
            VeloKind::Ramp(method) => interpolate(
                elapsed,
                self.duration,
                self.cached_start,
                self.cached_end,
                method,
            ),
            VeloKind::Dynamic => {
                interpolate_dynamic(elapsed, self.duration, self.cached_start, self.cached_end)
            }
        }
    }
}

/// Hairpins and changing dynamics both span ticks
impl TimelineEvent for VeloEvent {
    type Value = i32;

    fn tick(&self) -> Tick {
        self.tick
    }

    fn kind(&self) -> EventKind {
        match self.kind {
            VeloKind::Fixed => EventKind::Fixed,
            VeloKind::Ramp(_) | VeloKind::Dynamic => EventKind::Ramp,
        }
    }

    fn length(&self) -> i64 {
        self.duration
    }

    fn cached_start(&self) -> i32 {
        self.cached_start
    }

    fn cached_end(&self) -> i32 {
        self.cached_end
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════

/// What an accepted edit did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VeloOutcome {
    Inserted,
    /// A fixed dynamic on a hairpin start set its start velocity
    HairpinStartSet { hairpin: Tick },
    /// A fixed dynamic on a hairpin end set its end velocity
    HairpinEndSet { hairpin: Tick },
    /// The hairpin was placed after a changing dynamic
    Shifted { to: Tick },
}

/// Why an edit was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VeloRejection {
    #[error("{tick} lies inside the hairpin starting at {hairpin}")]
    InsideHairpin { tick: Tick, hairpin: Tick },

    #[error("overlaps the fixed dynamic at {tick}")]
    OverlapsFixed { tick: Tick },

    #[error("overlaps the hairpin starting at {hairpin}")]
    OverlapsHairpin { hairpin: Tick },

    #[error("the changing dynamic at {dynamic} starts inside the hairpin")]
    DynamicInsideHairpin { dynamic: Tick },

    #[error("the changing dynamic at {dynamic} covers the whole hairpin")]
    SwallowedByDynamic { dynamic: Tick },

    #[error("the hairpin at {hairpin} would be covered entirely")]
    HairpinSwallowed { hairpin: Tick },

    #[error("cannot move a hairpin to {tick}, already occupied")]
    Occupied { tick: Tick },

    #[error("negative duration {0}")]
    NegativeDuration(i64),
}

// ═══════════════════════════════════════════════════════════════════════════
// VELOCITY LIST
// ═══════════════════════════════════════════════════════════════════════════

/// Note velocities over ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawVeloList")]
pub struct VeloList {
    events: Timeline<VeloEvent>,
    default_velocity: i32,
}

#[derive(Deserialize)]
struct RawVeloList {
    events: Timeline<VeloEvent>,
    #[serde(default = "default_velocity")]
    default_velocity: i32,
}

fn default_velocity() -> i32 {
    DEFAULT_VALUE
}

impl From<RawVeloList> for VeloList {
    fn from(raw: RawVeloList) -> Self {
        let mut list = Self {
            events: raw.events,
            default_velocity: raw.default_velocity,
        };
        resolve(list.events.events_mut(), list.default_velocity);
        list
    }
}

impl Default for VeloList {
    fn default() -> Self {
        Self::with_default(DEFAULT_VALUE)
    }
}

impl VeloList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(default_velocity: i32) -> Self {
        Self {
            events: Timeline::new(),
            default_velocity,
        }
    }

    pub fn with_config(config: &TimelineConfig) -> Self {
        Self::with_default(config.default_velocity)
    }

    pub fn events(&self) -> &Timeline<VeloEvent> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Velocity at `tick`
    pub fn velocity_at(&self, tick: Tick) -> i32 {
        match self.events.last_at_or_before(tick) {
            Some(idx) => self.events.as_slice()[idx].velocity_at(tick),
            None => self.default_velocity,
        }
    }

    /// Velocity in effect just before `tick`
    pub fn prev_velocity(&self, tick: Tick) -> i32 {
        let Some(idx) = self.events.lower_bound(tick).checked_sub(1) else {
            return self.default_velocity;
        };
        let event = &self.events.as_slice()[idx];
        if tick >= event.end_tick() {
            event.cached_end
        } else {
            event.cached_start
        }
    }

    /// Start velocity of the first event after `tick`
    pub fn next_velocity(&self, tick: Tick) -> i32 {
        self.events
            .first_after(tick)
            .map_or(self.default_velocity, |e| e.cached_start)
    }

    /// Start ticks of events whose span `[tick, tick + duration]` meets
    /// `[start, end]`
    pub fn find_overlapping(&self, start: Tick, end: Tick) -> Vec<Tick> {
        overlapping(&self.events, start, end)
    }

    /// Set a dynamic marking at `tick`
    pub fn set_dynamic(&mut self, tick: Tick, velocity: i32) -> Result<VeloOutcome, VeloRejection> {
        log::debug!("velo list: dynamic {velocity} at {tick}");
        self.edit(|events| {
            for st in overlapping(events, tick, tick) {
                let Some(event) = events.first_at_mut(st) else {
                    continue;
                };
                match event.kind {
                    VeloKind::Ramp(_) if event.end_tick() == tick => {
                        event.end = Some(velocity);
                        return Ok(VeloOutcome::HairpinEndSet { hairpin: st });
                    }
                    VeloKind::Ramp(_) if st < tick => {
                        return Err(VeloRejection::InsideHairpin { tick, hairpin: st });
                    }
                    VeloKind::Ramp(_) => {
                        event.start = Some(velocity);
                        return Ok(VeloOutcome::HairpinStartSet { hairpin: st });
                    }
                    VeloKind::Fixed => return Err(VeloRejection::OverlapsFixed { tick: st }),
                    // one at the same tick is replaced below
                    VeloKind::Dynamic if st < tick => {
                        log::debug!("velo list: ending dynamic at {st} before {tick}");
                        event.duration = tick.since(st) - 1;
                    }
                    VeloKind::Dynamic => {}
                }
            }
            events.replace(VeloEvent::fixed(tick, velocity));
            Ok(VeloOutcome::Inserted)
        })
    }

    /// Set a changing dynamic moving from `start` to `end` over `duration` ticks
    pub fn set_dynamic_change(
        &mut self,
        tick: Tick,
        duration: i64,
        start: i32,
        end: i32,
    ) -> Result<VeloOutcome, VeloRejection> {
        log::debug!("velo list: changing dynamic {start} -> {end} at {tick} for {duration}");
        if duration < 0 {
            return Err(VeloRejection::NegativeDuration(duration));
        }

        self.edit(|events| {
            // stop short of the next changing dynamic before anything is moved
            let duration = overlapping(events, tick, tick + duration)
                .into_iter()
                .filter(|&st| st > tick)
                .find(|&st| {
                    events
                        .first_at(st)
                        .is_some_and(|e| e.kind == VeloKind::Dynamic)
                })
                .map_or(duration, |st| {
                    log::debug!("velo list: changing dynamic at {tick} ends before {st}");
                    duration.min(st.since(tick) - 1)
                });
            let etick = tick + duration;

            for st in overlapping(events, tick, etick) {
                let Some(event) = events.first_at(st).cloned() else {
                    continue;
                };
                match event.kind {
                    VeloKind::Ramp(_) if st < tick && event.end_tick() > tick => {
                        return Err(VeloRejection::InsideHairpin { tick, hairpin: st });
                    }
                    // ends where this one starts
                    VeloKind::Ramp(_) if st < tick => {}
                    VeloKind::Ramp(_) => {
                        let new_tick = etick + 1;
                        let remaining = event.end_tick().since(new_tick);
                        if remaining <= 0 {
                            return Err(VeloRejection::HairpinSwallowed { hairpin: st });
                        }
                        if events.contains_tick(new_tick) {
                            return Err(VeloRejection::Occupied { tick: new_tick });
                        }
                        log::debug!("velo list: moving hairpin from {st} to {new_tick}");
                        events.remove_first_at(st);
                        events.insert(VeloEvent {
                            tick: new_tick,
                            start: Some(end),
                            duration: remaining,
                            ..event
                        });
                    }
                    VeloKind::Fixed => return Err(VeloRejection::OverlapsFixed { tick: st }),
                    VeloKind::Dynamic if st < tick => {
                        log::debug!("velo list: ending dynamic at {st} before {tick}");
                        if let Some(earlier) = events.first_at_mut(st) {
                            earlier.duration = tick.since(st) - 1;
                        }
                    }
                    // the same tick, replaced below
                    VeloKind::Dynamic => {}
                }
            }
            events.replace(VeloEvent::dynamic(tick, duration, start, end));
            Ok(VeloOutcome::Inserted)
        })
    }

    /// Set a hairpin over `duration` ticks. Open velocities are taken from a
    /// fixed dynamic at either end, or else from the context.
    pub fn set_hairpin(
        &mut self,
        tick: Tick,
        duration: i64,
        method: ChangeMethod,
        start: Option<i32>,
        end: Option<i32>,
    ) -> Result<VeloOutcome, VeloRejection> {
        log::debug!("velo list: {method} hairpin at {tick} for {duration}, {start:?} -> {end:?}");
        if duration < 0 {
            return Err(VeloRejection::NegativeDuration(duration));
        }
        self.edit(|events| place_hairpin(events, tick, duration, method, start, end))
    }

    /// Remove the event at `tick`
    pub fn remove(&mut self, tick: Tick) -> Option<VeloEvent> {
        let removed = self.events.remove_first_at(tick);
        if removed.is_some() {
            log::debug!("velo list: removed event at {tick}");
            resolve(self.events.events_mut(), self.default_velocity);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn edit<F>(&mut self, apply: F) -> Result<VeloOutcome, VeloRejection>
    where
        F: FnOnce(&mut Timeline<VeloEvent>) -> Result<VeloOutcome, VeloRejection>,
    {
        let mut draft = self.events.clone();
        match apply(&mut draft) {
            Ok(outcome) => {
                resolve(draft.events_mut(), self.default_velocity);
                self.events = draft;
                log::debug!("velo list: {outcome:?}");
                Ok(outcome)
            }
            Err(rejection) => {
                log::debug!("velo list: rejected, {rejection}");
                Err(rejection)
            }
        }
    }

    /// Log the list at debug level
    pub fn dump(&self) {
        log::debug!(
            "velo list: {} events, default {}",
            self.events.len(),
            self.default_velocity
        );
        for event in &self.events {
            log::debug!(
                "  {:>6}: {:?} {:?} -> {:?} over {} ({} -> {})",
                event.tick.ticks(),
                event.kind,
                event.start,
                event.end,
                event.duration,
                event.cached_start,
                event.cached_end
            );
        }
    }
}

fn overlapping(events: &Timeline<VeloEvent>, start: Tick, end: Tick) -> Vec<Tick> {
    events
        .iter()
        .take_while(|e| e.tick <= end)
        .filter(|e| (e.tick <= start && e.end_tick() >= start) || e.tick >= start)
        .map(|e| e.tick)
        .collect()
}

fn place_hairpin(
    events: &mut Timeline<VeloEvent>,
    tick: Tick,
    duration: i64,
    method: ChangeMethod,
    mut start: Option<i32>,
    mut end: Option<i32>,
) -> Result<VeloOutcome, VeloRejection> {
    let etick = tick + duration;

    for st in overlapping(events, tick, etick) {
        let Some(event) = events.first_at(st).cloned() else {
            continue;
        };
        match event.kind {
            // touching at an end is fine
            VeloKind::Ramp(_) if event.end_tick() == tick || st == etick => {}
            VeloKind::Ramp(_) => return Err(VeloRejection::OverlapsHairpin { hairpin: st }),
            VeloKind::Fixed => {
                if st == tick {
                    start = start.or(event.start);
                } else if st == etick {
                    end = end.or(event.start);
                } else {
                    log::debug!("velo list: dropping dynamic at {st} inside new hairpin");
                }
                events.remove_first_at(st);
            }
            VeloKind::Dynamic if st > tick => {
                return Err(VeloRejection::DynamicInsideHairpin { dynamic: st });
            }
            VeloKind::Dynamic => {
                let new_tick = event.end_tick() + 1;
                let remaining = etick.since(new_tick);
                if remaining <= 0 {
                    return Err(VeloRejection::SwallowedByDynamic { dynamic: st });
                }
                log::debug!("velo list: hairpin moves after dynamic at {st}, to {new_tick}");
                place_hairpin(events, new_tick, remaining, method, event.end, end)?;
                return Ok(VeloOutcome::Shifted { to: new_tick });
            }
        }
    }

    events.replace(VeloEvent::hairpin(tick, duration, method, start, end));
    Ok(VeloOutcome::Inserted)
}

/// Fill in the cached start and end velocity of every event
fn resolve(events: &mut [VeloEvent], default_velocity: i32) {
    let mut upcoming = default_velocity;
    for event in events.iter_mut().rev() {
        event.cached_end = event.end.unwrap_or(upcoming);
        upcoming = event.start.unwrap_or(upcoming);
    }

    let mut previous: Option<(Tick, i32, i32)> = None;
    for event in events.iter_mut() {
        let before = match previous {
            Some((end_tick, _, end)) if event.tick >= end_tick => end,
            Some((_, start, _)) => start,
            None => default_velocity,
        };
        event.cached_start = event.start.unwrap_or(before);
        if event.kind == VeloKind::Fixed {
            event.cached_end = event.cached_start;
        }
        previous = Some((event.end_tick(), event.cached_start, event.cached_end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hairpin_list() -> VeloList {
        let mut list = VeloList::new();
        list.set_hairpin(Tick(0), 960, ChangeMethod::Normal, Some(60), Some(100))
            .unwrap();
        list
    }

    #[test]
    fn test_empty_list_reports_default() {
        let list = VeloList::with_default(64);
        assert_eq!(list.velocity_at(Tick(0)), 64);
        assert_eq!(list.prev_velocity(Tick(100)), 64);
        assert_eq!(list.next_velocity(Tick(100)), 64);
    }

    #[test]
    fn test_fixed_dynamics() {
        let mut list = VeloList::new();
        assert_eq!(list.set_dynamic(Tick(0), 60), Ok(VeloOutcome::Inserted));
        assert_eq!(list.set_dynamic(Tick(480), 100), Ok(VeloOutcome::Inserted));
        assert_eq!(list.velocity_at(Tick(-1)), 80);
        assert_eq!(list.velocity_at(Tick(0)), 60);
        assert_eq!(list.velocity_at(Tick(479)), 60);
        assert_eq!(list.velocity_at(Tick(480)), 100);
        assert_eq!(list.prev_velocity(Tick(480)), 60);
        assert_eq!(list.next_velocity(Tick(0)), 100);
    }

    #[test]
    fn test_hairpin_interpolates_and_holds_end() {
        let list = hairpin_list();
        assert_eq!(list.velocity_at(Tick(0)), 60);
        assert_eq!(list.velocity_at(Tick(480)), 80);
        assert_eq!(list.velocity_at(Tick(960)), 100);
        assert_eq!(list.velocity_at(Tick(5000)), 100);
    }

    #[test]
    fn test_dynamic_inside_hairpin_is_rejected() {
        let mut list = hairpin_list();
        let before = list.clone();
        assert_eq!(
            list.set_dynamic(Tick(480), 90),
            Err(VeloRejection::InsideHairpin {
                tick: Tick(480),
                hairpin: Tick(0)
            })
        );
        assert_eq!(list, before);
        assert_eq!(list.velocity_at(Tick(0)), 60);
        assert_eq!(list.velocity_at(Tick(960)), 100);
    }

    #[test]
    fn test_dynamic_on_hairpin_ends() {
        let mut list = VeloList::new();
        list.set_hairpin(Tick(480), 480, ChangeMethod::Normal, None, None)
            .unwrap();
        assert_eq!(
            list.set_dynamic(Tick(480), 50),
            Ok(VeloOutcome::HairpinStartSet { hairpin: Tick(480) })
        );
        assert_eq!(
            list.set_dynamic(Tick(960), 90),
            Ok(VeloOutcome::HairpinEndSet { hairpin: Tick(480) })
        );
        assert_eq!(list.len(), 1);
        assert_eq!(list.velocity_at(Tick(480)), 50);
        assert_eq!(list.velocity_at(Tick(720)), 70);
        assert_eq!(list.velocity_at(Tick(1000)), 90);
    }

    #[test]
    fn test_placeholders_resolve_from_neighbours() {
        let mut list = VeloList::new();
        list.set_dynamic(Tick(0), 50).unwrap();
        list.set_hairpin(Tick(480), 480, ChangeMethod::Normal, None, None)
            .unwrap();
        // no following event yet: aims at the default
        assert_eq!(list.velocity_at(Tick(960)), 80);

        list.set_dynamic(Tick(1200), 110).unwrap();
        assert_eq!(list.velocity_at(Tick(480)), 50);
        assert_eq!(list.velocity_at(Tick(720)), 80);
        assert_eq!(list.velocity_at(Tick(960)), 110);
    }

    #[test]
    fn test_second_fixed_at_tick_is_rejected() {
        let mut list = VeloList::new();
        list.set_dynamic(Tick(480), 60).unwrap();
        assert_eq!(
            list.set_dynamic(Tick(480), 70),
            Err(VeloRejection::OverlapsFixed { tick: Tick(480) })
        );
        assert_eq!(list.velocity_at(Tick(480)), 60);
    }

    #[test]
    fn test_changing_dynamic_holds_first_quarter() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(0), 400, 100, 60).unwrap();
        assert_eq!(list.velocity_at(Tick(50)), 100);
        assert_eq!(list.velocity_at(Tick(250)), 80);
        assert_eq!(list.velocity_at(Tick(400)), 60);
        assert_eq!(list.velocity_at(Tick(900)), 60);
    }

    #[test]
    fn test_fixed_dynamic_shortens_changing_dynamic() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(0), 480, 100, 60).unwrap();
        list.set_dynamic(Tick(240), 90).unwrap();
        assert_eq!(list.events().first_at(Tick(0)).map(VeloEvent::duration), Some(239));
        assert_eq!(list.velocity_at(Tick(240)), 90);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_changing_dynamic_shortens_earlier_dynamic() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(0), 480, 100, 60).unwrap();
        assert_eq!(
            list.set_dynamic_change(Tick(240), 200, 90, 70),
            Ok(VeloOutcome::Inserted)
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list.events().first_at(Tick(0)).map(VeloEvent::duration), Some(239));
        assert_eq!(list.velocity_at(Tick(240)), 90);
        assert_eq!(list.velocity_at(Tick(440)), 70);
    }

    #[test]
    fn test_changing_dynamic_stops_before_later_dynamic() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(480), 200, 50, 70).unwrap();
        assert_eq!(
            list.set_dynamic_change(Tick(0), 960, 100, 60),
            Ok(VeloOutcome::Inserted)
        );
        assert_eq!(list.len(), 2);
        assert_eq!(list.events().first_at(Tick(0)).map(VeloEvent::duration), Some(479));
        assert_eq!(list.events().first_at(Tick(480)).map(VeloEvent::duration), Some(200));
        assert_eq!(list.velocity_at(Tick(480)), 50);
    }

    #[test]
    fn test_shortened_changing_dynamic_leaves_later_hairpin() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(300), 100, 50, 70).unwrap();
        list.set_hairpin(Tick(500), 500, ChangeMethod::Normal, Some(40), Some(120))
            .unwrap();
        assert_eq!(
            list.set_dynamic_change(Tick(0), 600, 100, 90),
            Ok(VeloOutcome::Inserted)
        );

        assert_eq!(list.len(), 3);
        assert_eq!(list.events().first_at(Tick(0)).map(VeloEvent::duration), Some(299));
        assert!(list.events().first_at(Tick(601)).is_none());
        let hairpin = list.events().first_at(Tick(500)).unwrap();
        assert_eq!(hairpin.duration(), 500);
        assert_eq!(hairpin.start(), Some(40));
        assert_eq!(list.velocity_at(Tick(500)), 40);
        assert_eq!(list.velocity_at(Tick(1000)), 120);
    }

    #[test]
    fn test_changing_dynamic_nudges_hairpin() {
        let mut list = VeloList::new();
        list.set_hairpin(Tick(480), 960, ChangeMethod::Normal, None, Some(120))
            .unwrap();
        assert_eq!(
            list.set_dynamic_change(Tick(480), 240, 60, 80),
            Ok(VeloOutcome::Inserted)
        );
        let hairpin = list.events().first_at(Tick(721)).unwrap();
        assert_eq!(hairpin.duration(), 719);
        assert_eq!(hairpin.start(), Some(80));
        assert_eq!(list.velocity_at(Tick(721)), 80);
        assert_eq!(list.velocity_at(Tick(1440)), 120);
    }

    #[test]
    fn test_changing_dynamic_rejections() {
        let mut list = hairpin_list();
        let before = list.clone();
        assert_eq!(
            list.set_dynamic_change(Tick(240), 100, 70, 90),
            Err(VeloRejection::InsideHairpin {
                tick: Tick(240),
                hairpin: Tick(0)
            })
        );
        assert_eq!(
            list.set_dynamic_change(Tick(0), 960, 70, 90),
            Err(VeloRejection::HairpinSwallowed { hairpin: Tick(0) })
        );
        assert_eq!(
            list.set_dynamic_change(Tick(0), -5, 70, 90),
            Err(VeloRejection::NegativeDuration(-5))
        );
        assert_eq!(list, before);

        list.set_dynamic(Tick(2000), 50).unwrap();
        assert_eq!(
            list.set_dynamic_change(Tick(1900), 200, 70, 90),
            Err(VeloRejection::OverlapsFixed { tick: Tick(2000) })
        );
        // a changing dynamic may start where the hairpin ends
        assert!(list.set_dynamic_change(Tick(960), 100, 100, 70).is_ok());
    }

    #[test]
    fn test_hairpin_shifted_after_dynamic() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(0), 240, 60, 80).unwrap();
        assert_eq!(
            list.set_hairpin(Tick(0), 960, ChangeMethod::Normal, None, Some(120)),
            Ok(VeloOutcome::Shifted { to: Tick(241) })
        );
        let hairpin = list.events().first_at(Tick(241)).unwrap();
        assert_eq!(hairpin.duration(), 719);
        assert_eq!(list.velocity_at(Tick(241)), 80);
        assert_eq!(list.velocity_at(Tick(960)), 120);
    }

    #[test]
    fn test_hairpin_rejections_leave_list_unchanged() {
        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(0), 960, 60, 80).unwrap();
        let before = list.clone();
        assert_eq!(
            list.set_hairpin(Tick(0), 480, ChangeMethod::Normal, None, None),
            Err(VeloRejection::SwallowedByDynamic { dynamic: Tick(0) })
        );
        assert_eq!(list, before);

        let mut list = VeloList::new();
        list.set_dynamic_change(Tick(240), 100, 60, 80).unwrap();
        assert_eq!(
            list.set_hairpin(Tick(0), 960, ChangeMethod::Normal, None, None),
            Err(VeloRejection::DynamicInsideHairpin { dynamic: Tick(240) })
        );
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_hairpin_takes_values_from_fixed_dynamics() {
        let mut list = VeloList::new();
        list.set_dynamic(Tick(0), 50).unwrap();
        list.set_dynamic(Tick(480), 30).unwrap();
        list.set_dynamic(Tick(960), 110).unwrap();
        list.set_hairpin(Tick(0), 960, ChangeMethod::EaseIn, None, None)
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.velocity_at(Tick(0)), 50);
        assert_eq!(list.velocity_at(Tick(960)), 110);
    }

    #[test]
    fn test_hairpins_may_touch_but_not_overlap() {
        let mut list = hairpin_list();
        assert_eq!(
            list.set_hairpin(Tick(960), 480, ChangeMethod::Normal, None, Some(40)),
            Ok(VeloOutcome::Inserted)
        );
        assert_eq!(
            list.set_hairpin(Tick(240), 480, ChangeMethod::Normal, None, None),
            Err(VeloRejection::OverlapsHairpin { hairpin: Tick(0) })
        );
        // the second hairpin starts where the first ends
        assert_eq!(list.velocity_at(Tick(960)), 100);
        assert_eq!(list.velocity_at(Tick(1440)), 40);
    }

    #[test]
    fn test_find_overlapping_is_inclusive() {
        let mut list = hairpin_list();
        list.set_dynamic(Tick(1200), 70).unwrap();
        assert_eq!(list.find_overlapping(Tick(960), Tick(960)), vec![Tick(0)]);
        assert_eq!(list.find_overlapping(Tick(500), Tick(1200)), vec![Tick(0), Tick(1200)]);
        assert!(list.find_overlapping(Tick(961), Tick(1199)).is_empty());
    }

    #[test]
    fn test_remove_re_resolves() {
        let mut list = VeloList::new();
        list.set_hairpin(Tick(0), 480, ChangeMethod::Normal, Some(40), None)
            .unwrap();
        list.set_dynamic(Tick(600), 100).unwrap();
        assert_eq!(list.velocity_at(Tick(480)), 100);
        assert!(list.remove(Tick(600)).is_some());
        assert_eq!(list.velocity_at(Tick(480)), 80);
        assert!(list.remove(Tick(600)).is_none());
    }

    #[test]
    fn test_serde_reload_resolves() {
        let mut list = hairpin_list();
        list.set_dynamic(Tick(1200), 70).unwrap();
        let json = serde_json::to_string(&list).unwrap();
        let loaded: VeloList = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, list);
        assert_eq!(loaded.velocity_at(Tick(480)), 80);
    }
}
