//! Tempo map
//!
//! Converts between ticks and elapsed seconds. Each event may change the
//! tempo (a fixed tempo or a linear ramp ending at the event's tick) and may
//! hold playback for a pause. Elapsed time is the integral of 1/tempo over
//! ticks; ramps are integrated with the trapezoid rule, which is exact for a
//! linear tempo change.
//!
//! The map is normalised eagerly after every edit, and every normalisation
//! yields a new [`TempoVersion`]. Callers holding a [`Stamped`] result can
//! reuse it for as long as the version matches.

use crate::config::{DEFAULT_TEMPO, TimelineConfig};
use crate::timeline::{EventKind, Timeline, TimelineEvent};
use ag_core::{DEFAULT_DIVISION, Tick};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════════

/// How an event changes the tempo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TempoChange {
    /// Tempo in beats per second from the event's tick on
    Fixed(f64),
    /// Linear change by `delta` beats per second, from `start_tick` up to the
    /// event's tick
    Ramp { delta: f64, start_tick: Tick },
}

/// Tempo change and/or pause at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoEvent {
    tick: Tick,
    #[serde(default)]
    change: Option<TempoChange>,
    /// Seconds to hold at this tick
    #[serde(default)]
    pause: Option<f64>,
    /// Seconds elapsed when playback leaves this tick (after the pause)
    #[serde(skip)]
    time: f64,
    /// Tempo in effect after this tick
    #[serde(skip)]
    tempo: f64,
    /// Tempo in effect before this tick
    #[serde(skip)]
    ramp_from: f64,
    /// Ramp start, clamped to the previous event
    #[serde(skip)]
    ramp_start: Tick,
}

impl TempoEvent {
    fn new(tick: Tick) -> Self {
        Self {
            tick,
            change: None,
            pause: None,
            time: 0.0,
            tempo: 0.0,
            ramp_from: 0.0,
            ramp_start: tick,
        }
    }

    pub fn change(&self) -> Option<TempoChange> {
        self.change
    }

    pub fn pause(&self) -> Option<f64> {
        self.pause
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    fn ramp(&self) -> Option<RampSegment> {
        match self.change {
            Some(TempoChange::Ramp { delta, .. }) => Some(RampSegment {
                start: self.ramp_start,
                end: self.tick,
                delta,
            }),
            _ => None,
        }
    }
}

impl TimelineEvent for TempoEvent {
    type Value = f64;

    fn tick(&self) -> Tick {
        self.tick
    }

    fn kind(&self) -> EventKind {
        match self.change {
            Some(TempoChange::Fixed(_)) => EventKind::Fixed,
            Some(TempoChange::Ramp { .. }) => EventKind::Ramp,
            None => EventKind::Invalid,
        }
    }

    fn length(&self) -> i64 {
        match self.change {
            Some(TempoChange::Ramp { .. }) => self.tick.since(self.ramp_start),
            _ => 0,
        }
    }

    /// The ramp ends at the event's tick, so it spans backwards
    fn end_tick(&self) -> Tick {
        self.tick
    }

    fn cached_start(&self) -> f64 {
        self.ramp_from
    }

    fn cached_end(&self) -> f64 {
        self.tempo
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// VERSIONING
// ═══════════════════════════════════════════════════════════════════════════

/// Snapshot of a tempo map's state; changes whenever the map changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TempoVersion(u64);

/// Query result tagged with the version it was computed against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub version: TempoVersion,
}

// ═══════════════════════════════════════════════════════════════════════════
// INTEGRATION
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct RampSegment {
    start: Tick,
    end: Tick,
    delta: f64,
}

/// Position reached after an event
#[derive(Debug, Clone, Copy)]
struct Cursor {
    tick: Tick,
    time: f64,
    tempo: f64,
}

impl Cursor {
    fn origin(tempo: f64) -> Self {
        Self {
            tick: Tick::ZERO,
            time: 0.0,
            tempo,
        }
    }

    fn after(event: &TempoEvent) -> Self {
        Self {
            tick: event.tick,
            time: event.time,
            tempo: event.tempo,
        }
    }

    /// Seconds at `tick`, which must lie between this cursor and the event
    /// owning `ramp` (if any)
    fn time_at(&self, tick: Tick, ramp: Option<RampSegment>, scale: f64) -> f64 {
        match ramp {
            Some(ramp) if tick > ramp.start => {
                let into = tick.since(ramp.start) as f64;
                let span = ramp.end.since(ramp.start) as f64;
                let tempo = self.tempo + ramp.delta * into / span;
                let linear = ramp.start.since(self.tick) as f64 / (scale * self.tempo);
                linear + 0.5 * (1.0 / (scale * self.tempo) + 1.0 / (scale * tempo)) * into
                    + self.time
            }
            _ => self.time + tick.since(self.tick) as f64 / (scale * self.tempo),
        }
    }

    /// Tick reached `time` seconds in, at this cursor's tempo
    fn linear_tick(&self, time: f64, scale: f64) -> Tick {
        self.tick + ((time - self.time) * scale * self.tempo).round() as i64
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TEMPO MAP
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct RawTempoMap {
    events: Timeline<TempoEvent>,
    #[serde(default = "default_division")]
    division: i64,
    #[serde(default = "default_tempo")]
    default_tempo: f64,
    #[serde(default = "unit")]
    rel_tempo: f64,
}

fn default_division() -> i64 {
    DEFAULT_DIVISION
}

fn default_tempo() -> f64 {
    DEFAULT_TEMPO
}

fn unit() -> f64 {
    1.0
}

impl From<RawTempoMap> for TempoMap {
    fn from(raw: RawTempoMap) -> Self {
        let mut map = Self {
            events: raw.events,
            division: raw.division,
            default_tempo: raw.default_tempo,
            rel_tempo: raw.rel_tempo,
            version: 0,
        };
        map.normalize();
        map
    }
}

/// Tick to seconds projection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawTempoMap")]
pub struct TempoMap {
    events: Timeline<TempoEvent>,
    division: i64,
    default_tempo: f64,
    rel_tempo: f64,
    #[serde(skip)]
    version: u64,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::with_config(&TimelineConfig::default())
    }
}

impl TempoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &TimelineConfig) -> Self {
        Self {
            events: Timeline::new(),
            division: config.division,
            default_tempo: config.default_tempo,
            rel_tempo: 1.0,
            version: 0,
        }
    }

    pub fn events(&self) -> &Timeline<TempoEvent> {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn division(&self) -> i64 {
        self.division
    }

    pub fn version(&self) -> TempoVersion {
        TempoVersion(self.version)
    }

    pub fn rel_tempo(&self) -> f64 {
        self.rel_tempo
    }

    fn scale(&self) -> f64 {
        self.division as f64 * self.rel_tempo
    }

    /// Set a tempo change at `tick`.
    ///
    /// Without `start_tick` the tempo becomes `tempo`. With it, the tempo
    /// changes linearly by `tempo` between `start_tick` and `tick`.
    ///
    /// A change that would leave the tempo at `tick` zero, negative or not
    /// finite is ignored with a warning. Later ramps are not re-checked: a
    /// ramp whose start tempo drops so that it ends at or below zero makes
    /// times past it infinite or NaN.
    pub fn set_tempo(&mut self, tick: Tick, tempo: f64, start_tick: Option<Tick>) {
        let resulting = match start_tick {
            Some(_) => self.cursor_at(tick - 1).tempo + tempo,
            None => tempo,
        };
        if !resulting.is_finite() || resulting <= 0.0 {
            log::warn!("tempo map: ignoring change at {tick} to tempo {resulting}");
            return;
        }

        let change = match start_tick {
            Some(start_tick) => TempoChange::Ramp {
                delta: tempo,
                start_tick,
            },
            None => TempoChange::Fixed(tempo),
        };
        log::debug!("tempo map: {change:?} at {tick}");

        match self.events.first_at_mut(tick) {
            Some(event) => event.change = Some(change),
            None => {
                let mut event = TempoEvent::new(tick);
                event.change = Some(change);
                self.events.insert(event);
            }
        }
        self.normalize();
    }

    /// Ramp from the tempo in effect at `start_tick` to `target` at `tick`
    pub fn set_tempo_ramp_to(&mut self, tick: Tick, target: f64, start_tick: Tick) {
        let delta = target - self.tempo_at(start_tick);
        self.set_tempo(tick, delta, Some(start_tick));
    }

    /// Hold playback at `tick` for `seconds`; zero removes the pause
    pub fn set_pause(&mut self, tick: Tick, seconds: f64) {
        log::debug!("tempo map: pause {seconds}s at {tick}");
        let pause = (seconds > 0.0).then_some(seconds);

        match self.events.first_at_mut(tick) {
            Some(event) => {
                event.pause = pause;
                if event.change.is_none() && event.pause.is_none() {
                    self.events.remove_first_at(tick);
                }
            }
            None if pause.is_some() => {
                let mut event = TempoEvent::new(tick);
                event.pause = pause;
                self.events.insert(event);
            }
            None => return,
        }
        self.normalize();
    }

    /// Remove the tempo change at `tick`. An event that also pauses stays as
    /// a pause. Returns whether anything changed.
    pub fn del(&mut self, tick: Tick) -> bool {
        let Some(event) = self.events.first_at_mut(tick) else {
            log::debug!("tempo map: nothing to delete at {tick}");
            return false;
        };
        if event.change.is_none() {
            return false;
        }

        if event.pause.is_some() {
            event.change = None;
        } else {
            self.events.remove_first_at(tick);
        }
        self.normalize();
        true
    }

    pub fn clear(&mut self) {
        log::debug!("tempo map: clearing");
        self.events.clear();
        self.normalize();
    }

    /// Remove events in `[start, end)`
    pub fn clear_range(&mut self, start: Tick, end: Tick) {
        log::debug!("tempo map: clearing {start}..{end}");
        if self.events.clear_range(start, end) > 0 {
            self.normalize();
        }
    }

    /// Scale every tempo by `rel_tempo`
    pub fn set_rel_tempo(&mut self, rel_tempo: f64) {
        if !rel_tempo.is_finite() || rel_tempo <= 0.0 {
            log::warn!("tempo map: ignoring relative tempo {rel_tempo}");
            return;
        }
        self.rel_tempo = rel_tempo;
        self.normalize();
    }

    /// Recompute times and tempos and start a new version
    fn normalize(&mut self) {
        let scale = self.scale();
        let mut cursor = Cursor::origin(self.default_tempo);

        for event in self.events.events_mut() {
            if let Some(TempoChange::Ramp { start_tick, .. }) = event.change {
                event.ramp_start = start_tick.max(cursor.tick).min(event.tick);
                if event.ramp_start != start_tick {
                    log::debug!(
                        "tempo map: ramp at {} starts at {start_tick}, clamped to {}",
                        event.tick,
                        event.ramp_start
                    );
                }
            }

            let arrival = cursor.time_at(event.tick, event.ramp(), scale);
            event.time = arrival + event.pause.unwrap_or(0.0);
            event.ramp_from = cursor.tempo;
            event.tempo = match event.change {
                Some(TempoChange::Fixed(tempo)) => tempo,
                Some(TempoChange::Ramp { delta, .. }) => cursor.tempo + delta,
                None => cursor.tempo,
            };
            if event.tempo <= 0.0 {
                log::warn!("tempo map: tempo {} at {} is not positive", event.tempo, event.tick);
            }
            cursor = Cursor::after(event);
        }

        self.version += 1;
    }

    /// Cursor at the last event at or before `tick`
    fn cursor_at(&self, tick: Tick) -> Cursor {
        self.events
            .last_at_or_before(tick)
            .map_or(Cursor::origin(self.default_tempo), |idx| {
                Cursor::after(&self.events.as_slice()[idx])
            })
    }

    /// Tempo in beats per second at `tick`
    pub fn tempo_at(&self, tick: Tick) -> f64 {
        let cursor = self.cursor_at(tick);
        match self.events.first_after(tick).and_then(TempoEvent::ramp) {
            Some(ramp) if ramp.start <= tick => {
                let progress = tick.since(ramp.start) as f64 / ramp.end.since(ramp.start) as f64;
                cursor.tempo + ramp.delta * progress
            }
            _ => cursor.tempo,
        }
    }

    /// Seconds elapsed when playback leaves `tick`
    pub fn tick_to_time(&self, tick: Tick) -> Stamped<f64> {
        let cursor = self.cursor_at(tick);
        let ramp = self.events.first_after(tick).and_then(TempoEvent::ramp);
        Stamped {
            value: cursor.time_at(tick, ramp, self.scale()),
            version: self.version(),
        }
    }

    /// Tick reached after `time` seconds. Times inside a pause map to the
    /// paused tick.
    pub fn time_to_tick(&self, time: f64) -> Stamped<Tick> {
        let scale = self.scale();
        let mut cursor = Cursor::origin(self.default_tempo);

        for event in &self.events {
            let arrival = event.time - event.pause.unwrap_or(0.0);
            if time <= arrival {
                return self.stamp(Self::solve(cursor, event, time, scale));
            }
            if time <= event.time {
                return self.stamp(event.tick);
            }
            cursor = Cursor::after(event);
        }

        self.stamp(cursor.linear_tick(time, scale))
    }

    fn stamp<T>(&self, value: T) -> Stamped<T> {
        Stamped {
            value,
            version: self.version(),
        }
    }

    /// Invert the segment from `cursor` to `event` at `time`
    fn solve(cursor: Cursor, event: &TempoEvent, time: f64, scale: f64) -> Tick {
        let Some(ramp) = event.ramp() else {
            return cursor.linear_tick(time, scale);
        };
        if time <= cursor.time_at(ramp.start, None, scale) {
            return cursor.linear_tick(time, scale);
        }

        // time is increasing over the ramp, bisect on whole ticks
        let at = |tick: Tick| cursor.time_at(tick, Some(ramp), scale);
        let (mut lo, mut hi) = (ramp.start, ramp.end);
        while hi.since(lo) > 1 {
            let mid = lo + hi.since(lo) / 2;
            if at(mid) < time {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        if time - at(lo) <= at(hi) - time { lo } else { hi }
    }

    /// `cached` if it is still current, otherwise a fresh result
    pub fn tick_to_time_cached(&self, tick: Tick, cached: Stamped<f64>) -> Stamped<f64> {
        if cached.version == self.version() {
            cached
        } else {
            self.tick_to_time(tick)
        }
    }

    /// `cached` if it is still current, otherwise a fresh result
    pub fn time_to_tick_cached(&self, time: f64, cached: Stamped<Tick>) -> Stamped<Tick> {
        if cached.version == self.version() {
            cached
        } else {
            self.time_to_tick(time)
        }
    }

    /// Log the map at debug level
    pub fn dump(&self) {
        log::debug!(
            "tempo map: {} events, relative tempo {}, version {}",
            self.events.len(),
            self.rel_tempo,
            self.version
        );
        for event in &self.events {
            log::debug!(
                "  {:>6}: {:?} pause {:?} tempo {:.3} time {:.4}",
                event.tick.ticks(),
                event.change,
                event.pause,
                event.tempo,
                event.time
            );
        }
    }
}
