//! Normalisation pipeline for change maps
//!
//! Each stage takes the events in tick order and returns a new, still sorted
//! list. After the last stage every tick holds at most one ramp followed by
//! at most one fix, no two ramps overlap, and every ramp carries its start
//! and end value.

use super::ChangeMapEvent;
use crate::timeline::EventKind;
use ag_core::Tick;
use std::cmp::Reverse;

/// Span of a ramp that survived enclosure pruning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RampSpan {
    pub start: Tick,
    pub end: Tick,
    /// The ramp began while an earlier ramp was still running
    pub starts_in_ramp: bool,
}

/// Output of the whole pipeline
#[derive(Debug)]
pub(crate) struct Cleaned<E> {
    pub events: Vec<E>,
    /// Ramps whose end value had to be clamped to their start value
    pub clamped: usize,
}

pub(crate) fn run<E: ChangeMapEvent>(events: Vec<E>, default_value: i32) -> Cleaned<E> {
    let events = order_ties(events);
    let (events, spans) = prune_enclosed(events);
    let events = resolve_collisions(events, &spans);
    cache_values(events, default_value)
}

/// Stage 0: within each tick put the ramps first, longest first, then the
/// most recently added fix. Older fixes at the same tick are dropped.
pub(crate) fn order_ties<E: ChangeMapEvent>(events: Vec<E>) -> Vec<E> {
    let mut ordered = Vec::with_capacity(events.len());
    for group in events.chunk_by(|a, b| a.tick() == b.tick()) {
        let mut ramps: Vec<E> = group.iter().filter(|e| e.is_ramp()).cloned().collect();
        ramps.sort_by_key(|e| Reverse(e.length()));
        ordered.extend(ramps);

        if let Some(fix) = group.iter().rev().find(|e| e.is_fixed()) {
            ordered.push(fix.clone());
        }

        let invalid = group.iter().filter(|e| e.kind() == EventKind::Invalid).count();
        if invalid > 0 {
            log::debug!("dropping {invalid} invalid event(s) at {}", group[0].tick());
        }
    }
    ordered
}

/// Stage 1: drop ramps that end inside the ramp currently running and fixes
/// strictly inside it. Records the span of every surviving ramp.
pub(crate) fn prune_enclosed<E: ChangeMapEvent>(events: Vec<E>) -> (Vec<E>, Vec<RampSpan>) {
    let mut kept = Vec::with_capacity(events.len());
    let mut spans: Vec<RampSpan> = Vec::new();
    let mut open: Option<(Tick, Tick)> = None;

    for event in events {
        let tick = event.tick();
        if open.is_some_and(|(_, end)| end < tick) {
            open = None;
        }

        match event.kind() {
            EventKind::Ramp => {
                let end = event.end_tick();
                if open.is_some_and(|(_, open_end)| end <= open_end) {
                    log::trace!("pruning ramp {tick}..{end}, enclosed");
                    continue;
                }
                spans.push(RampSpan {
                    start: tick,
                    end,
                    starts_in_ramp: open.is_some(),
                });
                open = Some((tick, end));
            }
            EventKind::Fixed => {
                if let Some((start, end)) = open {
                    if tick != start && tick != end {
                        log::trace!("pruning fix at {tick}, inside ramp {start}..{end}");
                        continue;
                    }
                }
            }
            EventKind::Invalid => continue,
        }
        kept.push(event);
    }

    (kept, spans)
}

/// Stage 2: a ramp that began inside another one is moved to start where
/// that one ends; its end tick stays put.
pub(crate) fn resolve_collisions<E: ChangeMapEvent>(
    mut events: Vec<E>,
    spans: &[RampSpan],
) -> Vec<E> {
    let mut moved = false;
    for (j, event) in events.iter_mut().filter(|e| e.is_ramp()).enumerate() {
        if !spans[j].starts_in_ramp {
            continue;
        }
        // the first surviving ramp never starts inside another one
        let new_start = spans[j - 1].end;
        log::trace!(
            "moving ramp {}..{} to start at {new_start}",
            spans[j].start,
            spans[j].end
        );
        event.move_start(new_start);
        moved = true;
    }

    if moved {
        events.sort_by_key(|e| (e.tick(), e.is_fixed()));
    }
    events
}

/// Stage 3: cache the start and end value of every ramp.
///
/// The start is the fix at the ramp's own tick, else the end of the ramp or
/// the value of the fix at the previous tick, else `default_value`. The end
/// is start + delta, or without a delta the fix at the next tick. A ramp
/// followed by another ramp (or by nothing) without a delta stays flat.
pub(crate) fn cache_values<E: ChangeMapEvent>(mut events: Vec<E>, default_value: i32) -> Cleaned<E> {
    let bounds: Vec<(usize, usize)> = {
        let mut start = 0;
        events
            .chunk_by(|a, b| a.tick() == b.tick())
            .map(|group| {
                let range = (start, start + group.len());
                start += group.len();
                range
            })
            .collect()
    };

    fn fix_in<E: ChangeMapEvent>(events: &[E], (from, to): (usize, usize)) -> Option<i32> {
        events[from..to].iter().find(|e| e.is_fixed()).map(|e| e.value())
    }
    fn ramp_end_in<E: ChangeMapEvent>(events: &[E], (from, to): (usize, usize)) -> Option<i32> {
        events[from..to].iter().find(|e| e.is_ramp()).map(|e| e.cached_end())
    }

    let mut clamped = 0;
    for (g, &group) in bounds.iter().enumerate() {
        let Some(i) = (group.0..group.1).find(|&i| events[i].is_ramp()) else {
            continue;
        };

        let start = fix_in(&events, group)
            .or_else(|| {
                let prev = *bounds.get(g.checked_sub(1)?)?;
                ramp_end_in(&events, prev).or_else(|| fix_in(&events, prev))
            })
            .unwrap_or(default_value);

        let ramp = &events[i];
        let mut end = if ramp.value() != 0 {
            start + ramp.value()
        } else {
            bounds
                .get(g + 1)
                .and_then(|&next| fix_in(&events, next))
                .unwrap_or(start)
        };

        if ramp.direction().is_reversed_by(start, end) {
            log::debug!(
                "clamping ramp at {}: {start} -> {end} runs against {:?}",
                ramp.tick(),
                ramp.direction()
            );
            end = start;
            clamped += 1;
        }

        events[i].set_cached(start, end);
    }

    Cleaned { events, clamped }
}
