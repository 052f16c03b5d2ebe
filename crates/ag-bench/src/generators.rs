//! Test data generators for benchmarks

use ag_core::{ChangeDirection, ChangeMethod, Tick};
use ag_timeline::{ChangeMap, TempoMap, TimelineEvent, VeloList};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Grid the generators place events on (a sixteenth at 480 ticks per quarter)
pub const GRID: i64 = 120;

/// Common event counts for benchmarks
pub const EVENT_COUNTS: &[usize] = &[16, 64, 256, 1024];

fn random_method(rng: &mut ChaCha8Rng) -> ChangeMethod {
    ChangeMethod::ALL[rng.random_range(0..ChangeMethod::ALL.len())]
}

/// Generate a reproducible, un-normalised change map with overlapping ramps
pub fn generate_change_map(events: usize, seed: u64) -> ChangeMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let span = (events as i64).max(1) * 4;
    let mut map = ChangeMap::new();

    for _ in 0..events {
        let tick = Tick(rng.random_range(0..span) * GRID);
        if rng.random_bool(0.5) {
            map.add_fixed(tick, rng.random_range(0..128));
        } else {
            let length = rng.random_range(1..16) * GRID;
            let direction = if rng.random() {
                ChangeDirection::Increasing
            } else {
                ChangeDirection::Decreasing
            };
            let method = random_method(&mut rng);
            map.add_ramp(tick, tick + length, rng.random_range(0..40), method, direction);
        }
    }
    map
}

/// Generate a reproducible tempo map of fixed tempos, ramps and pauses
pub fn generate_tempo_map(events: usize, seed: u64) -> TempoMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut map = TempoMap::new();
    let mut tick = 0;

    for _ in 0..events {
        tick += rng.random_range(1..16) * GRID;
        match rng.random_range(0..3) {
            0 => map.set_tempo(Tick(tick), rng.random_range(1.0..4.0), None),
            1 => {
                let target = rng.random_range(1.0..4.0);
                let start = Tick(tick - rng.random_range(1..8) * GRID);
                map.set_tempo_ramp_to(Tick(tick), target, start);
            }
            _ => map.set_pause(Tick(tick), rng.random_range(0.1..1.0)),
        }
    }
    map
}

/// Generate a reproducible velocity list. Rejected edits are skipped, so the
/// list may hold fewer than `events` events.
pub fn generate_velo_list(events: usize, seed: u64) -> VeloList {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut list = VeloList::new();
    let mut tick = 0;

    for _ in 0..events {
        tick += rng.random_range(1..12) * GRID;
        let duration = rng.random_range(1..8) * GRID;
        let start = rng.random_range(20..120);
        let end = rng.random_range(20..120);
        let _ = match rng.random_range(0..3) {
            0 => list.set_dynamic(Tick(tick), start),
            1 => list.set_dynamic_change(Tick(tick), duration, start, end),
            _ => {
                let method = random_method(&mut rng);
                list.set_hairpin(Tick(tick), duration, method, None, Some(end))
            }
        };
    }
    list
}

/// Generate reproducible query ticks in `[0, max)`
pub fn generate_query_ticks(count: usize, max: i64, seed: u64) -> Vec<Tick> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| Tick(rng.random_range(0..max.max(1))))
        .collect()
}

/// Last tick any event of the map touches
pub fn change_map_extent(map: &ChangeMap) -> i64 {
    map.events()
        .iter()
        .map(|e| e.end_tick().ticks())
        .max()
        .unwrap_or(0)
}
