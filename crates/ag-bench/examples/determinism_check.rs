//! Determinism Checker: verifies timeline queries are bit-exact across runs.
//!
//! Builds each timeline from the same seed several times, runs the same
//! queries against every copy and compares the raw results.
//!
//! Exit code 0 = deterministic, 1 = non-deterministic
//! Output: machine-parseable lines for CI

use ag_bench::{
    GRID, change_map_extent, generate_change_map, generate_query_ticks, generate_tempo_map,
    generate_velo_list,
};
use ag_core::Tick;
use std::hint::black_box;

const EVENTS: usize = 256;
const QUERIES: usize = 4096;
const NUM_RUNS: usize = 5;
const SEED: u64 = 0x5EED;

/// Compare two result vectors word by word
fn results_match(a: &[u64], b: &[u64]) -> (bool, Option<usize>) {
    if a.len() != b.len() {
        return (false, Some(a.len().min(b.len())));
    }
    match a.iter().zip(b).position(|(x, y)| x != y) {
        Some(idx) => (false, Some(idx)),
        None => (true, None),
    }
}

fn compare_runs(name: &str, results: &[Vec<u64>]) -> bool {
    let reference = &results[0];
    let mut all_match = true;
    for (run, result) in results.iter().enumerate().skip(1) {
        let (matched, idx) = results_match(reference, result);
        if !matched {
            eprintln!(
                "DETERMINISM_FAIL: {} run {} differs at query {}",
                name,
                run,
                idx.unwrap_or(0)
            );
            all_match = false;
        }
    }
    all_match
}

fn check_change_map() -> bool {
    let results: Vec<Vec<u64>> = (0..NUM_RUNS)
        .map(|_| {
            let mut map = generate_change_map(EVENTS, SEED);
            let ticks = generate_query_ticks(QUERIES, change_map_extent(&map) + GRID, SEED);
            let mut out: Vec<u64> = ticks.iter().map(|&t| map.value_at(t) as u64).collect();
            out.push(map.normalize().clamped_ramps() as u64);
            out
        })
        .collect();
    compare_runs("change_map", &results)
}

fn check_change_ranges() -> bool {
    let results: Vec<Vec<u64>> = (0..NUM_RUNS)
        .map(|_| {
            let mut map = generate_change_map(EVENTS, SEED);
            let extent = change_map_extent(&map);
            map.changes_in_range(Tick(0), Tick(extent))
                .iter()
                .flat_map(|span| [span.start.ticks() as u64, span.end.ticks() as u64])
                .collect()
        })
        .collect();
    compare_runs("change_ranges", &results)
}

fn check_tempo_map() -> bool {
    let results: Vec<Vec<u64>> = (0..NUM_RUNS)
        .map(|_| {
            let map = generate_tempo_map(EVENTS, SEED);
            let ticks = generate_query_ticks(QUERIES, EVENTS as i64 * 16 * GRID, SEED);
            ticks
                .iter()
                .flat_map(|&t| {
                    let time = map.tick_to_time(t).value;
                    let back = map.time_to_tick(time).value;
                    [time.to_bits(), map.tempo_at(t).to_bits(), back.ticks() as u64]
                })
                .collect()
        })
        .collect();
    compare_runs("tempo_map", &results)
}

fn check_velo_list() -> bool {
    let results: Vec<Vec<u64>> = (0..NUM_RUNS)
        .map(|_| {
            let list = generate_velo_list(EVENTS, SEED);
            let ticks = generate_query_ticks(QUERIES, EVENTS as i64 * 12 * GRID, SEED);
            ticks
                .iter()
                .map(|&t| list.velocity_at(t) as u64)
                .collect()
        })
        .collect();
    compare_runs("velo_list", &results)
}

fn main() {
    eprintln!(
        "=== Timeline Determinism Check ({} runs per timeline) ===",
        NUM_RUNS
    );

    let checks: Vec<(&str, fn() -> bool)> = vec![
        ("change_map_values", check_change_map),
        ("change_map_ranges", check_change_ranges),
        ("tempo_map", check_tempo_map),
        ("velo_list", check_velo_list),
    ];

    let mut passed = 0;
    let mut failed = 0;

    for (name, check_fn) in &checks {
        let ok = black_box(check_fn());
        if ok {
            // Machine-parseable output for CI
            println!("DETERMINISM_PASS: {}", name);
            passed += 1;
        } else {
            println!("DETERMINISM_FAIL: {}", name);
            failed += 1;
        }
    }

    eprintln!("\n=== Results: {}/{} passed ===", passed, passed + failed);
    println!("DETERMINISM_TOTAL: passed={} failed={}", passed, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}
