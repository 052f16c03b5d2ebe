//! Edit scripts
//!
//! A script is a JSON document with one list of tagged operations per
//! timeline:
//!
//! ```json
//! {
//!   "changes":  [{ "op": "fixed", "tick": 0, "value": 80 },
//!                { "op": "ramp", "tick": 480, "end": 960, "delta": 20 }],
//!   "tempo":    [{ "op": "tempo", "tick": 0, "tempo": 2.0 },
//!                { "op": "pause", "tick": 1920, "seconds": 0.5 }],
//!   "velocity": [{ "op": "dynamic", "tick": 0, "velocity": 80 },
//!                { "op": "hairpin", "tick": 480, "duration": 480, "end": 112 }]
//! }
//! ```

use std::fs;
use std::path::Path;

use ag_core::{ChangeDirection, ChangeMethod, Tick};
use ag_timeline::{
    ChangeMap, TempoMap, TimelineConfig, TimelineEvent, VeloList, VeloOutcome, VeloRejection,
};
use anyhow::{Context, Result};
use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════════════════
// OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum ChangeOp {
    Fixed {
        tick: i64,
        value: i32,
    },
    Ramp {
        tick: i64,
        end: i64,
        delta: i32,
        #[serde(default)]
        method: ChangeMethod,
        #[serde(default)]
        direction: ChangeDirection,
    },
    Remove {
        tick: i64,
    },
    Clear,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum TempoOp {
    /// Fixed tempo, or a ramp by `tempo` when `from` is given
    Tempo {
        tick: i64,
        tempo: f64,
        #[serde(default)]
        from: Option<i64>,
    },
    /// Ramp from `from` up or down to the `to` tempo at `tick`
    RampTo {
        tick: i64,
        to: f64,
        from: i64,
    },
    Pause {
        tick: i64,
        seconds: f64,
    },
    Remove {
        tick: i64,
    },
    Relative {
        tempo: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum VelocityOp {
    Dynamic {
        tick: i64,
        velocity: i32,
    },
    DynamicChange {
        tick: i64,
        duration: i64,
        start: i32,
        end: i32,
    },
    Hairpin {
        tick: i64,
        duration: i64,
        #[serde(default)]
        method: ChangeMethod,
        #[serde(default)]
        start: Option<i32>,
        #[serde(default)]
        end: Option<i32>,
    },
    Remove {
        tick: i64,
    },
}

/// A parsed edit script
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Script {
    pub changes: Vec<ChangeOp>,
    pub tempo: Vec<TempoOp>,
    pub velocity: Vec<VelocityOp>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse edit script")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("In script {}", path.display()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// APPLYING
// ═══════════════════════════════════════════════════════════════════════════

/// A velocity edit the list refused
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// Position of the operation in the velocity list of the script
    pub index: usize,
    pub op: VelocityOp,
    pub reason: VeloRejection,
}

/// The three timelines after a script has run
#[derive(Debug)]
pub struct Timelines {
    pub changes: ChangeMap,
    pub tempo: TempoMap,
    pub velocity: VeloList,
    pub outcomes: Vec<(usize, VeloOutcome)>,
    pub rejected: Vec<Rejected>,
}

impl Timelines {
    /// Run every operation of `script` against fresh timelines
    pub fn apply(script: &Script, config: &TimelineConfig) -> Self {
        let mut timelines = Self {
            changes: ChangeMap::with_config(config),
            tempo: TempoMap::with_config(config),
            velocity: VeloList::with_config(config),
            outcomes: Vec::new(),
            rejected: Vec::new(),
        };

        for op in &script.changes {
            timelines.apply_change(op);
        }
        for op in &script.tempo {
            timelines.apply_tempo(op);
        }
        for (index, op) in script.velocity.iter().enumerate() {
            match timelines.apply_velocity(op) {
                Ok(Some(outcome)) => timelines.outcomes.push((index, outcome)),
                Ok(None) => {}
                Err(reason) => timelines.rejected.push(Rejected {
                    index,
                    op: op.clone(),
                    reason,
                }),
            }
        }

        log::debug!(
            "applied script: {} changes, {} tempo, {} velocity ({} rejected)",
            script.changes.len(),
            script.tempo.len(),
            script.velocity.len(),
            timelines.rejected.len()
        );
        timelines
    }

    fn apply_change(&mut self, op: &ChangeOp) {
        match *op {
            ChangeOp::Fixed { tick, value } => self.changes.add_fixed(Tick(tick), value),
            ChangeOp::Ramp {
                tick,
                end,
                delta,
                method,
                direction,
            } => self
                .changes
                .add_ramp(Tick(tick), Tick(end), delta, method, direction),
            ChangeOp::Remove { tick } => {
                self.changes.remove_at(Tick(tick));
            }
            ChangeOp::Clear => self.changes.clear(),
        }
    }

    fn apply_tempo(&mut self, op: &TempoOp) {
        match *op {
            TempoOp::Tempo { tick, tempo, from } => {
                self.tempo.set_tempo(Tick(tick), tempo, from.map(Tick))
            }
            TempoOp::RampTo { tick, to, from } => {
                self.tempo.set_tempo_ramp_to(Tick(tick), to, Tick(from))
            }
            TempoOp::Pause { tick, seconds } => self.tempo.set_pause(Tick(tick), seconds),
            TempoOp::Remove { tick } => {
                self.tempo.del(Tick(tick));
            }
            TempoOp::Relative { tempo } => self.tempo.set_rel_tempo(tempo),
        }
    }

    fn apply_velocity(&mut self, op: &VelocityOp) -> Result<Option<VeloOutcome>, VeloRejection> {
        let outcome = match *op {
            VelocityOp::Dynamic { tick, velocity } => {
                self.velocity.set_dynamic(Tick(tick), velocity)
            }
            VelocityOp::DynamicChange {
                tick,
                duration,
                start,
                end,
            } => self
                .velocity
                .set_dynamic_change(Tick(tick), duration, start, end),
            VelocityOp::Hairpin {
                tick,
                duration,
                method,
                start,
                end,
            } => self
                .velocity
                .set_hairpin(Tick(tick), duration, method, start, end),
            VelocityOp::Remove { tick } => {
                if self.velocity.remove(Tick(tick)).is_none() {
                    log::warn!("no velocity event at {tick} to remove");
                }
                return Ok(None);
            }
        };
        outcome.map(Some)
    }

    /// Last tick touched by any event, used as the default end of a table
    pub fn extent(&mut self) -> Tick {
        let changes = self
            .changes
            .normalize()
            .events()
            .iter()
            .map(|e| e.end_tick())
            .max();
        let tempo = self.tempo.events().iter().map(|e| e.tick()).max();
        let velocity = self
            .velocity
            .events()
            .iter()
            .map(|e| e.tick() + e.duration())
            .max();
        [changes, tempo, velocity]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(Tick::ZERO)
    }

    /// Log all three timelines at debug level
    pub fn dump(&mut self) {
        self.changes.dump();
        self.tempo.dump();
        self.velocity.dump();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TABLE
// ═══════════════════════════════════════════════════════════════════════════

/// One line of the inspection table
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub tick: Tick,
    pub value: i32,
    pub bpm: f64,
    pub seconds: f64,
    pub velocity: i32,
}

/// Sample the timelines every `step` ticks over `[from, to]`
pub fn sample(timelines: &mut Timelines, from: Tick, to: Tick, step: i64) -> Vec<Row> {
    let step = step.max(1);
    let mut rows = Vec::new();
    let mut tick = from;
    while tick <= to {
        rows.push(Row {
            tick,
            value: timelines.changes.value_at(tick),
            bpm: timelines.tempo.tempo_at(tick) * 60.0,
            seconds: timelines.tempo.tick_to_time(tick).value,
            velocity: timelines.velocity.velocity_at(tick),
        });
        tick = tick + step;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "changes": [
            { "op": "fixed", "tick": 0, "value": 80 },
            { "op": "ramp", "tick": 480, "end": 960, "delta": 40, "method": "ease-in" },
            { "op": "fixed", "tick": 1920, "value": 60 }
        ],
        "tempo": [
            { "op": "tempo", "tick": 0, "tempo": 2.0 },
            { "op": "tempo", "tick": 960, "tempo": 1.0 }
        ],
        "velocity": [
            { "op": "dynamic", "tick": 0, "velocity": 64 },
            { "op": "hairpin", "tick": 480, "duration": 480, "end": 96 },
            { "op": "dynamic", "tick": 600, "velocity": 100 }
        ]
    }"#;

    #[test]
    fn test_parse_script() {
        let script = Script::from_json(SCRIPT).unwrap();
        assert_eq!(script.changes.len(), 3);
        assert_eq!(
            script.changes[1],
            ChangeOp::Ramp {
                tick: 480,
                end: 960,
                delta: 40,
                method: ChangeMethod::EaseIn,
                direction: ChangeDirection::Increasing,
            }
        );
        assert_eq!(
            script.velocity[1],
            VelocityOp::Hairpin {
                tick: 480,
                duration: 480,
                method: ChangeMethod::Normal,
                start: None,
                end: Some(96),
            }
        );
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let script = Script::from_json(r#"{ "tempo": [] }"#).unwrap();
        assert_eq!(script, Script::default());
    }

    #[test]
    fn test_unknown_op_is_an_error() {
        let err = Script::from_json(r#"{ "changes": [{ "op": "wobble", "tick": 0 }] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_apply_reports_rejections() {
        let script = Script::from_json(SCRIPT).unwrap();
        let timelines = Timelines::apply(&script, &TimelineConfig::default());

        assert_eq!(timelines.outcomes.len(), 2);
        assert_eq!(timelines.rejected.len(), 1);
        assert_eq!(timelines.rejected[0].index, 2);
        assert_eq!(
            timelines.rejected[0].reason,
            VeloRejection::InsideHairpin {
                tick: Tick(600),
                hairpin: Tick(480)
            }
        );
    }

    #[test]
    fn test_sample_table() {
        let script = Script::from_json(SCRIPT).unwrap();
        let mut timelines = Timelines::apply(&script, &TimelineConfig::default());
        let rows = sample(&mut timelines, Tick(0), Tick(1920), 480);

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].value, 80);
        assert_eq!(rows[2].value, 120);
        assert_eq!(rows[4].value, 60);
        assert_eq!(rows[0].velocity, 64);
        assert_eq!(rows[2].velocity, 96);
        assert!((rows[0].bpm - 120.0).abs() < 1e-9);
        assert!((rows[3].bpm - 60.0).abs() < 1e-9);
        // 960 ticks at 2 beats/s, then 480 at 1 beat/s
        assert!((rows[3].seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_extent_covers_every_timeline() {
        let script = Script::from_json(
            r#"{ "velocity": [{ "op": "dynamic_change", "tick": 960, "duration": 480,
                                "start": 40, "end": 90 }] }"#,
        )
        .unwrap();
        let mut timelines = Timelines::apply(&script, &TimelineConfig::default());
        assert_eq!(timelines.extent(), Tick(1440));

        let mut empty = Timelines::apply(&Script::default(), &TimelineConfig::default());
        assert_eq!(empty.extent(), Tick::ZERO);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.json");
        fs::write(&path, SCRIPT).unwrap();
        assert_eq!(Script::load(&path).unwrap(), Script::from_json(SCRIPT).unwrap());

        let err = Script::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
