//! ag-timeline: Tick-indexed timelines
//!
//! One ordered event container and three timelines built on it:
//! - `ChangeMap`: fixed values and ramps, normalised lazily before reads
//! - `TempoMap`: tick to seconds projection with ramps and pauses
//! - `VeloList`: note velocities from dynamics and hairpins, overlaps
//!   settled when an edit is made

mod change_map;
mod config;
mod tempo;
mod timeline;
mod velo;

pub use change_map::*;
pub use config::*;
pub use tempo::*;
pub use timeline::*;
pub use velo::*;
