//! ag-core: Shared types for the Agogic timeline engine
//!
//! This crate provides the leaf types used by the timelines:
//! - `Tick` positions and spans
//! - Change methods/directions and their persistence names
//! - The ramp interpolation engine
//! - The error type

mod change;
mod error;
mod interpolate;
mod tick;

pub use change::*;
pub use error::*;
pub use interpolate::*;
pub use tick::*;
