//! # ag-bench
//!
//! Performance benchmarks for the Agogic timelines.
//!
//! ## Benchmark Categories
//!
//! - **Change map**: normalisation, point queries, range queries
//! - **Tempo map**: tick to time and time to tick
//! - **Velocity list**: edits and velocity queries
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p ag-bench
//!
//! # Run specific benchmark
//! cargo bench -p ag-bench -- tempo
//!
//! # With baseline comparison
//! cargo bench -p ag-bench -- --save-baseline main
//! cargo bench -p ag-bench -- --baseline main
//! ```

pub mod generators;

pub use generators::*;
