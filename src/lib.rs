//! Campaign Engine — the data and logic core of an election-scenario editor.
//!
//! Holds a scenario's entity graph in memory, imports and exports the
//! persisted scenario-code text format resiliently, and runs a seeded,
//! fully deterministic election simulation over any store snapshot. No
//! I/O and no UI; hosts feed text in and read results out.

pub mod core;
pub mod schema;
