//! Record types for the scenario entity graph.

pub mod ids;
pub mod issue;
pub mod metadata;
pub mod question;
pub mod state;
