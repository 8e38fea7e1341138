//! Task, decision and feedback message types
//!
//! These are the shapes written to the decision log and feedback log and
//! printed by the CLI.

pub mod messages;

pub use messages::*;
