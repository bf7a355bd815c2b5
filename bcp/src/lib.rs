//! Library half of the `bcp` planner: argument validation and job output
//!
//! The binary wires these into [`common::prepare_copy_jobs`] and prints one line per job.

pub mod path;
pub mod plan;
