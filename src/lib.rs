//! Admin Tools: run long-running content administration jobs and stream
//! their progress to observers.

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod tools;
