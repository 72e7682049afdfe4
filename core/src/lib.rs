//! taskweave-core: dependency-layered task orchestration with checkpoint and resume.

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod planner;
pub mod state;
