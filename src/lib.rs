//! DevTeam: dependency-aware task scheduling for a team of named agents.

pub mod agents;
pub mod config;
pub mod error;
pub mod memory;
pub mod recovery;
pub mod scheduler;
pub mod tasks;
