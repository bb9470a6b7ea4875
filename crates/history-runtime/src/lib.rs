//! Runtime layer for FaB History.
//!
//! Owns the immutable match table once it is loaded and serves view
//! requests against it from a tokio task.

pub mod orchestrator;
pub mod views;

pub use history_core as core;
pub use history_data as data;
