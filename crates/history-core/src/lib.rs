//! Core domain types for FaB History.
//!
//! Holds the canonical match model, the derived view types, the error
//! taxonomy, field parsers for the GEM export and the CLI settings.

pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
