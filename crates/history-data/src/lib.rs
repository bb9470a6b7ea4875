//! Data layer for FaB History.
//!
//! Responsible for ingesting GEM match-history exports, normalizing them
//! into canonical [`core::models::Match`] records, aggregating statistical
//! views, filtering tables with client-declared predicates, and running the
//! top-level load-and-analyse pipeline.

pub mod aggregator;
pub mod analysis;
pub mod filter;
pub mod normalizer;
pub mod reader;

pub use history_core as core;
