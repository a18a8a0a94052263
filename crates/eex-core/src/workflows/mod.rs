//! # Workflows Module
//!
//! High-level entry points that tie configuration, the data layer and file
//! formats together.
//!
//! ## Architecture
//!
//! - **Translation Workflow** ([`translate`]) - Reads a file into a fresh data layer,
//!   writes a data layer back out, or does both in one call and reports what was moved.

pub mod translate;
