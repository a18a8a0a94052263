//! Provides input/output functionality for simulation-package file formats.
//!
//! Every format implements [`traits::EnergyExpressionFile`], which moves data
//! between a file and a [`crate::engine::datalayer::DataLayer`]. Readers route
//! their sections through the data layer's command map so the same validation
//! applies to file input as to direct API calls.

pub mod lammps;
pub mod traits;
