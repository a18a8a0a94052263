//! # Core Module
//!
//! Stateless building blocks shared by the data layer and the file formats.
//!
//! - **Tabular data** ([`table`]) - Indexed, typed column tables used as the exchange currency
//! - **Metadata catalogs** ([`metadata`]) - Atom property and bonded-term descriptions
//! - **Units** ([`units`]) - Unit expression parsing and conversion factors
//! - **Storage** ([`store`]) - Table-store backends (in-memory and on-disk)
//! - **Geometry** ([`geometry`]) - Simulation box bounds

pub mod geometry;
pub mod metadata;
pub mod store;
pub mod table;
pub mod units;
