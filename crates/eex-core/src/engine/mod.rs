//! # Engine Module
//!
//! The stateful half of the library: a [`datalayer::DataLayer`] owns one
//! energy-expression dataset and the stores that keep it consistent.
//!
//! ## Architecture
//!
//! - **Unique values** ([`indexer`]) - Bidirectional value tuple to id maps per atom property
//! - **Atom properties** ([`atoms`]) - Per-property tables stored raw or as shared ids
//! - **Functional forms** ([`forms`]) - Registered bonded-term expressions per order
//! - **Term parameters** ([`parameters`]) - Deduplicated parameter sets keyed by uid
//! - **Term connectivity** ([`terms`]) - Which atoms take part in which term
//! - **Dispatch** ([`command`]) - Named commands used by file readers
//! - **Configuration** ([`config`]) - Data layer settings and tolerances
//! - **Error Handling** ([`error`]) - The data layer error taxonomy
//!
//! Ids for shared atom values start at 0 and are never reused. Parameter uids
//! are the smallest unused non-negative integer unless the caller supplies one.

pub mod atoms;
pub mod command;
pub mod config;
pub mod datalayer;
pub mod error;
pub mod forms;
pub mod indexer;
pub mod parameters;
pub mod terms;
