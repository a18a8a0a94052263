//! # EEX Core Library
//!
//! An energy-expression data layer for molecular simulation inputs. It stores atom
//! properties, bonded-term parameters and their functional forms, deduplicates
//! repeated parameter sets into stable integer identifiers, and translates the
//! canonical representation to and from simulation-package file formats.
//!
//! ## Architectural Philosophy
//!
//! The library follows a layered design so that every collaborator can be swapped
//! or tested in isolation.
//!
//! - **[`core`]: The Foundation.** Stateless building blocks: the column [`core::table::Table`],
//!   the immutable metadata [`core::metadata::Catalog`], unit conversion, and the
//!   table-store backends (in-memory and on-disk).
//!
//! - **[`engine`]: The Data Layer.** The stateful coordinator [`engine::datalayer::DataLayer`]
//!   and the stores it owns: the unique value indexer, the atom property store, the
//!   functional form registry, the term parameter store and the term connectivity store.
//!
//! - **[`io`]: File Formats.** Readers and writers that move a data layer to and from
//!   external formats, currently the LAMMPS data file.
//!
//! - **[`workflows`]: The Public API.** End-to-end translation entry points that tie
//!   configuration, the data layer and file formats together.

pub mod core;
pub mod engine;
pub mod io;
pub mod workflows;
