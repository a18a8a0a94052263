//! LAMMPS data files.
//!
//! Atoms are read and written in the `full` atom style (`id mol type q x y z`)
//! in LAMMPS `real` units. Coefficient sections map onto the built-in
//! functional form with the same name as the LAMMPS style; the style is taken
//! from the `# style` comment of a section header when present and from
//! [`LammpsOptions`] otherwise. Coefficients are stored under uids equal to
//! their LAMMPS type ids, which the connectivity sections reference.

mod reader;
mod writer;

use super::traits::EnergyExpressionFile;
use crate::core::metadata::TermOrder;
use crate::core::table::TableError;
use crate::engine::datalayer::DataLayer;
use crate::engine::error::DataLayerError;
use phf::{Map, phf_map};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LammpsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Section '{section}' has {found} entries but the header declares {expected}")]
    CountMismatch {
        section: String,
        expected: usize,
        found: usize,
    },
    #[error("Unsupported style '{style}' for section '{section}'")]
    UnsupportedStyle { section: String, style: String },
    #[error("Order {order} parameters use several functional forms [{}]", .forms.join(", "))]
    MixedStyles { order: u8, forms: Vec<String> },
    #[error("Order {order} terms reference uids without parameters: {uids:?}")]
    DanglingTerms { order: u8, uids: Vec<i64> },
    #[error("Missing required data: {0}")]
    MissingData(String),
    #[error("Inconsistent data: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    DataLayer(#[from] DataLayerError),
}

/// Bonded styles used when a coefficient section names none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LammpsOptions {
    pub bond_style: String,
    pub angle_style: String,
    pub dihedral_style: String,
}

impl Default for LammpsOptions {
    fn default() -> Self {
        Self {
            bond_style: "harmonic".to_string(),
            angle_style: "harmonic".to_string(),
            dihedral_style: "charmm".to_string(),
        }
    }
}

impl LammpsOptions {
    pub fn style(&self, order: TermOrder) -> Option<&str> {
        match order {
            TermOrder::BOND => Some(&self.bond_style),
            TermOrder::ANGLE => Some(&self.angle_style),
            TermOrder::DIHEDRAL => Some(&self.dihedral_style),
            _ => None,
        }
    }
}

/// What the reader found in a data file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LammpsSummary {
    pub title: String,
    /// Header counts keyed as written, e.g. `atoms` or `bond types`.
    pub sizes: BTreeMap<String, usize>,
    /// Section names in file order.
    pub sections: Vec<String>,
    /// Sections that were recognized but not stored.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Masses,
    Atoms,
    Terms(TermOrder),
    Coeffs(TermOrder),
    Unsupported,
}

static SECTIONS: Map<&'static str, SectionKind> = phf_map! {
    "Masses" => SectionKind::Masses,
    "Atoms" => SectionKind::Atoms,
    "Bonds" => SectionKind::Terms(TermOrder::BOND),
    "Angles" => SectionKind::Terms(TermOrder::ANGLE),
    "Dihedrals" => SectionKind::Terms(TermOrder::DIHEDRAL),
    "Bond Coeffs" => SectionKind::Coeffs(TermOrder::BOND),
    "Angle Coeffs" => SectionKind::Coeffs(TermOrder::ANGLE),
    "Dihedral Coeffs" => SectionKind::Coeffs(TermOrder::DIHEDRAL),
    "Velocities" => SectionKind::Unsupported,
    "Impropers" => SectionKind::Unsupported,
    "Pair Coeffs" => SectionKind::Unsupported,
    "PairIJ Coeffs" => SectionKind::Unsupported,
    "Improper Coeffs" => SectionKind::Unsupported,
    "BondBond Coeffs" => SectionKind::Unsupported,
    "BondAngle Coeffs" => SectionKind::Unsupported,
    "MiddleBondTorsion Coeffs" => SectionKind::Unsupported,
    "EndBondTorsion Coeffs" => SectionKind::Unsupported,
    "AngleTorsion Coeffs" => SectionKind::Unsupported,
    "AngleAngleTorsion Coeffs" => SectionKind::Unsupported,
    "BondBond13 Coeffs" => SectionKind::Unsupported,
    "AngleAngle Coeffs" => SectionKind::Unsupported,
};

/// Header count that sizes each section.
fn count_key(section: &str) -> Option<&'static str> {
    match section {
        "Masses" | "Pair Coeffs" => Some("atom types"),
        "Atoms" | "Velocities" => Some("atoms"),
        "Bonds" => Some("bonds"),
        "Angles" => Some("angles"),
        "Dihedrals" => Some("dihedrals"),
        "Impropers" => Some("impropers"),
        "Bond Coeffs" => Some("bond types"),
        "Angle Coeffs" => Some("angle types"),
        "Dihedral Coeffs" => Some("dihedral types"),
        "Improper Coeffs" => Some("improper types"),
        _ => None,
    }
}

/// LAMMPS styles whose coefficient order matches the built-in form of the same name.
fn supported_styles(order: TermOrder) -> &'static [&'static str] {
    match order {
        TermOrder::BOND => &["harmonic", "morse", "fene"],
        TermOrder::ANGLE => &["harmonic", "cosine"],
        TermOrder::DIHEDRAL => &["charmm", "opls"],
        _ => &[],
    }
}

fn section_names(order: TermOrder) -> (&'static str, &'static str) {
    match order {
        TermOrder::BOND => ("Bonds", "Bond Coeffs"),
        TermOrder::ANGLE => ("Angles", "Angle Coeffs"),
        _ => ("Dihedrals", "Dihedral Coeffs"),
    }
}

const WRITTEN_ORDERS: [TermOrder; 3] = [TermOrder::BOND, TermOrder::ANGLE, TermOrder::DIHEDRAL];

pub struct LammpsFile;

impl EnergyExpressionFile for LammpsFile {
    type Options = LammpsOptions;
    type Summary = LammpsSummary;
    type Error = LammpsError;

    fn read_from(
        datalayer: &mut DataLayer,
        reader: &mut impl BufRead,
        options: &Self::Options,
    ) -> Result<Self::Summary, Self::Error> {
        reader::read(datalayer, reader, options)
    }

    /// Section styles come from the stored functional forms, so `options`
    /// only matter when reading.
    fn write_to(
        datalayer: &DataLayer,
        writer: &mut impl Write,
        _options: &Self::Options,
    ) -> Result<(), Self::Error> {
        writer::write(datalayer, writer)
    }
}

/// Two SPC/E-like waters with a section the reader skips.
#[cfg(test)]
const TWO_WATERS: &str = "\
Two waters

 6 atoms
 4 bonds
 2 angles
 2 atom types
 1 bond types
 1 angle types

 -5.0 5.0 xlo xhi
 -5.0 5.0 ylo yhi
 -5.0 5.0 zlo zhi

Masses

 1 15.9994
 2 1.008

Bond Coeffs # harmonic

 1 1000.0 1.0

Angle Coeffs

 1 100.0 109.47

Atoms # full

 1 1 1 -0.8476 0.0 0.0 0.0
 2 1 2 0.4238 1.0 0.0 0.0
 3 1 2 0.4238 -0.33 0.94 0.0
 4 2 1 -0.8476 3.0 0.0 0.0
 5 2 2 0.4238 4.0 0.0 0.0
 6 2 2 0.4238 2.67 0.94 0.0

Velocities

 1 0 0 0
 2 0 0 0
 3 0 0 0
 4 0 0 0
 5 0 0 0
 6 0 0 0

Bonds

 1 1 1 2
 2 1 1 3
 3 1 4 5
 4 1 4 6

Angles

 1 1 2 1 3
 2 1 5 4 6
";
