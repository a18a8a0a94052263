use super::{LammpsError, WRITTEN_ORDERS, section_names, supported_styles};
use crate::core::geometry::BoxBounds;
use crate::core::metadata::TermOrder;
use crate::core::table::{Column, Table};
use crate::engine::config::UnitMap;
use crate::engine::datalayer::DataLayer;
use crate::engine::terms::TERM_INDEX;
use nalgebra::Point3;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use tracing::{debug, info, instrument, warn};

const TITLE: &str = "LAMMPS data file generated by eex";

struct AtomRow {
    id: usize,
    molecule: i64,
    atom_type: usize,
    charge: f64,
    position: Point3<f64>,
}

struct AtomData {
    rows: Vec<AtomRow>,
    /// Stored atom index to written atom id.
    ids: HashMap<i64, usize>,
    type_count: usize,
    /// Written atom type to mass.
    masses: BTreeMap<usize, f64>,
}

struct Coefficients {
    style: String,
    /// Stored uid to written type id.
    type_ids: BTreeMap<i64, usize>,
    rows: Vec<Vec<f64>>,
}

struct TermBlock {
    order: TermOrder,
    coefficients: Option<Coefficients>,
    rows: Vec<Vec<usize>>,
}

fn int_column<'a>(table: &'a Table, name: &str) -> Result<&'a [i64], LammpsError> {
    table
        .column(name)
        .and_then(Column::as_ints)
        .ok_or_else(|| LammpsError::MissingData(format!("integer column '{}'", name)))
}

fn float_column<'a>(table: &'a Table, name: &str) -> Result<&'a [f64], LammpsError> {
    table
        .column(name)
        .and_then(Column::as_floats)
        .ok_or_else(|| LammpsError::MissingData(format!("float column '{}'", name)))
}

/// Maps each stored index of a single-column property table to its value.
fn by_index<T: Copy>(table: &Table, values: &[T]) -> HashMap<i64, T> {
    table.index().iter().copied().zip(values.iter().copied()).collect()
}

fn collect_atoms(dl: &DataLayer) -> Result<AtomData, LammpsError> {
    let tables = dl.list_tables();
    let has = |name: &str| tables.iter().any(|t| t == name);
    for required in ["atom_type", "charge", "xyz"] {
        if !has(required) {
            return Err(LammpsError::MissingData(format!("atom property '{}'", required)));
        }
    }

    let none = UnitMap::new();
    let atoms = dl.get_atoms(&["atom_type", "charge", "xyz"], true, &none)?;
    let types = int_column(&atoms, "atom_type")?;
    let charges = float_column(&atoms, "charge")?;
    let (x, y, z) = (
        float_column(&atoms, "X")?,
        float_column(&atoms, "Y")?,
        float_column(&atoms, "Z")?,
    );

    let molecules = if has("molecule_index") {
        let table = dl.get_atoms(&["molecule_index"], true, &none)?;
        by_index(&table, int_column(&table, "molecule_index")?)
    } else {
        HashMap::new()
    };
    let atom_masses = if has("mass") {
        let table = dl.get_atoms(&["mass"], true, &none)?;
        by_index(&table, float_column(&table, "mass")?)
    } else {
        HashMap::new()
    };

    let type_ids: BTreeMap<i64, usize> = types
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, t)| (t, i + 1))
        .collect();

    let mut order: Vec<usize> = (0..atoms.len()).collect();
    order.sort_by_key(|&row| atoms.index()[row]);

    let tolerance = dl.config().tolerance;
    let mut rows = Vec::with_capacity(order.len());
    let mut ids = HashMap::with_capacity(order.len());
    let mut masses = BTreeMap::new();
    for (position, &row) in order.iter().enumerate() {
        let index = atoms.index()[row];
        let id = position + 1;
        let atom_type = type_ids.get(&types[row]).copied().unwrap_or_default();
        if let Some(&mass) = atom_masses.get(&index) {
            match masses.get(&atom_type) {
                Some(&known) if !tolerance.is_close(known, mass) => {
                    return Err(LammpsError::Inconsistent(format!(
                        "atom type {} has masses {} and {}",
                        types[row], known, mass
                    )));
                }
                Some(_) => {}
                None => {
                    masses.insert(atom_type, mass);
                }
            }
        }
        ids.insert(index, id);
        rows.push(AtomRow {
            id,
            molecule: molecules.get(&index).copied().unwrap_or(1),
            atom_type,
            charge: charges[row],
            position: Point3::new(x[row], y[row], z[row]),
        });
    }

    if !masses.is_empty() && masses.len() != type_ids.len() {
        return Err(LammpsError::MissingData(
            "masses for every atom type".to_string(),
        ));
    }
    Ok(AtomData {
        rows,
        ids,
        type_count: type_ids.len(),
        masses,
    })
}

fn collect_coefficients(
    dl: &DataLayer,
    order: TermOrder,
) -> Result<Option<Coefficients>, LammpsError> {
    let uids = dl.parameter_uids(order)?;
    if uids.is_empty() {
        return Ok(None);
    }

    let mut forms = BTreeSet::new();
    for &uid in &uids {
        forms.insert(dl.parameter(order, uid)?.form.clone());
    }
    if forms.len() > 1 {
        return Err(LammpsError::MixedStyles {
            order: order.value(),
            forms: forms.into_iter().collect(),
        });
    }
    let style = forms.into_iter().next().unwrap_or_default();

    let (_, section) = section_names(order);
    let builtin = supported_styles(order)
        .contains(&style.as_str())
        .then(|| dl.catalog().builtin_form(order, &style))
        .flatten()
        .ok_or_else(|| LammpsError::UnsupportedStyle {
            section: section.to_string(),
            style: style.clone(),
        })?;
    let units: UnitMap = builtin.units.clone().into_iter().collect();

    let mut type_ids = BTreeMap::new();
    let mut rows = Vec::with_capacity(uids.len());
    for (position, &uid) in uids.iter().enumerate() {
        let named = dl.get_parameter(order, uid, &units)?;
        let values = builtin
            .parameters
            .iter()
            .map(|p| {
                named.get(p).copied().ok_or_else(|| {
                    LammpsError::Inconsistent(format!(
                        "'{}' parameters of order {} lack '{}'",
                        style, order, p
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        type_ids.insert(uid, position + 1);
        rows.push(values);
    }
    Ok(Some(Coefficients {
        style,
        type_ids,
        rows,
    }))
}

fn collect_terms(
    dl: &DataLayer,
    order: TermOrder,
    atom_ids: &HashMap<i64, usize>,
) -> Result<TermBlock, LammpsError> {
    let dangling = dl.dangling_term_indices(order)?;
    if !dangling.is_empty() {
        return Err(LammpsError::DanglingTerms {
            order: order.value(),
            uids: dangling,
        });
    }

    let coefficients = collect_coefficients(dl, order)?;
    let mut block = TermBlock {
        order,
        coefficients,
        rows: Vec::new(),
    };
    if dl.term_count(order)?.total == 0 {
        return Ok(block);
    }

    let table = dl.read_terms(order)?;
    let uids = int_column(&table, TERM_INDEX)?;
    let names = order.index_columns();
    let members = names
        .iter()
        .map(|c| int_column(&table, c))
        .collect::<Result<Vec<_>, _>>()?;

    let mut positions: Vec<usize> = (0..table.len()).collect();
    positions.sort_by_key(|&row| table.index()[row]);
    for row in positions {
        let type_id = block
            .coefficients
            .as_ref()
            .and_then(|c| c.type_ids.get(&uids[row]))
            .copied()
            .ok_or_else(|| LammpsError::DanglingTerms {
                order: order.value(),
                uids: vec![uids[row]],
            })?;
        let mut fields = Vec::with_capacity(members.len() + 1);
        fields.push(type_id);
        for column in &members {
            let atom = column[row];
            let id = atom_ids.get(&atom).copied().ok_or_else(|| {
                LammpsError::MissingData(format!("atom {} referenced by order {} terms", atom, order))
            })?;
            fields.push(id);
        }
        block.rows.push(fields);
    }
    Ok(block)
}

fn join_fixed(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| format!("{:.8}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_ids(values: &[usize]) -> String {
    values
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[instrument(skip_all, name = "lammps_write")]
pub(super) fn write(dl: &DataLayer, writer: &mut impl Write) -> Result<(), LammpsError> {
    let atoms = collect_atoms(dl)?;
    let blocks = WRITTEN_ORDERS
        .iter()
        .map(|&order| collect_terms(dl, order, &atoms.ids))
        .collect::<Result<Vec<_>, _>>()?;

    let bounds = match dl.box_size() {
        Some(bounds) => bounds,
        None => {
            debug!("No box set; using the bounds of the atom positions.");
            BoxBounds::enclosing(atoms.rows.iter().map(|r| r.position))
                .ok_or_else(|| LammpsError::MissingData("box bounds".to_string()))?
        }
    };

    writeln!(writer, "{}", TITLE)?;
    writeln!(writer)?;
    writeln!(writer, " {} atoms", atoms.rows.len())?;
    for block in &blocks {
        let (terms, _) = section_names(block.order);
        writeln!(writer, " {} {}", block.rows.len(), terms.to_lowercase())?;
    }
    writeln!(writer, " 0 impropers")?;
    writeln!(writer)?;
    writeln!(writer, " {} atom types", atoms.type_count)?;
    for block in &blocks {
        let (terms, _) = section_names(block.order);
        let count = block.coefficients.as_ref().map_or(0, |c| c.rows.len());
        writeln!(
            writer,
            " {} {} types",
            count,
            terms.trim_end_matches('s').to_lowercase()
        )?;
    }
    writeln!(writer, " 0 improper types")?;
    writeln!(writer)?;
    for (axis, label) in ["x", "y", "z"].into_iter().enumerate() {
        let (lo, hi) = bounds.axis(axis);
        writeln!(writer, " {:.6} {:.6} {}lo {}hi", lo, hi, label, label)?;
    }

    for block in &blocks {
        if let Some(coefficients) = &block.coefficients {
            let (_, section) = section_names(block.order);
            writeln!(writer, "\n{} # {}\n", section, coefficients.style)?;
            for (i, values) in coefficients.rows.iter().enumerate() {
                writeln!(writer, " {} {}", i + 1, join_fixed(values))?;
            }
        }
    }

    if atoms.masses.is_empty() {
        warn!("No masses stored; the Masses section is omitted.");
    } else {
        writeln!(writer, "\nMasses\n")?;
        for (atom_type, mass) in &atoms.masses {
            writeln!(writer, " {} {:.8}", atom_type, mass)?;
        }
    }

    writeln!(writer, "\nAtoms # full\n")?;
    for atom in &atoms.rows {
        writeln!(
            writer,
            " {} {} {} {:.8} {:.8} {:.8} {:.8}",
            atom.id,
            atom.molecule,
            atom.atom_type,
            atom.charge,
            atom.position.x,
            atom.position.y,
            atom.position.z
        )?;
    }

    for block in blocks.iter().filter(|b| !b.rows.is_empty()) {
        let (section, _) = section_names(block.order);
        writeln!(writer, "\n{}\n", section)?;
        for (i, fields) in block.rows.iter().enumerate() {
            writeln!(writer, " {} {}", i + 1, join_ids(fields))?;
        }
    }

    info!(
        atoms = atoms.rows.len(),
        bonds = blocks[0].rows.len(),
        angles = blocks[1].rows.len(),
        dihedrals = blocks[2].rows.len(),
        "Wrote LAMMPS data file."
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::atoms::ATOM_INDEX;
    use crate::engine::config::DataLayerConfig;
    use crate::engine::forms::FormDefinition;
    use crate::io::lammps::reader::read;
    use crate::io::lammps::{LammpsFile, LammpsOptions, TWO_WATERS};
    use crate::io::traits::EnergyExpressionFile;
    use std::io::Cursor;

    fn from_text(text: &str) -> DataLayer {
        let mut dl = DataLayer::new(DataLayerConfig::in_memory("write")).unwrap();
        read(&mut dl, &mut Cursor::new(text), &LammpsOptions::default()).unwrap();
        dl
    }

    fn to_text(dl: &DataLayer) -> Result<String, LammpsError> {
        let mut buffer = Vec::new();
        write(dl, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap())
    }

    fn one_water() -> DataLayer {
        let mut dl = DataLayer::new(DataLayerConfig::in_memory("water")).unwrap();
        let atoms = Table::new(vec![10, 11, 12])
            .named_index(ATOM_INDEX)
            .with_column("atom_type", vec![1i64, 2, 2])
            .unwrap()
            .with_column("charge", vec![-0.8476, 0.4238, 0.4238])
            .unwrap()
            .with_column("X", vec![0.0, 1.0, -0.33])
            .unwrap()
            .with_column("Y", vec![0.0, 0.0, 0.94])
            .unwrap()
            .with_column("Z", vec![0.0, 0.0, 0.0])
            .unwrap();
        dl.add_atoms(&atoms, true, &UnitMap::new()).unwrap();
        dl
    }

    fn builtin(dl: &mut DataLayer, order: TermOrder, name: &str) {
        let units: UnitMap = dl
            .catalog()
            .builtin_form(order, name)
            .unwrap()
            .units
            .clone()
            .into_iter()
            .collect();
        dl.register_functional_form(order, name, FormDefinition::Builtin(units))
            .unwrap();
    }

    fn bonds(term_index: i64) -> Table {
        Table::with_range_index(2)
            .with_column(TERM_INDEX, vec![term_index, term_index])
            .unwrap()
            .with_column("atom1", vec![10i64, 10])
            .unwrap()
            .with_column("atom2", vec![11i64, 12])
            .unwrap()
    }

    #[test]
    fn written_file_reads_back_the_same_system() {
        let original = from_text(TWO_WATERS);
        let text = to_text(&original).unwrap();
        let copy = from_text(&text);

        assert_eq!(copy.atom_count().unwrap(), 6);
        assert_eq!(copy.term_count(2).unwrap().total, 4);
        assert_eq!(copy.term_count(3).unwrap().total, 2);
        assert_eq!(copy.box_size(), original.box_size());
        assert_eq!(copy.parameter(2, 1).unwrap().values, vec![1000.0, 1.0]);
        assert_eq!(copy.parameter(3, 1).unwrap().values, vec![100.0, 109.47]);

        let props = ["atom_type", "charge", "mass"];
        let before = original.get_atoms(&props, true, &UnitMap::new()).unwrap();
        let after = copy.get_atoms(&props, true, &UnitMap::new()).unwrap();
        for row in 0..6 {
            assert_eq!(before.row(row), after.row(row));
        }
    }

    #[test]
    fn output_has_header_and_styled_sections() {
        let text = to_text(&from_text(TWO_WATERS)).unwrap();
        assert!(text.starts_with(TITLE));
        for line in [
            " 6 atoms",
            " 0 dihedrals",
            " 2 atom types",
            " 1 bond types",
            " -5.000000 5.000000 xlo xhi",
            "Bond Coeffs # harmonic",
            "Angle Coeffs # harmonic",
            "Atoms # full",
            " 1 15.99940000",
        ] {
            assert!(text.contains(line), "missing '{}' in\n{}", line, text);
        }
        assert!(!text.contains("Dihedrals"));
        assert!(!text.contains("Velocities"));
    }

    #[test]
    fn section_styles_follow_the_stored_forms() {
        let dl = from_text(TWO_WATERS);
        let options = LammpsOptions {
            bond_style: "morse".to_string(),
            ..LammpsOptions::default()
        };
        let mut buffer = Vec::new();
        LammpsFile::write_to(&dl, &mut buffer, &options).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("Bond Coeffs # harmonic"));
        assert!(!text.contains("morse"));
    }

    #[test]
    fn atoms_and_types_are_renumbered_from_one() {
        let mut dl = one_water();
        builtin(&mut dl, TermOrder::BOND, "harmonic");
        dl.add_parameters(2, "harmonic", vec![450.0, 1.0], Some(7), &UnitMap::new())
            .unwrap();
        dl.add_bonds(&bonds(7)).unwrap();

        let text = to_text(&dl).unwrap();
        assert!(text.contains("\nBonds\n\n 1 1 1 2\n 2 1 1 3\n"), "{}", text);
        assert!(text.contains(" 1 1 1 -0.84760000"));
        assert!(!text.contains("Masses"));
    }

    #[test]
    fn box_defaults_to_atom_extent() {
        let text = to_text(&one_water()).unwrap();
        assert!(text.contains(" -0.330000 1.000000 xlo xhi"));
        assert!(text.contains(" 0.000000 0.940000 ylo yhi"));
    }

    #[test]
    fn dangling_terms_are_refused() {
        let mut dl = one_water();
        dl.add_bonds(&bonds(5)).unwrap();
        assert!(matches!(
            to_text(&dl),
            Err(LammpsError::DanglingTerms { order: 2, uids }) if uids == vec![5]
        ));
    }

    #[test]
    fn mixed_bond_styles_are_refused() {
        let mut dl = one_water();
        builtin(&mut dl, TermOrder::BOND, "harmonic");
        builtin(&mut dl, TermOrder::BOND, "morse");
        dl.add_parameters(2, "harmonic", vec![450.0, 1.0], None, &UnitMap::new())
            .unwrap();
        dl.add_parameters(2, "morse", vec![100.0, 2.0, 1.0], None, &UnitMap::new())
            .unwrap();
        assert!(matches!(
            to_text(&dl),
            Err(LammpsError::MixedStyles { order: 2, forms }) if forms == vec!["harmonic", "morse"]
        ));
    }

    #[test]
    fn conflicting_masses_per_type_are_refused() {
        let mut dl = one_water();
        let masses = Table::new(vec![10, 11, 12])
            .with_column("mass", vec![15.9994, 1.008, 2.014])
            .unwrap();
        dl.add_atoms(&masses, true, &UnitMap::new()).unwrap();
        assert!(matches!(to_text(&dl), Err(LammpsError::Inconsistent(_))));
    }

    #[test]
    fn missing_atoms_are_reported() {
        let dl = DataLayer::new(DataLayerConfig::in_memory("empty")).unwrap();
        assert!(matches!(to_text(&dl), Err(LammpsError::MissingData(_))));
    }
}
