use super::{LammpsError, LammpsOptions, LammpsSummary, SECTIONS, SectionKind, count_key, supported_styles};
use crate::core::geometry::BoxBounds;
use crate::core::metadata::TermOrder;
use crate::core::table::{DType, Scalar, Table};
use crate::engine::atoms::ATOM_INDEX;
use crate::engine::command::Payload;
use crate::engine::config::UnitMap;
use crate::engine::datalayer::DataLayer;
use crate::engine::forms::FormDefinition;
use crate::engine::terms::TERM_INDEX;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

struct Section {
    name: String,
    kind: SectionKind,
    style: Option<String>,
    line: usize,
    rows: Vec<(usize, Vec<String>)>,
}

#[derive(Default)]
struct ParsedFile {
    title: String,
    sizes: BTreeMap<String, usize>,
    lo: [Option<f64>; 3],
    hi: [Option<f64>; 3],
    sections: Vec<Section>,
}

fn split_comment(line: &str) -> (&str, Option<&str>) {
    match line.split_once('#') {
        Some((content, comment)) => (content.trim(), Some(comment.trim())),
        None => (line.trim(), None),
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> LammpsError {
    LammpsError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_field<T: FromStr>(line: usize, field: &str, what: &str) -> Result<T, LammpsError> {
    field
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {} '{}'", what, field)))
}

fn parse_lines(reader: &mut impl BufRead) -> Result<ParsedFile, LammpsError> {
    let mut parsed = ParsedFile::default();
    let mut current: Option<Section> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let number = i + 1;
        if number == 1 {
            parsed.title = line.trim().to_string();
            continue;
        }

        let (content, comment) = split_comment(&line);
        if content.is_empty() {
            continue;
        }

        if let Some(&kind) = SECTIONS.get(content) {
            if let Some(done) = current.take() {
                parsed.sections.push(done);
            }
            current = Some(Section {
                name: content.to_string(),
                kind,
                style: comment.filter(|c| !c.is_empty()).map(str::to_string),
                line: number,
                rows: Vec::new(),
            });
            continue;
        }

        let tokens: Vec<String> = content.split_whitespace().map(str::to_string).collect();
        match current.as_mut() {
            Some(section) => section.rows.push((number, tokens)),
            None => parse_header_line(&mut parsed, number, &tokens)?,
        }
    }
    if let Some(done) = current {
        parsed.sections.push(done);
    }
    Ok(parsed)
}

fn parse_header_line(
    parsed: &mut ParsedFile,
    line: usize,
    tokens: &[String],
) -> Result<(), LammpsError> {
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    match words.as_slice() {
        [lo, hi, axis_lo, axis_hi]
            if axis_lo.ends_with("lo") && axis_hi.ends_with("hi") && axis_lo.len() == 3 =>
        {
            let axis = match axis_lo.chars().next() {
                Some('x') => 0,
                Some('y') => 1,
                Some('z') => 2,
                _ => return Err(parse_error(line, format!("unknown box axis '{}'", axis_lo))),
            };
            parsed.lo[axis] = Some(parse_field(line, lo, "box bound")?);
            parsed.hi[axis] = Some(parse_field(line, hi, "box bound")?);
        }
        [_, _, _, "xy", "xz", "yz"] => {
            warn!(line, "Ignoring triclinic tilt factors.");
        }
        [count, key @ ..] if !key.is_empty() => {
            let count: usize = parse_field(line, count, "count")?;
            parsed.sizes.insert(key.join(" "), count);
        }
        _ => return Err(parse_error(line, format!("unrecognized header line '{}'", words.join(" ")))),
    }
    Ok(())
}

fn check_count(parsed: &ParsedFile, section: &Section) -> Result<(), LammpsError> {
    if let Some(expected) = count_key(&section.name).and_then(|key| parsed.sizes.get(key)) {
        if *expected != section.rows.len() {
            return Err(LammpsError::CountMismatch {
                section: section.name.clone(),
                expected: *expected,
                found: section.rows.len(),
            });
        }
    }
    Ok(())
}

fn require_fields(section: &Section, line: usize, tokens: &[String], n: usize) -> Result<(), LammpsError> {
    if tokens.len() < n {
        return Err(parse_error(
            line,
            format!("'{}' rows need {} fields, found {}", section.name, n, tokens.len()),
        ));
    }
    Ok(())
}

fn read_coeffs(
    dl: &mut DataLayer,
    section: &Section,
    order: TermOrder,
    options: &LammpsOptions,
) -> Result<(), LammpsError> {
    let style = section
        .style
        .as_deref()
        .or_else(|| options.style(order))
        .unwrap_or_default()
        .to_string();
    if !supported_styles(order).contains(&style.as_str()) {
        return Err(LammpsError::UnsupportedStyle {
            section: section.name.clone(),
            style,
        });
    }

    let units: UnitMap = dl
        .catalog()
        .builtin_form(order, &style)
        .map(|form| form.units.clone().into_iter().collect())
        .ok_or_else(|| LammpsError::UnsupportedStyle {
            section: section.name.clone(),
            style: style.clone(),
        })?;
    let arity = units.len();
    dl.register_functional_form(order, &style, FormDefinition::Builtin(units))?;

    for (line, tokens) in &section.rows {
        require_fields(section, *line, tokens, arity + 1)?;
        let uid: i64 = parse_field(*line, &tokens[0], "type id")?;
        let values = tokens[1..=arity]
            .iter()
            .map(|t| parse_field::<f64>(*line, t, "coefficient"))
            .collect::<Result<Vec<_>, _>>()?;
        dl.add_parameters(order, &style, values, Some(uid), &UnitMap::new())?;
    }
    debug!(section = %section.name, style = %style, types = section.rows.len(), "Read coefficients.");
    Ok(())
}

fn read_masses(section: &Section) -> Result<BTreeMap<i64, f64>, LammpsError> {
    let mut masses = BTreeMap::new();
    for (line, tokens) in &section.rows {
        require_fields(section, *line, tokens, 2)?;
        let atom_type: i64 = parse_field(*line, &tokens[0], "atom type")?;
        let mass: f64 = parse_field(*line, &tokens[1], "mass")?;
        masses.insert(atom_type, mass);
    }
    Ok(masses)
}

fn atoms_table(section: &Section) -> Result<Table, LammpsError> {
    if let Some(style) = section.style.as_deref() {
        if style != "full" {
            return Err(LammpsError::UnsupportedStyle {
                section: section.name.clone(),
                style: style.to_string(),
            });
        }
    }
    let schema: Vec<(String, DType)> = [
        ("molecule_index", DType::Int),
        ("atom_type", DType::Int),
        ("charge", DType::Float),
        ("X", DType::Float),
        ("Y", DType::Float),
        ("Z", DType::Float),
    ]
    .into_iter()
    .map(|(n, d)| (n.to_string(), d))
    .collect();

    let mut index = Vec::with_capacity(section.rows.len());
    let mut rows = Vec::with_capacity(section.rows.len());
    for (line, tokens) in &section.rows {
        require_fields(section, *line, tokens, 7)?;
        index.push(parse_field(*line, &tokens[0], "atom id")?);
        let mut row = Vec::with_capacity(6);
        for (field, (_, dtype)) in tokens[1..7].iter().zip(&schema) {
            row.push(match dtype {
                DType::Int => Scalar::Int(parse_field(*line, field, "integer")?),
                DType::Float => Scalar::Float(parse_field(*line, field, "number")?),
            });
        }
        rows.push(row);
    }
    Ok(Table::from_rows(index, &schema, &rows)?.named_index(ATOM_INDEX))
}

fn terms_table(section: &Section, order: TermOrder) -> Result<Table, LammpsError> {
    let arity = order.arity();
    let mut schema = vec![(TERM_INDEX.to_string(), DType::Int)];
    schema.extend(order.index_columns().into_iter().map(|c| (c, DType::Int)));

    let mut index = Vec::with_capacity(section.rows.len());
    let mut rows = Vec::with_capacity(section.rows.len());
    for (line, tokens) in &section.rows {
        require_fields(section, *line, tokens, arity + 2)?;
        index.push(parse_field(*line, &tokens[0], "term id")?);
        let row = tokens[1..arity + 2]
            .iter()
            .map(|t| parse_field(*line, t, "integer").map(Scalar::Int))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }
    Ok(Table::from_rows(index, &schema, &rows)?)
}

fn command_for(order: TermOrder) -> &'static str {
    match order {
        TermOrder::BOND => "add_bonds",
        TermOrder::ANGLE => "add_angles",
        _ => "add_dihedrals",
    }
}

#[instrument(skip_all, name = "lammps_read")]
pub(super) fn read(
    dl: &mut DataLayer,
    reader: &mut impl BufRead,
    options: &LammpsOptions,
) -> Result<LammpsSummary, LammpsError> {
    let parsed = parse_lines(reader)?;
    for section in &parsed.sections {
        check_count(&parsed, section)?;
    }

    let mut summary = LammpsSummary {
        title: parsed.title.clone(),
        sizes: parsed.sizes.clone(),
        sections: parsed.sections.iter().map(|s| s.name.clone()).collect(),
        skipped: Vec::new(),
    };

    for section in &parsed.sections {
        if let SectionKind::Coeffs(order) = section.kind {
            read_coeffs(dl, section, order, options)?;
        }
    }

    let mut masses = None;
    let mut atom_types: Vec<(i64, i64)> = Vec::new();
    for section in &parsed.sections {
        match section.kind {
            SectionKind::Masses => masses = Some(read_masses(section)?),
            SectionKind::Atoms => {
                let table = atoms_table(section)?;
                if let Some(types) = table.column("atom_type").and_then(|c| c.as_ints()) {
                    atom_types.extend(table.index().iter().copied().zip(types.iter().copied()));
                }
                dl.call("add_atoms", Payload::Table(table))?;
            }
            SectionKind::Terms(order) => {
                debug!(section = %section.name, line = section.line, "Reading terms.");
                dl.call(command_for(order), Payload::Table(terms_table(section, order)?))?;
            }
            SectionKind::Coeffs(_) => {}
            SectionKind::Unsupported => {
                warn!(section = %section.name, "Section is not supported yet; skipping.");
                dl.call("NYI", Payload::Empty)?;
                summary.skipped.push(section.name.clone());
            }
        }
    }

    if let Some(masses) = masses {
        if !atom_types.is_empty() {
            let mut index = Vec::with_capacity(atom_types.len());
            let mut values = Vec::with_capacity(atom_types.len());
            for (atom, atom_type) in atom_types {
                let mass = masses.get(&atom_type).ok_or_else(|| {
                    LammpsError::MissingData(format!("mass of atom type {}", atom_type))
                })?;
                index.push(atom);
                values.push(*mass);
            }
            let table = Table::new(index)
                .named_index(ATOM_INDEX)
                .with_column("mass", values)?;
            dl.add_atoms(&table, true, &UnitMap::new())?;
        }
    }

    if let (Some(lo), Some(hi)) = (
        parsed.lo.iter().copied().collect::<Option<Vec<f64>>>(),
        parsed.hi.iter().copied().collect::<Option<Vec<f64>>>(),
    ) {
        dl.set_box_size(BoxBounds::new(
            Point3::new(lo[0], lo[1], lo[2]),
            Point3::new(hi[0], hi[1], hi[2]),
        ));
    }

    info!(
        atoms = summary.sizes.get("atoms").copied().unwrap_or(0),
        sections = summary.sections.len(),
        "Read LAMMPS data file."
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::DataLayerConfig;
    use crate::io::lammps::TWO_WATERS as SMALL;
    use std::io::Cursor;

    fn read_str(text: &str) -> (DataLayer, Result<LammpsSummary, LammpsError>) {
        let mut dl = DataLayer::new(DataLayerConfig::in_memory("lammps")).unwrap();
        let result = read(&mut dl, &mut Cursor::new(text), &LammpsOptions::default());
        (dl, result)
    }

    #[test]
    fn reads_header_sizes_and_box() {
        let (dl, result) = read_str(SMALL);
        let summary = result.unwrap();
        assert_eq!(summary.title, "Two waters");
        assert_eq!(summary.sizes["atoms"], 6);
        assert_eq!(summary.sizes["bond types"], 1);
        assert_eq!(summary.skipped, vec!["Velocities"]);
        let bounds = dl.box_size().unwrap();
        assert_eq!(bounds.axis(0), (-5.0, 5.0));
    }

    #[test]
    fn reads_atoms_with_masses_by_type() {
        let (dl, result) = read_str(SMALL);
        result.unwrap();
        assert_eq!(dl.atom_count().unwrap(), 6);
        let atoms = dl.get_atoms(&["atom_type", "mass"], true, &UnitMap::new()).unwrap();
        assert_eq!(atoms.value(0, "mass"), Some(Scalar::Float(15.9994)));
        assert_eq!(atoms.value(4, "mass"), Some(Scalar::Float(1.008)));
    }

    #[test]
    fn coefficients_are_stored_under_type_ids() {
        let (dl, result) = read_str(SMALL);
        result.unwrap();
        assert_eq!(dl.parameter_uids(2).unwrap(), vec![1]);
        assert_eq!(dl.parameter(3, 1).unwrap().form, "harmonic");
        assert_eq!(dl.parameter(2, 1).unwrap().values, vec![1000.0, 1.0]);
        assert!(dl.dangling_term_indices(2).unwrap().is_empty());
        assert_eq!(dl.term_count(3).unwrap().total, 2);
    }

    #[test]
    fn count_mismatch_is_reported() {
        let text = SMALL.replace(" 4 bonds", " 5 bonds");
        let (_, result) = read_str(&text);
        assert!(matches!(
            result,
            Err(LammpsError::CountMismatch { expected: 5, found: 4, .. })
        ));
    }

    #[test]
    fn unsupported_styles_are_rejected() {
        let text = SMALL.replace("Bond Coeffs # harmonic", "Bond Coeffs # quartic");
        let (_, result) = read_str(&text);
        assert!(matches!(result, Err(LammpsError::UnsupportedStyle { .. })));
    }

    #[test]
    fn malformed_rows_report_their_line() {
        let text = SMALL.replace(" 2 1 1 3\n", " 2 1 one 3\n");
        let (_, result) = read_str(&text);
        assert!(matches!(result, Err(LammpsError::Parse { line, .. }) if line > 1));
    }
}
