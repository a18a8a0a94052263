use super::error::DataLayerError;
use crate::core::table::Table;
use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;

/// The operations file readers may route data to by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    AddAtoms,
    AddBonds,
    AddAngles,
    AddDihedrals,
    AddOther,
    /// Placeholder for sections a reader recognizes but cannot store yet.
    NotYetImplemented,
}

static COMMANDS: Map<&'static str, Command> = phf_map! {
    "add_atoms" => Command::AddAtoms,
    "add_bonds" => Command::AddBonds,
    "add_angles" => Command::AddAngles,
    "add_dihedrals" => Command::AddDihedrals,
    "add_other" => Command::AddOther,
    "NYI" => Command::NotYetImplemented,
};

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::AddAtoms => "add_atoms",
            Command::AddBonds => "add_bonds",
            Command::AddAngles => "add_angles",
            Command::AddDihedrals => "add_dihedrals",
            Command::AddOther => "add_other",
            Command::NotYetImplemented => "NYI",
        }
    }
}

impl FromStr for Command {
    type Err = DataLayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        COMMANDS
            .get(s)
            .copied()
            .ok_or_else(|| DataLayerError::UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The data handed to a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Table(Table),
    Keyed { key: String, table: Table },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "no payload",
            Payload::Table(_) => "table",
            Payload::Keyed { .. } => "keyed table",
        }
    }

    pub(crate) fn into_table(self, command: Command) -> Result<Table, DataLayerError> {
        match self {
            Payload::Table(table) => Ok(table),
            other => Err(DataLayerError::TypeMismatch {
                expected: format!("table payload for '{}'", command),
                found: other.kind().to_string(),
            }),
        }
    }

    pub(crate) fn into_keyed(self, command: Command) -> Result<(String, Table), DataLayerError> {
        match self {
            Payload::Keyed { key, table } => Ok((key, table)),
            other => Err(DataLayerError::TypeMismatch {
                expected: format!("keyed table payload for '{}'", command),
                found: other.kind().to_string(),
            }),
        }
    }
}

impl From<Table> for Payload {
    fn from(table: Table) -> Self {
        Payload::Table(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_to_commands() {
        assert_eq!("add_bonds".parse::<Command>().unwrap(), Command::AddBonds);
        assert_eq!("NYI".parse::<Command>().unwrap(), Command::NotYetImplemented);
        for command in [Command::AddAtoms, Command::AddOther, Command::AddDihedrals] {
            assert_eq!(command.name().parse::<Command>().unwrap(), command);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            "add_impropers".parse::<Command>(),
            Err(DataLayerError::UnknownCommand(name)) if name == "add_impropers"
        ));
    }

    #[test]
    fn payload_shape_is_checked() {
        let err = Payload::Empty.into_table(Command::AddAtoms).unwrap_err();
        assert!(matches!(err, DataLayerError::TypeMismatch { .. }));
        let table = Table::with_range_index(1);
        assert!(Payload::from(table.clone()).into_table(Command::AddAtoms).is_ok());
        assert!(Payload::Table(table).into_keyed(Command::AddOther).is_err());
    }
}
