use crate::engine::datalayer::DataLayer;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing energy-expression file formats.
///
/// Implementors parse a file into a [`DataLayer`] and serialize a data layer
/// back into the format. Format-specific choices (styles, unit systems) travel
/// in [`Self::Options`].
pub trait EnergyExpressionFile {
    /// Format-specific reading and writing options.
    type Options: Default;

    /// What a reader reports about the file it consumed.
    type Summary;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a file from a buffered reader into `datalayer`.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails, the data layer rejects the data, or
    /// an I/O operation fails.
    fn read_from(
        datalayer: &mut DataLayer,
        reader: &mut impl BufRead,
        options: &Self::Options,
    ) -> Result<Self::Summary, Self::Error>;

    /// Writes the contents of `datalayer` to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the data layer cannot be expressed in the format or
    /// writing fails.
    fn write_to(
        datalayer: &DataLayer,
        writer: &mut impl Write,
        options: &Self::Options,
    ) -> Result<(), Self::Error>;

    /// Reads a file from a path into `datalayer`.
    fn read_from_path<P: AsRef<Path>>(
        datalayer: &mut DataLayer,
        path: P,
        options: &Self::Options,
    ) -> Result<Self::Summary, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(datalayer, &mut reader, options)
    }

    /// Writes the contents of `datalayer` to a path.
    fn write_to_path<P: AsRef<Path>>(
        datalayer: &DataLayer,
        path: P,
        options: &Self::Options,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(datalayer, &mut writer, options)?;
        writer.flush()?;
        Ok(())
    }
}
