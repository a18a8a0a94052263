use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "EEX CLI - Translate molecular energy expressions between simulation file formats.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read an input file and write it back out through the data layer.
    Convert(ConvertArgs),
    /// Read an input file and print what the data layer holds.
    Inspect(InspectArgs),
}

/// Arguments for the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Path to the input file (e.g., water.data).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    #[command(flatten)]
    pub format: FormatArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub styles: StyleArgs,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the input file.
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// List the distinct values of shared atom properties (charge, mass).
    #[arg(long)]
    pub values: bool,

    #[command(flatten)]
    pub format: FormatArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub styles: StyleArgs,
}

#[derive(Args, Debug, Clone)]
pub struct FormatArgs {
    /// File format; guessed from the file extension when omitted.
    #[arg(short, long, value_name = "NAME")]
    pub format: Option<String>,
}

/// Where the data layer keeps its tables while a command runs.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Table-store backend ('memory' or 'disk').
    #[arg(long, default_value = "memory", value_name = "NAME")]
    pub backend: String,

    /// Directory for the disk backend. Defaults to the system temp directory.
    #[arg(long, value_name = "PATH")]
    pub store_dir: Option<PathBuf>,

    /// Keep the disk backend's tables after the command finishes.
    #[arg(long)]
    pub keep_store: bool,

    /// Load atom properties and functional forms from a TOML catalog.
    #[arg(long, value_name = "PATH")]
    pub catalog: Option<PathBuf>,
}

/// LAMMPS styles for coefficient sections without a `# style` comment.
#[derive(Args, Debug, Clone)]
pub struct StyleArgs {
    #[arg(long, default_value = "harmonic", value_name = "STYLE")]
    pub bond_style: String,

    #[arg(long, default_value = "harmonic", value_name = "STYLE")]
    pub angle_style: String,

    #[arg(long, default_value = "charmm", value_name = "STYLE")]
    pub dihedral_style: String,
}
