//! cli argument parser module

use clap::Parser;

/// What default configuration information to dump to stdout.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum DumpDefault {
    /// Dump the default config to stdout.
    Config,
}

/// Structure containing all the flags and arguments that can be passed to
/// the binary from a shell.
#[derive(Parser)]
#[clap(version, author, about)]
pub struct Cli {
    /// Specify the configuration file to use, overrides the normal
    /// configuration file resolution.
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Cap the number of measurement frames the demo fits, overriding the
    /// config file's `simulation.num-frames`.
    #[arg(long, value_name = "N")]
    pub frames: Option<usize>,

    /// Raise the tracing filter level to `debug` (repeat for `trace`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// What default configuration information to dump to stdout.
    #[arg(long, value_enum)]
    pub dump_default: Option<DumpDefault>,
}

#[must_use]
pub fn parse_arguments() -> Cli {
    Cli::parse()
}
