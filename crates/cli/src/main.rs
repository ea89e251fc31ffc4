// divrecon CLI - strict custody vs NBIM dividend reconciliation

mod exit_codes;
mod inspect;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use divrecon_io::IoError;
use divrecon_recon::ReconError;
use exit_codes::{EXIT_CONFIG, EXIT_IO, EXIT_PARSE, EXIT_SCHEMA, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "divrecon")]
#[command(about = "Reconcile custody and NBIM dividend bookings into a breaks table")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile two CSV files and write the breaks table
    #[command(after_help = "\
Examples:
  divrecon run --custody custody.csv --nbim nbim.csv
  divrecon run --custody custody.csv --nbim nbim.csv -o out/breaks.csv --shape flags
  divrecon run --config dividends.toml --json
  divrecon run --config dividends.toml --money-tol 0.05")]
    Run {
        #[command(flatten)]
        inputs: recon::InputArgs,

        /// Output CSV path [default: breaks_flags.csv]
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Output shape: breaks (one row per break) or flags (one row per key)
        #[arg(long)]
        shape: Option<divrecon_recon::OutputShape>,

        /// Print the summary as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Suppress the human summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Validate a TOML run config without running
    #[command(after_help = "\
Examples:
  divrecon validate dividends.toml

Config layout (every section optional except name):
  name = \"Dividend bookings Q1\"

  [inputs]                 # relative to the config file
  custody = \"custody.csv\"
  nbim = \"nbim.csv\"

  [tolerance]
  money = 0.01
  rate = 0.0001

  [output]
  path = \"breaks_flags.csv\"
  shape = \"breaks\"         # or \"flags\"")]
    Validate {
        /// Path to the TOML config file
        config: PathBuf,
    },

    /// Show how a CSV file is detected and normalized
    #[command(after_help = "\
Examples:
  divrecon inspect custody.csv
  divrecon inspect nbim.csv --json")]
    Inspect {
        /// CSV file to inspect
        file: PathBuf,

        /// Output JSON instead of a text report
        #[arg(long)]
        json: bool,
    },

    /// Write breaks grouped by join key, with source-row context, as JSON
    #[command(after_help = "\
Examples:
  divrecon groups --custody custody.csv --nbim nbim.csv -o groups.json")]
    Groups {
        #[command(flatten)]
        inputs: recon::InputArgs,

        /// Output JSON path
        #[arg(long, short = 'o', default_value = "break_groups.json")]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    let result = match cli.command {
        Commands::Run {
            inputs,
            output,
            shape,
            json,
            quiet,
        } => recon::cmd_run(inputs, output, shape, json, quiet),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Inspect { file, json } => inspect::cmd_inspect(file, json),
        Commands::Groups { inputs, output } => recon::cmd_groups(inputs, output),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8, format: LogFormat) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "divrecon=warn",
        1 => "divrecon=info",
        2 => "divrecon=debug",
        _ => "divrecon=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Parse { .. } => CliError::new(EXIT_PARSE, err.to_string()).with_hint(
                "expected a header row with ',', ';', '|' or tab delimiters in UTF-8, cp1252 or latin1",
            ),
            IoError::Read { .. } | IoError::Write { .. } => CliError::io(err.to_string()),
        }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::Schema { .. } => CliError::new(EXIT_SCHEMA, err.to_string()).with_hint(
                "key columns are matched by exact name, case, known aliases, then letters and digits only",
            ),
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                CliError::new(EXIT_CONFIG, err.to_string())
            }
        }
    }
}
