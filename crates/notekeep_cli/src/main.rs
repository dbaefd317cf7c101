//! notekeep command-line entry point.
//!
//! # Responsibility
//! - Resolve the store location and bring its schema up to date before any
//!   note operation runs.
//! - Expose upsert/rename/get/list as subcommands printing JSON to stdout.
//!
//! # Invariants
//! - A migration failure exits before any repository call.
//! - Logs go to stderr (or `--log-dir`), never to stdout.

use clap::{Parser, Subcommand};
use log::error;
use notekeep_core::{
    default_log_level, init_logging, open_store, ConfigError, LoggingError, NoteListQuery,
    NoteRepository, RepoError, StoreConfig, DEFAULT_PAGE_SIZE,
};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "notekeep")]
#[command(about = "Title-keyed note store", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding `notes.db` (default: `$PATH_PREFIX`, then `data`)
    #[arg(long)]
    path_prefix: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files (default: stderr)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations and exit
    Migrate,

    /// Print one note by exact title
    Get { title: String },

    /// Create a note or update it in place
    Put {
        title: String,

        /// New content; omit to only refresh the modification time
        #[arg(long)]
        content: Option<String>,
    },

    /// Move a note to a new title
    Rename { old_title: String, new_title: String },

    /// List notes, most recently updated first
    List {
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        page: i64,

        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, allow_negative_numbers = true)]
        page_size: i64,

        /// Case-insensitive substring of title or content
        #[arg(long)]
        query: Option<String>,
    },
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Repo(RepoError),
    Output(serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Repo(RepoError::NotFound(_)) => 4,
            Self::Repo(RepoError::Conflict { .. }) => 5,
            Self::Repo(RepoError::Db(err)) if err.is_fatal() => 3,
            _ => 1,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "failed to encode output: {err}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error code={}", err.exit_code());
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, cli.log_dir.as_deref())?;

    let config = store_config(cli.path_prefix)?;
    let (repo, report) = open_store(&config)?;

    match cli.command {
        Command::Migrate => print_json(&report),
        Command::Get { title } => print_json(&repo.get_note(&title)?),
        Command::Put { title, content } => {
            print_json(&repo.upsert_note(&title, content.as_deref())?)
        }
        Command::Rename {
            old_title,
            new_title,
        } => print_json(&repo.rename_note(&old_title, &new_title)?),
        Command::List {
            page,
            page_size,
            query,
        } => {
            let list_query = NoteListQuery {
                page: Some(page),
                page_size: Some(page_size),
                query,
            };
            print_json(&repo.list_notes(&list_query)?)
        }
    }
}

/// `--path-prefix` wins; otherwise `PATH_PREFIX` or the default applies.
fn store_config(path_prefix: Option<PathBuf>) -> Result<StoreConfig, ConfigError> {
    match path_prefix {
        Some(prefix) => Ok(StoreConfig::new(prefix)),
        None => StoreConfig::from_env(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
