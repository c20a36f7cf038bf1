use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use services::review_session::DEFAULT_ADVANCE_DELAY;

use crate::logging::Verbosity;

pub const DEFAULT_DATA: &str = "data.json";
pub const DEFAULT_DB_URL: &str = "sqlite://cmdcards.sqlite3";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDelay { raw: String },
    InvalidDbUrl { raw: String },
    InvalidData { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDelay { raw } => {
                write!(f, "invalid --advance-delay-ms value: {raw}")
            }
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidData { raw } => write!(f, "invalid --data value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cmdcards [--data <path|url>] [--db <sqlite_url>] [--advance-delay-ms <ms>]");
    eprintln!("           [--offline-cache] [-v|-vv|-q]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --data {DEFAULT_DATA}");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --advance-delay-ms {}", DEFAULT_ADVANCE_DELAY.as_millis());
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CMDCARDS_DATA, CMDCARDS_DB_URL, CMDCARDS_ADVANCE_DELAY_MS,");
    eprintln!("  CMDCARDS_OFFLINE_CACHE, RUST_LOG");
}

/// Runtime settings: flags first, then `CMDCARDS_*` variables, then defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data: String,
    pub db_url: String,
    pub advance_delay: Duration,
    pub offline_cache: bool,
    pub verbosity: Verbosity,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(Config),
    Help,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_delay(raw: String) -> Result<Duration, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ArgsError::InvalidDelay { raw })
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Parse command-line arguments (without the program name).
    ///
    /// `env` looks up environment variables so tests stay hermetic.
    ///
    /// # Errors
    ///
    /// Returns `ArgsError` for unknown flags or malformed values.
    pub fn parse(
        mut args: impl Iterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Invocation, ArgsError> {
        let mut data = env("CMDCARDS_DATA").unwrap_or_else(|| DEFAULT_DATA.into());
        let mut db_url = env("CMDCARDS_DB_URL")
            .map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut advance_delay = match env("CMDCARDS_ADVANCE_DELAY_MS") {
            Some(raw) => parse_delay(raw)?,
            None => DEFAULT_ADVANCE_DELAY,
        };
        let mut offline_cache = env("CMDCARDS_OFFLINE_CACHE").is_some_and(|v| is_truthy(&v));
        let mut verbose = 0_u8;
        let mut quiet = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data" => {
                    let value = require_value(&mut args, "--data")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidData { raw: value });
                    }
                    data = value;
                }
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--advance-delay-ms" => {
                    advance_delay = parse_delay(require_value(&mut args, "--advance-delay-ms")?)?;
                }
                "--offline-cache" => offline_cache = true,
                "-v" | "--verbose" => verbose = verbose.saturating_add(1),
                "-vv" => verbose = verbose.saturating_add(2),
                "-q" | "--quiet" => quiet = true,
                "--help" | "-h" => return Ok(Invocation::Help),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Invocation::Run(Self {
            data,
            db_url,
            advance_delay,
            offline_cache,
            verbosity: Verbosity::from_flags(verbose, quiet),
        }))
    }
}

/// Turn a bare or `sqlite:` path into an absolute `sqlite://` URL.
#[must_use]
pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim();
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file and its directory so `SQLite` can open it.
///
/// # Errors
///
/// Returns an error for malformed URLs or filesystem failures.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}
