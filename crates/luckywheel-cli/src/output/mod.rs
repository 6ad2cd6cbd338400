//! Output formatting module
//!
//! Table and JSON rendering for CLI commands.

use serde::Serialize;
use std::fmt::Display;
use tabled::{Table, Tabled};

/// Output format enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'table' or 'json'", s)),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Writes command results in the selected format
///
/// Status lines (`success`, `info`) are only printed in table mode so that
/// JSON output stays machine-readable.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Print a list of rows, or `empty` when there are none
    pub fn list<T>(&self, rows: &[T], empty: &str) -> anyhow::Result<()>
    where
        T: Serialize + Tabled,
    {
        match self.format {
            OutputFormat::Table if rows.is_empty() => println!("{}", empty),
            OutputFormat::Table => println!("{}", Table::new(rows)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        }
        Ok(())
    }

    /// Print one row
    pub fn single<T>(&self, row: &T) -> anyhow::Result<()>
    where
        T: Serialize + Tabled,
    {
        match self.format {
            OutputFormat::Table => println!("{}", Table::new([row])),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(row)?),
        }
        Ok(())
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", colored::Colorize::green(message));
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{}", message);
        }
    }

    /// Warnings go to stderr regardless of format
    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", colored::Colorize::yellow(message));
        }
    }

    fn chatty(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Table
    }
}
