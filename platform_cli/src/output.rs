//! Terminal output helpers.
//!
//! Status messages go to stderr; command results go to stdout in the
//! selected format.

use colored::Colorize;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::CliError;
use crate::OutputFormat;

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    eprintln!("{} {}", "ok:".green().bold(), msg);
}

pub fn section(title: &str) {
    eprintln!();
    eprintln!("{}", title.bold().underline());
}

/// Prints a list of rows.
pub fn print_data<T: Serialize + Tabled>(items: &[T], format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("  (none)");
            } else {
                println!("{}", Table::new(items).with(Style::rounded()));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Yaml => print!("{}", serde_yaml_ng::to_string(items)?),
    }
    Ok(())
}

/// Prints a single row.
pub fn print_item<T: Serialize + Tabled>(item: &T, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Table => println!("{}", Table::new([item]).with(Style::rounded())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
        OutputFormat::Yaml => print!("{}", serde_yaml_ng::to_string(item)?),
    }
    Ok(())
}

/// Prints a document that has no tabular form. Tables fall back to JSON.
pub fn print_document<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value)?)
        }
        OutputFormat::Yaml => print!("{}", serde_yaml_ng::to_string(value)?),
    }
    Ok(())
}
