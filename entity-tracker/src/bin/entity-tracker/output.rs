use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table, presets};
use serde::Serialize;

use crate::theme::{BULLET, THEME, Tone};

/// Output format options for CLI commands
#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// One line per item
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Data that can be rendered as a table or a compact listing.
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    fn is_chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    /// Renders `data` in the configured format.
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Table => println!("{}", data.to_table(&self.options)),
            OutputFormat::Compact => println!("{}", data.to_compact()),
        }
        Ok(())
    }

    fn line(&self, tone: Tone, message: &str) -> String {
        if self.options.no_color {
            format!("{} {message}", tone.icon())
        } else {
            format!("{} {}", tone.icon().color(tone.color()), message.color(tone.color()))
        }
    }

    pub fn success(&self, message: &str) {
        if self.is_chatty() {
            println!("{}", self.line(Tone::Success, message));
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(Tone::Error, message));
    }

    pub fn warning(&self, message: &str) {
        if self.is_chatty() {
            println!("{}", self.line(Tone::Warning, message));
        }
    }

    pub fn info(&self, message: &str) {
        if self.is_chatty() {
            println!("{}", self.line(Tone::Info, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.is_chatty() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        } else {
            println!("\n{}", text.color(THEME.emphasis).bold());
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.is_chatty() {
            return;
        }
        if self.options.no_color {
            println!("  {BULLET} {text}");
        } else {
            println!("  {} {text}", BULLET.color(THEME.muted));
        }
    }
}

/// Table with the preset matching the color setting.
pub fn themed_table(options: &GlobalOptions) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(presets::ASCII_FULL);
    } else {
        table.load_preset(presets::UTF8_FULL_CONDENSED);
    }
    table
}

pub fn set_table_header(table: &mut Table, options: &GlobalOptions, headers: &[&str]) {
    let cells = headers.iter().map(|header| {
        let cell = Cell::new(header).add_attribute(Attribute::Bold);
        if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
    });
    table.set_header(cells.collect::<Vec<_>>());
}
