//! Table formatting for CLI list commands
//!
//! Commands describe their rows once as a [`Table`]; the output format picks
//! the rendering (aligned columns, CSV, markdown or bare IDs).

use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

/// One column: header plus the width used for aligned output
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub width: usize,
}

impl Column {
    pub const fn new(header: &'static str, width: usize) -> Self {
        Self { header, width }
    }
}

/// Rows of plain cells; the first cell of each row is its ID
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
    /// Noun used in the summary line, e.g. "template"
    noun: &'static str,
}

impl Table {
    pub fn new(columns: &[Column], noun: &'static str) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
            noun,
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Print in the given format; `Auto` renders aligned columns
    pub fn print(&self, format: OutputFormat, quiet: bool) -> Result<()> {
        match format {
            OutputFormat::Csv => print!("{}", self.to_csv()?),
            OutputFormat::Md => println!("{}", self.to_markdown()),
            OutputFormat::Id => {
                for row in &self.rows {
                    if let Some(id) = row.first() {
                        println!("{}", id);
                    }
                }
            }
            _ => self.print_aligned(quiet),
        }
        Ok(())
    }

    fn print_aligned(&self, quiet: bool) {
        let header: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{:<w$}", style(c.header).bold(), w = c.width))
            .collect();
        println!("{}", header.join(" ").trim_end());
        let total: usize = self.columns.iter().map(|c| c.width + 1).sum();
        println!("{}", "-".repeat(total.saturating_sub(1)));

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .zip(row)
                .map(|(c, cell)| format!("{:<w$}", cell, w = c.width))
                .collect();
            println!("{}", cells.join(" ").trim_end());
        }

        if !quiet {
            println!();
            println!("{} {}(s) found", style(self.rows.len()).cyan(), self.noun);
        }
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(self.columns.iter().map(|c| c.header.to_lowercase()))
            .into_diagnostic()?;
        for row in &self.rows {
            writer.write_record(row).into_diagnostic()?;
        }
        let bytes = writer.into_inner().into_diagnostic()?;
        String::from_utf8(bytes).into_diagnostic()
    }

    pub fn to_markdown(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
        for row in &self.rows {
            builder.push_record(row.iter().map(|cell| cell.replace('|', "\\|")));
        }
        builder.build().with(Style::markdown()).to_string()
    }
}
