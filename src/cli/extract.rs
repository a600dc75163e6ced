use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::RunArgs;
use crate::error::Result;
use crate::export::write_extract_outputs;
use crate::extractor::{extract_all, ExtractOptions, ExtractReport};
use crate::settings::{load_settings, Settings};

pub fn run(args: &RunArgs) -> Result<()> {
    let mut settings = load_settings();
    args.apply(&mut settings);
    extract(&settings)?;
    Ok(())
}

/// Run the extract stage and print what was found.
pub(crate) fn extract(settings: &Settings) -> Result<ExtractReport> {
    let opts = ExtractOptions::from_settings(settings)?;
    let output = PathBuf::from(&settings.output_dir);
    let report = extract_all(&opts)?;
    let written = write_extract_outputs(&report, &opts.source_dir, &output)?;

    let mut table = Table::new();
    table.set_header(vec!["Year", "Kind", "File", "Records"]);
    for source in &report.sources {
        table.add_row(vec![
            Cell::new(format!("{} ({})", source.roc_year, source.year)),
            Cell::new(&source.kind),
            Cell::new(&source.file),
            Cell::new(source.records),
        ]);
    }
    println!("Extracted\n{table}");

    if !report.skipped.is_empty() {
        println!();
        for skipped in &report.skipped {
            println!(
                "{} {} ({}): {}",
                "skipped".yellow(),
                skipped.file,
                skipped.roc_year,
                skipped.reason
            );
        }
    }
    if !report.missing_years.is_empty() {
        let years: Vec<String> = report.missing_years.iter().map(|y| y.to_string()).collect();
        println!("{} {}", "No directory for:".yellow(), years.join(", "));
    }

    println!();
    println!(
        "{} budget rows, {} fund rows, {} summary rows",
        report.budget_rows.len(),
        report.fund_rows.len(),
        report.summary_rows.len()
    );
    for path in written {
        println!("  {}", path.display());
    }
    Ok(report)
}
