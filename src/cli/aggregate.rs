use std::path::{Path, PathBuf};

use comfy_table::{Cell, Table};

use crate::aggregator::{aggregate as build_site, AggregateSummary};
use crate::categorizer::CategoryMap;
use crate::error::Result;
use crate::fmt::billions;
use crate::settings::{load_settings, shellexpand_path, Settings};

pub fn run(output: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = output {
        settings.output_dir = shellexpand_path(&dir);
    }
    aggregate(&settings)?;
    Ok(())
}

pub(crate) fn aggregate(settings: &Settings) -> Result<AggregateSummary> {
    let map_path = settings.category_map.as_deref().map(|p| PathBuf::from(shellexpand_path(p)));
    let map = CategoryMap::load_or_default(map_path.as_deref())?;
    let summary = build_site(Path::new(&settings.output_dir), &map, settings.unmatched)?;

    let mut table = Table::new();
    table.set_header(vec!["Input", "Rows"]);
    table.add_row(vec![Cell::new("summary_all.csv"), Cell::new(summary.summary_rows)]);
    table.add_row(vec![Cell::new("funds_all.csv"), Cell::new(summary.fund_rows)]);
    table.add_row(vec![Cell::new("budget_all.csv"), Cell::new(summary.budget_rows)]);
    println!("Aggregated\n{table}");

    let years: Vec<String> = summary.years.iter().map(|y| y.to_string()).collect();
    println!("Years: {}", if years.is_empty() { "(none)".to_string() } else { years.join(", ") });
    if !summary.totals.is_empty() {
        let mut totals = Table::new();
        totals.set_header(vec!["Year", "Revenue (bn)", "Expenditure (bn)"]);
        for (year, revenue, expenditure) in &summary.totals {
            totals.add_row(vec![
                Cell::new(year),
                Cell::new(billions(*revenue)),
                Cell::new(billions(*expenditure)),
            ]);
        }
        println!("Totals\n{totals}");
    }
    for path in &summary.written {
        println!("  {}", path.display());
    }
    Ok(summary)
}
