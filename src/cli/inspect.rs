use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cells::{clean_str, roc_to_ad};
use crate::error::{FiscalError, Result};
use crate::extractor::{detect, get_by_key, ExtractOptions, Extracted, ExtractorKind};
use crate::funds::FundLayout;
use crate::grid::{load_grid, Grid};
use crate::hierarchy::HierarchyLayout;
use crate::models::Level;
use crate::settings::load_settings;

/// Widest cell printed in the preview table.
const PREVIEW_WIDTH: usize = 24;

fn preview(text: &str) -> String {
    let cleaned = clean_str(text);
    if cleaned.chars().count() > PREVIEW_WIDTH {
        let cut: String = cleaned.chars().take(PREVIEW_WIDTH).collect();
        format!("{cut}…")
    } else {
        cleaned
    }
}

fn year_from_path(file_path: &Path) -> Option<i32> {
    file_path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_string_lossy().parse().ok())
}

fn print_rows(grid: &Grid, rows: usize) {
    let width = grid.head(rows).iter().map(Vec::len).max().unwrap_or(0);
    let mut table = Table::new();
    let mut header = vec!["#".to_string()];
    header.extend((0..width).map(|c| c.to_string()));
    table.set_header(header);
    for (idx, row) in grid.head(rows).iter().enumerate() {
        let mut cells = vec![Cell::new(idx)];
        cells.extend((0..width).map(|c| Cell::new(preview(row.get(c).map(String::as_str).unwrap_or("")))));
        table.add_row(cells);
    }
    println!("{table}");
}

fn column(col: Option<usize>) -> String {
    col.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn run(file: &str, rows: usize, kind: Option<&str>, year: Option<i32>) -> Result<()> {
    let settings = load_settings();
    let opts = ExtractOptions::from_settings(&settings)?;
    let file_path = Path::new(file);
    let grid = load_grid(file_path)?;
    let name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.to_string());
    let roc_year = year.or_else(|| year_from_path(file_path)).unwrap_or(settings.last_year);

    println!("File:   {}", file_path.display());
    println!("Size:   {} rows × {} columns", grid.len(), grid.width());
    println!("Year:   {} (AD {})", roc_year, roc_to_ad(roc_year));
    print_rows(&grid, rows);

    let kind: Option<ExtractorKind> = match kind {
        Some(key) => Some(get_by_key(key).ok_or_else(|| FiscalError::UnknownKind(key.to_string()))?),
        None => detect(&name, &grid),
    };
    let Some(kind) = kind else {
        println!("{}", "Not recognised as any extractor kind.".yellow());
        return Ok(());
    };
    println!("Kind:   {} ({})", kind.key().bold(), kind.name());
    if let Some(flow) = kind.flow() {
        println!("Flow:   {}", flow.key());
    }

    match kind {
        ExtractorKind::Funds => {
            let layout = FundLayout::resolve(&grid, &opts.policy, &name)?;
            println!("Header: row {}", layout.header_row);
            println!(
                "Columns: name {}, income {}, expense {}; data from row {}",
                layout.name, layout.income, layout.expense, layout.data_start
            );
        }
        ExtractorKind::Summary => {}
        _ => {
            let layout = HierarchyLayout::resolve(&grid, &opts.policy, &name)?;
            println!("Header: row {}", layout.header_row);
            let markers: Vec<String> = Level::ALL
                .iter()
                .map(|l| format!("{} {}", l.marker(), column(layout.markers[l.index()])))
                .collect();
            println!(
                "Columns: {}, name {}, amount {}; data from row {}",
                markers.join(", "),
                column(layout.name),
                layout.amount,
                layout.data_start
            );
        }
    }

    match kind.extract(&grid, roc_year, &opts, &name)? {
        Extracted::Hierarchy(records) => {
            let mut table = Table::new();
            table.set_header(vec!["Level", "Codes", "Name", "Amount"]);
            for record in records.iter().take(rows) {
                table.add_row(vec![
                    Cell::new(record.level.marker()),
                    Cell::new(record.codes.join(".")),
                    Cell::new(&record.name),
                    Cell::new(crate::fmt::amount(record.amount)),
                ]);
            }
            println!("{} records\n{table}", records.len());
        }
        Extracted::Summary(sheet) => {
            println!(
                "Revenue {}  Expenditure {}",
                crate::fmt::amount(sheet.year.revenue),
                crate::fmt::amount(sheet.year.expenditure)
            );
            let mut table = Table::new();
            table.set_header(vec!["Type", "Category", "Amount"]);
            for row in &sheet.rows {
                table.add_row(vec![
                    Cell::new(row.flow.key()),
                    Cell::new(&row.category),
                    Cell::new(crate::fmt::amount(row.amount)),
                ]);
            }
            println!("{} rows\n{table}", sheet.rows.len());
        }
        Extracted::Funds(sheet) => {
            let basic = &sheet.year.basic_fund;
            println!(
                "General fund: {} / {} (extra {} / {})",
                crate::fmt::amount(basic.total.revenue),
                crate::fmt::amount(basic.total.expenditure),
                crate::fmt::amount(basic.extra.revenue),
                crate::fmt::amount(basic.extra.expenditure)
            );
            let mut table = Table::new();
            table.set_header(vec!["Fund", "Type", "Income", "Expense"]);
            for row in &sheet.rows {
                table.add_row(vec![
                    Cell::new(&row.fund_name),
                    Cell::new(row.fund_type.key()),
                    Cell::new(crate::fmt::amount(row.income)),
                    Cell::new(crate::fmt::amount(row.expense)),
                ]);
            }
            println!("{} special funds\n{table}", sheet.rows.len());
        }
    }
    Ok(())
}
