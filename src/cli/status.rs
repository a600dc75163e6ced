use std::path::PathBuf;

use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::extractor::{detect, list_workbooks, year_dirs};
use crate::grid::load_grid;
use crate::settings::{load_settings, settings_file_exists, settings_path};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let source = PathBuf::from(&settings.source_dir);

    println!(
        "Settings:   {}{}",
        settings_path().display(),
        if settings_file_exists() { "" } else { " (defaults)" }
    );
    println!("Source dir: {}", source.display());
    println!("Output dir: {}", settings.output_dir);
    println!("Years:      {}–{} (ROC)", settings.first_year, settings.last_year);
    println!(
        "Header:     scan {} rows, {} hits, {:?} on ties",
        settings.header_scan_rows, settings.min_header_hits, settings.tie_break
    );
    println!("Category map: {}", settings.category_map.as_deref().unwrap_or("(built-in)"));

    if !source.is_dir() {
        println!();
        println!("Source directory not found. Run `fiscal init --source-dir <path>` to set it.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Year", "File", "Kind"]);
    for (year, dir) in year_dirs(&source)? {
        if year < settings.first_year || year > settings.last_year {
            continue;
        }
        for path in list_workbooks(&dir)? {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let kind = match load_grid(&path) {
                Ok(grid) => detect(&name, &grid).map(|k| k.key().to_string()).unwrap_or_else(|| "-".to_string()),
                Err(e) => format!("unreadable: {e}"),
            };
            table.add_row(vec![Cell::new(year), Cell::new(name), Cell::new(kind)]);
        }
    }
    println!();
    println!("Workbooks\n{table}");
    Ok(())
}
