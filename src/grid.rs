use std::path::Path;

use crate::cells::clean_str;
use crate::error::{FiscalError, Result};

/// Raw text of a worksheet, addressed by absolute row and column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    #[cfg(test)]
    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Widest row in the sheet.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn row(&self, idx: usize) -> &[String] {
        self.rows.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cell text, empty when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn head(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Cleaned text of the first `n` rows, used for content-based detection.
    pub fn head_text(&self, n: usize) -> String {
        self.head(n)
            .iter()
            .flat_map(|r| r.iter())
            .map(|c| clean_str(c))
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Extensions `load_grid` understands.
pub fn is_supported(file_path: &Path) -> bool {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => true,
        #[cfg(feature = "workbook")]
        "xls" | "xlsx" | "xlsm" | "ods" => true,
        _ => false,
    }
}

/// Load the first worksheet of a workbook (or a CSV export of one).
pub fn load_grid(file_path: &Path) -> Result<Grid> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => load_csv(file_path),
        #[cfg(feature = "workbook")]
        "xls" | "xlsx" | "xlsm" | "ods" => load_workbook(file_path),
        _ => Err(FiscalError::UnsupportedFile(file_path.display().to_string())),
    }
}

fn load_csv(file_path: &Path) -> Result<Grid> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Grid::new(rows))
}

#[cfg(feature = "workbook")]
fn load_workbook(file_path: &Path) -> Result<Grid> {
    use calamine::Reader;

    let mut workbook = calamine::open_workbook_auto(file_path)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Grid::default());
    };
    let range = workbook.worksheet_range(&sheet)?;
    Ok(range_to_grid(&range))
}

/// Ranges start at the first non-empty cell; pad back to absolute positions
/// so positional column fallbacks line up with what a spreadsheet shows.
#[cfg(feature = "workbook")]
fn range_to_grid(range: &calamine::Range<calamine::Data>) -> Grid {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![String::new(); col_offset];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }
    Grid::new(rows)
}

#[cfg(feature = "workbook")]
fn cell_text(cell: &calamine::Data) -> String {
    use calamine::Data;

    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Codes and amounts are stored as floats; keep `3` from becoming `3.0`.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
