use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::extractor::{ExtractReport, SkippedFile, SourceFile};

pub const BUDGET_CSV: &str = "unified/budget_all.csv";
pub const FUNDS_CSV: &str = "unified/funds_all.csv";
pub const SUMMARY_CSV: &str = "unified/summary_all.csv";
pub const MANIFEST_JSON: &str = "unified/sources.json";
pub const SUMMARY_JSON: &str = "json/summary.json";
pub const FUNDS_JSON: &str = "json/funds.json";
pub const REVENUE_JSON: &str = "json/revenue_by_source.json";
pub const AGENCY_JSON: &str = "json/expenditure_by_agency.json";
pub const FUNCTION_JSON: &str = "json/expenditure_by_function.json";

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Pretty JSON with non-ASCII kept as-is and a trailing newline.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

/// Write rows with a header line. Returns false (and writes nothing) for an
/// empty slice.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<bool> {
    if rows.is_empty() {
        return Ok(false);
    }
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(true)
}

pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

/// Like [`read_csv`], but a missing file reads as no rows.
pub fn read_csv_or_empty<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "file not found, treating as empty");
        return Ok(Vec::new());
    }
    read_csv(path)
}

// ---------------------------------------------------------------------------
// Extract outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub generated_at: String,
    pub source_dir: String,
    pub sources: &'a [SourceFile],
    pub skipped: &'a [SkippedFile],
    pub missing_years: &'a [i32],
}

/// Write the unified CSVs, per-kind JSON and the source manifest. Returns
/// the paths written.
pub fn write_extract_outputs(report: &ExtractReport, source_dir: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let csvs: [(&str, bool); 3] = [
        (BUDGET_CSV, write_csv(&output_dir.join(BUDGET_CSV), &report.budget_rows)?),
        (FUNDS_CSV, write_csv(&output_dir.join(FUNDS_CSV), &report.fund_rows)?),
        (SUMMARY_CSV, write_csv(&output_dir.join(SUMMARY_CSV), &report.summary_rows)?),
    ];
    for (rel, wrote) in csvs {
        if wrote {
            written.push(output_dir.join(rel));
        } else {
            info!(file = rel, "no rows, not written");
        }
    }

    let documents: [(&str, serde_json::Value); 5] = [
        (SUMMARY_JSON, serde_json::to_value(&report.summaries)?),
        (FUNDS_JSON, serde_json::to_value(&report.funds)?),
        (REVENUE_JSON, serde_json::to_value(&report.revenue_by_source)?),
        (AGENCY_JSON, serde_json::to_value(&report.expenditure_by_agency)?),
        (FUNCTION_JSON, serde_json::to_value(&report.expenditure_by_function)?),
    ];
    for (rel, value) in documents {
        let path = output_dir.join(rel);
        write_json(&path, &value)?;
        written.push(path);
    }

    let manifest = Manifest {
        generated_at: Utc::now().to_rfc3339(),
        source_dir: source_dir.display().to_string(),
        sources: &report.sources,
        skipped: &report.skipped,
        missing_years: &report.missing_years,
    };
    let path = output_dir.join(MANIFEST_JSON);
    write_json(&path, &manifest)?;
    written.push(path);

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetRow, Flow, FundRow, FundType};

    fn budget_row(amount: i64) -> BudgetRow {
        BudgetRow {
            year: 2024,
            flow: Flow::Revenue,
            category_1: "稅課收入".to_string(),
            category_2: "所得稅".to_string(),
            item_name: String::new(),
            account_name: String::new(),
            amount,
            source_file: "a.xls".to_string(),
        }
    }

    #[test]
    fn test_write_json_keeps_chinese_and_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.json");
        write_json(&path, &serde_json::json!({"name": "稅課收入"})).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\n  \"name\": \"稅課收入\"\n}\n");
    }

    #[test]
    fn test_write_csv_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        let rows: Vec<BudgetRow> = Vec::new();
        assert!(!write_csv(&path, &rows).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_csv_header_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unified").join("budget_all.csv");
        assert!(write_csv(&path, &[budget_row(100), budget_row(-5)]).unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(
            "year,type,category_1,category_2,item_name,account_name,amount,source_file\n"
        ));
        assert!(content.contains("2024,Revenue,稅課收入,所得稅,,,100,a.xls"));
        let rows: Vec<BudgetRow> = read_csv(&path).unwrap();
        assert_eq!(rows, vec![budget_row(100), budget_row(-5)]);
    }

    #[test]
    fn test_fund_type_serializes_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("funds.csv");
        let row = FundRow {
            year: 2024,
            fund_name: "國軍生產及服務作業基金".to_string(),
            fund_type: FundType::SpecialIncome,
            income: 10,
            expense: 4,
            surplus: 6,
            source_file: "f.xls".to_string(),
        };
        write_csv(&path, &[row.clone()]).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("special income"));
        let rows: Vec<FundRow> = read_csv(&path).unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_read_csv_or_empty_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<BudgetRow> = read_csv_or_empty(&dir.path().join("missing.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_write_extract_outputs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let report = ExtractReport {
            budget_rows: vec![budget_row(100)],
            ..ExtractReport::default()
        };
        let written = write_extract_outputs(&report, Path::new("src"), dir.path()).unwrap();
        assert!(dir.path().join(BUDGET_CSV).exists());
        assert!(!dir.path().join(FUNDS_CSV).exists());
        assert!(dir.path().join(SUMMARY_JSON).exists());
        assert!(written.contains(&dir.path().join(MANIFEST_JSON)));
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(MANIFEST_JSON)).unwrap()).unwrap();
        assert_eq!(manifest["source_dir"], "src");
        assert!(manifest["generated_at"].as_str().is_some());
        assert!(dir.path().join(AGENCY_JSON).exists());
        assert_eq!(written.len(), 7);
    }
}
