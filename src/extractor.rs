use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::categorizer::CategoryMap;
use crate::cells::roc_to_ad;
use crate::error::{FiscalError, Result};
use crate::funds::{self, FundSheet};
use crate::grid::{self, Grid};
use crate::header::HeaderPolicy;
use crate::hierarchy::{self, HierarchyLayout};
use crate::models::{
    BudgetRow, FiscalRecord, FlatBudgetItem, Flow, FundRow, FundYear, RelationalYear, SummaryRow, SummaryYear,
};
use crate::settings::{shellexpand_path, Settings};
use crate::summary::{self, SummarySheet};

/// Rows scanned for content-based detection.
const DETECT_ROWS: usize = 20;
const AGENCY_NAMES: &[&str] = &["總統府", "行政院", "立法院", "司法院", "考試院", "監察院"];
const REVENUE_NAMES: &[&str] = &["稅課收入", "罰款及賠償收入", "規費收入"];

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn has_all(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().all(|k| text.contains(k))
}

fn has_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Numeric subdirectories of `source`, sorted by ROC year.
pub fn year_dirs(source: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let mut years = Vec::new();
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(year) = entry.file_name().to_string_lossy().parse::<i32>() {
            years.push((year, entry.path()));
        }
    }
    years.sort();
    Ok(years)
}

/// Workbooks in a year directory, sorted by name. Office lock files
/// (`~$...`) and hidden files are ignored.
pub fn list_workbooks(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let name = file_name(&path);
        if !path.is_file() || name.starts_with('~') || name.starts_with('.') {
            continue;
        }
        if grid::is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Extractor kinds, declared in detection priority order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    Funds,
    Summary,
    RevenueBySource,
    ExpenditureByAgency,
    ExpenditureByFunction,
}

impl ExtractorKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Funds => "funds",
            Self::Summary => "summary",
            Self::RevenueBySource => "revenue_by_source",
            Self::ExpenditureByAgency => "expenditure_by_agency",
            Self::ExpenditureByFunction => "expenditure_by_function",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Funds => "基金別預算分析表",
            Self::Summary => "歲入歲出簡明比較分析表",
            Self::RevenueBySource => "歲入來源別預算表",
            Self::ExpenditureByAgency => "歲出機關別預算表",
            Self::ExpenditureByFunction => "歲出政事別預算表",
        }
    }

    /// Flow of the hierarchical kinds.
    pub fn flow(&self) -> Option<Flow> {
        match self {
            Self::RevenueBySource => Some(Flow::Revenue),
            Self::ExpenditureByAgency | Self::ExpenditureByFunction => Some(Flow::Expenditure),
            Self::Funds | Self::Summary => None,
        }
    }

    pub fn matches_filename(&self, name: &str) -> bool {
        match self {
            Self::Funds => name.contains("基金") && has_any(name, &["分析", "基金別"]),
            Self::Summary => name.contains("簡明比較"),
            Self::RevenueBySource => {
                (has_all(name, &["歲入", "來源"]) || has_all(name, &["來源", "科目"])) && !name.contains("分析")
            }
            Self::ExpenditureByFunction => has_all(name, &["歲出", "政事"]) && !name.contains("分析"),
            Self::ExpenditureByAgency => has_any(name, &["歲出機關別", "機關別預算表"]),
        }
    }

    pub fn matches_content(&self, head: &str) -> bool {
        match self {
            Self::Funds => head.contains("基金別預算分析表"),
            Self::Summary => head.contains("簡明比較") || has_all(head, &["歲入合計", "歲出合計"]),
            Self::RevenueBySource => has_all(head, &["來源", "歲入"]),
            Self::ExpenditureByFunction => has_all(head, &["政事別", "歲出"]),
            Self::ExpenditureByAgency => has_all(head, &["機關", "歲出"]),
        }
    }

    /// Last resort for untitled sheets: recognisable data labels next to a
    /// 款 column and a 本年度預算數 column.
    fn matches_data(&self, head: &str) -> bool {
        let hierarchical = has_all(head, &["款", "本年度預算數"]);
        match self {
            Self::ExpenditureByAgency => hierarchical && has_any(head, AGENCY_NAMES),
            Self::RevenueBySource => hierarchical && has_any(head, REVENUE_NAMES),
            _ => false,
        }
    }

    pub fn extract(&self, grid: &Grid, roc_year: i32, opts: &ExtractOptions, source: &str) -> Result<Extracted> {
        match self {
            Self::Funds => funds::extract(grid, roc_year, &opts.policy, source).map(Extracted::Funds),
            Self::Summary => {
                summary::extract(grid, roc_year, &opts.policy, &opts.category_map, source).map(Extracted::Summary)
            }
            Self::RevenueBySource | Self::ExpenditureByAgency | Self::ExpenditureByFunction => {
                let layout = HierarchyLayout::resolve(grid, &opts.policy, source)?;
                Ok(Extracted::Hierarchy(hierarchy::walk(grid, &layout, roc_year)))
            }
        }
    }
}

pub const ALL_EXTRACTORS: &[ExtractorKind] = &[
    ExtractorKind::Funds,
    ExtractorKind::Summary,
    ExtractorKind::RevenueBySource,
    ExtractorKind::ExpenditureByAgency,
    ExtractorKind::ExpenditureByFunction,
];

/// Content checks run function before agency so that 政事別 sheets, which
/// also mention 機關, are not claimed by the agency extractor.
const CONTENT_ORDER: &[ExtractorKind] = &[
    ExtractorKind::Funds,
    ExtractorKind::Summary,
    ExtractorKind::ExpenditureByFunction,
    ExtractorKind::ExpenditureByAgency,
    ExtractorKind::RevenueBySource,
];

pub fn get_by_key(key: &str) -> Option<ExtractorKind> {
    ALL_EXTRACTORS.iter().find(|k| k.key() == key).copied()
}

/// Classify a workbook by file name, then title rows, then data labels.
pub fn detect(filename: &str, grid: &Grid) -> Option<ExtractorKind> {
    if let Some(kind) = ALL_EXTRACTORS.iter().find(|k| k.matches_filename(filename)) {
        return Some(*kind);
    }
    let head = grid.head_text(DETECT_ROWS);
    if let Some(kind) = CONTENT_ORDER.iter().find(|k| k.matches_content(&head)) {
        return Some(*kind);
    }
    ALL_EXTRACTORS.iter().find(|k| k.matches_data(&head)).copied()
}

// ---------------------------------------------------------------------------
// Options and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub source_dir: PathBuf,
    pub years: RangeInclusive<i32>,
    pub policy: HeaderPolicy,
    pub code_widths: [usize; 4],
    pub category_map: CategoryMap,
}

impl ExtractOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let map_path = settings.category_map.as_deref().map(|p| PathBuf::from(shellexpand_path(p)));
        Ok(Self {
            source_dir: PathBuf::from(shellexpand_path(&settings.source_dir)),
            years: settings.first_year..=settings.last_year,
            policy: settings.header_policy(),
            code_widths: settings.code_widths,
            category_map: CategoryMap::load_or_default(map_path.as_deref())?,
        })
    }
}

/// Output of one extractor run over one sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Hierarchy(Vec<FiscalRecord>),
    Summary(SummarySheet),
    Funds(FundSheet),
}

impl Extracted {
    pub fn record_count(&self) -> usize {
        match self {
            Self::Hierarchy(records) => records.len(),
            Self::Summary(sheet) => sheet.rows.len(),
            Self::Funds(sheet) => sheet.rows.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFile {
    pub year: i32,
    pub roc_year: i32,
    pub kind: String,
    pub file: String,
    pub sha256: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub roc_year: i32,
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
    pub budget_rows: Vec<BudgetRow>,
    pub fund_rows: Vec<FundRow>,
    pub summary_rows: Vec<SummaryRow>,
    pub summaries: Vec<SummaryYear>,
    pub funds: Vec<FundYear>,
    pub revenue_by_source: Vec<RelationalYear>,
    pub expenditure_by_agency: Vec<FlatBudgetItem>,
    pub expenditure_by_function: Vec<FlatBudgetItem>,
    pub sources: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
    pub missing_years: Vec<i32>,
}

impl ExtractReport {
    fn absorb(&mut self, kind: ExtractorKind, roc_year: i32, extracted: Extracted, source: &str, widths: &[usize; 4]) {
        match (kind, extracted) {
            (ExtractorKind::RevenueBySource, Extracted::Hierarchy(records)) => {
                self.budget_rows
                    .extend(hierarchy::to_budget_rows(&records, Flow::Revenue, source));
                self.revenue_by_source
                    .push(hierarchy::to_relational(&records, roc_to_ad(roc_year), widths));
            }
            (ExtractorKind::ExpenditureByAgency, Extracted::Hierarchy(records)) => {
                self.budget_rows
                    .extend(hierarchy::to_budget_rows(&records, Flow::Expenditure, source));
                self.expenditure_by_agency
                    .extend(hierarchy::to_flat_items(&records, widths));
            }
            (ExtractorKind::ExpenditureByFunction, Extracted::Hierarchy(records)) => {
                self.expenditure_by_function
                    .extend(hierarchy::to_flat_items(&records, widths));
            }
            (_, Extracted::Summary(sheet)) => {
                self.summary_rows.extend(sheet.rows);
                self.summaries.push(sheet.year);
            }
            (_, Extracted::Funds(sheet)) => {
                self.fund_rows.extend(sheet.rows);
                self.funds.push(sheet.year);
            }
            (kind, Extracted::Hierarchy(_)) => {
                debug!(kind = kind.key(), "hierarchy records ignored for kind");
            }
        }
    }

    fn skip(&mut self, roc_year: i32, file: &str, reason: String) {
        warn!(year = roc_year, file, %reason, "skipping file");
        self.skipped.push(SkippedFile {
            roc_year,
            file: file.to_string(),
            reason,
        });
    }
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Extract every year in `opts.years`. Only a missing source root is an
/// error; unreadable or unrecognised files are logged and skipped.
pub fn extract_all(opts: &ExtractOptions) -> Result<ExtractReport> {
    if !opts.source_dir.is_dir() {
        return Err(FiscalError::Other(format!(
            "source directory not found: {}",
            opts.source_dir.display()
        )));
    }
    let available: Vec<(i32, PathBuf)> = year_dirs(&opts.source_dir)?
        .into_iter()
        .filter(|(year, _)| opts.years.contains(year))
        .collect();

    let mut report = ExtractReport::default();
    for roc_year in opts.years.clone() {
        match available.iter().find(|(y, _)| *y == roc_year) {
            Some((_, dir)) => extract_year(opts, roc_year, dir, &mut report),
            None => {
                warn!(year = roc_year, "year directory not found");
                report.missing_years.push(roc_year);
            }
        }
    }
    info!(
        files = report.sources.len(),
        skipped = report.skipped.len(),
        "extraction finished"
    );
    Ok(report)
}

fn extract_year(opts: &ExtractOptions, roc_year: i32, dir: &Path, report: &mut ExtractReport) {
    let files = match list_workbooks(dir) {
        Ok(files) => files,
        Err(e) => {
            report.skip(roc_year, &dir.display().to_string(), e.to_string());
            return;
        }
    };

    let mut seen: HashSet<ExtractorKind> = HashSet::new();
    for path in files {
        let name = file_name(&path);
        let grid = match grid::load_grid(&path) {
            Ok(grid) => grid,
            Err(e) => {
                report.skip(roc_year, &name, e.to_string());
                continue;
            }
        };
        if grid.is_empty() {
            report.skip(roc_year, &name, "empty sheet".to_string());
            continue;
        }
        let Some(kind) = detect(&name, &grid) else {
            debug!(year = roc_year, file = %name, "unrecognised workbook");
            continue;
        };
        if !seen.insert(kind) {
            info!(year = roc_year, file = %name, kind = kind.key(), "kind already extracted for year, ignoring");
            continue;
        }

        let extracted = match kind.extract(&grid, roc_year, opts, &name) {
            Ok(extracted) => extracted,
            Err(e) => {
                report.skip(roc_year, &name, e.to_string());
                continue;
            }
        };
        let sha256 = match compute_checksum(&path) {
            Ok(sum) => sum,
            Err(e) => {
                report.skip(roc_year, &name, e.to_string());
                continue;
            }
        };
        let records = extracted.record_count();
        info!(year = roc_year, file = %name, kind = kind.key(), records, "extracted");
        report.absorb(kind, roc_year, extracted, &name, &opts.code_widths);
        report.sources.push(SourceFile {
            year: roc_to_ad(roc_year),
            roc_year,
            kind: kind.key().to_string(),
            file: name,
            sha256,
            records,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(source: &Path) -> ExtractOptions {
        ExtractOptions {
            source_dir: source.to_path_buf(),
            years: 112..=113,
            policy: HeaderPolicy::default(),
            code_widths: hierarchy::DEFAULT_CODE_WIDTHS,
            category_map: CategoryMap::default(),
        }
    }

    const REVENUE_CSV: &str = "中央政府總預算\n\
        款,項,目,節,科目名稱,本年度預算數\n\
        1,,,,稅課收入,\"2,500\"\n\
        ,1,,,所得稅,\"1,500\"\n\
        ,2,,,貨物稅,\"1,000\"\n";

    const SUMMARY_CSV: &str = "歲入歲出簡明比較分析表\n\
        項目,本年度預算數\n\
        歲入合計,2500\n\
        稅課收入,2500\n\
        歲出合計,900\n\
        國防支出,900\n";

    #[test]
    fn test_get_by_key() {
        assert_eq!(get_by_key("funds"), Some(ExtractorKind::Funds));
        assert_eq!(get_by_key("revenue_by_source"), Some(ExtractorKind::RevenueBySource));
        assert_eq!(get_by_key("nope"), None);
        for kind in ALL_EXTRACTORS {
            assert_eq!(get_by_key(kind.key()), Some(*kind));
        }
    }

    #[test]
    fn test_detect_by_filename() {
        let empty = Grid::default();
        assert_eq!(detect("113基金別預算分析表.xls", &empty), Some(ExtractorKind::Funds));
        assert_eq!(detect("歲入歲出簡明比較分析表.xlsx", &empty), Some(ExtractorKind::Summary));
        assert_eq!(detect("歲入來源別預算表.xls", &empty), Some(ExtractorKind::RevenueBySource));
        assert_eq!(detect("歲出政事別預算表.xls", &empty), Some(ExtractorKind::ExpenditureByFunction));
        assert_eq!(detect("歲出機關別預算表.xls", &empty), Some(ExtractorKind::ExpenditureByAgency));
        assert_eq!(detect("歲入來源別分析表.xls", &empty), None);
    }

    #[test]
    fn test_detect_by_content() {
        let grid = Grid::from_rows(&[&["中央政府總預算"], &["歲出機關別預算表"], &["款", "項"]]);
        assert_eq!(detect("table3.xls", &grid), Some(ExtractorKind::ExpenditureByAgency));
        let grid = Grid::from_rows(&[&["歲出政事別預算表"], &["主管機關"]]);
        assert_eq!(detect("t.xls", &grid), Some(ExtractorKind::ExpenditureByFunction));
        let grid = Grid::from_rows(&[&["項目", "預算數"], &["歲入合計", "1"], &["歲出合計", "1"]]);
        assert_eq!(detect("t.xls", &grid), Some(ExtractorKind::Summary));
    }

    #[test]
    fn test_detect_by_data_labels() {
        let grid = Grid::from_rows(&[
            &["款", "項", "名稱", "本年度預算數"],
            &["1", "", "總統府", "100"],
        ]);
        assert_eq!(detect("sheet1.xls", &grid), Some(ExtractorKind::ExpenditureByAgency));
        let grid = Grid::from_rows(&[
            &["款", "項", "名稱", "本年度預算數"],
            &["1", "", "規費收入", "100"],
        ]);
        assert_eq!(detect("sheet1.xls", &grid), Some(ExtractorKind::RevenueBySource));
        let grid = Grid::from_rows(&[&["名稱", "金額"], &["總統府", "100"]]);
        assert_eq!(detect("sheet1.xls", &grid), None);
    }

    #[test]
    fn test_flow_of_kinds() {
        assert_eq!(ExtractorKind::RevenueBySource.flow(), Some(Flow::Revenue));
        assert_eq!(ExtractorKind::ExpenditureByFunction.flow(), Some(Flow::Expenditure));
        assert_eq!(ExtractorKind::Funds.flow(), None);
    }

    #[test]
    fn test_compute_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        std::fs::write(&path, "abc").unwrap();
        assert_eq!(
            compute_checksum(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_list_workbooks_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv", "~$a.xlsx", "notes.txt", ".hidden.csv"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.csv")).unwrap();
        let names: Vec<String> = list_workbooks(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_year_dirs_ignores_non_numeric() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["113", "97", "archive"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("100"), "file, not dir").unwrap();
        let years: Vec<i32> = year_dirs(dir.path()).unwrap().iter().map(|(y, _)| *y).collect();
        assert_eq!(years, vec![97, 113]);
    }

    #[test]
    fn test_extract_all_collects_outputs_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let year = dir.path().join("113");
        std::fs::create_dir(&year).unwrap();
        std::fs::write(year.join("01歲入來源別預算表.csv"), REVENUE_CSV).unwrap();
        std::fs::write(year.join("02歲入來源別預算表.csv"), REVENUE_CSV).unwrap();
        std::fs::write(year.join("03簡明比較分析表.csv"), SUMMARY_CSV).unwrap();
        std::fs::write(year.join("04歲出機關別預算表.csv"), "no header here\n1,2\n").unwrap();
        std::fs::write(year.join("05readme.csv"), "hello\n").unwrap();
        std::fs::write(year.join("06歲出政事別預算表.csv"), "").unwrap();

        let report = extract_all(&options(dir.path())).unwrap();
        assert_eq!(report.missing_years, vec![112]);
        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.sources[0].file, "01歲入來源別預算表.csv");
        assert_eq!(report.sources[0].records, 3);
        assert_eq!(report.sources[0].year, 2024);
        assert_eq!(report.sources[1].kind, "summary");
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].file, "04歲出機關別預算表.csv");
        assert_eq!(report.skipped[1].file, "06歲出政事別預算表.csv");
        assert_eq!(report.skipped[1].reason, "empty sheet");
        assert!(report.expenditure_by_function.is_empty());
        assert!(report.expenditure_by_agency.is_empty());

        assert_eq!(report.budget_rows.len(), 3);
        assert!(report.budget_rows.iter().all(|r| r.flow == Flow::Revenue));
        assert_eq!(report.revenue_by_source.len(), 1);
        assert_eq!(report.revenue_by_source[0].amount, 2500);
        assert_eq!(report.summaries[0].revenue, 2500);
        assert_eq!(report.summary_rows.len(), 2);
    }

    #[test]
    fn test_extract_all_requires_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let opts = options(&dir.path().join("missing"));
        assert!(matches!(extract_all(&opts), Err(FiscalError::Other(_))));
    }
}
