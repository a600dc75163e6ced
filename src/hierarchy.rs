//! Walks a hierarchical budget sheet (款/項/目/節) into [`FiscalRecord`]s.
//!
//! Each data row carries up to four level markers. The deepest non-empty
//! marker is the row's level; setting a level clears every deeper slot of the
//! running [`HierarchyState`], so later rows inherit their ancestors' codes
//! and names until a new parent shows up.

use crate::cells::{clean_number, clean_str, code_to_int, extract_code_name, pad_code, roc_to_ad, strip_code_prefix};
use crate::error::{FiscalError, Result};
use crate::grid::Grid;
use crate::header::{find_column_index, find_column_in_row, find_header_row, HeaderPolicy};
use crate::models::{BudgetRow, FiscalRecord, FlatBudgetItem, Flow, Level, RelationalItem, RelationalYear};

pub const HEADER_KEYWORDS: &[&str] = &["款", "項", "目", "節", "預算", "名稱", "本年度", "科目"];
const NAME_KEYWORDS: &[&str] = &["名稱"];
const AMOUNT_KEYWORDS: &[&str] = &["本年度預算數", "預算案數", "預算數"];
const TOTAL_MARKERS: &[&str] = &["合計", "總計"];

/// Default id widths for the four code segments (2-2-2-4).
pub const DEFAULT_CODE_WIDTHS: [usize; 4] = [2, 2, 2, 4];

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
struct Slot {
    code: String,
    name: String,
}

/// Last-seen code and name per level for the file being walked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HierarchyState {
    slots: [Slot; 4],
}

impl HierarchyState {
    /// Set `level` and clear every deeper level.
    pub fn set(&mut self, level: Level, code: &str, name: &str) {
        let idx = level.index();
        self.slots[idx] = Slot {
            code: code.to_string(),
            name: name.to_string(),
        };
        for slot in &mut self.slots[idx + 1..] {
            *slot = Slot::default();
        }
    }

    /// Record an enclosing marker seen on a deeper row. A new code starts a
    /// new parent (clearing deeper levels); the same code only refreshes the
    /// name when the marker carries one.
    fn enter(&mut self, level: Level, code: &str, name: &str) {
        let idx = level.index();
        if self.slots[idx].code != code {
            self.set(level, code, name);
        } else if !name.is_empty() {
            self.slots[idx].name = name.to_string();
        }
    }

    pub fn codes(&self) -> [String; 4] {
        self.slots.clone().map(|s| s.code)
    }

    pub fn names(&self) -> [String; 4] {
        self.slots.clone().map(|s| s.name)
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Column positions of a hierarchical sheet and the first data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyLayout {
    pub header_row: usize,
    pub markers: [Option<usize>; 4],
    pub name: Option<usize>,
    pub amount: usize,
    pub data_start: usize,
}

impl HierarchyLayout {
    pub fn resolve(grid: &Grid, policy: &HeaderPolicy, source: &str) -> Result<Self> {
        let header_row = find_header_row(grid, HEADER_KEYWORDS, policy)
            .ok_or_else(|| FiscalError::NoHeader(source.to_string()))?;
        let region = grid.head(policy.max_scan.max(header_row + 1));
        let header = grid.row(header_row);
        let width = grid.width();

        let mut markers = [None; 4];
        for level in Level::ALL {
            markers[level.index()] = find_column_index(region, &[level.marker()]);
        }

        let name = find_column_index(region, NAME_KEYWORDS)
            .or_else(|| find_column_in_row(header, &["科目"]).filter(|c| !markers.contains(&Some(*c))))
            .or_else(|| Some(4).filter(|c| *c < width && !markers.contains(&Some(*c))));

        let amount = find_column_index(region, AMOUNT_KEYWORDS)
            .or_else(|| {
                // Two-row headers put 本年度 above the actual column labels.
                header_row
                    .checked_sub(1)
                    .and_then(|prev| find_column_in_row(grid.row(prev), &["本年度", "預算"]))
            })
            .or_else(|| name.map(|n| n + 1).filter(|c| *c < width))
            .ok_or_else(|| FiscalError::MissingColumn {
                file: source.to_string(),
                column: "amount",
            })?;

        // Positional fallback: level N sits in column N unless that column is
        // labelled with something else or already taken.
        for level in Level::ALL {
            if markers[level.index()].is_some() {
                continue;
            }
            let col = level.index();
            let label = clean_str(header.get(col).map(String::as_str).unwrap_or(""));
            let free = col < width
                && name != Some(col)
                && amount != col
                && !markers.contains(&Some(col))
                && (label.is_empty() || label == level.marker());
            if free {
                markers[level.index()] = Some(col);
            }
        }

        let mut data_start = header_row + 1;
        if grid.cell(data_start, 0).contains("單位") {
            data_start += 1;
        }

        Ok(Self {
            header_row,
            markers,
            name,
            amount,
            data_start,
        })
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// Classify every data row under the header into [`FiscalRecord`]s.
pub fn walk(grid: &Grid, layout: &HierarchyLayout, roc_year: i32) -> Vec<FiscalRecord> {
    let year = roc_to_ad(roc_year);
    let mut state = HierarchyState::default();
    let mut records = Vec::new();

    for row_idx in layout.data_start..grid.len() {
        let raw: [String; 4] = layout
            .markers
            .map(|col| col.map(|c| clean_str(grid.cell(row_idx, c))).unwrap_or_default());
        let split: [(String, String); 4] = raw.clone().map(|r| extract_code_name(&r));

        let Some(level) = Level::ALL
            .iter()
            .rev()
            .copied()
            .find(|l| !raw[l.index()].is_empty())
        else {
            continue;
        };

        // Prefer the numeric code; fall back to the whole marker text.
        let code_of = |l: Level| {
            let (code, _) = &split[l.index()];
            if code.is_empty() { raw[l.index()].clone() } else { code.clone() }
        };

        let explicit = layout
            .name
            .map(|c| strip_code_prefix(&clean_str(grid.cell(row_idx, c))))
            .unwrap_or_default();
        let attached = split[level.index()].1.clone();
        let name = if explicit.is_empty() { attached } else { explicit };

        let amount = clean_number(grid.cell(row_idx, layout.amount));

        for outer in Level::ALL.iter().take(level.index()) {
            if !raw[outer.index()].is_empty() {
                state.enter(*outer, &code_of(*outer), &split[outer.index()].1);
            }
        }
        state.set(level, &code_of(level), &name);

        if amount == 0 && name.is_empty() {
            continue;
        }

        let is_total = level == Level::Kuan && TOTAL_MARKERS.iter().any(|m| name.contains(m));
        let codes = state.codes();
        records.push(FiscalRecord {
            year,
            level,
            codes: codes[..=level.index()].to_vec(),
            lineage: state.names(),
            name,
            amount,
            is_total,
        });
    }
    records
}

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

fn full_id(codes: &[String], widths: &[usize; 4]) -> String {
    (0..4)
        .map(|i| pad_code(codes.get(i).map(String::as_str).unwrap_or(""), widths[i]))
        .collect()
}

/// Unified CSV rows: every non-total record with an amount, named by lineage.
pub fn to_budget_rows(records: &[FiscalRecord], flow: Flow, source_file: &str) -> Vec<BudgetRow> {
    records
        .iter()
        .filter(|r| !r.is_total && r.amount != 0)
        .map(|r| BudgetRow {
            year: r.year,
            flow,
            category_1: r.lineage[0].clone(),
            category_2: r.lineage[1].clone(),
            item_name: r.lineage[2].clone(),
            account_name: r.lineage[3].clone(),
            amount: r.amount,
            source_file: source_file.to_string(),
        })
        .collect()
}

/// Per-level lists linked by `parent_id`. The year amount is the sum of the
/// non-total top-level items.
pub fn to_relational(records: &[FiscalRecord], year: i32, widths: &[usize; 4]) -> RelationalYear {
    let mut out = RelationalYear {
        year,
        amount: 0,
        kuan: Vec::new(),
        xiang: Vec::new(),
        mu: Vec::new(),
        jie: Vec::new(),
    };
    let mut parents: [Option<String>; 3] = [None, None, None];

    for record in records {
        if record.is_total {
            continue;
        }
        let id = full_id(&record.codes, widths);
        let parent_id = match record.level {
            Level::Kuan => None,
            other => parents[other.index() - 1].clone(),
        };
        let item = RelationalItem {
            id: id.clone(),
            name: record.name.clone(),
            amount: record.amount,
            parent_id,
        };
        match record.level {
            Level::Kuan => out.kuan.push(item),
            Level::Xiang => out.xiang.push(item),
            Level::Mu => out.mu.push(item),
            Level::Jie => out.jie.push(item),
        }
        if record.level != Level::Jie {
            let idx = record.level.index();
            parents[idx] = Some(id);
            for deeper in &mut parents[idx + 1..] {
                *deeper = None;
            }
        }
    }

    out.amount = out.kuan.iter().map(|i| i.amount).sum();
    out
}

/// Flat items carrying the numeric code path.
pub fn to_flat_items(records: &[FiscalRecord], widths: &[usize; 4]) -> Vec<FlatBudgetItem> {
    records
        .iter()
        .map(|r| {
            let mut hierarchy = [0i64; 4];
            for (slot, code) in hierarchy.iter_mut().zip(&r.codes) {
                *slot = code_to_int(code);
            }
            FlatBudgetItem {
                id: full_id(&r.codes, widths),
                year: r.year,
                name: vec![r.name.clone()],
                amount: r.amount,
                hierarchy,
            }
        })
        .collect()
}
