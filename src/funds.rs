//! Extracts the 基金別預算分析表: general-fund totals plus one detail row per
//! special fund, grouped under the 部分 heading that precedes it.

use crate::cells::{clean_number, clean_str, roc_to_ad};
use crate::error::{FiscalError, Result};
use crate::grid::Grid;
use crate::header::{find_column_all, find_column_in_row, find_header_row, HeaderPolicy};
use crate::models::{BasicFund, FundRow, FundTotal, FundType, FundYear, SpecialFund, SpecialFundDetail};

pub const HEADER_KEYWORDS: &[&str] = &["基金名稱", "基金來源", "基金用途", "本年度", "預算數", "基金別"];
const NAME_KEYWORDS: &[&str] = &["名稱", "單位", "基金別"];
const INCOME_KEYWORDS: &[&str] = &["來源", "收入"];
const EXPENSE_KEYWORDS: &[&str] = &["用途", "支出"];
const CURRENT_KEYWORDS: &[&str] = &["預算", "本年度"];
const TOTAL_MARKERS: &[&str] = &["合計", "總計"];

/// Fund document plus the per-fund CSV rows of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct FundSheet {
    pub year: FundYear,
    pub rows: Vec<FundRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Basic,
    Special,
}

/// Column positions of a fund sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundLayout {
    pub header_row: usize,
    pub name: usize,
    pub income: usize,
    pub expense: usize,
    pub data_start: usize,
}

impl FundLayout {
    pub fn resolve(grid: &Grid, policy: &HeaderPolicy, source: &str) -> Result<Self> {
        let header_row = find_header_row(grid, HEADER_KEYWORDS, policy)
            .ok_or_else(|| FiscalError::NoHeader(source.to_string()))?;
        let header = grid.row(header_row);
        let next = grid.row(header_row + 1);

        let name = find_column_in_row(header, NAME_KEYWORDS).unwrap_or(0);
        let mut income = find_column_all(header, &[INCOME_KEYWORDS, CURRENT_KEYWORDS]);
        let mut expense = find_column_all(header, &[EXPENSE_KEYWORDS, CURRENT_KEYWORDS]);

        // Split headers carry 收入 / 支出 on the row below.
        let mut sub_header = false;
        if income.is_none() || expense.is_none() {
            if income.is_none() {
                income = find_column_all(next, &[INCOME_KEYWORDS]);
                sub_header |= income.is_some();
            }
            if expense.is_none() {
                expense = find_column_all(next, &[EXPENSE_KEYWORDS]);
                sub_header |= expense.is_some();
            }
        }

        let income = income.unwrap_or(2);
        let expense = expense.unwrap_or(3);
        // A label row under the header names the columns but holds no data.
        if !sub_header {
            let below = [grid.cell(header_row + 1, income), grid.cell(header_row + 1, expense)];
            sub_header = below.iter().any(|c| {
                let c = clean_str(c);
                INCOME_KEYWORDS.iter().chain(EXPENSE_KEYWORDS).any(|k| c.contains(k))
            });
        }

        Ok(Self {
            header_row,
            name,
            income,
            expense,
            data_start: header_row + 1 + usize::from(sub_header),
        })
    }
}

fn is_number(text: &str) -> bool {
    let text = text.replace(',', "");
    !text.is_empty() && text.parse::<f64>().is_ok()
}

/// Name of the row: a numeric code in the name column defers to the column
/// to its right.
fn row_name(grid: &Grid, row: usize, col: usize) -> String {
    let primary = clean_str(grid.cell(row, col));
    let secondary = clean_str(grid.cell(row, col + 1));
    let primary_is_code = !primary.is_empty() && primary.chars().all(|c| c.is_ascii_digit());
    if (primary_is_code || primary.is_empty()) && !secondary.is_empty() && !is_number(&secondary) {
        secondary
    } else if primary_is_code {
        String::new()
    } else {
        primary
    }
}

fn is_type_heading(name: &str) -> bool {
    name.contains("部分")
        || (name.contains("基金")
            && (name.starts_with('(') || name.starts_with('（') || name.starts_with('甲') || name.starts_with('乙')))
}

pub fn extract(grid: &Grid, roc_year: i32, policy: &HeaderPolicy, source: &str) -> Result<FundSheet> {
    let layout = FundLayout::resolve(grid, policy, source)?;
    let year = roc_to_ad(roc_year);

    let mut basic = BasicFund::default();
    let mut special = SpecialFund::default();
    let mut section = Section::None;
    let mut fund_type = FundType::Business;

    for row_idx in layout.data_start..grid.len() {
        let name = row_name(grid, row_idx, layout.name);
        if name.is_empty() || name.contains("名稱") {
            continue;
        }
        let totals = FundTotal {
            revenue: clean_number(grid.cell(row_idx, layout.income)),
            expenditure: clean_number(grid.cell(row_idx, layout.expense)),
        };

        if name.contains("普通基金") {
            section = Section::Basic;
            // Older sheets put the general-fund totals on the section row;
            // a later 總預算 row still overrides them.
            if totals != FundTotal::default() {
                basic.total = totals;
            }
            continue;
        }
        if name.contains("特種基金") {
            section = Section::Special;
            if TOTAL_MARKERS.iter().any(|m| name.contains(m)) || totals != FundTotal::default() {
                special.total = totals;
            }
            continue;
        }

        match section {
            Section::None => {}
            Section::Basic => {
                if name.contains("總預算") {
                    basic.total = totals;
                } else if name.contains("特別預算") {
                    basic.extra = totals;
                }
            }
            Section::Special => {
                if is_type_heading(&name) {
                    fund_type = FundType::guess(&name);
                    continue;
                }
                if TOTAL_MARKERS.iter().any(|m| name.contains(m)) {
                    continue;
                }
                if totals != FundTotal::default() {
                    special.details.push(SpecialFundDetail {
                        name,
                        fund_type,
                        revenue: totals.revenue,
                        expenditure: totals.expenditure,
                    });
                }
            }
        }
    }

    let rows = special
        .details
        .iter()
        .map(|d| FundRow {
            year,
            fund_name: d.name.clone(),
            fund_type: d.fund_type,
            income: d.revenue,
            expense: d.expenditure,
            surplus: d.revenue - d.expenditure,
            source_file: source.to_string(),
        })
        .collect();

    Ok(FundSheet {
        year: FundYear {
            year,
            basic_fund: basic,
            special_fund: special,
        },
        rows,
    })
}
