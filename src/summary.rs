use crate::categorizer::CategoryMap;
use crate::cells::{clean_number, clean_str, roc_to_ad};
use crate::error::{FiscalError, Result};
use crate::grid::Grid;
use crate::header::{find_column_in_row, find_header_row, HeaderPolicy};
use crate::models::{CategoryAmount, Flow, SummaryRow, SummaryYear};

pub const HEADER_KEYWORDS: &[&str] = &["項目", "科目", "預算數", "本年度"];
const NAME_KEYWORDS: &[&str] = &["項目", "科目"];
const AMOUNT_KEYWORDS: &[&str] = &["預算數", "預算案數", "本年度"];
const SKIP_MARKERS: &[&str] = &["合計", "總計", "餘絀"];

/// Rows and bucketed totals of one 歲入歲出簡明比較分析表.
#[derive(Debug, Clone, PartialEq)]
pub struct SummarySheet {
    pub rows: Vec<SummaryRow>,
    pub year: SummaryYear,
}

pub fn extract(
    grid: &Grid,
    roc_year: i32,
    policy: &HeaderPolicy,
    map: &CategoryMap,
    source: &str,
) -> Result<SummarySheet> {
    let header_row = find_header_row(grid, HEADER_KEYWORDS, policy)
        .ok_or_else(|| FiscalError::NoHeader(source.to_string()))?;
    let header = grid.row(header_row);
    let name_col = find_column_in_row(header, NAME_KEYWORDS).unwrap_or(0);
    let amount_col = find_column_in_row(header, AMOUNT_KEYWORDS).unwrap_or(1);

    let year = roc_to_ad(roc_year);
    let mut rows = Vec::new();
    let mut revenue_total = None;
    let mut expenditure_total = None;
    let mut revenue_categories: Vec<CategoryAmount> = Vec::new();
    let mut expenditure_categories: Vec<CategoryAmount> = Vec::new();
    let mut section = Flow::Revenue;

    for row_idx in header_row + 1..grid.len() {
        let name = clean_str(grid.cell(row_idx, name_col));
        if name.is_empty() {
            continue;
        }
        let amount = clean_number(grid.cell(row_idx, amount_col));

        if name.contains("歲入合計") {
            revenue_total = Some(amount);
        } else if name.contains("歲出合計") {
            expenditure_total = Some(amount);
        }
        // Section headings switch the flow and are not categories themselves.
        let heading = if name.contains("歲出") {
            section = Flow::Expenditure;
            true
        } else if name.contains("歲入") {
            section = Flow::Revenue;
            true
        } else {
            false
        };
        if heading || SKIP_MARKERS.iter().any(|m| name.contains(m)) {
            continue;
        }

        let flow = if name.contains("支出") { Flow::Expenditure } else { section };
        if amount != 0 {
            rows.push(SummaryRow {
                year,
                flow,
                category: name.clone(),
                amount,
                source_file: source.to_string(),
            });
        }

        if let Some(rule) = map.bucket(&name) {
            let target = match rule.flow {
                Flow::Revenue => &mut revenue_categories,
                Flow::Expenditure => &mut expenditure_categories,
            };
            // Subtotal rows repeat a bucket; keep the first occurrence.
            if !target.iter().any(|c| c.name == rule.display_name()) {
                target.push(CategoryAmount {
                    name: rule.display_name().to_string(),
                    amount,
                });
            }
        }
    }

    let revenue = revenue_total.unwrap_or_else(|| revenue_categories.iter().map(|c| c.amount).sum());
    let expenditure =
        expenditure_total.unwrap_or_else(|| expenditure_categories.iter().map(|c| c.amount).sum());

    Ok(SummarySheet {
        rows,
        year: SummaryYear {
            year,
            revenue,
            expenditure,
            revenue_categories,
            expenditure_categories,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> Grid {
        Grid::from_rows(&[
            &["中華民國114年度中央政府總預算"],
            &["歲入歲出簡明比較分析表"],
            &["項目", "本年度預算數", "上年度預算數", "比較增減"],
            &["一、歲入合計", "2,900", "2,700", "200"],
            &["稅課收入", "2,500", "2,300", "200"],
            &["營業盈餘及事業收入", "300", "300", "0"],
            &["規費收入", "60", "60", "0"],
            &["罰款及賠償收入", "40", "40", "0"],
            &["二、歲出合計", "2,800", "2,600", "200"],
            &["國防支出", "1,000", "900", "100"],
            &["社會福利支出", "1,800", "1,700", "100"],
            &["三、歲入歲出餘絀", "100", "100", "0"],
        ])
    }

    #[test]
    fn test_extract_totals_and_rows() {
        let out = extract(&sheet(), 114, &HeaderPolicy::default(), &CategoryMap::default(), "s.xlsx").unwrap();
        assert_eq!(out.year.year, 2025);
        assert_eq!(out.year.revenue, 2900);
        assert_eq!(out.year.expenditure, 2800);
        let categories: Vec<(&str, Flow, i64)> = out
            .rows
            .iter()
            .map(|r| (r.category.as_str(), r.flow, r.amount))
            .collect();
        assert_eq!(
            categories,
            vec![
                ("稅課收入", Flow::Revenue, 2500),
                ("營業盈餘及事業收入", Flow::Revenue, 300),
                ("規費收入", Flow::Revenue, 60),
                ("罰款及賠償收入", Flow::Revenue, 40),
                ("國防支出", Flow::Expenditure, 1000),
                ("社會福利支出", Flow::Expenditure, 1800),
            ]
        );
    }

    #[test]
    fn test_extract_buckets_first_occurrence() {
        let out = extract(&sheet(), 114, &HeaderPolicy::default(), &CategoryMap::default(), "s.xlsx").unwrap();
        let revenue: Vec<(&str, i64)> = out
            .year
            .revenue_categories
            .iter()
            .map(|c| (c.name.as_str(), c.amount))
            .collect();
        // 規費 and 罰款 share a bucket; the first row wins.
        assert_eq!(
            revenue,
            vec![("稅課收入", 2500), ("營業盈餘及事業收入", 300), ("規費及罰款收入", 60)]
        );
        assert_eq!(out.year.expenditure_categories.len(), 2);
    }

    #[test]
    fn test_missing_totals_fall_back_to_bucket_sum() {
        let grid = Grid::from_rows(&[
            &["科目", "預算數"],
            &["稅課收入", "100"],
            &["國防支出", "40"],
        ]);
        let out = extract(&grid, 100, &HeaderPolicy::default(), &CategoryMap::default(), "s.csv").unwrap();
        assert_eq!(out.year.revenue, 100);
        assert_eq!(out.year.expenditure, 40);
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let grid = Grid::from_rows(&[&["稅課收入", "100"]]);
        let err = extract(&grid, 100, &HeaderPolicy::default(), &CategoryMap::default(), "s.csv").unwrap_err();
        assert!(matches!(err, FiscalError::NoHeader(_)));
    }
}
