//! Chart-ready views of the unified CSVs: a per-year overview bucketed by the
//! category map, special funds ranked by income, and an agency → program
//! tree of expenditure. Each view has a raw form (thousand NTD, as in the
//! sheets) and a billion form derived from it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::categorizer::{place, CategoryMap, Placement, UnmatchedPolicy, OTHER_BUCKET};
use crate::error::Result;
use crate::export::{read_csv_or_empty, write_json, BUDGET_CSV, FUNDS_CSV, SUMMARY_CSV};
use crate::models::{BudgetRow, Flow, FundRow, SummaryRow};

/// Thousand NTD → billion NTD (1 billion = 1,000,000 thousand), two decimals.
pub fn scale_billions(value: i64) -> f64 {
    (value as f64 / 1_000_000.0 * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Overview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry<T> {
    pub name: String,
    pub abbr: String,
    pub amount: T,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowOverview<T> {
    pub total: T,
    pub breakdown: BTreeMap<String, BreakdownEntry<T>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewYear<T> {
    pub year: i32,
    pub revenue: FlowOverview<T>,
    pub expenditure: FlowOverview<T>,
}

impl FlowOverview<i64> {
    fn empty(map: &CategoryMap, flow: Flow, policy: UnmatchedPolicy) -> Self {
        let mut breakdown: BTreeMap<String, BreakdownEntry<i64>> = map
            .rules_for(flow)
            .map(|rule| {
                let entry = BreakdownEntry {
                    name: rule.en.clone(),
                    abbr: rule.abbr.clone(),
                    amount: 0,
                };
                (rule.id.clone(), entry)
            })
            .collect();
        if policy == UnmatchedPolicy::Other {
            breakdown.entry(OTHER_BUCKET.to_string()).or_insert(BreakdownEntry {
                name: "Other".to_string(),
                abbr: "Other".to_string(),
                amount: 0,
            });
        }
        Self { total: 0, breakdown }
    }

    fn add(&mut self, id: &str, amount: i64) {
        if let Some(entry) = self.breakdown.get_mut(id) {
            entry.amount += amount;
            self.total += amount;
        }
    }

    pub fn to_billion(&self) -> FlowOverview<f64> {
        FlowOverview {
            total: scale_billions(self.total),
            breakdown: self
                .breakdown
                .iter()
                .map(|(id, e)| {
                    let entry = BreakdownEntry {
                        name: e.name.clone(),
                        abbr: e.abbr.clone(),
                        amount: scale_billions(e.amount),
                    };
                    (id.clone(), entry)
                })
                .collect(),
        }
    }
}

impl OverviewYear<i64> {
    pub fn to_billion(&self) -> OverviewYear<f64> {
        OverviewYear {
            year: self.year,
            revenue: self.revenue.to_billion(),
            expenditure: self.expenditure.to_billion(),
        }
    }

    fn flow_mut(&mut self, flow: Flow) -> &mut FlowOverview<i64> {
        match flow {
            Flow::Revenue => &mut self.revenue,
            Flow::Expenditure => &mut self.expenditure,
        }
    }
}

fn years_of(years: impl Iterator<Item = i32>) -> Vec<i32> {
    years.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Per-year totals and bucket breakdowns. Totals are the sum of the bucketed
/// amounts; excluded labels contribute nothing.
pub fn overview(rows: &[SummaryRow], map: &CategoryMap, policy: UnmatchedPolicy) -> Vec<OverviewYear<i64>> {
    years_of(rows.iter().map(|r| r.year))
        .into_iter()
        .map(|year| {
            let mut entry = OverviewYear {
                year,
                revenue: FlowOverview::empty(map, Flow::Revenue, policy),
                expenditure: FlowOverview::empty(map, Flow::Expenditure, policy),
            };
            for row in rows.iter().filter(|r| r.year == year) {
                match place(map, &row.category, policy) {
                    Placement::Bucket(rule) => entry.flow_mut(rule.flow).add(&rule.id, row.amount),
                    Placement::Other(flow) => entry.flow_mut(flow).add(OTHER_BUCKET, row.amount),
                    Placement::Excluded => {}
                }
            }
            entry
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Funds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundItem<T> {
    pub name: String,
    pub income: T,
    pub expense: T,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundsYear<T> {
    pub year: i32,
    pub items: Vec<FundItem<T>>,
}

impl FundsYear<i64> {
    pub fn to_billion(&self) -> FundsYear<f64> {
        FundsYear {
            year: self.year,
            items: self
                .items
                .iter()
                .map(|i| FundItem {
                    name: i.name.clone(),
                    income: scale_billions(i.income),
                    expense: scale_billions(i.expense),
                })
                .collect(),
        }
    }
}

pub fn funds_by_year(rows: &[FundRow]) -> Vec<FundsYear<i64>> {
    years_of(rows.iter().map(|r| r.year))
        .into_iter()
        .map(|year| {
            let mut items: Vec<FundItem<i64>> = rows
                .iter()
                .filter(|r| r.year == year)
                .map(|r| FundItem {
                    name: r.fund_name.clone(),
                    income: r.income,
                    expense: r.expense,
                })
                .collect();
            items.sort_by(|a, b| b.income.cmp(&a.income));
            FundsYear { year, items }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Budget tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode<T> {
    pub name: String,
    pub value: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode<T>>,
}

impl TreeNode<i64> {
    pub fn to_billion(&self) -> TreeNode<f64> {
        TreeNode {
            name: self.name.clone(),
            value: scale_billions(self.value),
            children: self.children.iter().map(|c| c.to_billion()).collect(),
        }
    }
}

/// Index of the child called `name`, appending an empty one if absent.
fn child_index(children: &mut Vec<TreeNode<i64>>, name: &str) -> usize {
    match children.iter().position(|c| c.name == name) {
        Some(idx) => idx,
        None => {
            children.push(TreeNode {
                name: name.to_string(),
                value: 0,
                children: Vec::new(),
            });
            children.len() - 1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetTreeYear<T> {
    pub year: i32,
    pub children: Vec<TreeNode<T>>,
}

impl BudgetTreeYear<i64> {
    pub fn to_billion(&self) -> BudgetTreeYear<f64> {
        BudgetTreeYear {
            year: self.year,
            children: self.children.iter().map(|c| c.to_billion()).collect(),
        }
    }
}

fn lineage(row: &BudgetRow) -> [&str; 4] {
    [
        row.category_1.as_str(),
        row.category_2.as_str(),
        row.item_name.as_str(),
        row.account_name.as_str(),
    ]
}

/// Number of lineage levels down to the deepest non-empty one.
fn depth(row: &BudgetRow) -> usize {
    lineage(row).iter().rposition(|s| !s.is_empty()).map_or(0, |i| i + 1)
}

fn is_descendant(parent: &BudgetRow, child: &BudgetRow) -> bool {
    let d = depth(parent);
    depth(child) > d && lineage(parent)[..d] == lineage(child)[..d]
}

/// Rows not followed by one of their own children. Subtotal rows (an agency
/// or program line followed by its breakdown) are dropped so that nothing is
/// counted twice.
fn leaf_rows<'a>(rows: &[&'a BudgetRow]) -> Vec<&'a BudgetRow> {
    rows.iter()
        .enumerate()
        .filter(|(i, row)| rows.get(i + 1).map_or(true, |next| !is_descendant(row, next)))
        .map(|(_, row)| *row)
        .collect()
}

/// Expenditure rows grouped agency → program, in first-seen order.
pub fn budget_tree(rows: &[BudgetRow]) -> Vec<BudgetTreeYear<i64>> {
    years_of(rows.iter().map(|r| r.year))
        .into_iter()
        .map(|year| {
            let year_rows: Vec<&BudgetRow> = rows
                .iter()
                .filter(|r| r.year == year && r.flow == Flow::Expenditure && r.amount != 0)
                .collect();
            let mut agencies: Vec<TreeNode<i64>> = Vec::new();
            for row in leaf_rows(&year_rows) {
                let agency = if row.category_1.is_empty() { "Unknown" } else { row.category_1.as_str() };
                let program = if row.item_name.is_empty() { "General" } else { row.item_name.as_str() };

                let a = child_index(&mut agencies, agency);
                let node = &mut agencies[a];
                node.value += row.amount;
                let p = child_index(&mut node.children, program);
                node.children[p].value += row.amount;
            }
            BudgetTreeYear {
                year,
                children: agencies,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSummary {
    pub summary_rows: usize,
    pub fund_rows: usize,
    pub budget_rows: usize,
    pub years: Vec<i32>,
    /// (year, revenue total, expenditure total) from the overview.
    pub totals: Vec<(i32, i64, i64)>,
    pub written: Vec<PathBuf>,
}

/// Read the unified CSVs under `output_dir` and write `site/raw` and
/// `site/billion`.
pub fn aggregate(output_dir: &Path, map: &CategoryMap, policy: UnmatchedPolicy) -> Result<AggregateSummary> {
    let summary_rows: Vec<SummaryRow> = read_csv_or_empty(&output_dir.join(SUMMARY_CSV))?;
    let fund_rows: Vec<FundRow> = read_csv_or_empty(&output_dir.join(FUNDS_CSV))?;
    let budget_rows: Vec<BudgetRow> = read_csv_or_empty(&output_dir.join(BUDGET_CSV))?;

    let overview_raw = overview(&summary_rows, map, policy);
    let funds_raw = funds_by_year(&fund_rows);
    let budget_raw = budget_tree(&budget_rows);

    let overview_bil: Vec<_> = overview_raw.iter().map(|y| y.to_billion()).collect();
    let funds_bil: Vec<_> = funds_raw.iter().map(|y| y.to_billion()).collect();
    let budget_bil: Vec<_> = budget_raw.iter().map(|y| y.to_billion()).collect();

    let site = output_dir.join("site");
    let mut written = Vec::new();
    let mut save = |rel: &str, value: serde_json::Value| -> Result<()> {
        let path = site.join(rel);
        write_json(&path, &value)?;
        written.push(path);
        Ok(())
    };
    save("raw/overview.json", serde_json::to_value(&overview_raw)?)?;
    save("billion/overview.json", serde_json::to_value(&overview_bil)?)?;
    save("raw/funds.json", serde_json::to_value(&funds_raw)?)?;
    save("billion/funds.json", serde_json::to_value(&funds_bil)?)?;
    save("raw/budget_detail.json", serde_json::to_value(&budget_raw)?)?;
    save("billion/budget_detail.json", serde_json::to_value(&budget_bil)?)?;

    let years = years_of(
        summary_rows
            .iter()
            .map(|r| r.year)
            .chain(fund_rows.iter().map(|r| r.year))
            .chain(budget_rows.iter().map(|r| r.year)),
    );
    info!(years = years.len(), files = written.len(), "aggregation finished");
    let totals = overview_raw
        .iter()
        .map(|y| (y.year, y.revenue.total, y.expenditure.total))
        .collect();

    Ok(AggregateSummary {
        summary_rows: summary_rows.len(),
        fund_rows: fund_rows.len(),
        budget_rows: budget_rows.len(),
        years,
        totals,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FundType;

    fn summary(year: i32, flow: Flow, category: &str, amount: i64) -> SummaryRow {
        SummaryRow {
            year,
            flow,
            category: category.to_string(),
            amount,
            source_file: "s.xls".to_string(),
        }
    }

    fn budget(year: i32, flow: Flow, agency: &str, program: &str, amount: i64) -> BudgetRow {
        BudgetRow {
            year,
            flow,
            category_1: agency.to_string(),
            category_2: String::new(),
            item_name: program.to_string(),
            account_name: String::new(),
            amount,
            source_file: "b.xls".to_string(),
        }
    }

    fn fund(year: i32, name: &str, income: i64) -> FundRow {
        FundRow {
            year,
            fund_name: name.to_string(),
            fund_type: FundType::Business,
            income,
            expense: 1,
            surplus: income - 1,
            source_file: "f.xls".to_string(),
        }
    }

    #[test]
    fn test_scale_billions() {
        assert_eq!(scale_billions(2_345_678), 2.35);
        assert_eq!(scale_billions(0), 0.0);
        assert_eq!(scale_billions(-1_500_000), -1.5);
        assert_eq!(scale_billions(1_000_000_000), 1000.0);
    }

    #[test]
    fn test_overview_buckets_and_preinitialises() {
        let rows = vec![
            summary(2025, Flow::Revenue, "稅課收入", 2_000_000),
            summary(2025, Flow::Revenue, "規費收入", 100_000),
            summary(2025, Flow::Revenue, "罰款及賠償收入", 50_000),
            summary(2025, Flow::Revenue, "捐獻收入", 7),
            summary(2025, Flow::Expenditure, "國防支出", 400_000),
            summary(2024, Flow::Revenue, "稅課收入", 1),
        ];
        let out = overview(&rows, &CategoryMap::default(), UnmatchedPolicy::Exclude);
        assert_eq!(out.iter().map(|y| y.year).collect::<Vec<_>>(), vec![2024, 2025]);
        let y = &out[1];
        assert_eq!(y.revenue.total, 2_150_000);
        assert_eq!(y.revenue.breakdown["fees"].amount, 150_000);
        assert_eq!(y.revenue.breakdown["fees"].name, "Fees and Fines");
        assert_eq!(y.revenue.breakdown["property"].amount, 0);
        assert!(!y.revenue.breakdown.contains_key(OTHER_BUCKET));
        assert_eq!(y.expenditure.total, 400_000);
        assert_eq!(y.expenditure.breakdown.len(), 9);
    }

    #[test]
    fn test_overview_other_policy() {
        let rows = vec![
            summary(2025, Flow::Revenue, "捐獻收入", 7),
            summary(2025, Flow::Expenditure, "災害準備金支出", 3),
        ];
        let out = overview(&rows, &CategoryMap::default(), UnmatchedPolicy::Other);
        assert_eq!(out[0].revenue.breakdown[OTHER_BUCKET].amount, 7);
        assert_eq!(out[0].expenditure.breakdown[OTHER_BUCKET].amount, 3);
        assert_eq!(out[0].revenue.total, 7);
    }

    #[test]
    fn test_overview_billion_scale() {
        let rows = vec![summary(2025, Flow::Revenue, "稅課收入", 2_345_678)];
        let out = overview(&rows, &CategoryMap::default(), UnmatchedPolicy::Exclude);
        let bil = out[0].to_billion();
        assert_eq!(bil.revenue.total, 2.35);
        assert_eq!(bil.revenue.breakdown["tax"].amount, 2.35);
        assert_eq!(bil.revenue.breakdown["tax"].abbr, "Tax");
    }

    #[test]
    fn test_funds_sorted_by_income_desc() {
        let rows = vec![fund(2025, "A", 10), fund(2025, "B", 30), fund(2025, "C", 20), fund(2024, "D", 1)];
        let out = funds_by_year(&rows);
        assert_eq!(out[0].year, 2024);
        let names: Vec<&str> = out[1].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_budget_tree_groups_in_first_seen_order() {
        let rows = vec![
            budget(2025, Flow::Expenditure, "行政院", "一般行政", 1_000_000),
            budget(2025, Flow::Expenditure, "總統府", "", 500_000),
            budget(2025, Flow::Expenditure, "行政院", "一般行政", 2_000_000),
            budget(2025, Flow::Expenditure, "行政院", "科技發展", 250_000),
            budget(2025, Flow::Expenditure, "", "x", 5),
            budget(2025, Flow::Revenue, "稅課收入", "", 9_000_000),
            budget(2025, Flow::Expenditure, "立法院", "", 0),
        ];
        let out = budget_tree(&rows);
        assert_eq!(out.len(), 1);
        let agencies: Vec<(&str, i64)> = out[0].children.iter().map(|n| (n.name.as_str(), n.value)).collect();
        assert_eq!(agencies, vec![("行政院", 3_250_000), ("總統府", 500_000), ("Unknown", 5)]);
        let programs: Vec<(&str, i64)> = out[0].children[0]
            .children
            .iter()
            .map(|n| (n.name.as_str(), n.value))
            .collect();
        assert_eq!(programs, vec![("一般行政", 3_000_000), ("科技發展", 250_000)]);
        assert_eq!(out[0].children[1].children[0].name, "General");
    }

    fn detail(agency: &str, unit: &str, program: &str, amount: i64) -> BudgetRow {
        BudgetRow {
            category_2: unit.to_string(),
            ..budget(2025, Flow::Expenditure, agency, program, amount)
        }
    }

    #[test]
    fn test_budget_tree_skips_subtotal_rows() {
        let rows = vec![
            detail("行政院", "", "", 1_500),
            detail("行政院", "行政院", "", 1_500),
            detail("行政院", "行政院", "一般行政", 1_000),
            detail("行政院", "行政院", "科技發展", 500),
            detail("總統府", "", "", 300),
            detail("立法院", "", "", 200),
            detail("立法院", "立法院", "", 200),
        ];
        let out = budget_tree(&rows);
        let agencies: Vec<(&str, i64, usize)> = out[0]
            .children
            .iter()
            .map(|n| (n.name.as_str(), n.value, n.children.len()))
            .collect();
        assert_eq!(agencies, vec![("行政院", 1_500, 2), ("總統府", 300, 1), ("立法院", 200, 1)]);
        assert_eq!(out[0].children[2].children[0].name, "General");
    }

    #[test]
    fn test_budget_tree_billion_from_raw() {
        let rows = vec![
            budget(2025, Flow::Expenditure, "行政院", "A", 1_004_000),
            budget(2025, Flow::Expenditure, "行政院", "B", 1_004_000),
        ];
        let bil = budget_tree(&rows)[0].to_billion();
        // Rounded from the raw sum, not summed after rounding.
        assert_eq!(bil.children[0].value, 2.01);
        assert_eq!(bil.children[0].children[0].value, 1.0);
        let json = serde_json::to_value(&bil).unwrap();
        assert!(json["children"][0]["children"][0].get("children").is_none());
    }

    #[test]
    fn test_aggregate_writes_site_files() {
        let dir = tempfile::tempdir().unwrap();
        crate::export::write_csv(
            &dir.path().join(SUMMARY_CSV),
            &[summary(2025, Flow::Revenue, "稅課收入", 1_000_000)],
        )
        .unwrap();
        let out = aggregate(dir.path(), &CategoryMap::default(), UnmatchedPolicy::Exclude).unwrap();
        assert_eq!(out.summary_rows, 1);
        assert_eq!(out.budget_rows, 0);
        assert_eq!(out.years, vec![2025]);
        assert_eq!(out.written.len(), 6);
        let content = std::fs::read_to_string(dir.path().join("site/billion/overview.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json[0]["revenue"]["total"], 1.0);
        let funds = std::fs::read_to_string(dir.path().join("site/raw/funds.json")).unwrap();
        assert_eq!(funds, "[]\n");
    }
}
