use serde::{Deserialize, Serialize};

/// Direction of a budget line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flow {
    #[serde(alias = "revenue")]
    Revenue,
    #[serde(alias = "expenditure")]
    Expenditure,
}

impl Flow {
    /// Expenditure labels carry `支出`; everything else is revenue.
    pub fn classify(label: &str) -> Self {
        if label.contains("支出") {
            Self::Expenditure
        } else {
            Self::Revenue
        }
    }

    /// Lowercase key used by the category map and site JSON.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Expenditure => "expenditure",
        }
    }
}

/// The four budget classification levels, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Level {
    /// 款
    Kuan,
    /// 項
    Xiang,
    /// 目
    Mu,
    /// 節
    Jie,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Kuan, Level::Xiang, Level::Mu, Level::Jie];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Self::Kuan => "款",
            Self::Xiang => "項",
            Self::Mu => "目",
            Self::Jie => "節",
        }
    }
}

/// One classified row of a hierarchical budget sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct FiscalRecord {
    /// AD year.
    pub year: i32,
    pub level: Level,
    /// Code path from the top level down to `level`.
    pub codes: Vec<String>,
    /// Carried-forward names of every level slot, empty when unset.
    pub lineage: [String; 4],
    pub name: String,
    pub amount: i64,
    /// Grand-total rows at the top level (合計 / 總計).
    pub is_total: bool,
}

// ---------------------------------------------------------------------------
// Unified CSV rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRow {
    pub year: i32,
    #[serde(rename = "type")]
    pub flow: Flow,
    pub category_1: String,
    pub category_2: String,
    pub item_name: String,
    pub account_name: String,
    pub amount: i64,
    pub source_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRow {
    pub year: i32,
    pub fund_name: String,
    pub fund_type: FundType,
    pub income: i64,
    pub expense: i64,
    pub surplus: i64,
    pub source_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub year: i32,
    #[serde(rename = "type")]
    pub flow: Flow,
    pub category: String,
    pub amount: i64,
    pub source_file: String,
}

// ---------------------------------------------------------------------------
// Per-year JSON documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAmount {
    pub name: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryYear {
    pub year: i32,
    pub revenue: i64,
    pub expenditure: i64,
    pub revenue_categories: Vec<CategoryAmount>,
    pub expenditure_categories: Vec<CategoryAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundType {
    #[serde(rename = "business")]
    Business,
    #[serde(rename = "operation")]
    Operation,
    #[serde(rename = "debt")]
    Debt,
    #[serde(rename = "special income")]
    SpecialIncome,
    #[serde(rename = "capital plan")]
    CapitalPlan,
    #[serde(rename = "other")]
    Other,
}

impl FundType {
    /// Name used in the CSV and JSON outputs.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Operation => "operation",
            Self::Debt => "debt",
            Self::SpecialIncome => "special income",
            Self::CapitalPlan => "capital plan",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FundTotal {
    pub revenue: i64,
    pub expenditure: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BasicFund {
    pub total: FundTotal,
    pub extra: FundTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialFundDetail {
    pub name: String,
    #[serde(rename = "type")]
    pub fund_type: FundType,
    pub revenue: i64,
    pub expenditure: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecialFund {
    pub total: FundTotal,
    pub details: Vec<SpecialFundDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundYear {
    pub year: i32,
    pub basic_fund: BasicFund,
    pub special_fund: SpecialFund,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationalItem {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub parent_id: Option<String>,
}

/// Revenue-by-source year with one list per level, linked by `parent_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationalYear {
    pub year: i32,
    pub amount: i64,
    #[serde(rename = "Kuan")]
    pub kuan: Vec<RelationalItem>,
    #[serde(rename = "Xiang")]
    pub xiang: Vec<RelationalItem>,
    #[serde(rename = "Mu")]
    pub mu: Vec<RelationalItem>,
    #[serde(rename = "Jie")]
    pub jie: Vec<RelationalItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatBudgetItem {
    pub id: String,
    pub year: i32,
    pub name: Vec<String>,
    pub amount: i64,
    pub hierarchy: [i64; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_classify() {
        assert_eq!(Flow::classify("國防支出"), Flow::Expenditure);
        assert_eq!(Flow::classify("稅課收入"), Flow::Revenue);
        assert_eq!(Flow::classify("一般政務支出"), Flow::Expenditure);
    }

    #[test]
    fn test_level_order() {
        assert!(Level::Kuan < Level::Jie);
        assert_eq!(Level::Mu.index(), 2);
        assert_eq!(Level::Xiang.marker(), "項");
    }

    #[test]
    fn test_budget_row_serializes_flow_as_type() {
        let row = BudgetRow {
            year: 2025,
            flow: Flow::Expenditure,
            category_1: "行政院".to_string(),
            category_2: String::new(),
            item_name: String::new(),
            account_name: String::new(),
            amount: 10,
            source_file: "a.xlsx".to_string(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "Expenditure");
    }

    #[test]
    fn test_fund_type_key_matches_serialized_name() {
        for fund_type in [
            FundType::Business,
            FundType::Operation,
            FundType::Debt,
            FundType::SpecialIncome,
            FundType::CapitalPlan,
            FundType::Other,
        ] {
            assert_eq!(serde_json::to_value(fund_type).unwrap(), fund_type.key());
        }
        assert_eq!(FundType::SpecialIncome.key(), "special income");
    }

    #[test]
    fn test_relational_year_uses_level_keys() {
        let year = RelationalYear {
            year: 2025,
            amount: 0,
            kuan: vec![],
            xiang: vec![],
            mu: vec![],
            jie: vec![],
        };
        let json = serde_json::to_value(&year).unwrap();
        assert!(json.get("Kuan").is_some());
        assert!(json.get("Jie").is_some());
    }
}
