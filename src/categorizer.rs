use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FiscalError, Result};
use crate::models::{Flow, FundType};

/// One bucket of the category map. A label belongs to the bucket when it
/// contains any of the `zh` keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: String,
    #[serde(rename = "type")]
    pub flow: Flow,
    /// Canonical Chinese bucket name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub abbr: String,
    pub zh: Vec<String>,
}

impl CategoryRule {
    fn new(id: &str, flow: Flow, name: &str, en: &str, abbr: &str, zh: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            flow,
            name: name.to_string(),
            en: en.to_string(),
            abbr: abbr.to_string(),
            zh: zh.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn matches(&self, label: &str) -> bool {
        self.zh.iter().any(|k| !k.is_empty() && label.contains(k.as_str()))
    }

    /// Display name, falling back to the first keyword.
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            self.zh.first().map(String::as_str).unwrap_or(&self.id)
        }
    }
}

/// What to do with labels no rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    #[default]
    Exclude,
    Other,
}

pub const OTHER_BUCKET: &str = "other";

/// Ordered keyword table; the first matching rule wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMap {
    rules: Vec<CategoryRule>,
}

impl Default for CategoryMap {
    fn default() -> Self {
        use Flow::{Expenditure, Revenue};
        Self {
            rules: vec![
                CategoryRule::new("tax", Revenue, "稅課收入", "Tax Revenue", "Tax", &["稅課"]),
                CategoryRule::new(
                    "enterprise",
                    Revenue,
                    "營業盈餘及事業收入",
                    "Surplus of Public Enterprises",
                    "Ent.",
                    &["營業盈餘"],
                ),
                CategoryRule::new("fees", Revenue, "規費及罰款收入", "Fees and Fines", "Fees", &["規費", "罰款"]),
                CategoryRule::new("property", Revenue, "財產收入", "Property Income", "Prop.", &["財產收入"]),
                CategoryRule::new("other_revenue", Revenue, "其他收入", "Other Revenue", "Other", &["其他收入"]),
                CategoryRule::new(
                    "general_admin",
                    Expenditure,
                    "一般政務支出",
                    "General Administration",
                    "Admin",
                    &["政務支出"],
                ),
                CategoryRule::new("defense", Expenditure, "國防支出", "National Defense", "Def.", &["國防支出"]),
                CategoryRule::new(
                    "education",
                    Expenditure,
                    "教育科學文化支出",
                    "Education, Science and Culture",
                    "Edu.",
                    &["教育科學"],
                ),
                CategoryRule::new("economic", Expenditure, "經濟發展支出", "Economic Development", "Econ.", &["經濟發展"]),
                CategoryRule::new("social_welfare", Expenditure, "社會福利支出", "Social Welfare", "Welfare", &["社會福利"]),
                CategoryRule::new(
                    "community",
                    Expenditure,
                    "社區發展及環境保護支出",
                    "Community Development and Environmental Protection",
                    "Env.",
                    &["社區發展"],
                ),
                CategoryRule::new("pension", Expenditure, "退休撫卹支出", "Pensions and Survivor Benefits", "Pension", &["退休撫卹"]),
                CategoryRule::new("debt", Expenditure, "債務支出", "Debt Service", "Debt", &["債務支出"]),
                CategoryRule::new(
                    "subsidies",
                    Expenditure,
                    "補助及其他支出",
                    "Subsidies and Others",
                    "Subs.",
                    &["補助及其他"],
                ),
            ],
        }
    }
}

impl CategoryMap {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Read a JSON array of rules (`id`, `type`, `zh`, and optional `name`, `en`, `abbr`).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rules: Vec<CategoryRule> = serde_json::from_str(&content)
            .map_err(|e| FiscalError::Settings(format!("invalid category map {}: {e}", path.display())))?;
        Ok(Self::new(rules))
    }

    /// Built-in table unless a path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn rules_for(&self, flow: Flow) -> impl Iterator<Item = &CategoryRule> {
        self.rules.iter().filter(move |r| r.flow == flow)
    }

    pub fn bucket(&self, label: &str) -> Option<&CategoryRule> {
        self.rules.iter().find(|r| r.matches(label))
    }
}

/// Where a label lands after applying the unmatched policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement<'a> {
    Bucket(&'a CategoryRule),
    Other(Flow),
    Excluded,
}

pub fn place<'a>(map: &'a CategoryMap, label: &str, policy: UnmatchedPolicy) -> Placement<'a> {
    match (map.bucket(label), policy) {
        (Some(rule), _) => Placement::Bucket(rule),
        (None, UnmatchedPolicy::Other) => Placement::Other(Flow::classify(label)),
        (None, UnmatchedPolicy::Exclude) => Placement::Excluded,
    }
}

const FUND_TYPES: &[(&str, FundType)] = &[
    ("營業", FundType::Business),
    ("作業", FundType::Operation),
    ("債務", FundType::Debt),
    ("特別收入", FundType::SpecialIncome),
    ("資本", FundType::CapitalPlan),
];

impl FundType {
    /// Classify a special-fund section heading such as `(一)營業部分`.
    pub fn guess(section: &str) -> Self {
        FUND_TYPES
            .iter()
            .find(|(kw, _)| section.contains(kw))
            .map(|(_, t)| *t)
            .unwrap_or(FundType::Other)
    }
}
