use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::categorizer::UnmatchedPolicy;
use crate::error::{FiscalError, Result};
use crate::header::{HeaderPolicy, TieBreak};
use crate::hierarchy::DEFAULT_CODE_WIDTHS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root holding one directory per ROC year.
    pub source_dir: String,
    pub output_dir: String,
    pub first_year: i32,
    pub last_year: i32,
    pub header_scan_rows: usize,
    pub min_header_hits: usize,
    pub tie_break: TieBreak,
    pub code_widths: [usize; 4],
    /// JSON category map replacing the built-in table.
    pub category_map: Option<String>,
    pub unmatched: UnmatchedPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_dir: "docs/tw-finance".to_string(),
            output_dir: "data".to_string(),
            first_year: 97,
            last_year: 114,
            header_scan_rows: 20,
            min_header_hits: 2,
            tie_break: TieBreak::Earliest,
            code_widths: DEFAULT_CODE_WIDTHS,
            category_map: None,
            unmatched: UnmatchedPolicy::Exclude,
        }
    }
}

impl Settings {
    pub fn header_policy(&self) -> HeaderPolicy {
        HeaderPolicy {
            max_scan: self.header_scan_rows,
            min_hits: self.min_header_hits,
            tie_break: self.tie_break,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_year > self.last_year {
            return Err(FiscalError::Settings(format!(
                "first_year {} is after last_year {}",
                self.first_year, self.last_year
            )));
        }
        if self.code_widths.iter().any(|w| *w == 0) {
            return Err(FiscalError::Settings("code_widths must be positive".to_string()));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fiscal")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FiscalError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
