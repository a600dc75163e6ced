pub mod aggregate;
pub mod categories;
pub mod extract;
pub mod init;
pub mod inspect;
pub mod run;
pub mod status;

use clap::{Args, Parser, Subcommand};

use crate::settings::{shellexpand_path, Settings};

#[derive(Parser)]
#[command(
    name = "fiscal",
    about = "Extract Taiwan central-government budget workbooks into unified CSV and chart JSON."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save source/output directories and the year range to settings.
    Init {
        /// Directory holding one folder per ROC year (e.g. 113/)
        #[arg(long = "source-dir")]
        source_dir: Option<String>,
        /// Directory for unified CSV, JSON and site output
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
        /// First ROC year to extract
        #[arg(long = "first-year")]
        first_year: Option<i32>,
        /// Last ROC year to extract
        #[arg(long = "last-year")]
        last_year: Option<i32>,
    },
    /// Extract every year directory into unified CSV and per-kind JSON.
    Extract(RunArgs),
    /// Build chart JSON (raw and billion scales) from the unified CSVs.
    Aggregate {
        /// Output directory (default: settings output_dir)
        #[arg(long)]
        output: Option<String>,
    },
    /// Extract, then aggregate.
    Run(RunArgs),
    /// Show how a single workbook is classified and parsed.
    Inspect {
        /// Path to an XLS/XLSX/ODS/CSV sheet
        file: String,
        /// Number of leading rows to print
        #[arg(long, default_value = "15")]
        rows: usize,
        /// Force an extractor kind (e.g. revenue_by_source)
        #[arg(long)]
        kind: Option<String>,
        /// ROC year of the sheet (default: parent directory name)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Inspect the category map.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Show settings and the workbooks detected per year.
    Status,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Source directory (default: settings source_dir)
    #[arg(long)]
    pub source: Option<String>,
    /// Output directory (default: settings output_dir)
    #[arg(long)]
    pub output: Option<String>,
    /// First ROC year
    #[arg(long = "from")]
    pub from_year: Option<i32>,
    /// Last ROC year
    #[arg(long = "to")]
    pub to_year: Option<i32>,
}

impl RunArgs {
    /// Overlay command-line flags on the saved settings for this run.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(source) = &self.source {
            settings.source_dir = shellexpand_path(source);
        }
        if let Some(output) = &self.output {
            settings.output_dir = shellexpand_path(output);
        }
        if let Some(year) = self.from_year {
            settings.first_year = year;
        }
        if let Some(year) = self.to_year {
            settings.last_year = year;
        }
    }
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// List the category rules in match order.
    List,
    /// Show which bucket a label falls into.
    Match {
        /// Category label as printed in the sheet, e.g. 稅課收入
        label: String,
    },
}
