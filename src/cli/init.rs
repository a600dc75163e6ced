use std::path::PathBuf;

use crate::error::Result;
use crate::settings::{load_settings, save_settings, settings_path, shellexpand_path};

pub fn run(
    source_dir: Option<String>,
    output_dir: Option<String>,
    first_year: Option<i32>,
    last_year: Option<i32>,
) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = source_dir {
        settings.source_dir = shellexpand_path(&dir);
    }
    if let Some(dir) = output_dir {
        settings.output_dir = shellexpand_path(&dir);
    }
    if let Some(year) = first_year {
        settings.first_year = year;
    }
    if let Some(year) = last_year {
        settings.last_year = year;
    }
    settings.validate()?;
    save_settings(&settings)?;

    let output = PathBuf::from(&settings.output_dir);
    std::fs::create_dir_all(&output)?;

    println!("Saved settings to {}", settings_path().display());
    println!("Source dir:  {}", settings.source_dir);
    println!("Output dir:  {}", output.display());
    println!("Years:       {}–{} (ROC)", settings.first_year, settings.last_year);
    if !PathBuf::from(&settings.source_dir).is_dir() {
        println!();
        println!("Source directory does not exist yet; add one folder per ROC year.");
    }
    Ok(())
}
