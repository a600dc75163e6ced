use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::categorizer::{place, CategoryMap, Placement};
use crate::error::Result;
use crate::settings::{load_settings, shellexpand_path};

fn load_map() -> Result<(CategoryMap, crate::categorizer::UnmatchedPolicy)> {
    let settings = load_settings();
    let path = settings.category_map.as_deref().map(|p| std::path::PathBuf::from(shellexpand_path(p)));
    Ok((CategoryMap::load_or_default(path.as_deref())?, settings.unmatched))
}

pub fn list() -> Result<()> {
    let (map, _) = load_map()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Type", "Name", "English", "Abbr", "Keywords"]);
    for rule in map.rules() {
        table.add_row(vec![
            Cell::new(&rule.id),
            Cell::new(rule.flow.key()),
            Cell::new(rule.display_name()),
            Cell::new(&rule.en),
            Cell::new(&rule.abbr),
            Cell::new(rule.zh.join(", ")),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn match_label(label: &str) -> Result<()> {
    let (map, policy) = load_map()?;
    match place(&map, label, policy) {
        Placement::Bucket(rule) => println!(
            "{label} \u{2192} {} ({}, {})",
            rule.id.green(),
            rule.flow.key(),
            rule.display_name()
        ),
        Placement::Other(flow) => println!("{label} \u{2192} {} ({})", "other".yellow(), flow.key()),
        Placement::Excluded => println!("{label} \u{2192} {}", "excluded (no matching rule)".red()),
    }
    Ok(())
}
