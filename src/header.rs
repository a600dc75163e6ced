use serde::{Deserialize, Serialize};

use crate::cells::clean_str;
use crate::grid::Grid;

/// Which row wins when two candidate header rows hit the same number of keywords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    #[default]
    Earliest,
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderPolicy {
    /// Rows from the top of the sheet considered as header candidates.
    pub max_scan: usize,
    /// Minimum number of distinct keywords a header row must contain.
    pub min_hits: usize,
    pub tie_break: TieBreak,
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self {
            max_scan: 20,
            min_hits: 2,
            tie_break: TieBreak::Earliest,
        }
    }
}

/// Number of distinct keywords found anywhere in the row's cleaned text.
pub fn keyword_hits(row: &[String], keywords: &[&str]) -> usize {
    let text: String = row.iter().map(|c| clean_str(c)).collect();
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Index of the row with the most keyword hits among the first
/// `policy.max_scan` rows, or `None` when no row reaches `policy.min_hits`.
pub fn find_header_row(grid: &Grid, keywords: &[&str], policy: &HeaderPolicy) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (idx, row) in grid.head(policy.max_scan).iter().enumerate() {
        let hits = keyword_hits(row, keywords);
        if hits < policy.min_hits.max(1) {
            continue;
        }
        best = match best {
            None => Some((idx, hits)),
            Some((_, best_hits)) if hits > best_hits => Some((idx, hits)),
            Some((_, best_hits)) if hits == best_hits && policy.tie_break == TieBreak::Latest => {
                Some((idx, hits))
            }
            keep => keep,
        };
    }
    best.map(|(idx, _)| idx)
}

fn cell_matches(cell: &str, keyword: &str, exact_only: bool) -> bool {
    if exact_only || keyword.chars().count() == 1 {
        cell == keyword
    } else {
        cell.contains(keyword)
    }
}

/// First column whose cleaned text matches any keyword, scanning rows top to
/// bottom and cells left to right. Exact matches anywhere in the region win
/// over partial ones; single-character keywords only ever match exactly, so
/// `目` does not pick up `科目`.
pub fn find_column_index(rows: &[Vec<String>], keywords: &[&str]) -> Option<usize> {
    for exact_only in [true, false] {
        for row in rows {
            for (col, raw) in row.iter().enumerate() {
                let cell = clean_str(raw);
                if cell.is_empty() {
                    continue;
                }
                if keywords.iter().any(|k| cell_matches(&cell, k, exact_only)) {
                    return Some(col);
                }
            }
        }
    }
    None
}

/// Single-row variant of [`find_column_index`].
pub fn find_column_in_row(row: &[String], keywords: &[&str]) -> Option<usize> {
    find_column_index(&[row.to_vec()], keywords)
}

/// First column in `row` whose text contains one keyword from each group.
pub fn find_column_all(row: &[String], groups: &[&[&str]]) -> Option<usize> {
    row.iter().position(|raw| {
        let cell = clean_str(raw);
        !cell.is_empty() && groups.iter().all(|g| g.iter().any(|k| cell.contains(k)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIERARCHY_KEYWORDS: &[&str] = &["款", "項", "目", "節", "預算", "名稱", "本年度", "科目"];

    fn sheet() -> Grid {
        Grid::from_rows(&[
            &["中央政府總預算"],
            &["歲入來源別預算表"],
            &["", "", "", "", "單位：新臺幣千元"],
            &["款", "項", "目", "節", "科目名稱", "本年度預算數", "上年度預算數"],
            &["1", "", "", "", "稅課收入", "1,000"],
        ])
    }

    #[test]
    fn test_find_header_row_picks_most_hits() {
        let idx = find_header_row(&sheet(), HIERARCHY_KEYWORDS, &HeaderPolicy::default());
        assert_eq!(idx, Some(3));
    }

    #[test]
    fn test_find_header_row_respects_min_hits() {
        let grid = Grid::from_rows(&[&["預算"], &["hello", "world"]]);
        assert_eq!(find_header_row(&grid, HIERARCHY_KEYWORDS, &HeaderPolicy::default()), None);
        let lenient = HeaderPolicy { min_hits: 1, ..HeaderPolicy::default() };
        assert_eq!(find_header_row(&grid, HIERARCHY_KEYWORDS, &lenient), Some(0));
    }

    #[test]
    fn test_find_header_row_respects_scan_window() {
        let policy = HeaderPolicy { max_scan: 3, ..HeaderPolicy::default() };
        assert_eq!(find_header_row(&sheet(), &["款", "項"], &policy), None);
    }

    #[test]
    fn test_tie_break_earliest_and_latest() {
        let grid = Grid::from_rows(&[&["項目", "預算數"], &["x"], &["項目", "預算數"]]);
        let keywords = &["項目", "預算數"];
        let earliest = HeaderPolicy::default();
        let latest = HeaderPolicy { tie_break: TieBreak::Latest, ..HeaderPolicy::default() };
        assert_eq!(find_header_row(&grid, keywords, &earliest), Some(0));
        assert_eq!(find_header_row(&grid, keywords, &latest), Some(2));
    }

    #[test]
    fn test_single_char_keyword_requires_exact_match() {
        let rows = vec![vec!["科目名稱".to_string(), "目".to_string()]];
        assert_eq!(find_column_index(&rows, &["目"]), Some(1));
        let rows = vec![vec!["科目名稱".to_string()]];
        assert_eq!(find_column_index(&rows, &["目"]), None);
    }

    #[test]
    fn test_exact_match_beats_earlier_partial() {
        let rows = vec![
            vec!["上年度預算數".to_string(), "x".to_string()],
            vec!["".to_string(), "預算數".to_string()],
        ];
        assert_eq!(find_column_index(&rows, &["預算數"]), Some(1));
    }

    #[test]
    fn test_partial_match_scans_left_to_right() {
        let rows = vec![vec![
            "款".to_string(),
            "本年度\n預算數".to_string(),
            "上年度預算數".to_string(),
        ]];
        assert_eq!(find_column_index(&rows, &["本年度預算數", "預算案數"]), Some(1));
    }

    #[test]
    fn test_find_column_all_requires_every_group() {
        let row: Vec<String> = ["基金別", "基金來源", "本年度基金來源", "本年度基金用途"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(find_column_all(&row, &[&["來源", "收入"], &["預算", "本年度"]]), Some(2));
        assert_eq!(find_column_all(&row, &[&["用途", "支出"], &["預算", "本年度"]]), Some(3));
        assert_eq!(find_column_in_row(&row, &["基金別"]), Some(0));
    }
}
