use crate::extract::anchor::is_anchor_label;
use crate::grid::CellGrid;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static ACADEMIC_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*[-–]\s*(\d{4})").expect("academic year pattern"));
static FIRST_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:học\s*k[ỳì]|semester)\s*(?:1|i)\b").expect("first term pattern")
});
static SECOND_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:học\s*k[ỳì]|semester)\s*(?:2|ii)\b").expect("second term pattern")
});
static FOUR_DIGIT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}").expect("year pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Term {
    First,
    Second,
    FullYear,
}

impl Term {
    pub fn as_str(self) -> &'static str {
        match self {
            Term::First => "FIRST",
            Term::Second => "SECOND",
            Term::FullYear => "FULL_YEAR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FIRST" => Some(Term::First),
            "SECOND" => Some(Term::Second),
            "FULL_YEAR" => Some(Term::FullYear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Always `YYYY-YYYY`, whatever spacing the export used.
    pub academic_year: String,
    pub start_year: i32,
    pub term: Term,
}

/// Scans the first `window_rows` rows for the academic year and term.
/// Returns `None` when no year is present; the term defaults to full-year.
///
/// Term markers are read only from the title rows above the first student
/// block, since full-year tables carry "Học kỳ I"/"Học kỳ II" column headers.
pub fn detect_metadata(grid: &CellGrid, window_rows: usize) -> Option<FileMeta> {
    let window = grid.row_count().min(window_rows);
    let title_rows = (0..window)
        .find(|&r| grid.row(r).iter().any(|c| is_anchor_label(c)))
        .unwrap_or(window);

    let window_text = row_text(grid, 0..window);
    let caps = ACADEMIC_YEAR.captures(&window_text)?;
    let start_year = caps[1].parse::<i32>().ok()?;
    let academic_year = format!("{}-{}", &caps[1], &caps[2]);

    let title = row_text(grid, 0..title_rows);
    let term = if FIRST_TERM.is_match(&title) {
        Term::First
    } else if SECOND_TERM.is_match(&title) {
        Term::Second
    } else {
        Term::FullYear
    };

    Some(FileMeta {
        academic_year,
        start_year,
        term,
    })
}

fn row_text(grid: &CellGrid, rows: std::ops::Range<usize>) -> String {
    let mut blob = String::new();
    for r in rows {
        for cell in grid.row(r) {
            if cell.is_empty() {
                continue;
            }
            blob.push_str(cell);
            blob.push(' ');
        }
    }
    blob
}

/// First four-digit run in a year-like string, e.g. 2023 for "2023-2026".
pub fn leading_year(s: &str) -> Option<i32> {
    FOUR_DIGIT_YEAR
        .find(s)
        .and_then(|m| m.as_str().parse::<i32>().ok())
}

/// Grade 10, 11 or 12 for a cohort in a given academic year; anything else is out of range.
pub fn grade_level(cohort_start: i32, academic_start: i32) -> Option<u8> {
    match academic_start - cohort_start {
        d @ 0..=2 => Some(10 + d as u8),
        _ => None,
    }
}
