use crate::grid::CellGrid;
use crate::meta::Term;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub subject: usize,
    pub continuous_assessment: Option<usize>,
    pub mid_term: Option<usize>,
    pub final_term: Option<usize>,
    pub average: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRow {
    pub row: usize,
    pub columns: ColumnMap,
}

fn is_subject_header(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("môn") && lower.contains("học")
}

/// First (row, col) below the anchor, within `window` rows, whose cell reads like "Môn học".
pub fn locate_subject_header(
    grid: &CellGrid,
    anchor_row: usize,
    window: usize,
) -> Option<(usize, usize)> {
    let last = (anchor_row + window).min(grid.row_count().saturating_sub(1));
    for r in anchor_row + 1..=last {
        for (c, cell) in grid.row(r).iter().enumerate() {
            if is_subject_header(cell) {
                return Some((r, c));
            }
        }
    }
    None
}

fn is_average_marker(lower: &str) -> bool {
    lower == "tb" || lower.contains("tbm")
}

/// Assigns score roles to header columns; the first column matching a role keeps it.
pub fn map_columns(grid: &CellGrid, header_row: usize, subject_col: usize, term: Term) -> ColumnMap {
    let mut map = ColumnMap {
        subject: subject_col,
        continuous_assessment: None,
        mid_term: None,
        final_term: None,
        average: None,
    };
    let lowered: Vec<String> = grid.row(header_row).iter().map(|c| c.to_lowercase()).collect();

    match term {
        Term::First | Term::Second => {
            for (c, lower) in lowered.iter().enumerate() {
                if lower.is_empty() {
                    continue;
                }
                if map.continuous_assessment.is_none() && lower.contains("tx") {
                    map.continuous_assessment = Some(c);
                }
                if map.mid_term.is_none() && lower.contains("gk") {
                    map.mid_term = Some(c);
                }
                if map.final_term.is_none() && lower.contains("ck") {
                    map.final_term = Some(c);
                }
                if map.average.is_none() && is_average_marker(lower) {
                    map.average = Some(c);
                }
            }
        }
        Term::FullYear => {
            map.average = lowered
                .iter()
                .position(|l| l.contains("cả năm"))
                .or_else(|| lowered.iter().position(|l| is_average_marker(l)));
        }
    }
    map
}

pub fn locate_header(
    grid: &CellGrid,
    anchor_row: usize,
    window: usize,
    term: Term,
) -> Option<HeaderRow> {
    let (row, subject_col) = locate_subject_header(grid, anchor_row, window)?;
    Some(HeaderRow {
        row,
        columns: map_columns(grid, row, subject_col, term),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: Vec<Vec<&str>>) -> CellGrid {
        CellGrid::from_rows(rows)
    }

    #[test]
    fn header_found_four_rows_below_anchor() {
        let g = grid(vec![
            vec!["", "Mã HS: 0012345", "", "", "", ""],
            vec!["", "Họ tên: A", "", "", "", ""],
            vec!["", "", "", "", "", ""],
            vec!["", "", "", "", "", ""],
            vec!["STT", "Môn học", "", "đđgtx", "đđggk", "đđgck"],
        ]);
        let h = locate_header(&g, 0, 8, Term::First).expect("header");
        assert_eq!(h.row, 4);
        assert_eq!(h.columns.subject, 1);
        assert_eq!(h.columns.continuous_assessment, Some(3));
        assert_eq!(h.columns.mid_term, Some(4));
        assert_eq!(h.columns.final_term, Some(5));
        assert_eq!(h.columns.average, None);
    }

    #[test]
    fn header_outside_window_is_missed() {
        let mut rows: Vec<Vec<&str>> = vec![vec!["Mã HS: 0012345"]];
        rows.extend((0..8).map(|_| vec![""]));
        rows.push(vec!["Môn học"]);
        assert_eq!(locate_subject_header(&grid(rows.clone()), 0, 8), None);
        assert_eq!(locate_subject_header(&grid(rows), 0, 9), Some((9, 0)));
    }

    #[test]
    fn anchor_row_itself_is_not_a_header() {
        let g = grid(vec![vec!["Mã HS: 0012345", "Môn học"]]);
        assert_eq!(locate_subject_header(&g, 0, 8), None);
    }

    #[test]
    fn uppercase_header_matches() {
        let g = grid(vec![vec!["Mã HS: 0012345"], vec!["MÔN HỌC"]]);
        assert_eq!(locate_subject_header(&g, 0, 8), Some((1, 0)));
    }

    #[test]
    fn term_average_accepts_exact_tb_or_tbm() {
        let g = grid(vec![vec!["Môn học", "TB cộng", "ĐTBm"]]);
        let m = map_columns(&g, 0, 0, Term::Second);
        assert_eq!(m.average, Some(2));
        let g = grid(vec![vec!["Môn học", "TB", "ĐTBm"]]);
        let m = map_columns(&g, 0, 0, Term::Second);
        assert_eq!(m.average, Some(1));
    }

    #[test]
    fn first_match_per_role_wins() {
        let g = grid(vec![vec!["Môn học", "TX1", "TX2", "GK", "CK", "TBM"]]);
        let m = map_columns(&g, 0, 0, Term::First);
        assert_eq!(m.continuous_assessment, Some(1));
        assert_eq!(m.mid_term, Some(3));
        assert_eq!(m.final_term, Some(4));
        assert_eq!(m.average, Some(5));
    }

    #[test]
    fn full_year_prefers_ca_nam_column() {
        let g = grid(vec![vec!["Môn học", "HK1", "HK2", "TBm", "Cả năm"]]);
        let m = map_columns(&g, 0, 0, Term::FullYear);
        assert_eq!(m.average, Some(4));
        assert_eq!(m.continuous_assessment, None);
        assert_eq!(m.mid_term, None);
    }

    #[test]
    fn full_year_falls_back_to_tbm() {
        let g = grid(vec![vec!["Môn học", "HK1", "HK2", "TBm"]]);
        assert_eq!(map_columns(&g, 0, 0, Term::FullYear).average, Some(3));
    }
}
