use super::header::HeaderRow;
use crate::grid::CellGrid;
use crate::meta::Term;
use crate::store::ScoreValues;

const TABLE_TERMINATORS: [&str; 2] = ["kết quả", "xếp loại"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRow {
    pub subject: String,
    pub values: ScoreValues,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectTable {
    pub rows: Vec<SubjectRow>,
    /// Row where the scan stopped; the assessment block is searched from here.
    pub end_row: usize,
}

/// Ordinal column values leaking into the subject column ("1", "2", "3.0").
fn is_numeric_text(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit()) && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn ends_table(subject: &str) -> bool {
    if subject.is_empty() {
        return true;
    }
    let lower = subject.to_lowercase();
    TABLE_TERMINATORS.iter().any(|t| lower.contains(t))
}

pub fn extract_subject_rows(
    grid: &CellGrid,
    header: &HeaderRow,
    term: Term,
    window: usize,
) -> SubjectTable {
    let cols = header.columns;
    let first = header.row + 1;
    let mut rows = Vec::new();
    let mut end_row = (first + window).min(grid.row_count());

    for r in first..first + window {
        if r >= grid.row_count() {
            end_row = r;
            break;
        }
        let subject = grid.cell(r, cols.subject);
        if ends_table(subject) {
            end_row = r;
            break;
        }
        if is_numeric_text(subject) {
            continue;
        }

        let read = |c: Option<usize>| c.and_then(|c| grid.value(r, c));
        let values = ScoreValues {
            continuous_assessment: read(cols.continuous_assessment),
            mid_term: read(cols.mid_term),
            final_term: read(cols.final_term),
            term_average: read(cols.average),
        };
        if term == Term::FullYear && values.term_average.is_none() {
            continue;
        }
        rows.push(SubjectRow {
            subject: subject.to_string(),
            values,
        });
    }

    SubjectTable { rows, end_row }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::header::locate_header;

    fn table(rows: Vec<Vec<&str>>, term: Term, window: usize) -> SubjectTable {
        let g = CellGrid::from_rows(rows);
        let header = locate_header(&g, 0, 8, term).expect("header");
        extract_subject_rows(&g, &header, term, window)
    }

    #[test]
    fn reads_raw_values_until_result_row() {
        let t = table(
            vec![
                vec!["Mã HS: 0012345", "", "", "", ""],
                vec!["Môn học", "ĐĐGtx", "ĐĐGgk", "ĐĐGck", "TBm"],
                vec!["Toán", "8.5", "7", "9", "8.2"],
                vec!["Ngữ văn", "8 7 9", "", "6.5", "7.1"],
                vec!["Kết quả học tập", "", "", "", ""],
                vec!["Tin học", "10", "10", "10", "10"],
            ],
            Term::First,
            22,
        );
        assert_eq!(t.end_row, 4);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].subject, "Toán");
        assert_eq!(t.rows[0].values.continuous_assessment.as_deref(), Some("8.5"));
        assert_eq!(t.rows[1].values.continuous_assessment.as_deref(), Some("8 7 9"));
        assert_eq!(t.rows[1].values.mid_term, None);
        assert_eq!(t.rows[1].values.term_average.as_deref(), Some("7.1"));
    }

    #[test]
    fn numeric_subject_cells_are_skipped_not_stopping() {
        let t = table(
            vec![
                vec!["Mã HS: 0012345", "", ""],
                vec!["Môn học", "TX", "TBm"],
                vec!["1", "", ""],
                vec!["Toán", "8", "8"],
                vec!["2.0", "", ""],
                vec!["Lý", "7", "7"],
                vec!["", "", ""],
            ],
            Term::Second,
            22,
        );
        let subjects: Vec<&str> = t.rows.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Toán", "Lý"]);
        assert_eq!(t.end_row, 6);
    }

    #[test]
    fn classification_row_stops_the_table() {
        let t = table(
            vec![
                vec!["Mã HS: 0012345", ""],
                vec!["Môn học", "TBm"],
                vec!["Toán", "8"],
                vec!["XẾP LOẠI", "Giỏi"],
            ],
            Term::First,
            22,
        );
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.end_row, 3);
    }

    #[test]
    fn full_year_skips_rows_without_average() {
        let t = table(
            vec![
                vec!["Mã HS: 0012345", "", ""],
                vec!["Môn học", "HK1", "Cả năm"],
                vec!["Toán", "8", "8.4"],
                vec!["Thể dục", "Đ", ""],
                vec!["Văn", "7", "7.2"],
            ],
            Term::FullYear,
            22,
        );
        let subjects: Vec<&str> = t.rows.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Toán", "Văn"]);
        assert_eq!(t.rows[0].values.continuous_assessment, None);
        assert_eq!(t.end_row, 5);
    }

    #[test]
    fn scan_stops_at_window_bound() {
        let mut rows = vec![vec!["Mã HS: 0012345", ""], vec!["Môn học", "TBm"]];
        for _ in 0..30 {
            rows.push(vec!["Toán", "8"]);
        }
        let t = table(rows, Term::First, 20);
        assert_eq!(t.rows.len(), 20);
        assert_eq!(t.end_row, 22);
    }

    #[test]
    fn numeric_text_detection() {
        assert!(is_numeric_text("12"));
        assert!(is_numeric_text("3.0"));
        assert!(!is_numeric_text("Toán 10"));
        assert!(!is_numeric_text("."));
    }
}
