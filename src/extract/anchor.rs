use crate::enrollment::normalize_student_code;
use crate::grid::CellGrid;

const ANCHOR_LABEL: &str = "mã hs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub row: usize,
    pub col: usize,
    /// Normalized student code.
    pub code: String,
}

pub fn is_anchor_label(text: &str) -> bool {
    text.to_lowercase().contains(ANCHOR_LABEL)
}

/// Code for the anchor at (row, col): inline after the last colon, else the first
/// digit-led value within `scan_cells` cells to the right (merged-cell layouts).
pub fn extract_code(grid: &CellGrid, row: usize, col: usize, scan_cells: usize) -> Option<String> {
    let text = grid.cell(row, col);
    if let Some((_, tail)) = text.rsplit_once(':') {
        let tail = tail.trim();
        if tail.chars().count() > 3 {
            return non_empty(normalize_student_code(tail));
        }
    }

    for offset in 1..=scan_cells {
        let c = col + offset;
        if c >= grid.col_count() {
            break;
        }
        let candidate = grid.cell(row, c);
        let starts_with_digit = candidate
            .chars()
            .next()
            .is_some_and(|ch| ch.is_ascii_digit());
        if candidate.chars().count() > 4 && starts_with_digit {
            return non_empty(normalize_student_code(candidate));
        }
    }
    None
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Row-major walk over the grid yielding every anchor with a usable code.
/// Lazy, so callers can process each student block before the scan moves on.
pub struct AnchorScanner<'g> {
    grid: &'g CellGrid,
    scan_cells: usize,
    row: usize,
    col: usize,
}

impl<'g> AnchorScanner<'g> {
    pub fn new(grid: &'g CellGrid, scan_cells: usize) -> Self {
        Self {
            grid,
            scan_cells,
            row: 0,
            col: 0,
        }
    }
}

impl Iterator for AnchorScanner<'_> {
    type Item = Anchor;

    fn next(&mut self) -> Option<Anchor> {
        let cols = self.grid.col_count();
        if cols == 0 {
            return None;
        }
        while self.row < self.grid.row_count() {
            let (r, c) = (self.row, self.col);
            self.col += 1;
            if self.col >= cols {
                self.col = 0;
                self.row += 1;
            }

            if !is_anchor_label(self.grid.cell(r, c)) {
                continue;
            }
            match extract_code(self.grid, r, c, self.scan_cells) {
                Some(code) => return Some(Anchor { row: r, col: c, code }),
                None => {
                    tracing::debug!(row = r, col = c, "anchor without a student code");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(cells: &[(usize, usize, &str)]) -> CellGrid {
        let mut rows = vec![vec![String::new(); 10]; 8];
        for (r, c, v) in cells {
            rows[*r][*c] = v.to_string();
        }
        CellGrid::from_rows(rows)
    }

    #[test]
    fn inline_code_after_colon() {
        let g = grid_with(&[(5, 2, "Mã HS : 0012345")]);
        assert_eq!(extract_code(&g, 5, 2, 5).as_deref(), Some("0012345"));
    }

    #[test]
    fn merged_cell_code_to_the_right() {
        let g = grid_with(&[(5, 2, "Mã HS"), (5, 5, "0012345")]);
        assert_eq!(extract_code(&g, 5, 2, 5).as_deref(), Some("0012345"));
    }

    #[test]
    fn short_inline_code_falls_back_to_neighbours() {
        let g = grid_with(&[(1, 0, "Mã HS: 12"), (1, 1, "Lớp"), (1, 2, "10A1"), (1, 3, "0012345")]);
        assert_eq!(extract_code(&g, 1, 0, 5).as_deref(), Some("0012345"));
    }

    #[test]
    fn neighbour_must_be_long_and_digit_led() {
        let g = grid_with(&[(0, 0, "Mã HS"), (0, 1, "1234"), (0, 2, "A12345")]);
        assert_eq!(extract_code(&g, 0, 0, 5), None);
    }

    #[test]
    fn neighbour_beyond_scan_distance_is_ignored() {
        let g = grid_with(&[(0, 0, "Mã HS"), (0, 6, "0012345")]);
        assert_eq!(extract_code(&g, 0, 0, 5), None);
        assert_eq!(extract_code(&g, 0, 0, 6).as_deref(), Some("0012345"));
    }

    #[test]
    fn float_artifact_is_normalized() {
        let g = grid_with(&[(0, 0, "Mã HS"), (0, 1, "0012345.0")]);
        assert_eq!(extract_code(&g, 0, 0, 5).as_deref(), Some("0012345"));
        let g = grid_with(&[(0, 0, "Mã HS: 0012345.0")]);
        assert_eq!(extract_code(&g, 0, 0, 5).as_deref(), Some("0012345"));
    }

    #[test]
    fn scanner_yields_every_anchor_in_row_major_order() {
        let g = grid_with(&[
            (1, 4, "Mã HS: 0000002"),
            (1, 0, "Mã HS: 0000001"),
            (3, 1, "Mã HS"),
            (6, 0, "MÃ HS"),
            (6, 1, "0000003"),
        ]);
        let found: Vec<Anchor> = AnchorScanner::new(&g, 5).collect();
        let codes: Vec<&str> = found.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes, vec!["0000001", "0000002", "0000003"]);
        assert_eq!((found[0].row, found[0].col), (1, 0));
        assert_eq!((found[1].row, found[1].col), (1, 4));
    }

    #[test]
    fn empty_grid_has_no_anchors() {
        let g = CellGrid::default();
        assert_eq!(AnchorScanner::new(&g, 5).count(), 0);
    }
}
