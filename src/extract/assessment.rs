use crate::grid::CellGrid;
use crate::store::AssessmentFields;

const SEPARATOR: &str = " | ";
const RESULT_MARKERS: [&str; 2] = ["kqht", "học lực"];
const CONDUCT_MARKERS: [&str; 2] = ["kqrl", "hạnh kiểm"];
const HONOR_MARKERS: [&str; 1] = ["danh hiệu"];
const REMARK_MARKER: &str = "nhận xét";

fn contains_any(lower: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| lower.contains(m))
}

fn after_last_colon(text: &str) -> Option<String> {
    let (_, tail) = text.rsplit_once(':')?;
    let tail = tail.trim();
    if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    }
}

/// A label without a colon ("Danh hiệu thi đua") is a caption, not a value.
fn assign(field: &mut Option<String>, segment: &str) {
    if let Some(value) = after_last_colon(segment) {
        *field = Some(value);
    }
}

/// Row text with blank cells dropped, joined by `" | "`.
fn row_line(grid: &CellGrid, row: usize) -> String {
    grid.row(row)
        .iter()
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

/// Best-effort read of the end-of-year block below the subject table.
/// Returns `None` unless a result, conduct or honor label was found.
pub fn parse_assessment_block(
    grid: &CellGrid,
    start_row: usize,
    window: usize,
) -> Option<AssessmentFields> {
    let mut fields = AssessmentFields::default();
    let end = (start_row + window).min(grid.row_count());

    for r in start_row..end {
        let line = row_line(grid, r);
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();

        let has_labels = contains_any(&lower, &RESULT_MARKERS)
            || contains_any(&lower, &CONDUCT_MARKERS)
            || contains_any(&lower, &HONOR_MARKERS);
        if has_labels {
            // "Học lực: Khá, Hạnh kiểm: Tốt" packs two labels into one cell.
            for segment in line.split(['|', ',', ';']) {
                let seg_lower = segment.to_lowercase();
                if contains_any(&seg_lower, &RESULT_MARKERS) {
                    assign(&mut fields.academic_result, segment);
                }
                if contains_any(&seg_lower, &CONDUCT_MARKERS) {
                    assign(&mut fields.conduct, segment);
                }
                if contains_any(&seg_lower, &HONOR_MARKERS) {
                    assign(&mut fields.honor, segment);
                }
            }
        }

        if lower.contains(REMARK_MARKER) {
            fields.remark = after_last_colon(&line);
        }
    }

    if fields.academic_result.is_some() || fields.conduct.is_some() || fields.honor.is_some() {
        Some(fields)
    } else {
        None
    }
}
