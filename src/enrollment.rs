use crate::grid::CellGrid;
use crate::meta;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: String,
    pub student_code: String,
    pub full_name: String,
    /// Enrollment span as provisioned, e.g. "2023-2026".
    pub cohort: String,
    pub class_label: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cohort {0:?} has no four-digit start year")]
pub struct CohortParseError(pub String);

/// Lookup side of the student directory the extraction engine reads from.
pub trait EnrollmentDirectory {
    fn resolve(&self, code: &str) -> anyhow::Result<Option<Enrollment>>;

    fn cohort_start_year(&self, enrollment: &Enrollment) -> Result<i32, CohortParseError> {
        meta::leading_year(&enrollment.cohort)
            .ok_or_else(|| CohortParseError(enrollment.cohort.clone()))
    }
}

/// Drops the ".0" that numeric-looking codes pick up on a trip through floats.
pub fn normalize_student_code(raw: &str) -> String {
    let code = raw.trim();
    code.strip_suffix(".0").unwrap_or(code).to_string()
}

pub struct SqliteDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteDirectory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl EnrollmentDirectory for SqliteDirectory<'_> {
    fn resolve(&self, code: &str) -> anyhow::Result<Option<Enrollment>> {
        find_by_code(self.conn, code)
    }
}

fn row_to_enrollment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: row.get(0)?,
        student_code: row.get(1)?,
        full_name: row.get(2)?,
        cohort: row.get(3)?,
        class_label: row.get(4)?,
    })
}

pub fn find_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Enrollment>> {
    let found = conn
        .query_row(
            "SELECT id, student_code, full_name, cohort, class_label
             FROM enrollments WHERE student_code = ?",
            [code],
            row_to_enrollment,
        )
        .optional()?;
    Ok(found)
}

pub fn list(conn: &Connection, search: Option<&str>) -> anyhow::Result<Vec<Enrollment>> {
    let pattern = format!("%{}%", search.unwrap_or("").trim());
    let mut stmt = conn.prepare(
        "SELECT id, student_code, full_name, cohort, class_label
         FROM enrollments
         WHERE full_name LIKE ?1 OR student_code LIKE ?1
         ORDER BY class_label, full_name, student_code",
    )?;
    let rows = stmt
        .query_map([&pattern], row_to_enrollment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnrollment {
    pub student_code: String,
    #[serde(default)]
    pub full_name: String,
    pub cohort: String,
    #[serde(default)]
    pub class_label: Option<String>,
}

/// Inserts or refreshes one directory entry keyed by student code; returns its id.
pub fn upsert(conn: &Connection, e: &NewEnrollment) -> anyhow::Result<String> {
    let code = normalize_student_code(&e.student_code);
    anyhow::ensure!(!code.is_empty(), "studentCode must not be empty");
    let now = chrono::Utc::now().to_rfc3339();
    let id: String = conn.query_row(
        "INSERT INTO enrollments(id, student_code, full_name, cohort, class_label, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_code) DO UPDATE SET
            full_name = excluded.full_name,
            cohort = excluded.cohort,
            class_label = excluded.class_label,
            updated_at = excluded.updated_at
         RETURNING id",
        (
            Uuid::new_v4().to_string(),
            &code,
            e.full_name.trim(),
            e.cohort.trim(),
            e.class_label.as_deref().map(str::trim),
            &now,
        ),
        |r| r.get(0),
    )?;
    Ok(id)
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterImportSummary {
    pub rows_total: usize,
    pub upserted: usize,
    pub skipped: usize,
}

fn find_column(header: &[String], names: &[&str]) -> Option<usize> {
    header.iter().position(|h| {
        let h = h.to_lowercase();
        names.iter().any(|n| h == *n)
    })
}

/// Class-list spreadsheet: header on the first row, one student per row after it.
pub fn import_roster(
    conn: &Connection,
    grid: &CellGrid,
    default_cohort: Option<&str>,
) -> anyhow::Result<RosterImportSummary> {
    let header = grid.row(0);
    let Some(code_col) = find_column(header, &["ma_hs", "mã hs", "mã học sinh", "student_code"])
    else {
        anyhow::bail!("roster is missing a Ma_HS column");
    };
    let name_col = find_column(header, &["ho_ten", "họ tên", "họ và tên", "full_name"]);
    let class_col = find_column(header, &["lop", "lớp", "class"]);
    let cohort_col = find_column(header, &["nien_khoa", "niên khóa", "niên khoá", "cohort"]);
    if cohort_col.is_none() && default_cohort.is_none() {
        anyhow::bail!("roster has no cohort column and no defaultCohort was given");
    }

    let mut summary = RosterImportSummary::default();
    let tx = conn.unchecked_transaction()?;
    for r in 1..grid.row_count() {
        if grid.row(r).iter().all(|c| c.is_empty()) {
            continue;
        }
        summary.rows_total += 1;
        let code = normalize_student_code(grid.cell(r, code_col));
        let cohort = cohort_col
            .and_then(|c| grid.value(r, c))
            .or_else(|| default_cohort.map(str::to_string))
            .unwrap_or_default();
        if code.is_empty() || cohort.is_empty() {
            summary.skipped += 1;
            continue;
        }
        let entry = NewEnrollment {
            student_code: code,
            full_name: name_col.map(|c| grid.cell(r, c).to_string()).unwrap_or_default(),
            cohort,
            class_label: class_col.and_then(|c| grid.value(r, c)),
        };
        upsert(&tx, &entry)?;
        summary.upserted += 1;
    }
    tx.commit()?;
    tracing::info!(
        upserted = summary.upserted,
        skipped = summary.skipped,
        "roster imported"
    );
    Ok(summary)
}
