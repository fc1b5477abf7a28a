use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "eduscore.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_code TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            cohort TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    // Workspaces created before class labels were tracked lack this column.
    ensure_enrollments_class_label(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS score_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            term TEXT NOT NULL,
            grade_level INTEGER NOT NULL,
            continuous_assessment TEXT,
            mid_term TEXT,
            final_term TEXT,
            term_average TEXT,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES enrollments(id),
            UNIQUE(student_id, subject, academic_year, term)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_score_records_student ON score_records(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_score_records_student_grade
         ON score_records(student_id, grade_level)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            academic_result TEXT,
            conduct TEXT,
            honor TEXT,
            remark TEXT,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES enrollments(id),
            UNIQUE(student_id, academic_year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessment_records_student
         ON assessment_records(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn ensure_enrollments_class_label(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "enrollments", "class_label")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE enrollments ADD COLUMN class_label TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
