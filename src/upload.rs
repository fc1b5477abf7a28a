use crate::enrollment::EnrollmentDirectory;
use crate::extract::{self, ExtractConfig, ProcessingSummary};
use crate::grid::{self, CellGrid};
use crate::store::RecordStore;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of one uploaded file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_sha256: Option<String>,
    #[serde(flatten)]
    pub summary: ProcessingSummary,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Processes an already loaded grid under a caller-chosen name.
pub fn process_named_grid<S: RecordStore + ?Sized>(
    name: &str,
    grid: &CellGrid,
    directory: &dyn EnrollmentDirectory,
    store: &mut S,
    cfg: &ExtractConfig,
) -> FileReport {
    let summary = extract::process_grid(grid, directory, store, cfg);
    tracing::info!(
        file = name,
        status = ?summary.status,
        students = summary.students_matched,
        scores = summary.scores_written,
        assessments = summary.assessments_written,
        "file processed"
    );
    FileReport {
        file: name.to_string(),
        source_sha256: None,
        summary,
    }
}

pub fn process_file<S: RecordStore + ?Sized>(
    path: &Path,
    directory: &dyn EnrollmentDirectory,
    store: &mut S,
    cfg: &ExtractConfig,
) -> FileReport {
    let name = display_name(path);
    let grid = match grid::load_grid(path) {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(file = %name, "could not load file: {e}");
            return FileReport {
                file: name,
                source_sha256: None,
                summary: ProcessingSummary::error(e.to_string()),
            };
        }
    };
    let sha = match grid::file_sha256(path) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::debug!(file = %name, "fingerprint unavailable: {e}");
            None
        }
    };

    let mut report = process_named_grid(&name, &grid, directory, store, cfg);
    report.source_sha256 = sha;
    report
}

/// Files are handled one after another; a failure in one never stops the rest.
pub fn process_files<S: RecordStore + ?Sized>(
    paths: &[PathBuf],
    directory: &dyn EnrollmentDirectory,
    store: &mut S,
    cfg: &ExtractConfig,
) -> Vec<FileReport> {
    paths
        .iter()
        .map(|p| process_file(p, directory, store, cfg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::Enrollment;
    use crate::extract::SummaryStatus;
    use crate::store::MemoryStore;

    struct OneStudent;

    impl EnrollmentDirectory for OneStudent {
        fn resolve(&self, code: &str) -> anyhow::Result<Option<Enrollment>> {
            Ok((code == "0012345").then(|| Enrollment {
                id: "s1".into(),
                student_code: code.into(),
                full_name: "Nguyễn Văn A".into(),
                cohort: "2023-2026".into(),
                class_label: Some("10A1".into()),
            }))
        }
    }

    fn temp_dir(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    const TERM_CSV: &str = "\
Học kỳ 1 năm học 2023-2024,,,,
Mã HS: 0012345,,,,
Môn học,TX,GK,CK,TBm
Toán,8,7,9,8.2
Kết quả,,,,
";

    #[test]
    fn bad_file_does_not_stop_the_batch() {
        let dir = temp_dir("eduscored-upload");
        let good = dir.join("hk1.csv");
        std::fs::write(&good, TERM_CSV).expect("write csv");
        let missing = dir.join("missing.csv");
        let unsupported = dir.join("notes.txt");
        std::fs::write(&unsupported, "hello").expect("write txt");

        let mut store = MemoryStore::default();
        let reports = process_files(
            &[missing, unsupported, good],
            &OneStudent,
            &mut store,
            &ExtractConfig::default(),
        );

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].summary.status, SummaryStatus::Error);
        assert_eq!(reports[1].summary.status, SummaryStatus::Error);
        assert_eq!(reports[2].file, "hk1.csv");
        assert_eq!(reports[2].summary.status, SummaryStatus::Success);
        assert_eq!(reports[2].summary.scores_written, 1);
        assert_eq!(reports[2].source_sha256.as_ref().map(|s| s.len()), Some(64));
        assert_eq!(store.scores.len(), 1);
    }

    #[test]
    fn report_serializes_flat() {
        let grid = CellGrid::from_rows(vec![vec!["no metadata here"]]);
        let mut store = MemoryStore::default();
        let report = process_named_grid(
            "inline",
            &grid,
            &OneStudent,
            &mut store,
            &ExtractConfig::default(),
        );
        let v = serde_json::to_value(&report).expect("json");
        assert_eq!(v["file"], "inline");
        assert_eq!(v["status"], "error");
        assert_eq!(v["studentsMatched"], 0);
        assert!(v.get("sourceSha256").is_none());
        assert!(v["detectedYear"].is_null());
    }
}
