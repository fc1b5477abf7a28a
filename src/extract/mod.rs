//! Grid-anchored extraction of per-student score tables.
//!
//! A file is scanned once for its academic year and term, then every "Mã HS"
//! anchor is resolved against the enrollment directory and its score table is
//! located by a bounded local search below the anchor.

pub mod anchor;
pub mod assessment;
pub mod header;
pub mod subjects;

use crate::enrollment::EnrollmentDirectory;
use crate::grid::CellGrid;
use crate::meta::{self, FileMeta, Term};
use crate::store::{AssessmentKey, RecordStore, ScoreKey, UpsertWriter, DEFAULT_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use anchor::AnchorScanner;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractConfig {
    pub metadata_rows: usize,
    pub code_scan_cells: usize,
    pub header_window: usize,
    pub subject_window: usize,
    pub assessment_window: usize,
    pub batch_size: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            metadata_rows: 15,
            code_scan_cells: 5,
            header_window: 8,
            subject_window: 22,
            assessment_window: 12,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no academic year (e.g. 2023-2024) found in the first {0} rows")]
    MissingAcademicYear(usize),
    #[error("enrollment lookup failed: {0:#}")]
    Directory(anyhow::Error),
    #[error("writing records failed: {0:#}")]
    Store(anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSummary {
    pub status: SummaryStatus,
    pub students_matched: usize,
    pub scores_written: usize,
    pub assessments_written: usize,
    pub detected_year: Option<String>,
    pub detected_term: Option<Term>,
    pub message: String,
}

impl ProcessingSummary {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SummaryStatus::Error,
            students_matched: 0,
            scores_written: 0,
            assessments_written: 0,
            detected_year: None,
            detected_term: None,
            message: message.into(),
        }
    }
}

/// Runs the whole extraction for one grid. Never panics on malformed input;
/// failures come back as an `error` summary.
pub fn process_grid<S: RecordStore + ?Sized>(
    grid: &CellGrid,
    directory: &dyn EnrollmentDirectory,
    store: &mut S,
    cfg: &ExtractConfig,
) -> ProcessingSummary {
    let Some(file_meta) = meta::detect_metadata(grid, cfg.metadata_rows) else {
        let e = ExtractError::MissingAcademicYear(cfg.metadata_rows);
        tracing::warn!("{e}");
        return ProcessingSummary::error(e.to_string());
    };

    let mut summary = ProcessingSummary {
        status: SummaryStatus::Success,
        students_matched: 0,
        scores_written: 0,
        assessments_written: 0,
        detected_year: Some(file_meta.academic_year.clone()),
        detected_term: Some(file_meta.term),
        message: String::new(),
    };

    let mut writer = UpsertWriter::new(store, cfg.batch_size);
    let mut matched: HashSet<String> = HashSet::new();
    let outcome = extract_students(grid, &file_meta, directory, &mut writer, &mut matched, cfg)
        .and_then(|()| writer.flush().map_err(ExtractError::Store));

    // Counts reflect what reached the store, including batches committed before a failure.
    let committed = writer.committed();
    summary.students_matched = matched.len();
    summary.scores_written = committed.scores;
    summary.assessments_written = committed.assessments;

    match outcome {
        Ok(()) if summary.students_matched == 0 => {
            summary.status = SummaryStatus::Warning;
            summary.message = format!(
                "no enrolled students recognised for {} {}",
                file_meta.academic_year,
                file_meta.term.as_str()
            );
        }
        Ok(()) => {
            summary.message = format!(
                "matched {} students, wrote {} scores and {} assessments",
                summary.students_matched, summary.scores_written, summary.assessments_written
            );
        }
        Err(e) => {
            tracing::warn!(
                scores = summary.scores_written,
                assessments = summary.assessments_written,
                "extraction aborted: {e}"
            );
            summary.status = SummaryStatus::Error;
            summary.message = e.to_string();
        }
    }
    summary
}

/// Walks every anchor in scan order and queues what each student block yields.
/// Resolved students are recorded in `matched` as they are found.
pub fn extract_students<S: RecordStore + ?Sized>(
    grid: &CellGrid,
    file_meta: &FileMeta,
    directory: &dyn EnrollmentDirectory,
    writer: &mut UpsertWriter<'_, S>,
    matched: &mut HashSet<String>,
    cfg: &ExtractConfig,
) -> Result<(), ExtractError> {
    for found in AnchorScanner::new(grid, cfg.code_scan_cells) {
        let Some(student) = directory
            .resolve(&found.code)
            .map_err(ExtractError::Directory)?
        else {
            tracing::debug!(code = %found.code, row = found.row, "no enrollment for code");
            continue;
        };
        let grade = directory
            .cohort_start_year(&student)
            .ok()
            .and_then(|cohort_start| meta::grade_level(cohort_start, file_meta.start_year));
        let Some(grade) = grade else {
            tracing::debug!(
                code = %found.code,
                cohort = %student.cohort,
                year = %file_meta.academic_year,
                "cohort does not map to grade 10-12"
            );
            continue;
        };
        matched.insert(student.id.clone());

        let Some(header_row) =
            header::locate_header(grid, found.row, cfg.header_window, file_meta.term)
        else {
            tracing::debug!(code = %found.code, row = found.row, "no subject header below anchor");
            continue;
        };
        let table =
            subjects::extract_subject_rows(grid, &header_row, file_meta.term, cfg.subject_window);

        for row in table.rows {
            let key = ScoreKey {
                student_id: student.id.clone(),
                subject: row.subject,
                academic_year: file_meta.academic_year.clone(),
                term: file_meta.term,
            };
            writer
                .upsert_score(key, grade, row.values)
                .map_err(ExtractError::Store)?;
        }

        if file_meta.term == Term::FullYear {
            if let Some(fields) =
                assessment::parse_assessment_block(grid, table.end_row, cfg.assessment_window)
            {
                let key = AssessmentKey {
                    student_id: student.id.clone(),
                    academic_year: file_meta.academic_year.clone(),
                };
                writer
                    .upsert_assessment(key, fields)
                    .map_err(ExtractError::Store)?;
            }
        }
    }
    Ok(())
}
