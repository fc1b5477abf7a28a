use crate::meta::Term;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScoreKey {
    pub student_id: String,
    pub subject: String,
    pub academic_year: String,
    pub term: Term,
}

/// Component values exactly as they appeared in the export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreValues {
    pub continuous_assessment: Option<String>,
    pub mid_term: Option<String>,
    pub final_term: Option<String>,
    pub term_average: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssessmentKey {
    pub student_id: String,
    pub academic_year: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentFields {
    pub academic_result: Option<String>,
    pub conduct: Option<String>,
    pub honor: Option<String>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    /// Created with `grade_level` when new; otherwise only the values are replaced.
    Score {
        key: ScoreKey,
        grade_level: u8,
        values: ScoreValues,
    },
    /// All four fields are replaced, `None`s included.
    Assessment {
        key: AssessmentKey,
        fields: AssessmentFields,
    },
}

/// Backing store for extracted records. A batch is applied atomically and in order.
pub trait RecordStore {
    fn commit(&mut self, batch: &[RecordWrite]) -> anyhow::Result<()>;
}

pub const DEFAULT_BATCH_SIZE: usize = 400;

/// Writes that have reached the store, by record kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitCounts {
    pub scores: usize,
    pub assessments: usize,
}

/// Buffers record writes and hands them to the store `batch_size` at a time.
pub struct UpsertWriter<'s, S: RecordStore + ?Sized> {
    store: &'s mut S,
    batch_size: usize,
    pending: Vec<RecordWrite>,
    committed: CommitCounts,
}

impl<'s, S: RecordStore + ?Sized> UpsertWriter<'s, S> {
    pub fn new(store: &'s mut S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            store,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            committed: CommitCounts::default(),
        }
    }

    pub fn upsert_score(
        &mut self,
        key: ScoreKey,
        grade_level: u8,
        values: ScoreValues,
    ) -> anyhow::Result<()> {
        self.push(RecordWrite::Score {
            key,
            grade_level,
            values,
        })
    }

    pub fn upsert_assessment(
        &mut self,
        key: AssessmentKey,
        fields: AssessmentFields,
    ) -> anyhow::Result<()> {
        self.push(RecordWrite::Assessment { key, fields })
    }

    fn push(&mut self, write: RecordWrite) -> anyhow::Result<()> {
        self.pending.push(write);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.store.commit(&self.pending)?;
        tracing::debug!(writes = self.pending.len(), "batch committed");
        for write in self.pending.drain(..) {
            match write {
                RecordWrite::Score { .. } => self.committed.scores += 1,
                RecordWrite::Assessment { .. } => self.committed.assessments += 1,
            }
        }
        Ok(())
    }

    /// Counts only batches the store accepted; a failed batch stays pending.
    pub fn committed(&self) -> CommitCounts {
        self.committed
    }

    /// Flushes whatever is left and reports how many writes reached the store.
    pub fn finish(mut self) -> anyhow::Result<usize> {
        self.flush()?;
        Ok(self.committed.scores + self.committed.assessments)
    }
}

pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl RecordStore for SqliteStore<'_> {
    fn commit(&mut self, batch: &[RecordWrite]) -> anyhow::Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let now = chrono::Utc::now().to_rfc3339();
        {
            let mut score_stmt = tx.prepare(
                "INSERT INTO score_records(
                    id, student_id, subject, academic_year, term, grade_level,
                    continuous_assessment, mid_term, final_term, term_average, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(student_id, subject, academic_year, term) DO UPDATE SET
                    continuous_assessment = excluded.continuous_assessment,
                    mid_term = excluded.mid_term,
                    final_term = excluded.final_term,
                    term_average = excluded.term_average,
                    updated_at = excluded.updated_at",
            )?;
            let mut assessment_stmt = tx.prepare(
                "INSERT INTO assessment_records(
                    id, student_id, academic_year, academic_result, conduct, honor, remark, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(student_id, academic_year) DO UPDATE SET
                    academic_result = excluded.academic_result,
                    conduct = excluded.conduct,
                    honor = excluded.honor,
                    remark = excluded.remark,
                    updated_at = excluded.updated_at",
            )?;
            for write in batch {
                match write {
                    RecordWrite::Score {
                        key,
                        grade_level,
                        values,
                    } => {
                        score_stmt.execute((
                            Uuid::new_v4().to_string(),
                            &key.student_id,
                            &key.subject,
                            &key.academic_year,
                            key.term.as_str(),
                            *grade_level as i64,
                            &values.continuous_assessment,
                            &values.mid_term,
                            &values.final_term,
                            &values.term_average,
                            &now,
                        ))?;
                    }
                    RecordWrite::Assessment { key, fields } => {
                        assessment_stmt.execute((
                            Uuid::new_v4().to_string(),
                            &key.student_id,
                            &key.academic_year,
                            &fields.academic_result,
                            &fields.conduct,
                            &fields.honor,
                            &fields.remark,
                            &now,
                        ))?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredScore {
    pub subject: String,
    pub academic_year: String,
    pub term: Term,
    pub grade_level: u8,
    #[serde(flatten)]
    pub values: ScoreValues,
}

pub fn scores_for_student(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<StoredScore>> {
    let mut stmt = conn.prepare(
        "SELECT subject, academic_year, term, grade_level,
                continuous_assessment, mid_term, final_term, term_average
         FROM score_records
         WHERE student_id = ?
         ORDER BY grade_level, academic_year, term, rowid",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            let term_raw: String = r.get(2)?;
            let term = Term::parse(&term_raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("unknown term {:?}", term_raw).into(),
                )
            })?;
            let grade: i64 = r.get(3)?;
            Ok(StoredScore {
                subject: r.get(0)?,
                academic_year: r.get(1)?,
                term,
                grade_level: grade as u8,
                values: ScoreValues {
                    continuous_assessment: r.get(4)?,
                    mid_term: r.get(5)?,
                    final_term: r.get(6)?,
                    term_average: r.get(7)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAssessment {
    pub academic_year: String,
    #[serde(flatten)]
    pub fields: AssessmentFields,
}

pub fn assessments_for_student(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Vec<StoredAssessment>> {
    let mut stmt = conn.prepare(
        "SELECT academic_year, academic_result, conduct, honor, remark
         FROM assessment_records
         WHERE student_id = ?
         ORDER BY academic_year",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(StoredAssessment {
                academic_year: r.get(0)?,
                fields: AssessmentFields {
                    academic_result: r.get(1)?,
                    conduct: r.get(2)?,
                    honor: r.get(3)?,
                    remark: r.get(4)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// In-memory store used by the engine tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub scores: std::collections::BTreeMap<ScoreKey, (u8, ScoreValues)>,
    pub assessments: std::collections::BTreeMap<AssessmentKey, AssessmentFields>,
    pub commits: Vec<usize>,
}

#[cfg(test)]
impl RecordStore for MemoryStore {
    fn commit(&mut self, batch: &[RecordWrite]) -> anyhow::Result<()> {
        for write in batch {
            match write {
                RecordWrite::Score {
                    key,
                    grade_level,
                    values,
                } => {
                    let entry = self
                        .scores
                        .entry(key.clone())
                        .or_insert((*grade_level, ScoreValues::default()));
                    entry.1 = values.clone();
                }
                RecordWrite::Assessment { key, fields } => {
                    self.assessments.insert(key.clone(), fields.clone());
                }
            }
        }
        self.commits.push(batch.len());
        Ok(())
    }
}
