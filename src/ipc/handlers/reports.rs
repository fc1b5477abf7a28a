use crate::enrollment::{self, normalize_student_code};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::meta::Term;
use crate::store::{self, StoredScore};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TermScores {
    academic_year: String,
    term: Term,
    scores: Vec<StoredScore>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GradeScores {
    grade_level: u8,
    terms: Vec<TermScores>,
}

/// Grade 10 first; within a grade, FIRST, SECOND then FULL_YEAR.
fn group_by_grade(scores: Vec<StoredScore>) -> Vec<GradeScores> {
    let mut grouped: BTreeMap<u8, BTreeMap<(String, Term), Vec<StoredScore>>> = BTreeMap::new();
    for s in scores {
        grouped
            .entry(s.grade_level)
            .or_default()
            .entry((s.academic_year.clone(), s.term))
            .or_default()
            .push(s);
    }
    grouped
        .into_iter()
        .map(|(grade_level, terms)| GradeScores {
            grade_level,
            terms: terms
                .into_iter()
                .map(|((academic_year, term), scores)| TermScores {
                    academic_year,
                    term,
                    scores,
                })
                .collect(),
        })
        .collect()
}

fn handle_student_scores(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let code = match required_str(req, "studentCode") {
        Ok(v) => normalize_student_code(&v),
        Err(e) => return e,
    };

    let student = match enrollment::find_by_code(conn, &code) {
        Ok(Some(s)) => s,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "studentCode": code })),
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let scores = match store::scores_for_student(conn, &student.id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let assessments = match store::assessments_for_student(conn, &student.id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };

    ok(
        &req.id,
        json!({
            "student": student,
            "grades": group_by_grade(scores),
            "assessments": assessments,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentScores" => Some(handle_student_scores(state, req)),
        _ => None,
    }
}
