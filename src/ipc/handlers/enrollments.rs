use crate::enrollment::{self, NewEnrollment};
use crate::grid;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_enrollments_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("enrollments") else {
        return err(&req.id, "bad_params", "missing enrollments", None);
    };
    let entries: Vec<NewEnrollment> = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid enrollments: {e}"), None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let mut ids = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match enrollment::upsert(&tx, entry) {
            Ok(id) => ids.push(id),
            Err(e) => {
                return err(
                    &req.id,
                    "db_update_failed",
                    format!("{e:#}"),
                    Some(json!({ "index": i, "studentCode": entry.student_code })),
                )
            }
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "upserted": ids.len(), "ids": ids }))
}

fn handle_enrollments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let search = req.params.get("search").and_then(|v| v.as_str());
    match enrollment::list(conn, search) {
        Ok(rows) => ok(&req.id, json!({ "enrollments": rows })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_import_roster(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()).map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let default_cohort = req.params.get("defaultCohort").and_then(|v| v.as_str());

    let roster = match grid::load_grid(&path) {
        Ok(g) => g,
        Err(e) => {
            return err(
                &req.id,
                "grid_load_failed",
                e.to_string(),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    };
    match enrollment::import_roster(conn, &roster, default_cohort) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => err(&req.id, "bad_params", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.upsert" => Some(handle_enrollments_upsert(state, req)),
        "enrollments.list" => Some(handle_enrollments_list(state, req)),
        "enrollments.importRoster" => Some(handle_import_roster(state, req)),
        _ => None,
    }
}
