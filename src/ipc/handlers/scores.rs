use crate::enrollment::SqliteDirectory;
use crate::grid;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::load_import_config;
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteStore;
use crate::upload;
use serde_json::json;
use std::path::PathBuf;

fn handle_import_files(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw_paths) = req.params.get("paths").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "paths must be an array", None);
    };
    let mut paths = Vec::with_capacity(raw_paths.len());
    for (i, p) in raw_paths.iter().enumerate() {
        let Some(s) = p.as_str() else {
            return err(
                &req.id,
                "bad_params",
                "paths must contain strings",
                Some(json!({ "index": i })),
            );
        };
        paths.push(PathBuf::from(s));
    }
    let cfg = match load_import_config(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };

    let directory = SqliteDirectory::new(conn);
    let mut store = SqliteStore::new(conn);
    let files = upload::process_files(&paths, &directory, &mut store, &cfg);
    ok(&req.id, json!({ "files": files }))
}

fn handle_import_grid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(rows) = req.params.get("rows").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "rows must be an array of arrays", None);
    };
    if let Some(i) = rows.iter().position(|r| !r.is_array()) {
        return err(
            &req.id,
            "bad_params",
            "rows must be an array of arrays",
            Some(json!({ "row": i })),
        );
    }
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("grid");
    let cfg = match load_import_config(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };

    let cells = grid::grid_from_json(rows);
    let directory = SqliteDirectory::new(conn);
    let mut store = SqliteStore::new(conn);
    let report = upload::process_named_grid(name, &cells, &directory, &mut store, &cfg);
    ok(&req.id, json!(report))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.importFiles" => Some(handle_import_files(state, req)),
        "scores.importGrid" => Some(handle_import_grid(state, req)),
        _ => None,
    }
}
