use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One JSON-lines request: `{"id": "..", "method": "..", "params": {..}}`.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Sidecar session state. `db` is open once a workspace has been selected.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
