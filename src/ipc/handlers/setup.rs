use crate::db;
use crate::extract::ExtractConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Import => {
            serde_json::to_value(ExtractConfig::default()).unwrap_or_else(|_| json!({}))
        }
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => {
                let (min, max) = match k.as_str() {
                    "metadataRows" => (1, 50),
                    "codeScanCells" => (1, 10),
                    "headerWindow" => (6, 9),
                    "subjectWindow" => (20, 25),
                    "assessmentWindow" => (10, 15),
                    "batchSize" => (1, 500),
                    _ => return Err(format!("unknown import field: {}", k)),
                };
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, min, max)?));
            }
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Bad stored values leave the defaults in place.
            if let Err(msg) = merge_section_patch(section, &mut current, saved_obj) {
                tracing::warn!(key = section.key(), "ignoring stored setup: {msg}");
                current = default_section(section);
            }
        }
    }
    Ok(current)
}

/// Extraction tunables for the open workspace.
pub fn load_import_config(conn: &rusqlite::Connection) -> anyhow::Result<ExtractConfig> {
    let value = load_section(conn, SetupSection::Import)?;
    Ok(serde_json::from_value(value)?)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let import = match load_section(conn, SetupSection::Import) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "import": import }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
