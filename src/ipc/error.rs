use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_carries_optional_details() {
        let e = err("7", "bad_params", "missing params.path", None);
        assert_eq!(e["ok"], false);
        assert_eq!(e["error"]["code"], "bad_params");
        assert!(e["error"].get("details").is_none());

        let e = err("7", "grid_load_failed", "x", Some(json!({ "path": "a.xlsx" })));
        assert_eq!(e["error"]["details"]["path"], "a.xlsx");
        assert_eq!(ok("8", json!(1))["result"], 1);
    }
}
