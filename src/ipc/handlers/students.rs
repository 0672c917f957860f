use crate::dataset::format_score;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

pub const NO_DATA_NOTICE: &str =
    "No student data available. Please ensure the CSV file is correctly loaded.";

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = state.store.load();
    let names = state.store.dataset().names();
    let mut result = json!({ "names": names });
    if names.is_empty() {
        result["notice"] = json!(outcome.notice.unwrap_or_else(|| NO_DATA_NOTICE.to_string()));
    }
    ok(&req.id, result)
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let ds = state.store.dataset();
    if ds.is_empty() {
        return err(&req.id, "no_data", NO_DATA_NOTICE, None);
    }
    let Some(rec) = ds.select(name) else {
        return err(
            &req.id,
            "not_found",
            format!("no student named {name:?}"),
            None,
        );
    };

    let record = match serde_json::to_value(rec) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "internal", e.to_string(), None),
    };
    ok(
        &req.id,
        json!({
            "record": record,
            "scores": [
                { "subject": "Math", "value": format_score(rec.math) },
                { "subject": "Science", "value": format_score(rec.science) },
                { "subject": "English", "value": format_score(rec.english) },
            ],
            "attendanceDisplay": rec
                .attendance
                .map(|a| format!("{}%", format_score(Some(a))))
                .unwrap_or_default(),
            "feedbackPrefill": rec.parent_feedback.clone().unwrap_or_default(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        _ => None,
    }
}
