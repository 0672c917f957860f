use crate::dataset::DatasetError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_feedback_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let feedback = match required_str(req, "feedback") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match state.store.save_feedback(name, feedback) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "message": "Feedback saved!",
                "updatedRows": summary.updated_rows,
                "sha256": summary.sha256,
                "savedAt": chrono::Utc::now().to_rfc3339(),
            }),
        ),
        Err(DatasetError::NotFound(n)) => err(
            &req.id,
            "not_found",
            format!("no student named {n:?}"),
            None,
        ),
        Err(e) => {
            tracing::error!(error = %e, "saving feedback failed");
            err(
                &req.id,
                "io_failed",
                format!("Error saving feedback: {e}"),
                Some(json!({ "dataFile": state.store.path().to_string_lossy() })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feedback.save" => Some(handle_feedback_save(state, req)),
        _ => None,
    }
}
