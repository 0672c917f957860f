use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use crate::store::LoadOutcome;
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = state.store.is_loaded();
    let student_count = if loaded { state.store.dataset().len() } else { 0 };
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "dataFile": state.store.path().to_string_lossy(),
            "dataLoaded": loaded,
            "studentCount": student_count,
            "suggestionsEnabled": state.generator.is_some(),
            "model": state.config.model,
            "notices": state.notices,
        }),
    )
}

fn load_result(state: &mut AppState, outcome: LoadOutcome) -> serde_json::Value {
    let names = state.store.dataset().names();
    let mut result = json!({
        "studentCount": outcome.student_count,
        "names": names,
    });
    if let Some(notice) = outcome.notice {
        result["notice"] = json!(notice);
    }
    result
}

fn handle_dataset_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = state.store.load();
    ok(&req.id, load_result(state, outcome))
}

fn handle_dataset_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = state.store.refresh();
    ok(&req.id, load_result(state, outcome))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "dataset.load" => Some(handle_dataset_load(state, req)),
        "dataset.refresh" => Some(handle_dataset_refresh(state, req)),
        _ => None,
    }
}
