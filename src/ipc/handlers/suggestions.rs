use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, optional_u32, required_str};
use crate::ipc::types::{AppState, Request};
use crate::suggest;

pub const MISSING_KEY_MESSAGE: &str =
    "Please set the Gemini API key to generate dynamic suggestions.";

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let feedback = optional_str(req, "feedback").unwrap_or("");
    let max_words = match optional_u32(req, "maxWords") {
        Ok(v) => v.unwrap_or(state.config.max_words),
        Err(resp) => return resp,
    };

    // The generator itself does not check for a credential; this is the gate.
    let Some(generator) = state.generator.as_deref() else {
        return err(&req.id, "suggestions_disabled", MISSING_KEY_MESSAGE, None);
    };
    let Some(rec) = state.store.dataset().select(name) else {
        return err(
            &req.id,
            "not_found",
            format!("no student named {name:?}"),
            None,
        );
    };

    let generated = suggest::generate(generator, rec, feedback, max_words);
    match serde_json::to_value(&generated) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "suggestions.generate" => Some(handle_generate(state, req)),
        _ => None,
    }
}
