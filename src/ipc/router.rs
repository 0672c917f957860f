use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let span = tracing::info_span!("request", id = %req.id, method = %req.method);
    let _guard = span.enter();

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::suggestions::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::feedback::try_handle(state, &req) {
        return resp;
    }

    tracing::warn!("unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
