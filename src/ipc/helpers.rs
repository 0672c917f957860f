use crate::ipc::error::err;
use crate::ipc::types::Request;

/// A string param that must be present. On failure the ready-made
/// `bad_params` response comes back as the error.
pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{key}"), None))
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn optional_u32(req: &Request, key: &str) -> Result<Option<u32>, serde_json::Value> {
    match req.params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("params.{key} must be a positive integer"),
                    None,
                )
            }),
    }
}
