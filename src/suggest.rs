use crate::config::{ApiKey, Config};
use crate::dataset::{format_score, StudentRecord};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const FALLBACK_TEXT: &str = "Unable to generate suggestions at this time.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Something that turns a prompt into completion text.
pub trait TextGenerator {
    fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generated {
    pub text: String,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn build_prompt(record: &StudentRecord, parent_feedback: &str, max_words: u32) -> String {
    format!(
        "\n    You are a helpful teacher providing concise suggestions to parents (within {max_words} words) based on their child's performance and their feedback.\n    \
         Student Performance Data:\n    \
         Name: {name}\n    \
         Math: {math}\n    \
         Science: {science}\n    \
         English: {english}\n    \
         Attendance: {attendance}%\n    \
         Strengths: {strengths}\n    \
         Weaknesses: {weaknesses}\n    \
         Teacher's Comments: {comments}\n    \
         Existing Suggestions: {suggestions}\n    \
         Parent Feedback: {parent_feedback}\n\n    \
         Generate 2-3 actionable suggestions for parents to support their child's learning. \n    \
         Keep responses short and practical, aiming for approximately {max_words} words or less.\n    ",
        name = record.name,
        math = format_score(record.math),
        science = format_score(record.science),
        english = format_score(record.english),
        attendance = format_score(record.attendance),
        strengths = record.strengths,
        weaknesses = record.weaknesses,
        comments = record.comments,
        suggestions = record.suggestions,
    )
}

/// Builds the prompt and asks the model. The word limit is only part of the
/// prompt; the reply comes back untouched. Any failure yields the fallback
/// text plus a warning for the user instead of an error.
pub fn generate(
    generator: &dyn TextGenerator,
    record: &StudentRecord,
    parent_feedback: &str,
    max_words: u32,
) -> Generated {
    let prompt = build_prompt(record, parent_feedback, max_words);
    tracing::debug!(prompt_chars = prompt.len(), max_words, "requesting suggestions");
    match generator.generate_text(&prompt) {
        Ok(text) => {
            tracing::info!(response_chars = text.len(), "suggestions generated");
            Generated {
                text,
                fallback: false,
                warning: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "suggestion generation failed");
            Generated {
                text: FALLBACK_TEXT.to_string(),
                fallback: true,
                warning: Some(format!(
                    "Error generating suggestions from Gemini API: {e}"
                )),
            }
        }
    }
}

/// Blocking client for the Gemini `generateContent` REST call.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    model: String,
    api_key: ApiKey,
}

impl GeminiClient {
    pub fn new(cfg: &Config, api_key: ApiKey) -> Result<Self, GenerationError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: cfg.api_base.clone(),
            model: cfg.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn extract_text(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let parts = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .ok_or_else(|| GenerationError::Malformed("no candidates in response".to_string()))?;
    let text: String = parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() {
        return Err(GenerationError::Malformed(
            "candidate has no text parts".to_string(),
        ));
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

impl TextGenerator for GeminiClient {
    fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        tracing::info!(model = %self.model, "calling text-generation service");
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose())
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        extract_text(&body)
    }
}
