use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATA_FILE: &str = "ptm_data.csv";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_WORDS: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read secrets file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("secrets file {path} is not valid TOML: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    BadTimeout { key: &'static str, value: String },
}

/// API credential. Never printed, not even through `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Blank keys count as missing.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Process-wide settings, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_file: PathBuf,
    pub api_key: Option<ApiKey>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub max_words: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

/// Shape of the optional secrets file. Keys mirror the environment names
/// for the credential and stay lowercase for the rest.
#[derive(Debug, Default, Deserialize)]
struct SecretsFile {
    #[serde(rename = "GEMINI_API_KEY")]
    gemini_api_key: Option<String>,
    model: Option<String>,
    data_file: Option<PathBuf>,
    api_base: Option<String>,
    timeout_secs: Option<u64>,
}

impl Config {
    /// Defaults, then the secrets file, then the process environment.
    ///
    /// Never fails: a value that cannot be used is skipped and reported
    /// alongside the config, so the remaining settings still apply.
    pub fn from_env() -> (Self, Vec<ConfigError>) {
        Self::resolve(|key| std::env::var(key).ok())
    }

    pub fn resolve<F>(lookup: F) -> (Self, Vec<ConfigError>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        let mut problems = Vec::new();

        let secrets_path = lookup("PTMD_SECRETS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRETS_FILE));
        match read_secrets_file(&secrets_path) {
            Ok(Some(file)) => cfg.apply_file(file),
            Ok(None) => {}
            Err(e) => problems.push(e),
        }

        if let Some(v) = lookup("GEMINI_API_KEY") {
            cfg.api_key = ApiKey::new(v);
        }
        if let Some(v) = lookup("PTMD_DATA_FILE").filter(|v| !v.trim().is_empty()) {
            cfg.data_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("PTMD_MODEL").filter(|v| !v.trim().is_empty()) {
            cfg.model = v.trim().to_string();
        }
        if let Some(v) = lookup("PTMD_API_BASE").filter(|v| !v.trim().is_empty()) {
            cfg.api_base = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("PTMD_TIMEOUT_SECS") {
            match v.trim().parse::<u64>().ok().filter(|s| *s > 0) {
                Some(secs) => cfg.timeout = Duration::from_secs(secs),
                None => problems.push(ConfigError::BadTimeout {
                    key: "PTMD_TIMEOUT_SECS",
                    value: v,
                }),
            }
        }

        (cfg, problems)
    }

    fn apply_file(&mut self, file: SecretsFile) {
        if let Some(k) = file.gemini_api_key {
            self.api_key = ApiKey::new(k);
        }
        if let Some(m) = file.model.filter(|m| !m.trim().is_empty()) {
            self.model = m.trim().to_string();
        }
        if let Some(p) = file.data_file {
            self.data_file = p;
        }
        if let Some(b) = file.api_base.filter(|b| !b.trim().is_empty()) {
            self.api_base = b.trim().trim_end_matches('/').to_string();
        }
        if let Some(t) = file.timeout_secs.filter(|t| *t > 0) {
            self.timeout = Duration::from_secs(t);
        }
    }
}

fn read_secrets_file(path: &Path) -> Result<Option<SecretsFile>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_string_lossy().to_string(),
                source,
            })
        }
    };
    toml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_string_lossy().to_string(),
            source,
        })
}
