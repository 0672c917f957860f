use crate::config::Config;
use crate::store::DatasetStore;
use crate::suggest::TextGenerator;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub store: DatasetStore,
    /// Present only when a credential is configured.
    pub generator: Option<Box<dyn TextGenerator>>,
    /// Startup problems the shell should show once.
    pub notices: Vec<String>,
}

impl AppState {
    pub fn new(config: Config, generator: Option<Box<dyn TextGenerator>>) -> Self {
        let store = DatasetStore::new(config.data_file.clone());
        Self {
            config,
            store,
            generator,
            notices: Vec::new(),
        }
    }
}
