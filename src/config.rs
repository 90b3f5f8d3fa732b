use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub repository: RepositorySettings,
    #[serde(default)]
    pub translations: TranslationSettings,
    pub inspection: InspectionSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub cors_allowed_origins: Vec<String>,
    pub max_payload_mb: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySettings {
    /// Root of `{report type}/{template name}.{doc_type}` template documents.
    pub templates_dir: PathBuf,
    /// Flat directory holding the generated drafts.
    pub reports_dir: PathBuf,
    /// Key of the document adapter, doubles as the file extension.
    pub doc_type: String,
}

/// Cargo name dictionaries: lower-case local name -> English name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationSettings {
    #[serde(default)]
    pub vegetables: HashMap<String, String>,
    #[serde(default)]
    pub fruits: HashMap<String, String>,
}

impl TranslationSettings {
    /// Vegetables win over fruits; unknown cargo translates to an empty string.
    pub fn translate(&self, cargo: &str) -> String {
        let key = cargo.to_lowercase();
        self.vegetables
            .get(&key)
            .or_else(|| self.fruits.get(&key))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectionSettings {
    /// Cargos whose colour table is followed by a second, adjacent one.
    pub double_color_table_cargos: Vec<String>,
}

impl InspectionSettings {
    pub fn has_double_color_table(&self, cargo: &str) -> bool {
        self.double_color_table_cargos
            .iter()
            .any(|c| c.trim().to_lowercase() == cargo)
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let defaults = Self::default();

        let s = Config::builder()
            // Built-in defaults, so config files only need to override
            .set_default("server.host", defaults.server.host.clone())?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("server.cors_allowed_origins", defaults.server.cors_allowed_origins.clone())?
            .set_default("server.max_payload_mb", defaults.server.max_payload_mb as i64)?
            .set_default(
                "repository.templates_dir",
                defaults.repository.templates_dir.to_string_lossy().to_string(),
            )?
            .set_default(
                "repository.reports_dir",
                defaults.repository.reports_dir.to_string_lossy().to_string(),
            )?
            .set_default("repository.doc_type", defaults.repository.doc_type.clone())?
            .set_default(
                "inspection.double_color_table_cargos",
                defaults.inspection.double_color_table_cargos.clone(),
            )?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Environment variables (with prefix INSPECTION_)
            .add_source(
                Environment::with_prefix("INSPECTION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    /// Load settings from environment variables directly (simpler for production)
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        // Server
        if let Ok(host) = env::var("SERVER_HOST") { self.server.host = host; }
        if let Ok(port) = env::var("SERVER_PORT") { self.server.port = port.parse().unwrap_or(8000); }

        // Repository
        if let Ok(path) = env::var("TEMPLATES_DIR") { self.repository.templates_dir = path.into(); }
        if let Ok(path) = env::var("REPORTS_DIR") { self.repository.reports_dir = path.into(); }
        if let Ok(doc_type) = env::var("DOC_TYPE") { self.repository.doc_type = doc_type; }

        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
                workers: None,
                cors_allowed_origins: vec!["*".to_string()],
                max_payload_mb: 50,
            },
            repository: RepositorySettings {
                templates_dir: PathBuf::from("./templates"),
                reports_dir: PathBuf::from("./reports"),
                doc_type: "json".to_string(),
            },
            translations: TranslationSettings::default(),
            inspection: InspectionSettings {
                double_color_table_cargos: vec!["apple".to_string(), "яблоко".to_string()],
            },
        }
    }
}
