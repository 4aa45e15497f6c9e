use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use unolingo_llm::{
    DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_SIMULATED_DELAY, DEFAULT_SYSTEM_PROMPT,
    ResponderConfig, ResponderKind,
};

use crate::coordinator::DEFAULT_MIN_SEND_INTERVAL;
use crate::manager::ManagerOptions;

pub const SETTINGS_DIRECTORY_NAME: &str = "unolingo";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "UNOLINGO_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponderSettings {
    #[serde(default)]
    pub kind: ResponderKind,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,
}

impl Default for ResponderSettings {
    fn default() -> Self {
        Self {
            kind: ResponderKind::default(),
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            simulated_delay_ms: default_simulated_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSettings {
    /// Minimum spacing between accepted sends.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_seed_samples")]
    pub seed_samples: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            seed_samples: default_seed_samples(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub responder: ResponderSettings,
    #[serde(default)]
    pub send: SendSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Settings {
    pub fn normalized(mut self) -> Self {
        let responder = &mut self.responder;
        responder.endpoint = responder.endpoint.trim().to_string();
        if responder.endpoint.is_empty() {
            responder.endpoint = default_endpoint();
        }
        responder.api_key = responder.api_key.trim().to_string();
        responder.model = responder.model.trim().to_string();
        if responder.model.is_empty() {
            responder.model = default_model();
        }
        if responder.system_prompt.trim().is_empty() {
            responder.system_prompt = default_system_prompt();
        }

        self.storage.data_dir = self
            .storage
            .data_dir
            .take()
            .filter(|path| !path.as_os_str().is_empty());

        self
    }

    pub fn to_responder_config(&self) -> ResponderConfig {
        ResponderConfig::new(self.responder.kind, &self.responder.endpoint)
            .with_api_key(&self.responder.api_key)
            .with_model(&self.responder.model)
            .with_system_prompt(&self.responder.system_prompt)
            .with_simulated_delay(Duration::from_millis(self.responder.simulated_delay_ms))
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            min_send_interval: Duration::from_millis(self.send.min_interval_ms),
            seed_samples: self.storage.seed_samples,
        }
    }

    /// Directory holding the session snapshot.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
    }
}

/// Settings shared through an atomically swapped snapshot.
pub struct SettingsStore {
    settings: Arc<ArcSwap<Settings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".unolingo"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_sources(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.settings.load_full()
    }

    pub fn update(&self, settings: Settings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    /// Defaults, then the JSON file if present, then `UNOLINGO_*` variables
    /// (`__` separates nested keys, e.g. `UNOLINGO_RESPONDER__API_KEY`).
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if path.exists() {
            figment = figment.merge(Json::file(path));
        } else {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }
        figment.merge(Env::prefixed(SETTINGS_ENV_PREFIX).split("__"))
    }

    fn load_from_sources(path: &Path) -> Settings {
        match Self::figment(path).extract::<Settings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                Settings::default()
            }
        }
    }

    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
        .unwrap_or_else(|| PathBuf::from(".unolingo"))
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_simulated_delay_ms() -> u64 {
    u64::try_from(DEFAULT_SIMULATED_DELAY.as_millis()).unwrap_or(u64::MAX)
}

fn default_min_interval_ms() -> u64 {
    u64::try_from(DEFAULT_MIN_SEND_INTERVAL.as_millis()).unwrap_or(u64::MAX)
}

fn default_seed_samples() -> bool {
    true
}
