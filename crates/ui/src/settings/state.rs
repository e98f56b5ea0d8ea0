use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use council_backend::{BackendConfig, DEFAULT_BASE_URL, DEFAULT_IDLE_TIMEOUT};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use gpui::{App, SharedString, Window};
use gpui_component::{Theme, ThemeMode, ThemeRegistry};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "council";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "COUNCIL_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouncilSettings {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Seconds without a stream event before a request is abandoned.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
    #[serde(default)]
    pub theme_name: String,
}

impl Default for CouncilSettings {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            idle_timeout_secs: default_idle_timeout_secs(),
            theme_mode: default_theme_mode(),
            theme_name: String::new(),
        }
    }
}

impl CouncilSettings {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(&self.backend_url)
            .with_idle_timeout(Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn normalized(mut self) -> Self {
        self.backend_url = if self.backend_url.trim().is_empty() {
            default_backend_url()
        } else {
            self.backend_url.trim().to_string()
        };
        if self.idle_timeout_secs == 0 {
            self.idle_timeout_secs = default_idle_timeout_secs();
        }
        self.theme_name = self.theme_name.trim().to_string();
        self
    }

    /// Switches to the given mode. A named theme pins one mode, so it is dropped.
    pub fn set_theme_mode(&mut self, mode: ThemeMode) {
        self.theme_mode = mode;
        self.theme_name.clear();
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        if let Some(theme_config) = ThemeRegistry::global(cx)
            .themes()
            .get(&SharedString::from(self.theme_name.clone()))
            .cloned()
        {
            let mode = theme_config.mode;
            let theme = Theme::global_mut(cx);
            if mode.is_dark() {
                theme.dark_theme = theme_config;
            } else {
                theme.light_theme = theme_config;
            }
            Theme::change(mode, window, cx);
            return;
        }

        Theme::change(self.theme_mode, window, cx);
    }
}

/// Live settings snapshot backed by `<config_dir>/council/settings.json`.
///
/// Reads layer built-in defaults, then the JSON file, then `COUNCIL_*` environment variables.
/// Edits are applied to both the file layer and the live snapshot; only the file layer is
/// written, so environment overrides never end up in `settings.json`.
pub struct SettingsStore {
    settings: Arc<ArcSwap<CouncilSettings>>,
    file_layer: ArcSwap<CouncilSettings>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".council"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        if !config_path.exists() {
            tracing::info!(path = ?config_path, "settings file not found, using defaults");
        }

        let file_figment = Figment::from(Serialized::defaults(CouncilSettings::default()))
            .merge(Json::file(&config_path));
        let file_layer = Self::extract(&config_path, file_figment.clone());
        let settings = Self::extract(
            &config_path,
            file_figment.merge(Env::prefixed(SETTINGS_ENV_PREFIX)),
        );

        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            file_layer: ArcSwap::from_pointee(file_layer),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<CouncilSettings> {
        self.settings.load_full()
    }

    /// Applies `edit` to the persisted layer and to the live snapshot, then saves the file.
    ///
    /// The live snapshot is left untouched when the write fails.
    pub fn update(
        &self,
        edit: impl Fn(&mut CouncilSettings),
    ) -> Result<Arc<CouncilSettings>, SettingsError> {
        let mut file_layer = CouncilSettings::clone(&self.file_layer.load());
        edit(&mut file_layer);
        let file_layer = file_layer.normalized();
        self.persist(&file_layer)?;
        self.file_layer.store(Arc::new(file_layer));

        let mut live = CouncilSettings::clone(&self.settings.load());
        edit(&mut live);
        let live = Arc::new(live.normalized());
        self.settings.store(live.clone());
        Ok(live)
    }

    fn extract(path: &Path, figment: Figment) -> CouncilSettings {
        match figment.extract::<CouncilSettings>() {
            Ok(settings) => settings.normalized(),
            Err(error) => {
                tracing::warn!(path = ?path, error = %error, "failed to parse settings, using defaults");
                CouncilSettings::default()
            }
        }
    }

    fn persist(&self, settings: &CouncilSettings) -> Result<(), SettingsError> {
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

        tracing::info!(path = ?self.config_path, "saved settings");
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

fn default_backend_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT.as_secs()
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Light
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}
