use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub engagement: EngagementConfig,
}

/// Tuning knobs for the proactive engagement core.
///
/// The loop/thread thresholds sit deliberately close to 1.0: proactive
/// interruptions must be rare, and most candidates fall below threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Minimum salience before the idle-breaker will ask about an open loop.
    #[serde(default = "default_loop_salience_threshold")]
    pub loop_salience_threshold: f64,
    /// Minimum intensity before the idle-breaker will share a thought.
    #[serde(default = "default_thread_intensity_threshold")]
    pub thread_intensity_threshold: f64,
    /// Minimum intensity for a thread to be eligible at all.
    #[serde(default = "default_min_thread_intensity")]
    pub min_thread_intensity: f64,
    /// Hours a thread stays ineligible after being mentioned.
    #[serde(default = "default_thread_cooldown_hours")]
    pub thread_cooldown_hours: i64,
    /// Hours a thread must age before it becomes eligible.
    #[serde(default = "default_thread_min_age_hours")]
    pub thread_min_age_hours: i64,
    /// Score boost for threads that are about the user.
    #[serde(default = "default_user_related_boost")]
    pub user_related_boost: f64,
    /// Surface budget stamped onto newly created open loops.
    #[serde(default = "default_max_surfaces")]
    pub default_max_surfaces: u32,
    /// When true, dedup only matches loops of the same type.
    #[serde(default)]
    pub dedup_scope_loop_type: bool,
    /// Master switch for low-priority proactive check-ins.
    #[serde(default = "default_true")]
    pub checkins_enabled: bool,
    #[serde(default = "default_sweep_poll_secs")]
    pub sweep_poll_secs: u64,
    /// Terminal promises older than this are deleted by the sweep.
    #[serde(default = "default_promise_retention_days")]
    pub promise_retention_days: i64,
}

fn default_loop_salience_threshold() -> f64 {
    0.8
}

fn default_thread_intensity_threshold() -> f64 {
    0.9
}

fn default_min_thread_intensity() -> f64 {
    0.6
}

fn default_thread_cooldown_hours() -> i64 {
    24
}

fn default_thread_min_age_hours() -> i64 {
    4
}

fn default_user_related_boost() -> f64 {
    0.1
}

fn default_max_surfaces() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_sweep_poll_secs() -> u64 {
    60
}

fn default_promise_retention_days() -> i64 {
    30
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            loop_salience_threshold: default_loop_salience_threshold(),
            thread_intensity_threshold: default_thread_intensity_threshold(),
            min_thread_intensity: default_min_thread_intensity(),
            thread_cooldown_hours: default_thread_cooldown_hours(),
            thread_min_age_hours: default_thread_min_age_hours(),
            user_related_boost: default_user_related_boost(),
            default_max_surfaces: default_max_surfaces(),
            dedup_scope_loop_type: false,
            checkins_enabled: default_true(),
            sweep_poll_secs: default_sweep_poll_secs(),
            promise_retention_days: default_promise_retention_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let idlekeeper_dir = home.join(".idlekeeper");

        Self {
            workspace_dir: idlekeeper_dir.join("workspace"),
            config_path: idlekeeper_dir.join("config.toml"),
            engagement: EngagementConfig::default(),
        }
    }
}

impl Config {
    /// Load the config file, writing a default one on first run.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Self::load_or_init_at(defaults.config_path.clone(), defaults.workspace_dir.clone())
    }

    /// Same as [`Config::load_or_init`] with explicit paths (tests, daemons).
    pub fn load_or_init_at(
        config_path: PathBuf,
        workspace_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let mut config = Self::load_from(&config_path)?;
            config.workspace_dir = workspace_dir;
            config.validate()?;
            return Ok(config);
        }

        let config = Self {
            workspace_dir,
            config_path,
            ..Self::default()
        };
        config.save()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized =
            toml::to_string(self).map_err(|e| ConfigError::Load(e.to_string()))?;
        fs::write(&self.config_path, serialized)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let eng = &self.engagement;
        for (name, value) in [
            ("loop_salience_threshold", eng.loop_salience_threshold),
            ("thread_intensity_threshold", eng.thread_intensity_threshold),
            ("min_thread_intensity", eng.min_thread_intensity),
            ("user_related_boost", eng.user_related_boost),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if eng.default_max_surfaces == 0 {
            return Err(ConfigError::Validation(
                "default_max_surfaces must be positive".into(),
            ));
        }

        if eng.promise_retention_days <= 0 {
            return Err(ConfigError::Validation(
                "promise_retention_days must be positive".into(),
            ));
        }

        Ok(())
    }
}
