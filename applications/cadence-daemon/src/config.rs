/// Daemon configuration
use crate::error::{DaemonError, Result};
use cadence_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonConfig {
    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default = "default_simulation")]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Holds the play-count ledger and the queue snapshot
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSON array of tracks
    #[serde(default = "default_library_manifest")]
    pub library_manifest: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Advance playback with the wall clock instead of on demand
    #[serde(default = "default_realtime")]
    pub realtime: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            playback: PlaybackConfig::default(),
            simulation: default_simulation(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise `cadence.toml` in the
    /// working directory is used when present. Variables such as
    /// `CADENCE_PLAYBACK__SHUFFLE=true` override file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("cadence.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (prefixed with CADENCE_)
        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| DaemonError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| DaemonError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let playback = &self.playback;

        if playback.skip_threshold_ms > playback.play_threshold_ms {
            return Err(DaemonError::Config(format!(
                "skip threshold ({} ms) must not exceed play threshold ({} ms)",
                playback.skip_threshold_ms, playback.play_threshold_ms
            )));
        }

        if !(0.0..=1.0).contains(&playback.duck_volume) {
            return Err(DaemonError::Config(format!(
                "duck volume {} is outside 0.0..=1.0",
                playback.duck_volume
            )));
        }

        if playback.position_tick_ms == 0 || playback.multi_click_window_ms == 0 {
            return Err(DaemonError::Config(
                "position tick and click window must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn playcount_path(&self) -> PathBuf {
        self.storage.data_dir.join("playcount.json")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.data_dir.join("queue")
    }
}

// Default values
fn default_storage() -> StorageSettings {
    StorageSettings {
        data_dir: default_data_dir(),
        library_manifest: default_library_manifest(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_library_manifest() -> PathBuf {
    PathBuf::from("./library.json")
}

fn default_simulation() -> SimulationSettings {
    SimulationSettings {
        realtime: default_realtime(),
    }
}

fn default_realtime() -> bool {
    true
}
