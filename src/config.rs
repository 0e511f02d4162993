// Configuration module: defaults, optional JSON file, then environment overrides

use crate::error::{OverlayError, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "EMOTION_OVERLAY_CONFIG";
/// Environment variable overriding the initial endpoint URL
pub const ENDPOINT_ENV: &str = "EMOTION_OVERLAY_URL";

pub const DEFAULT_ENDPOINT: &str = "https://your-colab-ngrok-url.ngrok.io/detect_emotion";

/// Ideal capture format requested from the camera driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CameraSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Initial value of the endpoint field.
    pub endpoint_url: String,
    pub camera: CameraSettings,
    /// Global timeout for one detection request, in seconds.
    pub request_timeout_secs: u64,
    /// Log destination; the app logs to file only.
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT.to_string(),
            camera: CameraSettings::default(),
            request_timeout_secs: 10,
            log_file: PathBuf::from("emotion_overlay.log"),
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file. Missing fields fall back to defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            OverlayError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Serialize settings to disk as pretty-printed JSON.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)
            .map_err(|e| OverlayError::Config(format!("failed to serialize settings: {e}")))?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Resolves the effective configuration.
    ///
    /// An absent file is not an error; a file that exists but cannot be read or parsed is,
    /// and is returned alongside the fallback so the caller can log it once logging is up.
    pub fn resolve() -> (Self, Option<OverlayError>) {
        let path = env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);

        let (mut config, problem) = if path.exists() {
            match Self::load_from_path(&path) {
                Ok(config) => (config, None),
                Err(e) => (Self::default(), Some(e)),
            }
        } else {
            (Self::default(), None)
        };

        config.apply_endpoint_override(env::var(ENDPOINT_ENV).ok());
        (config, problem)
    }

    fn apply_endpoint_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.endpoint_url = url;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Default config location (`config/emotion_overlay.json` under the working directory).
pub fn default_config_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/emotion_overlay.json"))
        .unwrap_or_else(|_| PathBuf::from("config/emotion_overlay.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn saved_settings_load_back() {
        let file = NamedTempFile::new().expect("tempfile");
        let mut settings = AppConfig::default();
        settings.endpoint_url = "http://localhost:5000/detect_emotion".into();
        settings.camera.fps = 15;
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppConfig::load_from_path(file.path()).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), r#"{ "camera": { "width": 1280 } }"#).expect("write");

        let loaded = AppConfig::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.endpoint_url, DEFAULT_ENDPOINT);
        assert_eq!(loaded.camera.width, 1280);
        assert_eq!(loaded.camera.height, 480);
        assert_eq!(loaded.request_timeout_secs, 10);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let file = NamedTempFile::new().expect("tempfile");
        fs::write(file.path(), "{ not json").expect("write");

        let err = AppConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, OverlayError::Config(_)));
    }

    #[test]
    fn blank_endpoint_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_endpoint_override(Some("   ".into()));
        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT);

        config.apply_endpoint_override(Some(" http://10.0.0.2/detect ".into()));
        assert_eq!(config.endpoint_url, "http://10.0.0.2/detect");
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
