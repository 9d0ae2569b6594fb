use anyhow::{Context, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calendar::Region;
use crate::ml::store::{DEFAULT_EXTENSION, DEFAULT_MODELS_DIR};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub app_name: String,
    pub app_version: String,
    /// Logger channel recorded on the root span
    pub logger: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub server: ServerSettings,
    pub models: ModelSettings,
    pub calendar: CalendarSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "silenus".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            logger: "LOGGER".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            server: ServerSettings::default(),
            models: ModelSettings::default(),
            calendar: CalendarSettings::default(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional config file, then environment variables.
    ///
    /// Top-level keys map to their upper-cased names (`APP_NAME`,
    /// `APP_VERSION`, `LOGGER`); nested keys use a double underscore
    /// (`SERVER__PORT`, `MODELS__DIR`, `CALENDAR__REGION`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Settings::default()).context("Failed to build default settings")?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        let settings: Settings = builder
            .add_source(Environment::default().separator("__"))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        if let Err(errors) = settings.validate() {
            anyhow::bail!("Invalid configuration: {}", errors.join(", "));
        }
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.app_name.trim().is_empty() {
            errors.push("app_name must not be empty".to_string());
        }
        if self.app_version.trim().is_empty() {
            errors.push("app_version must not be empty".to_string());
        }
        if self.server.port == 0 {
            errors.push("server.port must be > 0".to_string());
        }
        if self.models.dir.trim().is_empty() {
            errors.push("models.dir must not be empty".to_string());
        }
        if self.models.extension.trim().is_empty() || self.models.extension.starts_with('.') {
            errors.push("models.extension must be a bare extension such as 'json'".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub dir: String,
    pub extension: String,
    /// Symbols whose models are loaded at startup
    pub preload: Vec<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            dir: DEFAULT_MODELS_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            preload: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarSettings {
    pub region: Region,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.app_name, "silenus");
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.models.dir, "artifacts/models");
        assert_eq!(settings.calendar.region, Region::Brazil);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let settings = Settings {
            app_name: " ".to_string(),
            server: ServerSettings { port: 0, ..ServerSettings::default() },
            models: ModelSettings { extension: ".json".to_string(), ..ModelSettings::default() },
            ..Settings::default()
        };
        let errors = settings.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silenus.toml");
        std::fs::write(
            &path,
            r#"
log_format = "json"

[server]
port = 9100

[models]
dir = "/srv/models"
preload = ["PETR4", "VALE3"]

[calendar]
region = "brazil_b3"
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.models.dir, "/srv/models");
        assert_eq!(settings.models.preload, vec!["PETR4", "VALE3"]);
        assert_eq!(settings.calendar.region, Region::BrazilB3);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(settings.models.extension, "json");
    }
}
