use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dosage::{DEFAULT_DILUTION_PRESETS, DEFAULT_WATER_PRESETS_ML};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dosage: DosageConfig,
    #[serde(default)]
    pub recommend: RecommendConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// JSON fixture to serve from instead of the remote API. Empty means online.
    #[serde(default)]
    pub offline_fixture: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DosageConfig {
    #[serde(default = "default_water_presets")]
    pub water_presets_ml: Vec<f64>,
    #[serde(default = "default_dilution_presets")]
    pub dilution_presets: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Local,
    Server,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    #[serde(default = "default_top")]
    pub top: usize,
    #[serde(default)]
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub user_id: Option<u64>,
    pub offline_fixture: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/bonsai-care/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("failed parsing TOML config: {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(api_url) = overrides.api_url {
            self.api.base_url = api_url;
        }
        if let Some(user_id) = overrides.user_id {
            self.session.user_id = Some(user_id);
        }
        if let Some(fixture) = overrides.offline_fixture {
            self.api.offline_fixture = fixture;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_fixture_path(&self) -> Option<PathBuf> {
        let raw = self.api.offline_fixture.trim();
        (!raw.is_empty()).then(|| expand_tilde(raw))
    }

    pub fn default_template() -> String {
        let template = r#"[api]
base_url = "http://localhost:5000"
timeout_secs = 15
offline_fixture = ""

[session]
# user_id = 1
# username = "gardener"

[dosage]
water_presets_ml = [100, 200, 500, 1000, 2000, 5000]
dilution_presets = [100, 200, 500, 1000, 2000, 3000, 5000]

[recommend]
top = 5
aggregation = "local"

[server]
host = "127.0.0.1"
port = 8787
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            offline_fixture: String::new(),
        }
    }
}

impl Default for DosageConfig {
    fn default() -> Self {
        Self {
            water_presets_ml: default_water_presets(),
            dilution_presets: default_dilution_presets(),
        }
    }
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            top: default_top(),
            aggregation: Aggregation::Local,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_water_presets() -> Vec<f64> {
    DEFAULT_WATER_PRESETS_ML.to_vec()
}

fn default_dilution_presets() -> Vec<f64> {
    DEFAULT_DILUTION_PRESETS.to_vec()
}

fn default_top() -> usize {
    5
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed = Config::parse(&Config::default_template()).expect("template");
        let defaults = Config::default();
        assert_eq!(parsed.api.base_url, defaults.api.base_url);
        assert_eq!(parsed.dosage.water_presets_ml, defaults.dosage.water_presets_ml);
        assert_eq!(parsed.dosage.dilution_presets, defaults.dosage.dilution_presets);
        assert_eq!(parsed.recommend.aggregation, Aggregation::Local);
        assert_eq!(parsed.server.port, 8787);
        assert_eq!(parsed.session, SessionConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed = Config::parse(
            r#"
[session]
user_id = 7

[recommend]
aggregation = "server"
"#,
        )
        .expect("config");
        assert_eq!(parsed.session.user_id, Some(7));
        assert_eq!(parsed.recommend.aggregation, Aggregation::Server);
        assert_eq!(parsed.recommend.top, 5);
        assert_eq!(parsed.api.timeout_secs, 15);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            api_url: Some("https://bonsai.example".to_string()),
            user_id: Some(3),
            offline_fixture: Some("fixture.json".to_string()),
        });
        assert_eq!(config.api.base_url, "https://bonsai.example");
        assert_eq!(config.session.user_id, Some(3));
        assert_eq!(
            config.resolved_fixture_path(),
            Some(PathBuf::from("fixture.json"))
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/bonsai-care.toml"))).expect("load");
        assert_eq!(config.api.offline_fixture, "");
        assert!(config.resolved_fixture_path().is_none());
    }
}
