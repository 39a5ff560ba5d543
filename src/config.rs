use crate::error::{ObjectifyError, Result};
use objectify_common::MatchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const CATALOG_ENV: &str = "OBJECTIFY_CATALOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base_url: String,
    pub catalog_path: Option<PathBuf>,
    pub tolerance: f64,
    pub match_limit: usize,
    pub max_image_size: u32,
    pub timeout_seconds: u64,
    pub temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".into(),
            api_base_url: "https://generativelanguage.googleapis.com".into(),
            catalog_path: None,
            tolerance: 0.15,
            match_limit: 5,
            max_image_size: 1568,
            timeout_seconds: 60,
            temperature: 0.4,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ObjectifyError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("objectify"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key.clone().ok_or(ObjectifyError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_catalog_path(&mut self, path: PathBuf) -> Result<()> {
        self.catalog_path = Some(path);
        self.save()
    }

    /// カタログのパス（引数 > 環境変数 > 設定ファイル > ./catalog.csv）
    pub fn resolve_catalog_path(&self, override_path: Option<&std::path::Path>) -> PathBuf {
        if let Some(path) = override_path {
            return path.to_path_buf();
        }
        if let Ok(path) = std::env::var(CATALOG_ENV) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }
        self.catalog_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("catalog.csv"))
    }

    /// 設定ファイルの値から照合設定を作る
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            tolerance: self.tolerance,
            limit: self.match_limit,
            ..MatchConfig::default()
        }
    }
}
