use crate::error::{ObserverError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RESTエンドポイントのベースURL
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    /// 写真の保存先バケット
    pub photo_bucket: String,
    /// ローカルキャッシュファイル（未指定ならデータディレクトリ）
    pub cache_path: Option<PathBuf>,
    /// リモート読込後の静穏期間（ミリ秒）
    pub load_quiet_period_ms: u64,
    /// 同期後のクールダウン（ミリ秒）
    pub sync_cooldown_ms: u64,
    /// 全プロジェクト共通のパスワード
    pub master_password: Option<String>,
    /// 最後に開いたプロジェクト
    pub current_project: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            photo_bucket: "project-images".into(),
            cache_path: None,
            load_quiet_period_ms: 2000,
            sync_cooldown_ms: 5000,
            master_password: None,
            current_project: None,
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

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ObserverError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("observer").join("config.json"))
    }

    pub fn resolved_cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| ObserverError::Config("データディレクトリが見つかりません".into()))?;
        Ok(data_dir.join("observer").join(crate::cache::CACHE_FILE_NAME))
    }

    pub fn remote_url(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(url) = std::env::var("OBSERVER_REMOTE_URL") {
            return Ok(url);
        }
        self.remote_url.clone().ok_or(ObserverError::MissingRemote)
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var("OBSERVER_API_KEY").ok().or_else(|| self.api_key.clone())
    }

    pub fn load_quiet_period(&self) -> Duration {
        Duration::from_millis(self.load_quiet_period_ms)
    }

    pub fn sync_cooldown(&self) -> Duration {
        Duration::from_millis(self.sync_cooldown_ms)
    }

    pub fn set_remote_url(&mut self, url: String) -> Result<()> {
        self.remote_url = Some(url.trim_end_matches('/').to_string());
        self.save()
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    pub fn set_current_project(&mut self, project_id: Option<String>) -> Result<()> {
        self.current_project = project_id;
        self.save()
    }
}
