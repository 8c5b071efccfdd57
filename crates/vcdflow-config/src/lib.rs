pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use vcdflow_cloud::ProviderConfig;
use vcdflow_cloud::config::DEFAULT_MAX_RETRY_TIMEOUT;

/// Environment variable naming the manifest directly
pub const CONFIG_PATH_ENV: &str = "VCD_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["vcd.local.yaml", "vcd.yaml"];

/// vcdflowのグローバル設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("vcdflow");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// プロジェクトのマニフェストを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 VCD_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: vcd.local.yaml, vcd.yaml
/// 3. ./.vcdflow/vcd.yaml
/// 4. ~/.config/vcdflow/vcd.yaml (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_config = current_dir.join(".vcdflow").join("vcd.yaml");
    if project_config.exists() {
        return Ok(project_config);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("vcdflow").join("vcd.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ManifestNotFound)
}

/// `provider:` section of a manifest; every field may also come from the
/// environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderSection {
    pub user: Option<String>,
    pub password: Option<String>,
    pub org: Option<String>,
    pub vdc: Option<String>,
    pub url: Option<String>,
    pub max_retry_timeout: Option<u64>,
    pub allow_unverified_ssl: Option<bool>,
}

#[derive(Deserialize)]
struct ManifestHead {
    #[serde(default)]
    provider: ProviderSection,
}

fn env_value(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(name: &'static str, value: String) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name, value }),
    }
}

impl ProviderSection {
    /// Read the `provider:` section; other top-level keys are ignored
    pub fn from_manifest(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let head: ManifestHead = serde_yaml::from_str(content)?;
        Ok(head.provider)
    }

    /// 環境変数 VCD_* で上書き
    pub fn with_env_overrides(mut self) -> Result<Self> {
        for (name, field) in [
            ("VCD_USER", &mut self.user),
            ("VCD_PASSWORD", &mut self.password),
            ("VCD_ORG", &mut self.org),
            ("VCD_VDC", &mut self.vdc),
            ("VCD_URL", &mut self.url),
        ] {
            if let Some(value) = env_value(name) {
                *field = Some(value);
            }
        }

        if let Some(value) = env_value("VCD_MAX_RETRY_TIMEOUT") {
            let seconds = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "VCD_MAX_RETRY_TIMEOUT",
                value: value.clone(),
            })?;
            self.max_retry_timeout = Some(seconds);
        }
        if let Some(value) = env_value("VCD_ALLOW_UNVERIFIED_SSL") {
            self.allow_unverified_ssl = Some(parse_bool("VCD_ALLOW_UNVERIFIED_SSL", value)?);
        }

        Ok(self)
    }

    /// Typed settings; all missing required values are reported together
    pub fn into_config(self) -> Result<ProviderConfig> {
        let missing: Vec<&'static str> = [
            ("user", self.user.is_none()),
            ("password", self.password.is_none()),
            ("org", self.org.is_none()),
            ("url", self.url.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingSettings(missing));
        }

        let config = ProviderConfig {
            user: self.user.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            org: self.org.unwrap_or_default(),
            vdc: self.vdc,
            url: self.url.unwrap_or_default(),
            max_retry_timeout: self.max_retry_timeout.unwrap_or(DEFAULT_MAX_RETRY_TIMEOUT),
            allow_unverified_ssl: self.allow_unverified_ssl.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Provider settings from a manifest file, overridden by the environment
pub fn load_provider_config(path: &Path) -> Result<ProviderConfig> {
    let content = std::fs::read_to_string(path)?;
    ProviderSection::from_manifest(&content)?
        .with_env_overrides()?
        .into_config()
}
