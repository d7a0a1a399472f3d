//! User configuration for nb-bootstrap
//!
//! Settings are layered: built-in defaults, then the user's `config.toml`,
//! then `NB_BOOTSTRAP_*` environment variables.

use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_ADAPTER_REGISTRY: &str = "https://registry.nonebot.dev/adapters.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mirror {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Adapter catalog url
    pub adapter_registry: String,
    /// Timeout for registry requests, in seconds
    pub request_timeout: u64,
    /// Interpreter used when no project venv is found
    pub python: Option<String>,
    /// PyPI mirrors offered by `pip-index`
    pub mirrors: Vec<Mirror>,
    /// Fallback built-in plugin names when nonebot cannot be queried
    pub builtin_plugins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let mirror = |name: &str, url: &str| Mirror {
            name: name.to_string(),
            url: url.to_string(),
        };
        Self {
            adapter_registry: DEFAULT_ADAPTER_REGISTRY.to_string(),
            request_timeout: 30,
            python: None,
            mirrors: vec![
                mirror("清华大学", "https://pypi.tuna.tsinghua.edu.cn/simple"),
                mirror("中国科学技术大学", "https://pypi.mirrors.ustc.edu.cn/simple"),
                mirror("阿里云", "https://mirrors.aliyun.com/pypi/simple/"),
                mirror("豆瓣", "https://pypi.douban.com/simple/"),
            ],
            builtin_plugins: vec!["echo".to_string(), "single_session".to_string()],
        }
    }
}

impl Settings {
    /// Load settings from the default config file location
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_dir().join("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?)
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("NB_BOOTSTRAP"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Get platform-specific config directory
pub fn get_config_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "nonebot", "nb-bootstrap") {
        proj_dirs.config_dir().to_path_buf()
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(".config").join("nb-bootstrap")
    }
}
