use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use crate::model::RepoKey;

/// XDG ディレクトリの接頭辞
pub const APP_NAME: &str = "prt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 空なら $VISUAL → $EDITOR → vi
    pub editor: String,
    /// 起動時に開くリポジトリ（"owner/name"）
    pub repositories: Vec<String>,
    /// 1 回の一覧取得で取る件数
    pub page_size: u32,
    /// バルク操作の同時実行数。0 は無制限。
    pub batch_concurrency: usize,
    /// `PRT_LOG` がないときのログフィルタ
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            editor: String::new(),
            repositories: Vec::new(),
            page_size: 30,
            batch_concurrency: 0,
            log_filter: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// ~/.config/prt/config.toml
    pub fn config_path() -> Option<PathBuf> {
        BaseDirectories::with_prefix(APP_NAME)
            .ok()
            .map(|dirs| dirs.get_config_file("config.toml"))
    }

    pub fn editor(&self) -> Option<&str> {
        Some(self.editor.as_str()).filter(|s| !s.trim().is_empty())
    }

    /// 設定ファイルと CLI 引数のリポジトリをまとめる（重複は先勝ち）
    pub fn repo_keys(&self, extra: &[String]) -> Result<Vec<RepoKey>> {
        let mut keys: Vec<RepoKey> = Vec::new();
        for raw in self.repositories.iter().chain(extra) {
            let key = parse_repo(raw)?;
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// "owner/name" を検証して RepoKey にする
pub fn parse_repo(raw: &str) -> Result<RepoKey> {
    let raw = raw.trim();
    let valid = match raw.split_once('/') {
        Some((owner, name)) => {
            let ok = |s: &str| {
                !s.is_empty()
                    && !s.starts_with('.')
                    && s.chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            };
            ok(owner) && ok(name)
        }
        None => false,
    };
    if !valid {
        bail!("Invalid repository '{}': expected owner/name", raw);
    }
    Ok(RepoKey::github(raw))
}
