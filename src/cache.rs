use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use xdg::BaseDirectories;

use crate::config::APP_NAME;

/// 保持する最近のリポジトリ数
pub const MAX_RECENT: usize = 20;

const RECENT_FILE: &str = "recent_repositories.json";

/// キャッシュディレクトリ: ~/.cache/prt/
pub fn cache_dir() -> PathBuf {
    BaseDirectories::with_prefix(APP_NAME)
        .map(|dirs| dirs.get_cache_home())
        .unwrap_or_else(|_| PathBuf::from(".cache"))
}

pub fn recent_path() -> PathBuf {
    cache_dir().join(RECENT_FILE)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    /// "owner/name"
    pub name: String,
    /// UNIX 秒
    pub visited_at: u64,
}

/// 最近開いたリポジトリ（新しい順）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRepositories {
    entries: Vec<RecentEntry>,
}

impl RecentRepositories {
    /// 読み込み。ファイルがない・壊れている場合は空として扱う。
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(recent) => recent,
            Err(e) => {
                tracing::warn!("Ignoring corrupt recent repositories file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// 先頭に移動（なければ追加）し、上限を超えた古いものを捨てる
    pub fn touch(&mut self, name: &str) {
        let visited_at = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.entries.retain(|e| e.name != name);
        self.entries.insert(
            0,
            RecentEntry {
                name: name.to_string(),
                visited_at,
            },
        );
        self.entries.truncate(MAX_RECENT);
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }
}

/// 既定の場所に訪問を記録する
pub fn record_visits<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<RecentRepositories> {
    let path = recent_path();
    let mut recent = RecentRepositories::load_from(&path);
    for name in names {
        recent.touch(name);
    }
    recent.save_to(&path)?;
    Ok(recent)
}
