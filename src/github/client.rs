//! `gh` CLI の呼び出し
//!
//! 認証やホスト設定は `gh` に任せ、ここでは引数を組み立てて stdout を受け取るだけ。
//! `gh` はブロッキングなプロセスなので `spawn_blocking` の中で待つ。

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use std::process::Command;
use tracing::debug;

/// `gh <args>` を実行して stdout を返す。終了コードが 0 以外なら stderr をエラーにする。
pub async fn gh(args: Vec<String>) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        debug!(?args, "gh");
        let output = Command::new("gh")
            .args(&args)
            .output()
            .context("Failed to run `gh`; is the GitHub CLI installed?")?;
        if !output.status.success() {
            bail!(
                "gh {} failed: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout).context("`gh` printed invalid UTF-8")
    })
    .await
    .context("gh task was cancelled")?
}

/// `gh pr <subcommand> <number> -R owner/name [extra...]`
pub async fn gh_pr(subcommand: &str, repo: &str, number: u64, extra: &[&str]) -> Result<String> {
    let mut args = vec![
        "pr".to_string(),
        subcommand.to_string(),
        number.to_string(),
        "-R".to_string(),
        repo.to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    gh(args).await
}

/// `gh api` の 1 リクエスト
#[derive(Debug, Clone)]
pub struct GhRequest {
    method: &'static str,
    endpoint: String,
    paginate: bool,
    /// `-f key=value`（文字列）または `-F key=value`（数値など型付き）
    fields: Vec<(&'static str, String)>,
}

impl GhRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new("GET", endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new("POST", endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new("PUT", endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new("DELETE", endpoint)
    }

    fn new(method: &'static str, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            paginate: false,
            fields: Vec::new(),
        }
    }

    /// 全ページを取得する（GET のみ意味がある）
    pub fn paginate(mut self) -> Self {
        self.paginate = true;
        self
    }

    pub fn field(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.fields.push(("-f", format!("{}={}", key, value.as_ref())));
        self
    }

    pub fn typed_field(mut self, key: &str, value: impl ToString) -> Self {
        self.fields.push(("-F", format!("{}={}", key, value.to_string())));
        self
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["api".to_string()];
        if self.method != "GET" {
            args.push("--method".to_string());
            args.push(self.method.to_string());
        }
        if self.paginate {
            args.push("--paginate".to_string());
        }
        args.push(self.endpoint.clone());
        for (flag, pair) in &self.fields {
            args.push(flag.to_string());
            args.push(pair.clone());
        }
        args
    }

    /// 実行して stdout をそのまま返す
    pub async fn send(self) -> Result<String> {
        gh(self.args()).await
    }

    /// 実行して JSON をデコードする
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let endpoint = self.endpoint.clone();
        let output = self.send().await?;
        serde_json::from_str(&output)
            .with_context(|| format!("Unexpected response from {}", endpoint))
    }

    /// `--paginate` 付きで実行し、連結された配列を 1 つにまとめる
    pub async fn json_pages<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        let endpoint = self.endpoint.clone();
        let output = self.paginate().send().await?;
        concat_pages(&output).with_context(|| format!("Unexpected response from {}", endpoint))
    }
}

/// `gh api --paginate` はページごとの配列を区切りなしで出力する（`[..][..]`）
fn concat_pages<T: DeserializeOwned>(output: &str) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for page in serde_json::Deserializer::from_str(output).into_iter::<Vec<T>>() {
        items.extend(page?);
    }
    Ok(items)
}
