//! 外部エディタでコメント本文を書く
//!
//! エディタは 設定 → `$VISUAL` → `$EDITOR` → `vi` の順に探し、PATH にある最初のものを使う。

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::process::Command;
use tempfile::Builder;
use tracing::{debug, warn};

const FALLBACK_EDITOR: &str = "vi";
const MARKER_OPEN: &str = "<!--";

/// 起動するエディタのプログラムと引数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EditorCommand {
    /// 候補を順に試し、PATH に見つかったものを返す。
    /// 1 つも見つからなければ先頭の候補を返し、起動時のエラーで知らせる。
    pub fn resolve(configured: Option<&str>) -> Result<Self> {
        let candidates = candidates(
            configured,
            env::var("VISUAL").ok(),
            env::var("EDITOR").ok(),
        );
        let mut first: Option<Self> = None;
        for raw in &candidates {
            let Some(command) = Self::parse(raw)? else {
                continue;
            };
            if which::which(&command.program).is_ok() {
                if let Some(skipped) = first.as_ref().filter(|f| *f != &command) {
                    warn!(
                        skipped = %skipped.program,
                        resolved = %command.program,
                        "Editor not found in PATH, falling back"
                    );
                }
                return Ok(command);
            }
            first.get_or_insert(command);
        }
        Ok(first.unwrap_or_else(|| Self {
            program: FALLBACK_EDITOR.to_string(),
            args: Vec::new(),
        }))
    }

    /// `emacsclient -c -a ""` のような引数付きの指定を分割する
    fn parse(raw: &str) -> Result<Option<Self>> {
        let mut parts = shell_words::split(raw)
            .with_context(|| format!("Invalid editor command '{}'", raw))?
            .into_iter();
        Ok(parts.next().map(|program| Self {
            program,
            args: parts.collect(),
        }))
    }

    /// ファイルを開いてエディタの終了を待つ。正常終了なら true。
    fn edit(&self, path: &std::path::Path) -> Result<bool> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .status()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => anyhow!(
                    "Editor '{}' not found. Set 'editor' in ~/.config/prt/config.toml \
                     or $VISUAL / $EDITOR to an installed editor.",
                    self.program
                ),
                _ => anyhow!("Failed to launch editor '{}': {}", self.program, e),
            })?;
        debug!(editor = %self.program, ?status, "Editor exited");
        Ok(status.success())
    }
}

fn candidates(
    configured: Option<&str>,
    visual: Option<String>,
    editor: Option<String>,
) -> Vec<String> {
    let non_blank = |s: &String| !s.trim().is_empty();
    configured
        .map(String::from)
        .filter(non_blank)
        .into_iter()
        .chain(visual.filter(non_blank))
        .chain(editor.filter(non_blank))
        .chain(std::iter::once(FALLBACK_EDITOR.to_string()))
        .collect()
}

/// エディタに渡す下書き。`<!--` で始まる行は送信時に取り除く。
pub struct CommentDraft<'a> {
    /// 付け先の説明（`src/lib.rs:12` や `reply to comment 42`）
    pub context: &'a str,
}

impl CommentDraft<'_> {
    pub fn template(&self) -> String {
        format!(
            "{m} prt: write your comment below -->\n\
             {m} {} -->\n\
             {m} save and quit to post, leave empty to cancel -->\n\n",
            self.context,
            m = MARKER_OPEN
        )
    }

    /// 保存内容から本文を取り出す。空なら None。
    pub fn body(content: &str) -> Option<String> {
        let body = content
            .lines()
            .filter(|line| !line.trim_start().starts_with(MARKER_OPEN))
            .collect::<Vec<_>>()
            .join("\n");
        let body = body.trim();
        (!body.is_empty()).then(|| body.to_string())
    }
}

/// コメント本文をエディタで書く。空のまま保存するか異常終了すればキャンセル（None）。
pub fn open_comment_editor(editor: Option<&str>, context: &str) -> Result<Option<String>> {
    let file = Builder::new()
        .prefix("prt-comment-")
        .suffix(".md")
        .tempfile()
        .context("Failed to create comment draft")?;
    fs::write(file.path(), CommentDraft { context }.template())
        .context("Failed to write comment draft")?;

    let command = EditorCommand::resolve(editor)?;
    if !command.edit(file.path())? {
        return Ok(None);
    }

    let content = fs::read_to_string(file.path()).context("Failed to read comment draft")?;
    Ok(CommentDraft::body(&content))
}
