use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::client::{GitError, GitUtilsClient};

/// ローカル作業コピーに対する `git` CLI ラッパー
pub struct GitCli {
    working_dir: Option<String>,
}

impl GitCli {
    pub fn new(working_dir: Option<String>) -> Self {
        Self { working_dir }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        // Disable C-quoting of non-ASCII paths to get raw UTF-8 output
        command.args(["-c", "core.quotePath=false"]);
        command.args(args);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, GitError> {
        let output = self.command(args).output().await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// コミットがローカルのオブジェクトストアにあるか確認する
    async fn ensure_commit(&self, hash: &str) -> Result<(), GitError> {
        let object = format!("{}^{{commit}}", hash);
        match self.run(&["cat-file", "-e", &object]).await {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed { .. }) => Err(GitError::MissingCommit(hash.to_string())),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl GitUtilsClient for GitCli {
    async fn get_diff_patch(&self, base: &str, head: &str) -> Result<Vec<u8>, GitError> {
        if base.is_empty() {
            return Err(GitError::MissingCommit("<empty base>".to_string()));
        }
        if head.is_empty() {
            return Err(GitError::MissingCommit("<empty head>".to_string()));
        }
        self.ensure_commit(base).await?;
        self.ensure_commit(head).await?;

        // PR と同じく merge-base からの差分
        let range = format!("{}...{}", base, head);
        let patch = self.run(&["diff", "--no-color", "--no-ext-diff", &range]).await?;
        debug!(%range, bytes = patch.len(), "git diff loaded");
        Ok(patch)
    }
}
