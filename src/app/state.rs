use std::collections::{BTreeMap, HashMap};

use crate::model::{NotFound, PullRequest, RepoKey};

/// 一覧取得後に非同期で補完される PR の状態
#[derive(Debug, Clone)]
pub struct PullRequestView {
    pub pull_request: PullRequest,
    pub loading_approvals: bool,
    pub loading_comments: bool,
    pub loading_change_requests: bool,
}

impl PullRequestView {
    fn loading(pull_request: PullRequest) -> Self {
        Self {
            pull_request,
            loading_approvals: true,
            loading_comments: true,
            loading_change_requests: true,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading_approvals || self.loading_comments || self.loading_change_requests
    }

    fn finish(&mut self) {
        self.loading_approvals = false;
        self.loading_comments = false;
        self.loading_change_requests = false;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepositoryData {
    pub loading: bool,
    pub next_page_token: Option<String>,
    pub pull_requests: HashMap<u64, PullRequestView>,
}

/// リポジトリごとの読み込み済みデータ。描画ループだけが所有・変更する。
#[derive(Debug, Default)]
pub struct ApplicationState {
    repositories: BTreeMap<RepoKey, RepositoryData>,
    /// リロードごとに増える。古い世代の完了通知は捨てる。
    generation: u64,
}

impl ApplicationState {
    /// 全リポジトリ分のエントリを読み込み中として作り直し、新しい世代を返す
    pub fn reset(&mut self, repos: &[RepoKey]) -> u64 {
        self.generation += 1;
        self.repositories = repos
            .iter()
            .map(|repo| {
                (
                    repo.clone(),
                    RepositoryData {
                        loading: true,
                        ..Default::default()
                    },
                )
            })
            .collect();
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn repositories(&self) -> impl Iterator<Item = (&RepoKey, &RepositoryData)> {
        self.repositories.iter()
    }

    pub fn repository(&self, repo: &RepoKey) -> Result<&RepositoryData, NotFound> {
        self.repositories
            .get(repo)
            .ok_or_else(|| NotFound::new("repository", repo.to_string()))
    }

    fn repository_mut(&mut self, repo: &RepoKey) -> Result<&mut RepositoryData, NotFound> {
        self.repositories
            .get_mut(repo)
            .ok_or_else(|| NotFound::new("repository", repo.to_string()))
    }

    pub fn set_loading(&mut self, repo: &RepoKey, loading: bool) -> Result<(), NotFound> {
        self.repository_mut(repo)?.loading = loading;
        Ok(())
    }

    /// 取得したページを反映する。各 PR は補完待ちの状態で入る。
    pub fn insert_page(
        &mut self,
        repo: &RepoKey,
        items: &[PullRequest],
        next_page_token: Option<String>,
    ) -> Result<(), NotFound> {
        let data = self.repository_mut(repo)?;
        data.loading = false;
        data.next_page_token = next_page_token;
        for pr in items {
            data.pull_requests
                .insert(pr.id, PullRequestView::loading(pr.clone()));
        }
        Ok(())
    }

    /// 補完結果のレビュー集計を取り込み、読み込みフラグを落とす。
    /// 失敗時（None）はフラグだけ落として古いデータを残す。
    pub fn finish_enrichment(
        &mut self,
        repo: &RepoKey,
        id: u64,
        enriched: Option<&PullRequest>,
        promote_state: bool,
    ) -> Result<&PullRequestView, NotFound> {
        let view = self
            .repository_mut(repo)?
            .pull_requests
            .get_mut(&id)
            .ok_or_else(|| NotFound::new("pull request", format!("{}#{}", repo, id)))?;
        if let Some(pr) = enriched {
            view.pull_request.merge_enrichment(pr, promote_state);
        }
        view.finish();
        Ok(&*view)
    }

    /// バルク操作の結果などで PR 全体を差し替える
    pub fn replace(&mut self, pr: &PullRequest) -> Result<(), NotFound> {
        let view = self
            .repository_mut(&pr.repo)?
            .pull_requests
            .get_mut(&pr.id)
            .ok_or_else(|| NotFound::new("pull request", pr.url.clone()))?;
        view.pull_request = pr.clone();
        Ok(())
    }

    pub fn pull_request(&self, repo: &RepoKey, id: u64) -> Option<&PullRequestView> {
        self.repositories.get(repo)?.pull_requests.get(&id)
    }

    /// 次ページのトークンを持つリポジトリ
    pub fn pending_pages(&self) -> Vec<(RepoKey, String)> {
        self.repositories
            .iter()
            .filter(|(_, data)| !data.loading)
            .filter_map(|(repo, data)| {
                data.next_page_token
                    .as_ref()
                    .map(|token| (repo.clone(), token.clone()))
            })
            .collect()
    }
}
