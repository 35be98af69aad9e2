use super::*;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;

use crate::client::{GitError, PullRequestPage};
use crate::model::{Branch, PullRequest, PullRequestComment, PullRequestDescriptor};
use super::pr_table::SectionStatus;
use super::review::{ReviewPage, DIFF_UNAVAILABLE_MESSAGE};

const PATCH: &[u8] = b"diff --git a/src/lib.rs b/src/lib.rs
index 1111111..2222222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -10,3 +10,3 @@ fn main() {
 keep
-old
+new
 tail
diff --git a/README.md b/README.md
index 3333333..4444444 100644
--- a/README.md
+++ b/README.md
@@ -1,1 +1,2 @@
 # prt
+Triage pull requests.
";

#[derive(Default)]
struct FakeClient {
    pages: HashMap<String, Vec<PullRequestPage>>,
    failing_repos: HashSet<String>,
    failing_ids: HashSet<u64>,
    comments: Vec<PullRequestComment>,
    fail_comments: bool,
    fail_create: bool,
    /// 操作は成功するが取り直せない PR
    unrefreshable_ids: HashSet<u64>,
    calls: Mutex<Vec<String>>,
}

impl FakeClient {
    fn with_repo(mut self, name: &str, prs: Vec<PullRequest>) -> Self {
        self.pages.insert(
            name.to_string(),
            vec![PullRequestPage {
                items: prs,
                next_page_token: None,
            }],
        );
        self
    }

    fn with_pages(mut self, name: &str, pages: Vec<Vec<PullRequest>>) -> Self {
        let count = pages.len();
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, items)| PullRequestPage {
                items,
                next_page_token: (i + 1 < count).then(|| (i + 1).to_string()),
            })
            .collect();
        self.pages.insert(name.to_string(), pages);
        self
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn find(&self, id: u64) -> Result<PullRequest> {
        self.pages
            .values()
            .flatten()
            .flat_map(|page| page.items.iter())
            .find(|pr| pr.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP 404: #{} not found", id))
    }

    fn transition(&self, verb: &str, id: u64, state: PullRequestState) -> Result<PullRequest> {
        self.record(format!("{} #{}", verb, id));
        if self.failing_ids.contains(&id) {
            bail!("HTTP 403: cannot {} #{}", verb, id);
        }
        let mut pr = self.find(id)?;
        if self.unrefreshable_ids.contains(&id) {
            return Ok(PullRequest::state_only(&pr.repo, id, state));
        }
        pr.state = state;
        Ok(pr)
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn get_pull_requests(
        &self,
        repo: &RepoKey,
        _state: StateFilter,
        page_token: Option<&str>,
    ) -> Result<PullRequestPage> {
        self.record(format!("list {} {:?}", repo.name, page_token));
        if self.failing_repos.contains(&repo.name) {
            bail!("HTTP 500 from {}", repo.name);
        }
        let index = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        Ok(self
            .pages
            .get(&repo.name)
            .and_then(|pages| pages.get(index))
            .cloned()
            .unwrap_or_default())
    }

    async fn approve(&self, _repo: &RepoKey, id: u64) -> Result<PullRequest> {
        self.transition("approve", id, PullRequestState::Approved)
    }

    async fn unapprove(&self, _repo: &RepoKey, id: u64) -> Result<PullRequest> {
        self.transition("unapprove", id, PullRequestState::Open)
    }

    async fn decline(&self, _repo: &RepoKey, id: u64) -> Result<PullRequest> {
        self.transition("decline", id, PullRequestState::Declined)
    }

    async fn merge(&self, _repo: &RepoKey, id: u64) -> Result<PullRequest> {
        self.transition("merge", id, PullRequestState::Merged)
    }

    async fn get_comments(&self, _repo: &RepoKey, id: u64) -> Result<Vec<PullRequestComment>> {
        if self.fail_comments {
            bail!("HTTP 502 while listing comments of #{}", id);
        }
        Ok(self.comments.clone())
    }

    async fn create_comment(
        &self,
        _repo: &RepoKey,
        id: u64,
        content: &str,
        target: &CommentTarget,
    ) -> Result<PullRequestComment> {
        self.record(format!("comment #{}", id));
        if self.fail_create {
            bail!("HTTP 422: validation failed");
        }
        let mut comment = PullRequestComment {
            id: "c-100".to_string(),
            content: content.to_string(),
            author: "octocat".to_string(),
            created_at: "2024-05-01T10:00:00Z".to_string(),
            ..Default::default()
        };
        if let CommentTarget::Line {
            file_path, line, ..
        } = target
        {
            comment.file_path = file_path.clone();
            comment.after_line = *line;
        }
        Ok(comment)
    }

    async fn delete_comment(&self, _repo: &RepoKey, _id: u64, comment_id: &str) -> Result<()> {
        self.record(format!("delete {}", comment_id));
        Ok(())
    }

    async fn fill_misc_info(&self, _repo: &RepoKey, pr: &mut PullRequest) -> Result<()> {
        if self.failing_ids.contains(&pr.id) {
            bail!("HTTP 502 while enriching #{}", pr.id);
        }
        pr.approvals = vec!["alice".to_string()];
        pr.comment_count = 3;
        Ok(())
    }
}

/// None ならコミットが見つからない
struct FakeGit {
    diff: Option<Vec<u8>>,
}

#[async_trait]
impl GitUtilsClient for FakeGit {
    async fn get_diff_patch(&self, _base: &str, head: &str) -> Result<Vec<u8>, GitError> {
        self.diff
            .clone()
            .ok_or_else(|| GitError::MissingCommit(head.to_string()))
    }
}

fn pr(repo: &str, id: u64, title: &str) -> PullRequest {
    PullRequest {
        id,
        url: format!("https://github.com/{}/pull/{}", repo, id),
        repo: RepoKey::github(repo),
        title: title.to_string(),
        author: "octocat".to_string(),
        state: PullRequestState::Open,
        source: Branch {
            name: format!("topic-{}", id),
            commit_hash: format!("head{}", id),
        },
        destination: Branch {
            name: "main".to_string(),
            commit_hash: "base".to_string(),
        },
        approvals: Vec::new(),
        change_requests: Vec::new(),
        comments: Vec::new(),
        comment_count: 0,
        updated_at: "2024-05-01T09:00:00Z".to_string(),
    }
}

fn app_with(client: Arc<FakeClient>, diff: Option<&[u8]>, repos: &[&str]) -> App {
    let git = Arc::new(FakeGit {
        diff: diff.map(<[u8]>::to_vec),
    });
    App::new(
        Config::default(),
        repos.iter().map(|r| RepoKey::github(*r)).collect(),
        StateFilter::Open,
        client,
        git,
    )
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

/// 通知が途切れるまで描画ループと同じように反映する
async fn settle(app: &mut App) {
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(200), app.rx.recv()).await
    {
        app.handle_message(message);
    }
}

fn move_to_row(app: &mut App, url: &str) {
    let index = app
        .table
        .page
        .position(|line| {
            matches!(&line.reference, Some(LineReference::PullRequest { url: u }) if u == url)
        })
        .expect("row is rendered");
    app.table.page.select(index);
}

fn select_rows(app: &mut App, urls: &[String]) {
    for url in urls {
        move_to_row(app, url);
        app.handle_key(key(KeyCode::Char(' ')));
    }
}

async fn open_first_review(app: &mut App) {
    app.load_repositories();
    settle(app).await;
    move_to_row(app, "https://github.com/o/r/pull/1");
    app.handle_key(key(KeyCode::Enter));
    settle(app).await;
}

#[tokio::test]
async fn test_two_repository_table() {
    let client = Arc::new(
        FakeClient::default()
            .with_repo("o/repoA", vec![pr("o/repoA", 1, "Fix bug")])
            .with_repo("o/repoB", Vec::new()),
    );
    let mut app = app_with(client, Some(PATCH), &["o/repoA", "o/repoB"]);

    app.load_repositories();
    // 読み込み中はセクションごとに 1 行
    assert_eq!(app.table.page.len(), 4);
    assert_eq!(app.table.data_row_count(), 0);

    settle(&mut app).await;

    assert_eq!(app.table.data_row_count(), 1);
    assert_eq!(app.table.page.len(), 3);
    let section_b = app.table.section(&RepoKey::github("o/repoB")).unwrap();
    assert_eq!(section_b.status, SectionStatus::Loaded);
    assert!(section_b.rows.is_empty());
}

#[tokio::test]
async fn test_enrichment_fills_rows_and_state() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);

    app.load_repositories();
    settle(&mut app).await;

    let row = app.table.find_row("https://github.com/o/r/pull/1").unwrap();
    assert!(!row.enriching);
    assert_eq!(row.pull_request.approvals, vec!["alice"]);
    let view = app
        .app_state
        .pull_request(&RepoKey::github("o/r"), 1)
        .unwrap();
    assert!(!view.is_loading());
    assert_eq!(view.pull_request.comment_count, 3);
}

#[tokio::test]
async fn test_failed_enrichment_keeps_stale_row() {
    let mut fake = FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]);
    fake.failing_ids.insert(1);
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/r"]);

    app.load_repositories();
    settle(&mut app).await;

    let row = app.table.find_row("https://github.com/o/r/pull/1").unwrap();
    assert!(!row.enriching);
    assert!(row.pull_request.approvals.is_empty());
    assert!(!app
        .app_state
        .pull_request(&RepoKey::github("o/r"), 1)
        .unwrap()
        .is_loading());
}

#[tokio::test]
async fn test_failed_repository_renders_error_row() {
    let mut fake = FakeClient::default().with_repo("o/good", vec![pr("o/good", 1, "Fix bug")]);
    fake.failing_repos.insert("o/bad".to_string());
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/good", "o/bad"]);

    app.load_repositories();
    settle(&mut app).await;

    let bad = app.table.section(&RepoKey::github("o/bad")).unwrap();
    assert!(matches!(&bad.status, SectionStatus::Failed(m) if m.contains("HTTP 500")));
    assert_eq!(app.table.data_row_count(), 1);
    assert!(app
        .table
        .page
        .content()
        .iter()
        .any(|l| l.plain_text().contains("Error: HTTP 500")));
}

#[tokio::test]
async fn test_page_from_previous_load_is_dropped() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", Vec::new()));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);

    app.load_repositories();
    let stale = app.app_state.generation() - 1;
    app.handle_message(UiMessage::PageLoaded {
        generation: stale,
        repo: RepoKey::github("o/r"),
        result: Ok(PullRequestPage {
            items: vec![pr("o/r", 9, "Old")],
            next_page_token: None,
        }),
    });
    assert_eq!(app.table.data_row_count(), 0);

    settle(&mut app).await;
    assert_eq!(app.table.data_row_count(), 0);
    assert!(app.table.find_row("https://github.com/o/r/pull/9").is_err());
}

#[tokio::test]
async fn test_next_page_appends_rows() {
    let client = Arc::new(FakeClient::default().with_pages(
        "o/r",
        vec![vec![pr("o/r", 1, "First")], vec![pr("o/r", 2, "Second")]],
    ));
    let mut app = app_with(client.clone(), Some(PATCH), &["o/r"]);

    app.load_repositories();
    settle(&mut app).await;
    assert_eq!(app.table.data_row_count(), 1);

    app.handle_key(key(KeyCode::Char('n')));
    settle(&mut app).await;
    assert_eq!(app.table.data_row_count(), 2);
    assert!(client.calls().contains(&"list o/r Some(\"1\")".to_string()));

    // トークンがなくなったら何もしない
    app.handle_key(key(KeyCode::Char('n')));
    assert_eq!(app.flash.as_deref(), Some("No more pages"));
}

#[tokio::test]
async fn test_approve_three_with_one_failure() {
    let prs = vec![
        pr("o/r", 1, "One"),
        pr("o/r", 2, "Two"),
        pr("o/r", 3, "Three"),
    ];
    let urls: Vec<String> = prs.iter().map(|p| p.url.clone()).collect();
    let mut fake = FakeClient::default().with_repo("o/r", prs);
    fake.failing_ids.insert(2);
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/r"]);
    app.load_repositories();
    settle(&mut app).await;

    select_rows(&mut app, &urls);
    app.handle_key(key(KeyCode::Char('a')));

    for url in &urls {
        let row = app.table.find_row(url).unwrap();
        assert_eq!(row.status, RowStatus::Pending);
        assert_eq!(row.pull_request.state, PullRequestState::Approving);
    }
    assert!(app.is_batch_running());

    let mut callbacks = 0;
    while let Ok(Some(message)) =
        tokio::time::timeout(Duration::from_millis(200), app.rx.recv()).await
    {
        if matches!(message, UiMessage::BatchItem { .. }) {
            callbacks += 1;
        }
        app.handle_message(message);
    }

    assert_eq!(callbacks, 3);
    let status = |app: &App, i: usize| app.table.find_row(&urls[i]).unwrap().status.clone();
    assert_eq!(status(&app, 0), RowStatus::Done);
    assert!(matches!(status(&app, 1), RowStatus::Error(m) if m.contains("403")));
    assert_eq!(status(&app, 2), RowStatus::Done);
    assert_eq!(status(&app, 1).label(), "Error");

    let state = |app: &App, i: usize| app.table.find_row(&urls[i]).unwrap().pull_request.state;
    assert_eq!(state(&app, 0), PullRequestState::Approved);
    assert_eq!(state(&app, 1), PullRequestState::Open);
    assert_eq!(state(&app, 2), PullRequestState::Approved);

    assert!(!app.is_batch_running());
    assert_eq!(app.flash.as_deref(), Some("approve: 2 done, 1 failed"));
}

#[tokio::test]
async fn test_bulk_action_ignores_filtered_rows() {
    let prs = vec![pr("o/r", 1, "Fix bug"), pr("o/r", 2, "Add feature")];
    let urls: Vec<String> = prs.iter().map(|p| p.url.clone()).collect();
    let client = Arc::new(FakeClient::default().with_repo("o/r", prs));
    let mut app = app_with(client.clone(), Some(PATCH), &["o/r"]);
    app.load_repositories();
    settle(&mut app).await;

    select_rows(&mut app, &urls);
    app.handle_key(key(KeyCode::Char('/')));
    for c in "fix".chars() {
        app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.table.filter(), "fix");
    assert_eq!(app.table.data_row_count(), 1);

    app.handle_key(key(KeyCode::Char('m')));
    settle(&mut app).await;

    let merges: Vec<String> = client
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("merge"))
        .collect();
    assert_eq!(merges, vec!["merge #1"]);
    assert_eq!(
        app.table.find_row(&urls[1]).unwrap().status,
        RowStatus::Idle
    );
}

#[tokio::test]
async fn test_bulk_action_without_selection() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "One")]));
    let mut app = app_with(client.clone(), Some(PATCH), &["o/r"]);
    app.load_repositories();
    settle(&mut app).await;

    app.handle_key(key(KeyCode::Char('d')));
    assert_eq!(app.flash.as_deref(), Some("No pull requests selected"));
    assert!(!app.is_batch_running());
}

#[tokio::test]
async fn test_table_filter_escape_clears() {
    let client = Arc::new(FakeClient::default().with_repo(
        "o/r",
        vec![pr("o/r", 1, "Fix bug"), pr("o/r", 2, "Add feature")],
    ));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    app.load_repositories();
    settle(&mut app).await;

    app.handle_key(key(KeyCode::Char('/')));
    for c in "FEAT".chars() {
        app.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(app.table.data_row_count(), 1);
    app.handle_key(key(KeyCode::Esc));
    assert!(app.table_filter.is_none());
    assert_eq!(app.table.filter(), "");
    assert_eq!(app.table.data_row_count(), 2);
}

#[tokio::test]
async fn test_open_review_and_select_file() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    assert_eq!(app.screen, Screen::Review);
    let view = app.review.as_ref().unwrap();
    assert_eq!(*view.panel.state(), ReviewState::Ready);
    assert_eq!(view.panel.files().len(), 2);
    assert_eq!(*view.panel.current_page(), ReviewPage::Status);

    // ツリーを 1 行下げると最初のファイルが開く
    app.handle_key(key(KeyCode::Char('j')));
    let view = app.review.as_ref().unwrap();
    let Some(LineReference::TreeFile(first)) = view.tree.page.selected_reference().cloned() else {
        panic!("expected a file row");
    };
    assert_eq!(*view.panel.current_page(), ReviewPage::File(first));

    // ルートに戻るとステータスページ
    app.handle_key(key(KeyCode::Char('k')));
    assert_eq!(
        *app.review.as_ref().unwrap().panel.current_page(),
        ReviewPage::Status
    );
}

#[tokio::test]
async fn test_jump_to_file_modal() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    app.handle_key(key(KeyCode::Char('f')));
    assert!(app.modal.is_some());
    for c in "lib".chars() {
        app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Enter));

    assert!(app.modal.is_none());
    let view = app.review.as_ref().unwrap();
    assert_eq!(
        *view.panel.current_page(),
        ReviewPage::File("src/lib.rs".to_string())
    );
    assert_eq!(view.focus, ReviewFocus::Diff);
    assert_eq!(
        view.tree.page.selected_reference(),
        Some(&LineReference::TreeFile("src/lib.rs".to_string()))
    );
}

#[tokio::test]
async fn test_missing_commit_is_terminal_error() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, None, &["o/r"]);
    open_first_review(&mut app).await;

    let view = app.review.as_ref().unwrap();
    assert_eq!(
        *view.panel.state(),
        ReviewState::Error(DIFF_UNAVAILABLE_MESSAGE.to_string())
    );
    // Error では操作できない
    app.handle_key(key(KeyCode::Char('c')));
    assert!(app.pending_editor.is_none());
}

#[tokio::test]
async fn test_closing_review_ignores_late_results() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    app.load_repositories();
    settle(&mut app).await;
    move_to_row(&mut app, "https://github.com/o/r/pull/1");
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(key(KeyCode::Esc));

    settle(&mut app).await;
    assert_eq!(app.screen, Screen::Table);
    assert!(app.review.is_none());
}

fn select_new_line(app: &mut App) {
    app.publish(Topic::FileSelected, BusEvent::File("src/lib.rs".to_string()));
    let page = &mut app.review.as_mut().unwrap().panel.page;
    let index = page
        .position(|line| {
            matches!(
                &line.reference,
                Some(LineReference::DiffLine { line_number: 11, kind: crate::diff::LineType::Added, .. })
            )
        })
        .expect("added line is rendered");
    page.select(index);
}

#[tokio::test]
async fn test_comment_is_confirmed_in_place() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client.clone(), Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;
    select_new_line(&mut app);

    app.handle_key(key(KeyCode::Char('c')));
    let target = app.pending_editor.take().expect("editor requested");
    assert_eq!(
        target,
        CommentTarget::Line {
            file_path: "src/lib.rs".to_string(),
            side: crate::model::LineSide::After,
            line: 11,
        }
    );

    app.submit_comment(target, "Rename this".to_string());
    let panel = &app.review.as_ref().unwrap().panel;
    let placeholder = panel
        .pull_request
        .comments
        .iter()
        .find(|c| c.is_being_stored)
        .expect("placeholder added");
    assert_eq!(placeholder.author, LOCAL_AUTHOR);
    let count = panel.pull_request.comments.len();

    settle(&mut app).await;

    let panel = &app.review.as_ref().unwrap().panel;
    assert_eq!(panel.pull_request.comments.len(), count);
    let stored = panel.comment("c-100").expect("confirmed comment");
    assert!(!stored.is_being_stored);
    assert_eq!(stored.author, "octocat");
    assert!(client.calls().contains(&"comment #1".to_string()));
}

#[tokio::test]
async fn test_failed_comment_is_marked_deleted() {
    let mut fake = FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]);
    fake.fail_create = true;
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;
    select_new_line(&mut app);

    let target = app.review.as_ref().unwrap().panel.comment_target().unwrap();
    app.submit_comment(target, "Rename this".to_string());
    settle(&mut app).await;

    let panel = &app.review.as_ref().unwrap().panel;
    let failed = &panel.pull_request.comments[0];
    assert!(failed.deleted);
    assert!(!failed.is_being_stored);
    assert!(app.flash.as_deref().unwrap().contains("422"));
}

#[tokio::test]
async fn test_delete_comment_flow() {
    let mut fake = FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]);
    fake.comments = vec![PullRequestComment {
        id: "c-1".to_string(),
        file_path: "src/lib.rs".to_string(),
        after_line: 11,
        content: "Why?".to_string(),
        author: "reviewer".to_string(),
        ..Default::default()
    }];
    let client = Arc::new(fake);
    let mut app = app_with(client.clone(), Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;
    app.publish(Topic::FileSelected, BusEvent::File("src/lib.rs".to_string()));

    let page = &mut app.review.as_mut().unwrap().panel.page;
    let index = page
        .position(|l| l.reference == Some(LineReference::Comment("c-1".to_string())))
        .expect("comment rendered");
    page.select(index);

    app.handle_key(key(KeyCode::Char('x')));
    assert!(app.review.as_ref().unwrap().panel.comment("c-1").unwrap().is_being_deleted);

    settle(&mut app).await;
    let comment = app.review.as_ref().unwrap().panel.comment("c-1").unwrap().clone();
    assert!(comment.deleted);
    assert!(!comment.is_being_deleted);
    assert_eq!(client.calls().last().map(String::as_str), Some("delete c-1"));

    // 削除済みには返信できない
    assert!(app.review.as_ref().unwrap().panel.comment_target().is_none());
}

#[tokio::test]
async fn test_comment_on_non_diff_line_is_noop() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    // ステータスページの先頭行はコメントできない
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Char('c')));
    assert!(app.pending_editor.is_none());
    assert!(app.flash.is_some());
}

#[tokio::test]
async fn test_help_returns_to_previous_screen() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    app.handle_key(key(KeyCode::Char('?')));
    assert_eq!(app.screen, Screen::Help);
    app.handle_key(key(KeyCode::Esc));
    assert_eq!(app.screen, Screen::Review);
    assert!(app.review.is_some());
}

#[tokio::test]
async fn test_nested_publish_is_delivered_after_outer() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
    let outer = log.clone();
    app.bus.subscribe(Topic::CloseReview, move |app: &mut App, _: &BusEvent| {
        outer.borrow_mut().push("close");
        app.publish(Topic::StatusPageSelected, BusEvent::Empty);
        // 入れ子の publish はここではまだ配送されない
        outer.borrow_mut().push("close returned");
    });
    let second = log.clone();
    app.bus.subscribe(Topic::CloseReview, move |_: &mut App, _: &BusEvent| {
        second.borrow_mut().push("close 2");
    });
    let inner = log.clone();
    app.bus.subscribe(Topic::StatusPageSelected, move |_: &mut App, _: &BusEvent| {
        inner.borrow_mut().push("status");
    });

    let descriptor: PullRequestDescriptor = app.review.as_ref().unwrap().panel.pull_request.descriptor();
    app.publish(Topic::CloseReview, BusEvent::Empty);

    assert_eq!(*log.borrow(), vec!["close", "close returned", "close 2", "status"]);
    assert!(app.review.is_none());
    assert!(!app.dispatching);
    assert!(app.event_queue.is_empty());

    app.publish(Topic::OpenReview, BusEvent::Review(descriptor));
    assert_eq!(app.screen, Screen::Review);
}

#[tokio::test]
async fn test_late_enrichment_keeps_bulk_result() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "One")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    let url = "https://github.com/o/r/pull/1".to_string();
    app.load_repositories();
    settle(&mut app).await;

    select_rows(&mut app, &[url.clone()]);
    app.handle_key(key(KeyCode::Char('a')));
    settle(&mut app).await;
    assert_eq!(
        app.table.find_row(&url).unwrap().pull_request.state,
        PullRequestState::Approved
    );

    // 操作前に取った補完結果が後から届く
    let mut snapshot = pr("o/r", 1, "One");
    snapshot.comment_count = 5;
    app.handle_message(UiMessage::Enriched {
        generation: app.app_state.generation(),
        repo: RepoKey::github("o/r"),
        id: 1,
        result: Ok(snapshot),
    });

    let row = app.table.find_row(&url).unwrap();
    assert_eq!(row.pull_request.state, PullRequestState::Approved);
    assert_eq!(row.status, RowStatus::Done);
    assert_eq!(row.pull_request.comment_count, 5);
    let view = app.app_state.pull_request(&RepoKey::github("o/r"), 1).unwrap();
    assert_eq!(view.pull_request.state, PullRequestState::Approved);
    assert_eq!(view.pull_request.comment_count, 5);
}

#[tokio::test]
async fn test_enrichment_during_batch_keeps_transient_state() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "One")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    let url = "https://github.com/o/r/pull/1".to_string();
    app.load_repositories();
    settle(&mut app).await;

    select_rows(&mut app, &[url.clone()]);
    app.handle_key(key(KeyCode::Char('a')));
    let mut snapshot = pr("o/r", 1, "One");
    snapshot.state = PullRequestState::Approved;
    app.handle_message(UiMessage::Enriched {
        generation: app.app_state.generation(),
        repo: RepoKey::github("o/r"),
        id: 1,
        result: Ok(snapshot),
    });

    let row = app.table.find_row(&url).unwrap();
    assert_eq!(row.pull_request.state, PullRequestState::Approving);
    assert_eq!(row.status, RowStatus::Pending);

    settle(&mut app).await;
    assert_eq!(
        app.table.find_row(&url).unwrap().pull_request.state,
        PullRequestState::Approved
    );
}

#[tokio::test]
async fn test_enrichment_promotes_idle_open_row() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "One")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    app.load_repositories();
    settle(&mut app).await;

    let mut snapshot = pr("o/r", 1, "One");
    snapshot.state = PullRequestState::Approved;
    app.handle_message(UiMessage::Enriched {
        generation: app.app_state.generation(),
        repo: RepoKey::github("o/r"),
        id: 1,
        result: Ok(snapshot),
    });

    let row = app.table.find_row("https://github.com/o/r/pull/1").unwrap();
    assert_eq!(row.pull_request.state, PullRequestState::Approved);
}

#[tokio::test]
async fn test_unrefreshed_merge_keeps_row_details() {
    let mut fake = FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "One")]);
    fake.unrefreshable_ids.insert(1);
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/r"]);
    let url = "https://github.com/o/r/pull/1".to_string();
    app.load_repositories();
    settle(&mut app).await;

    select_rows(&mut app, &[url.clone()]);
    app.handle_key(key(KeyCode::Char('m')));
    settle(&mut app).await;

    let row = app.table.find_row(&url).unwrap();
    assert_eq!(row.status, RowStatus::Done);
    assert_eq!(row.pull_request.state, PullRequestState::Merged);
    assert_eq!(row.pull_request.title, "One");
    assert_eq!(row.pull_request.approvals, vec!["alice"]);
    let view = app.app_state.pull_request(&RepoKey::github("o/r"), 1).unwrap();
    assert_eq!(view.pull_request.state, PullRequestState::Merged);
    assert_eq!(view.pull_request.url, url);
    assert_eq!(app.flash.as_deref(), Some("merge: 1 done, 0 failed"));
}

#[tokio::test]
async fn test_batch_result_for_unknown_row_is_ignored() {
    let client = Arc::new(FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "One")]));
    let mut app = app_with(client, Some(PATCH), &["o/r"]);
    let url = "https://github.com/o/r/pull/1".to_string();
    app.load_repositories();
    settle(&mut app).await;

    select_rows(&mut app, &[url.clone()]);
    app.handle_key(key(KeyCode::Char('d')));
    let unknown = "https://github.com/o/r/pull/99".to_string();
    app.handle_message(UiMessage::BatchItem {
        action: BulkAction::Decline,
        url: unknown.clone(),
        result: Ok(pr("o/r", 99, "Gone")),
    });
    app.handle_message(UiMessage::BatchItem {
        action: BulkAction::Decline,
        url: unknown.clone(),
        result: Err("HTTP 404".to_string()),
    });

    assert!(app.table.find_row(&unknown).is_err());
    assert!(app.app_state.pull_request(&RepoKey::github("o/r"), 99).is_none());
    assert_eq!(app.table.data_row_count(), 1);
    assert_eq!(app.table.find_row(&url).unwrap().status, RowStatus::Pending);

    settle(&mut app).await;
    let row = app.table.find_row(&url).unwrap();
    assert_eq!(row.status, RowStatus::Done);
    assert_eq!(row.pull_request.state, PullRequestState::Declined);
}

#[tokio::test]
async fn test_comment_fetch_failure_keeps_diff() {
    let mut fake = FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]);
    fake.fail_comments = true;
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    let view = app.review.as_ref().unwrap();
    assert_eq!(*view.panel.state(), ReviewState::Ready);
    assert_eq!(view.panel.files().len(), 2);
    assert!(view.panel.pull_request.comments.is_empty());
    assert!(app.flash.as_deref().unwrap().contains("502"));

    // diff の操作はそのまま続けられる
    select_new_line(&mut app);
    app.handle_key(key(KeyCode::Char('c')));
    assert!(app.pending_editor.is_some());
}

#[tokio::test]
async fn test_comments_are_loaded_alongside_diff() {
    let mut fake = FakeClient::default().with_repo("o/r", vec![pr("o/r", 1, "Fix bug")]);
    fake.comments = vec![PullRequestComment {
        id: "c-1".to_string(),
        file_path: "src/lib.rs".to_string(),
        before_line: 10,
        content: "Keep this?".to_string(),
        author: "reviewer".to_string(),
        ..Default::default()
    }];
    let mut app = app_with(Arc::new(fake), Some(PATCH), &["o/r"]);
    open_first_review(&mut app).await;

    app.publish(Topic::FileSelected, BusEvent::File("src/lib.rs".to_string()));
    let panel = &app.review.as_ref().unwrap().panel;
    assert_eq!(*panel.state(), ReviewState::Ready);
    // 文脈行の旧側に付いたコメントも表示される
    assert!(panel
        .page
        .content()
        .iter()
        .any(|l| l.reference == Some(LineReference::Comment("c-1".to_string()))));
}

#[test]
fn test_quit_keys() {
    let mut app = app_with(Arc::new(FakeClient::default()), Some(PATCH), &["o/r"]);
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit);

    let mut app = app_with(Arc::new(FakeClient::default()), Some(PATCH), &["o/r"]);
    app.handle_key(key(KeyCode::Char('q')));
    assert!(app.should_quit);
}
