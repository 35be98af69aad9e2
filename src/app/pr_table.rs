//! 複数リポジトリの PR を 1 つにまとめたテーブル
//!
//! リポジトリごとにセクションを持ち、各セクションは見出し行と PR 行からなる。
//! フィルタは `visible` を切り替えるだけで行そのものは消さない。

use ratatui::style::{Color, Modifier, Style};

use crate::filter::matches_query;
use crate::model::{NotFound, PullRequest, PullRequestDescriptor, PullRequestState, RepoKey};
use crate::ui::scrollable_page::{Fragment, PageLine, ScrollablePage};

use super::types::{LineReference, RowStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionStatus {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TableRow {
    pub pull_request: PullRequest,
    pub selected: bool,
    pub visible: bool,
    pub status: RowStatus,
    /// approvals 等の補完待ち
    pub enriching: bool,
}

#[derive(Debug, Clone)]
pub struct Section {
    pub repo: RepoKey,
    pub status: SectionStatus,
    pub rows: Vec<TableRow>,
}

#[derive(Default)]
pub struct PullRequestTable {
    sections: Vec<Section>,
    filter: String,
    pub page: ScrollablePage<LineReference>,
}

impl PullRequestTable {
    pub fn new(repos: &[RepoKey]) -> Self {
        let mut table = Self::default();
        table.reset(repos);
        table
    }

    /// すべてのセクションを読み込み中として作り直す。フィルタ文字列は残す。
    pub fn reset(&mut self, repos: &[RepoKey]) {
        self.sections.clear();
        for repo in repos {
            if self.sections.iter().all(|s| &s.repo != repo) {
                self.sections.push(Section {
                    repo: repo.clone(),
                    status: SectionStatus::Loading,
                    rows: Vec::new(),
                });
            }
        }
        self.rebuild();
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, repo: &RepoKey) -> Result<&Section, NotFound> {
        self.sections
            .iter()
            .find(|s| &s.repo == repo)
            .ok_or_else(|| NotFound::new("repository", repo.to_string()))
    }

    fn section_mut(&mut self, repo: &RepoKey) -> Result<&mut Section, NotFound> {
        self.sections
            .iter_mut()
            .find(|s| &s.repo == repo)
            .ok_or_else(|| NotFound::new("repository", repo.to_string()))
    }

    /// 取得したページを追加する。既にある URL は内容だけ更新する。
    pub fn append_page(&mut self, repo: &RepoKey, items: Vec<PullRequest>) -> Result<(), NotFound> {
        let filter = self.filter.clone();
        let section = self.section_mut(repo)?;
        section.status = SectionStatus::Loaded;
        for pr in items {
            match section
                .rows
                .iter_mut()
                .find(|r| r.pull_request.url == pr.url)
            {
                Some(row) => row.pull_request = pr,
                None => section.rows.push(TableRow {
                    visible: matches_query(&pr.title, &filter),
                    pull_request: pr,
                    selected: false,
                    status: RowStatus::Idle,
                    enriching: true,
                }),
            }
        }
        self.rebuild();
        Ok(())
    }

    pub fn set_failed(&mut self, repo: &RepoKey, message: impl Into<String>) -> Result<(), NotFound> {
        self.section_mut(repo)?.status = SectionStatus::Failed(message.into());
        self.rebuild();
        Ok(())
    }

    pub fn find_row(&self, url: &str) -> Result<&TableRow, NotFound> {
        self.sections
            .iter()
            .flat_map(|s| s.rows.iter())
            .find(|r| r.pull_request.url == url)
            .ok_or_else(|| NotFound::new("pull request", url))
    }

    fn find_row_mut(&mut self, url: &str) -> Result<&mut TableRow, NotFound> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.rows.iter_mut())
            .find(|r| r.pull_request.url == url)
            .ok_or_else(|| NotFound::new("pull request", url))
    }

    /// 補完結果のレビュー集計を行に取り込む。状態は `merge_enrichment` の規則に従う。
    pub fn merge_enrichment(
        &mut self,
        url: &str,
        enriched: &PullRequest,
        promote_state: bool,
    ) -> Result<(), NotFound> {
        let row = self.find_row_mut(url)?;
        row.pull_request.merge_enrichment(enriched, promote_state);
        row.enriching = false;
        self.rebuild();
        Ok(())
    }

    /// バルク操作の結果で PR を差し替える（選択・表示フラグは維持）
    pub fn update_pull_request(&mut self, pr: PullRequest) -> Result<(), NotFound> {
        let row = self.find_row_mut(&pr.url)?;
        row.pull_request = pr;
        row.enriching = false;
        self.rebuild();
        Ok(())
    }

    pub fn finish_enrichment(&mut self, url: &str) -> Result<(), NotFound> {
        self.find_row_mut(url)?.enriching = false;
        self.rebuild();
        Ok(())
    }

    pub fn set_status(&mut self, url: &str, status: RowStatus) -> Result<(), NotFound> {
        self.find_row_mut(url)?.status = status;
        self.rebuild();
        Ok(())
    }

    pub fn set_state(&mut self, url: &str, state: PullRequestState) -> Result<(), NotFound> {
        self.find_row_mut(url)?.pull_request.state = state;
        self.rebuild();
        Ok(())
    }

    pub fn selected_url(&self) -> Option<&str> {
        match self.page.selected_reference()? {
            LineReference::PullRequest { url } => Some(url),
            _ => None,
        }
    }

    pub fn selected_row(&self) -> Option<&TableRow> {
        self.selected_url().and_then(|url| self.find_row(url).ok())
    }

    /// カーソル行の選択を切り替える。PR 行でなければ何もしない。
    pub fn toggle_current(&mut self) -> Option<bool> {
        let url = self.selected_url()?.to_string();
        let row = self.find_row_mut(&url).ok()?;
        if !row.visible {
            return None;
        }
        row.selected = !row.selected;
        let selected = row.selected;
        self.rebuild();
        Some(selected)
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// タイトルに対する部分一致で `visible` だけを切り替える
    pub fn apply_filter(&mut self, query: &str) {
        self.filter = query.to_string();
        for row in self.sections.iter_mut().flat_map(|s| s.rows.iter_mut()) {
            row.visible = matches_query(&row.pull_request.title, query);
        }
        self.rebuild();
    }

    /// バルク操作の対象（selected かつ visible の行だけ）
    pub fn selected_visible(&self) -> Vec<PullRequestDescriptor> {
        self.sections
            .iter()
            .flat_map(|s| s.rows.iter())
            .filter(|r| r.selected && r.visible)
            .map(|r| r.pull_request.descriptor())
            .collect()
    }

    pub fn data_row_count(&self) -> usize {
        self.page
            .content()
            .iter()
            .filter(|l| matches!(l.reference, Some(LineReference::PullRequest { .. })))
            .count()
    }

    fn rebuild(&mut self) {
        let lines = self.sections.iter().flat_map(section_lines).collect();
        self.page.set_content(lines);
    }
}

fn section_lines(section: &Section) -> Vec<PageLine<LineReference>> {
    let visible = section.rows.iter().filter(|r| r.visible).count();
    let count = match section.status {
        SectionStatus::Loaded if visible != section.rows.len() => {
            format!("{}/{}", visible, section.rows.len())
        }
        SectionStatus::Loaded => section.rows.len().to_string(),
        _ => "-".to_string(),
    };
    let mut lines = vec![PageLine::from_fragment(Fragment::new(
        section.repo.name.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    ))
    .push(Fragment::new(
        format!("({})", count),
        Style::default().fg(Color::DarkGray),
    )
    .at(section.repo.name.len() as u16 + 1))
    .with_reference(LineReference::RepositoryHeader(section.repo.clone()))];

    match &section.status {
        SectionStatus::Loading => lines.push(
            PageLine::from_fragment(
                Fragment::new("Loading…", Style::default().fg(Color::DarkGray)).at(2),
            )
            .with_reference(LineReference::RepositoryHeader(section.repo.clone())),
        ),
        SectionStatus::Failed(message) => lines.push(
            PageLine::from_fragment(
                Fragment::new(format!("Error: {}", message), Style::default().fg(Color::Red))
                    .at(2),
            )
            .with_reference(LineReference::RepositoryHeader(section.repo.clone())),
        ),
        SectionStatus::Loaded => {
            lines.extend(section.rows.iter().filter(|r| r.visible).map(row_line));
        }
    }
    lines
}

fn row_line(row: &TableRow) -> PageLine<LineReference> {
    let pr = &row.pull_request;
    let marker = if row.selected { "[x]" } else { "[ ]" };
    let state_style = match pr.state {
        PullRequestState::Approved | PullRequestState::Merged => Style::default().fg(Color::Green),
        PullRequestState::Declined => Style::default().fg(Color::Red),
        s if s.is_transient() => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    };
    let counts = if row.enriching {
        "✓… ✗… c…".to_string()
    } else {
        format!(
            "✓{} ✗{} c{}",
            pr.approvals.len(),
            pr.change_requests.len(),
            pr.comment_count
        )
    };
    let status_style = match row.status {
        RowStatus::Done => Style::default().fg(Color::Green),
        RowStatus::Error(_) => Style::default().fg(Color::Red),
        _ => Style::default().fg(Color::DarkGray),
    };

    PageLine::from_fragment(Fragment::raw(marker).at(2))
        .push(Fragment::new(format!("#{}", pr.id), Style::default().fg(Color::DarkGray)).at(6))
        .push(Fragment::raw(pr.title.clone()).at(14))
        .push(Fragment::new(format!("{:<5}", row.status.label()), status_style).right_aligned())
        .push(Fragment::new(counts, Style::default().fg(Color::DarkGray)).right_aligned().at(6))
        .push(Fragment::new(pr.state.label(), state_style).right_aligned().at(20))
        .with_reference(LineReference::PullRequest {
            url: pr.url.clone(),
        })
}
