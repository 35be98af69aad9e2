//! Common utilities for benchmarks.
//!
//! Provides test data generators with fixed seeds for reproducibility.

#![allow(dead_code)]

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use prt::model::{Branch, PullRequest, PullRequestComment, PullRequestState, RepoKey};

/// Fixed seed for reproducible benchmark data
const SEED: u64 = 42;

/// Create a seeded RNG for reproducible test data
pub fn seeded_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(SEED)
}

/// Path of the n-th generated file
pub fn file_path(index: usize) -> String {
    format!("src/module_{}/file_{}.rs", index % 7, index)
}

/// Generate a git-style multi-file diff.
///
/// Each hunk holds `lines_per_hunk` body lines: roughly 20% added, 20% removed
/// and 60% context. Hunk headers carry the exact line counts.
pub fn generate_diff(file_count: usize, hunks_per_file: usize, lines_per_hunk: usize) -> String {
    let mut rng = seeded_rng();
    let mut out = String::new();

    for file in 0..file_count {
        let path = file_path(file);
        out.push_str(&format!("diff --git a/{path} b/{path}\n"));
        out.push_str("index 1111111..2222222 100644\n");
        out.push_str(&format!("--- a/{path}\n+++ b/{path}\n"));

        let mut old_start = 1u32;
        let mut new_start = 1u32;
        for _ in 0..hunks_per_file {
            let mut body = Vec::with_capacity(lines_per_hunk);
            let (mut old_count, mut new_count) = (0u32, 0u32);
            for i in 0..lines_per_hunk {
                let content = generate_code_line(&mut rng, i);
                match rng.random_range(0..10u8) {
                    0..=1 => {
                        new_count += 1;
                        body.push(format!("+{}", content));
                    }
                    2..=3 => {
                        old_count += 1;
                        body.push(format!("-{}", content));
                    }
                    _ => {
                        old_count += 1;
                        new_count += 1;
                        body.push(format!(" {}", content));
                    }
                }
            }
            out.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                old_start, old_count, new_start, new_count
            ));
            for line in body {
                out.push_str(&line);
                out.push('\n');
            }
            old_start += old_count + 20;
            new_start += new_count + 20;
        }
    }
    out
}

/// One line of plausible source text
fn generate_code_line(rng: &mut ChaCha8Rng, line_num: usize) -> String {
    const SNIPPETS: &[&str] = &[
        "let rows = table.sections().iter().map(Section::len).sum::<usize>();",
        "if page.is_empty() { return None; }",
        "for hunk in &file.hunks {",
        "match review.state() {",
        "ReviewState::Ready => render_files(frame, area),",
        "impl From<GhComment> for PullRequestComment {",
        "#[derive(Debug, Clone, PartialEq)]",
        "pub fn selected_url(&self) -> Option<&str> {",
        "tx.send(UiMessage::Refresh).ok();",
        "// keep the cursor inside the viewport",
        "let width = UnicodeWidthStr::width(text.as_str());",
        "}",
        "",
        "assert_eq!(page.selected_index(), 3);",
        "tracing::debug!(repo = %repo, \"page loaded\");",
        "Ok(Vec::with_capacity(count))",
    ];

    let snippet = SNIPPETS[rng.random_range(0..SNIPPETS.len())];
    let indent = "    ".repeat(rng.random_range(0..4));
    format!("{}{} // {}", indent, snippet, line_num)
}

/// Generate inline comments on the first file; about a third are replies.
pub fn generate_comments(count: usize, max_line: u32) -> Vec<PullRequestComment> {
    let mut rng = seeded_rng();
    let mut comments: Vec<PullRequestComment> = Vec::with_capacity(count);
    for i in 0..count {
        let reply_to = (i > 0 && rng.random_range(0..3u8) == 0)
            .then(|| comments[rng.random_range(0..i)].clone());
        let comment = match reply_to {
            Some(parent) => PullRequestComment {
                id: format!("c{}", i),
                parent_id: parent.id,
                file_path: parent.file_path,
                before_line: parent.before_line,
                after_line: parent.after_line,
                content: "Agreed, but the error path also needs a test.".to_string(),
                author: "reviewer".to_string(),
                ..Default::default()
            },
            None => PullRequestComment {
                id: format!("c{}", i),
                file_path: file_path(0),
                after_line: rng.random_range(1..=max_line),
                content: "This allocation happens on every call; can it be hoisted out of the loop?"
                    .to_string(),
                author: "octocat".to_string(),
                ..Default::default()
            },
        };
        comments.push(comment);
    }
    comments
}

pub fn pull_request() -> PullRequest {
    PullRequest {
        id: 1,
        url: "https://github.com/o/r/pull/1".to_string(),
        repo: RepoKey::github("o/r"),
        title: "Benchmark".to_string(),
        author: "octocat".to_string(),
        state: PullRequestState::Open,
        source: Branch {
            name: "topic".to_string(),
            commit_hash: "head".to_string(),
        },
        destination: Branch {
            name: "main".to_string(),
            commit_hash: "base".to_string(),
        },
        approvals: Vec::new(),
        change_requests: Vec::new(),
        comments: Vec::new(),
        comment_count: 0,
        updated_at: String::new(),
    }
}
