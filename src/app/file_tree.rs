//! 変更ファイルのディレクトリツリー
//!
//! フラットなパス一覧からツリーを組み立て、子が 1 つだけのディレクトリ連鎖を
//! `a/b/c` のように 1 ノードへ畳み込む。ルート行はステータスページを表す。

use ratatui::style::{Color, Modifier, Style};

use crate::diff::{DiffFile, FileKind};
use crate::ui::scrollable_page::{Fragment, PageLine, ScrollablePage};

use super::types::LineReference;

#[derive(Debug, Clone, PartialEq)]
pub struct FileTreeNode<R> {
    pub segment: String,
    pub children: Vec<FileTreeNode<R>>,
    /// ファイルを完全に特定するノード（葉）だけが持つ
    pub reference: Option<R>,
}

impl<R> FileTreeNode<R> {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            children: Vec::new(),
            reference: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `(path, reference)` の組からツリーを作り、畳み込みまで済ませる
    pub fn build(entries: impl IntoIterator<Item = (String, R)>) -> Self {
        let mut entries: Vec<(String, R)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut root = Self::new("");
        for (path, reference) in entries {
            let mut node = &mut root;
            let mut depth = 0;
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                depth += 1;
                let pos = match node.children.iter().position(|c| c.segment == segment) {
                    Some(pos) => pos,
                    None => {
                        node.children.push(Self::new(segment));
                        node.children.len() - 1
                    }
                };
                node = &mut node.children[pos];
            }
            if depth > 0 {
                node.reference = Some(reference);
            }
        }

        for child in &mut root.children {
            child.collapse();
        }
        root
    }

    /// 子が 1 つでその子がさらに子を持つ間、自身と子を結合する（ルート以外で呼ぶ）
    fn collapse(&mut self) {
        while self.children.len() == 1 && !self.children[0].is_leaf() {
            let Some(child) = self.children.pop() else {
                break;
            };
            self.segment = format!("{}/{}", self.segment, child.segment);
            self.children = child.children;
            self.reference = child.reference;
        }
        for child in &mut self.children {
            child.collapse();
        }
    }

    /// 深さ優先でたどった (depth, ルートからのパス, ノード) の列。ルート自身は含まない。
    pub fn flatten(&self) -> Vec<TreeEntry<'_, R>> {
        let mut out = Vec::new();
        for child in &self.children {
            child.flatten_into(1, "", &mut out);
        }
        out
    }

    fn flatten_into<'a>(&'a self, depth: usize, parent: &str, out: &mut Vec<TreeEntry<'a, R>>) {
        let path = if parent.is_empty() {
            self.segment.clone()
        } else {
            format!("{}/{}", parent, self.segment)
        };
        out.push(TreeEntry {
            depth,
            path: path.clone(),
            node: self,
        });
        for child in &self.children {
            child.flatten_into(depth + 1, &path, out);
        }
    }
}

pub struct TreeEntry<'a, R> {
    pub depth: usize,
    pub path: String,
    pub node: &'a FileTreeNode<R>,
}

/// レビュー画面左側のファイルツリーパネル
pub struct FileTree {
    root: FileTreeNode<String>,
    root_label: String,
    /// ファイル id → (種別, 追加行数, 削除行数)
    details: std::collections::HashMap<String, (FileKind, usize, usize)>,
    pub page: ScrollablePage<LineReference>,
}

impl FileTree {
    pub fn new(files: &[DiffFile], root_label: impl Into<String>) -> Self {
        let root = FileTreeNode::build(files.iter().map(|f| (f.id.clone(), f.id.clone())));
        let details = files
            .iter()
            .map(|f| {
                let (added, removed) = f.stats();
                (f.id.clone(), (f.kind, added, removed))
            })
            .collect();
        let mut tree = Self {
            root,
            root_label: root_label.into(),
            details,
            page: ScrollablePage::new(),
        };
        tree.page.set_content(tree.render_lines());
        tree
    }

    pub fn root(&self) -> &FileTreeNode<String> {
        &self.root
    }

    /// ファイル行を選択する。見つからなければ None。
    pub fn select_file(&mut self, file_id: &str) -> Option<usize> {
        let index = self.page.position(|line| {
            matches!(&line.reference, Some(LineReference::TreeFile(id)) if id == file_id)
        })?;
        self.page.select(index);
        Some(index)
    }

    fn render_lines(&self) -> Vec<PageLine<LineReference>> {
        let mut lines = vec![PageLine::from_fragment(Fragment::new(
            format!("◆ {}", self.root_label),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
        .with_reference(LineReference::TreeRoot)];

        for entry in self.root.flatten() {
            let indent = (entry.depth * 2) as u16;
            let line = match &entry.node.reference {
                Some(file_id) if entry.node.is_leaf() => {
                    let (kind, added, removed) = self
                        .details
                        .get(file_id)
                        .copied()
                        .unwrap_or((FileKind::Modified, 0, 0));
                    PageLine::from_fragment(
                        Fragment::new(
                            format!("{} {}", kind.badge(), entry.node.segment),
                            Style::default().fg(kind_color(kind)),
                        )
                        .at(indent),
                    )
                    .push(
                        Fragment::new(
                            format!("+{} -{}", added, removed),
                            Style::default().fg(Color::DarkGray),
                        )
                        .right_aligned()
                        .at(1),
                    )
                    .with_reference(LineReference::TreeFile(file_id.clone()))
                }
                _ => PageLine::from_fragment(
                    Fragment::new(
                        format!("▾ {}/", entry.node.segment),
                        Style::default().fg(Color::Blue),
                    )
                    .at(indent),
                )
                .with_reference(LineReference::TreeDirectory(entry.path)),
            };
            lines.push(line);
        }
        lines
    }
}

fn kind_color(kind: FileKind) -> Color {
    match kind {
        FileKind::Added => Color::Green,
        FileKind::Removed => Color::Red,
        FileKind::Renamed => Color::Magenta,
        FileKind::Modified => Color::Reset,
    }
}
