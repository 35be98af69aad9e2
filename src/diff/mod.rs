//! Unified diff parsing.
//!
//! This module turns the raw output of `git diff` into a list of [`DiffFile`]s:
//! - File classification (Added, Removed, Renamed, Modified) from the
//!   `/dev/null` sentinels and old/new path mismatch
//! - Hunk splitting driven by the line counts in the `@@` header
//! - Line type classification (Added, Removed, Context)

use std::collections::HashMap;

const DEV_NULL: &str = "/dev/null";

/// Classification of a changed file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Added,
    Removed,
    Renamed,
    Modified,
}

impl FileKind {
    pub fn badge(&self) -> &'static str {
        match self {
            FileKind::Added => "A",
            FileKind::Removed => "D",
            FileKind::Renamed => "R",
            FileKind::Modified => "M",
        }
    }
}

/// Represents the type of a line inside a hunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    /// Line added in the new version (starts with +)
    Added,
    /// Line removed from the old version (starts with -)
    Removed,
    /// Context line, unchanged (starts with space)
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub line_type: LineType,
    /// The line content without the diff prefix (+/-/space)
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: u32,
    pub new_start: u32,
    pub lines: Vec<DiffLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFile {
    /// New path, or the old path for deletions
    pub id: String,
    pub old_path: String,
    pub new_path: String,
    pub kind: FileKind,
    pub is_binary: bool,
    pub hunks: Vec<DiffHunk>,
}

impl DiffFile {
    /// Path shown to the user (`old → new` for renames)
    pub fn display_path(&self) -> String {
        match self.kind {
            FileKind::Renamed => format!("{} → {}", self.old_path, self.new_path),
            _ => self.id.clone(),
        }
    }

    pub fn stats(&self) -> (usize, usize) {
        self.hunks
            .iter()
            .flat_map(|h| h.lines.iter())
            .fold((0, 0), |(add, del), line| match line.line_type {
                LineType::Added => (add + 1, del),
                LineType::Removed => (add, del + 1),
                LineType::Context => (add, del),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffParseError {
    #[error("diff is not valid UTF-8")]
    InvalidUtf8,
    #[error("malformed hunk header at line {line_no}: {line}")]
    MalformedHunkHeader { line_no: usize, line: String },
    #[error("unexpected line {line_no} outside of a file: {line}")]
    UnexpectedLine { line_no: usize, line: String },
    #[error("hunk at line {line_no} ended before its declared length")]
    TruncatedHunk { line_no: usize },
}

/// Parse a hunk header: `@@ -old_start[,old_count] +new_start[,new_count] @@ ...`
///
/// Returns `(old_start, old_count, new_start, new_count)`.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let rest = line.strip_prefix("@@ ")?;
    let end = rest.find(" @@")?;
    let mut ranges = rest[..end].split(' ');
    let old = ranges.next()?.strip_prefix('-')?;
    let new = ranges.next()?.strip_prefix('+')?;

    fn parse_range(range: &str) -> Option<(u32, u32)> {
        match range.split_once(',') {
            Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
            None => Some((range.parse().ok()?, 1)),
        }
    }

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;
    Some((old_start, old_count, new_start, new_count))
}

/// Strip the `a/` / `b/` prefix from a `---` / `+++` path
fn strip_diff_prefix(path: &str) -> String {
    // Drop a trailing tab-separated timestamp (non-git diffs)
    let path = path.split('\t').next().unwrap_or(path);
    if path == DEV_NULL {
        return DEV_NULL.to_string();
    }
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
        .to_string()
}

/// Extract `(old, new)` from a `diff --git a/old b/new` line
fn parse_git_header(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("diff --git ")?;
    let rest = rest.strip_prefix("a/")?;
    let split = rest.rfind(" b/")?;
    Some((rest[..split].to_string(), rest[split + 3..].to_string()))
}

struct FileBuilder {
    old_path: String,
    new_path: String,
    is_binary: bool,
    hunks: Vec<DiffHunk>,
}

impl FileBuilder {
    fn new(old_path: String, new_path: String) -> Self {
        Self {
            old_path,
            new_path,
            is_binary: false,
            hunks: Vec::new(),
        }
    }

    fn finish(self) -> DiffFile {
        let kind = if self.old_path == DEV_NULL {
            FileKind::Added
        } else if self.new_path == DEV_NULL {
            FileKind::Removed
        } else if self.old_path != self.new_path {
            FileKind::Renamed
        } else {
            FileKind::Modified
        };
        let id = match kind {
            FileKind::Removed => self.old_path.clone(),
            _ => self.new_path.clone(),
        };
        DiffFile {
            id,
            old_path: self.old_path,
            new_path: self.new_path,
            kind,
            is_binary: self.is_binary,
            hunks: self.hunks,
        }
    }
}

/// Parse a (possibly multi-file) unified diff.
///
/// An empty input yields an empty list. Anything that cannot be attributed to a
/// file header or a hunk is an error.
pub fn parse_unified_diff(bytes: &[u8]) -> Result<Vec<DiffFile>, DiffParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DiffParseError::InvalidUtf8)?;

    let mut files = Vec::new();
    let mut current: Option<FileBuilder> = None;
    // Remaining (old, new) line counts of the open hunk and its header line number
    let mut remaining: Option<(u32, u32, usize)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;

        if let Some((old_left, new_left, header_line)) = remaining.as_mut() {
            let header_line = *header_line;
            let hunk = current
                .as_mut()
                .and_then(|f| f.hunks.last_mut())
                .ok_or(DiffParseError::UnexpectedLine {
                    line_no,
                    line: line.to_string(),
                })?;

            let (line_type, content) = if let Some(content) = line.strip_prefix('+') {
                (LineType::Added, content)
            } else if let Some(content) = line.strip_prefix('-') {
                (LineType::Removed, content)
            } else if let Some(content) = line.strip_prefix(' ') {
                (LineType::Context, content)
            } else if line.starts_with('\\') {
                // "\ No newline at end of file"
                continue;
            } else if line.is_empty() {
                // Some tools strip the trailing space of empty context lines
                (LineType::Context, "")
            } else {
                return Err(DiffParseError::TruncatedHunk {
                    line_no: header_line,
                });
            };

            match line_type {
                LineType::Added => *new_left = new_left.saturating_sub(1),
                LineType::Removed => *old_left = old_left.saturating_sub(1),
                LineType::Context => {
                    *old_left = old_left.saturating_sub(1);
                    *new_left = new_left.saturating_sub(1);
                }
            }
            hunk.lines.push(DiffLine {
                line_type,
                content: content.to_string(),
            });

            if *old_left == 0 && *new_left == 0 {
                remaining = None;
            }
            continue;
        }

        if line.starts_with("diff --git ") {
            if let Some(file) = current.take() {
                files.push(file.finish());
            }
            let (old, new) = parse_git_header(line).unwrap_or_default();
            current = Some(FileBuilder::new(old, new));
        } else if let Some(path) = line.strip_prefix("--- ") {
            // Plain unified diffs without a `diff --git` line start here
            let starts_new_file = current.as_ref().is_none_or(|f| !f.hunks.is_empty());
            if starts_new_file {
                if let Some(file) = current.take() {
                    files.push(file.finish());
                }
                current = Some(FileBuilder::new(String::new(), String::new()));
            }
            if let Some(file) = current.as_mut() {
                file.old_path = strip_diff_prefix(path);
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            let file = current.as_mut().ok_or(DiffParseError::UnexpectedLine {
                line_no,
                line: line.to_string(),
            })?;
            file.new_path = strip_diff_prefix(path);
        } else if line.starts_with("@@") {
            let file = current.as_mut().ok_or(DiffParseError::UnexpectedLine {
                line_no,
                line: line.to_string(),
            })?;
            let (old_start, old_count, new_start, new_count) = parse_hunk_header(line)
                .ok_or(DiffParseError::MalformedHunkHeader {
                    line_no,
                    line: line.to_string(),
                })?;
            file.hunks.push(DiffHunk {
                header: line.to_string(),
                old_start,
                new_start,
                lines: Vec::new(),
            });
            if old_count > 0 || new_count > 0 {
                remaining = Some((old_count, new_count, line_no));
            }
        } else if let Some(file) = current.as_mut() {
            if let Some(path) = line.strip_prefix("rename from ") {
                file.old_path = path.to_string();
            } else if let Some(path) = line.strip_prefix("rename to ") {
                file.new_path = path.to_string();
            } else if line.starts_with("new file mode") {
                file.old_path = DEV_NULL.to_string();
            } else if line.starts_with("deleted file mode") {
                file.new_path = DEV_NULL.to_string();
            } else if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
                file.is_binary = true;
            }
            // index / mode / similarity lines carry nothing we render
        } else if !line.trim().is_empty() {
            return Err(DiffParseError::UnexpectedLine {
                line_no,
                line: line.to_string(),
            });
        }
    }

    if let Some((_, _, header_line)) = remaining {
        return Err(DiffParseError::TruncatedHunk {
            line_no: header_line,
        });
    }
    if let Some(file) = current.take() {
        files.push(file.finish());
    }
    Ok(files)
}

/// Index parsed files by their id
pub fn index_files(files: &[DiffFile]) -> HashMap<String, usize> {
    files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.id.clone(), i))
        .collect()
}
