//! Commit ranges and per-range file changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CommitId;

/// The span of history one job covers.
///
/// Either endpoint may be unresolved (`None`) until the mirror is available:
/// `from = None` means "earliest known commit", `to = None` means "current
/// head at processing time". A range is created per trigger and discarded
/// once its plan has been executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRange {
    pub from: Option<CommitId>,
    pub to: Option<CommitId>,
}

impl CommitRange {
    /// A range with both endpoints known (the webhook case).
    pub fn new(from: CommitId, to: CommitId) -> Self {
        CommitRange {
            from: Some(from),
            to: Some(to),
        }
    }

    /// A backfill range: from the given checkpoint (or the earliest commit
    /// when `None`) through the current head.
    pub fn backfill(from: Option<CommitId>) -> Self {
        CommitRange { from, to: None }
    }
}

impl fmt::Display for CommitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from.as_ref().map(CommitId::short).unwrap_or("earliest");
        let to = self.to.as_ref().map(CommitId::short).unwrap_or("head");
        write!(f, "{}..{}", from, to)
    }
}

/// A [`CommitRange`] with both endpoints resolved against the mirror.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRange {
    pub from: CommitId,
    pub to: CommitId,
}

impl fmt::Display for ResolvedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from.short(), self.to.short())
    }
}

/// How a file changed within a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Maps a `git diff --name-status` status code to a change kind.
    ///
    /// Returns `None` for codes outside A/M/D (renames, copies, unmerged);
    /// those entries carry no invalidation signal here.
    pub fn from_status(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' => Some(ChangeKind::Added),
            'M' => Some(ChangeKind::Modified),
            'D' => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// One file-level change from the diff between a range's endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

impl FileChange {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        FileChange {
            path: path.into(),
            kind,
        }
    }

    /// Parses one line of `git diff --name-status` output.
    ///
    /// Lines are `<status><TAB><path>`; status codes outside A/M/D yield
    /// `None`, as do blank lines.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let code = parts.next()?;
        let path = parts.next()?;
        let kind = ChangeKind::from_status(code)?;
        Some(FileChange::new(path, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_unresolved_endpoints() {
        let range = CommitRange::backfill(None);
        assert_eq!(range.to_string(), "earliest..head");
    }

    #[test]
    fn display_shortens_resolved_endpoints() {
        let range = CommitRange::new(
            CommitId::new("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            CommitId::new("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
        );
        assert_eq!(range.to_string(), "aaaaaaa..bbbbbbb");
    }

    #[test]
    fn parse_line_handles_tab_separated() {
        let change = FileChange::parse_line("M\texercises/addition.html").unwrap();
        assert_eq!(change.path, "exercises/addition.html");
        assert_eq!(change.kind, ChangeKind::Modified);
    }

    #[test]
    fn parse_line_handles_each_kind() {
        assert_eq!(
            FileChange::parse_line("A\tcss/main.css").unwrap().kind,
            ChangeKind::Added
        );
        assert_eq!(
            FileChange::parse_line("D\timages/logo.png").unwrap().kind,
            ChangeKind::Deleted
        );
    }

    #[test]
    fn parse_line_skips_renames_and_blank_lines() {
        assert!(FileChange::parse_line("R100\told.html\tnew.html").is_none());
        assert!(FileChange::parse_line("").is_none());
    }
}
