//! Local mirror of the upstream exercise repository.
//!
//! All version-control access goes through this module: syncing the mirror
//! to the upstream default branch, resolving commit-range endpoints,
//! producing the per-range diff, and enumerating the exercise sources in the
//! checked-out tree.
//!
//! Git runs as a subprocess with a clean environment (no system or user
//! config, no terminal prompts) for reproducible behavior across machines.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;

use thiserror::Error;
use tracing::{debug, info};

use crate::classify::ClassifierRules;
use crate::types::{ArtifactId, CommitId, CommitRange, FileChange, InvalidCommitId, ResolvedRange};

/// Errors from mirror operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed.
    #[error("git command failed: {command}\nstderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Git produced output that is not a commit id.
    #[error("unexpected git output: {0}")]
    InvalidCommit(#[from] InvalidCommitId),

    /// The repository has no commits to resolve a range against.
    #[error("repository has no commits")]
    EmptyHistory,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for mirror operations.
pub type GitResult<T> = Result<T, GitError>;

/// Create a git Command with a clean environment (no system/user config).
pub(crate) fn git_command(workdir: &Path) -> std::process::Command {
    use std::process::Command;

    let mut cmd = Command::new("git");
    cmd.current_dir(workdir);

    // Disable system and user config for reproducible behavior
    cmd.env("GIT_CONFIG_NOSYSTEM", "1");
    cmd.env("GIT_CONFIG_GLOBAL", "/dev/null");

    // Disable terminal prompts
    cmd.env("GIT_TERMINAL_PROMPT", "0");

    cmd
}

/// Run a git command in the given working directory.
pub(crate) fn run_git(workdir: &Path, args: &[&str]) -> GitResult<Output> {
    let output = git_command(workdir).args(args).output()?;

    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let command = format!("git {}", args.join(" "));
        Err(GitError::CommandFailed { command, stderr })
    }
}

/// Run a git command and return trimmed stdout.
pub(crate) fn run_git_stdout(workdir: &Path, args: &[&str]) -> GitResult<String> {
    let output = run_git(workdir, args)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The local repository mirror, exclusively owned by the worker.
#[derive(Debug, Clone)]
pub struct Mirror {
    /// Clone URL of the upstream repository.
    url: String,
    /// Directory holding the mirror checkout.
    dir: PathBuf,
    /// Name of the upstream default branch.
    default_branch: String,
}

impl Mirror {
    pub fn new(url: impl Into<String>, dir: impl Into<PathBuf>, default_branch: impl Into<String>) -> Self {
        Mirror {
            url: url.into(),
            dir: dir.into(),
            default_branch: default_branch.into(),
        }
    }

    /// Returns the mirror checkout directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Brings the mirror to a clean state tracking the upstream default
    /// branch: clone if absent, else checkout/reset/pull.
    pub fn sync(&self) -> GitResult<()> {
        if self.dir.join(".git").exists() {
            debug!(dir = %self.dir.display(), "Updating existing mirror");
            run_git(&self.dir, &["checkout", &self.default_branch])?;
            run_git(&self.dir, &["reset", "--hard"])?;
            run_git(&self.dir, &["pull", "--ff-only", "origin", &self.default_branch])?;
        } else {
            info!(url = %self.url, dir = %self.dir.display(), "Cloning mirror");
            let parent = self.dir.parent().unwrap_or(Path::new("."));
            std::fs::create_dir_all(parent)?;
            let dir_str = self.dir.to_string_lossy();
            run_git(parent, &["clone", &self.url, &dir_str])?;
        }
        Ok(())
    }

    /// Checks out a commit in detached-HEAD mode so enumeration and static
    /// serving reflect that revision.
    pub fn checkout_detached(&self, commit: &CommitId) -> GitResult<()> {
        run_git(&self.dir, &["checkout", "--detach", commit.as_str()])?;
        Ok(())
    }

    /// The earliest commit reachable from the default branch head.
    pub fn earliest_commit(&self) -> GitResult<CommitId> {
        let listing = run_git_stdout(&self.dir, &["rev-list", "--reverse", "HEAD"])?;
        let first = listing.lines().next().ok_or(GitError::EmptyHistory)?;
        Ok(CommitId::parse(first)?)
    }

    /// The current head commit.
    pub fn head_commit(&self) -> GitResult<CommitId> {
        let head = run_git_stdout(&self.dir, &["rev-parse", "HEAD"])?;
        Ok(CommitId::parse(head)?)
    }

    /// Resolves a range's endpoints against the synced mirror.
    pub fn resolve(&self, range: &CommitRange) -> GitResult<ResolvedRange> {
        let from = match &range.from {
            Some(id) => id.clone(),
            None => self.earliest_commit()?,
        };
        let to = match &range.to {
            Some(id) => id.clone(),
            None => self.head_commit()?,
        };
        Ok(ResolvedRange { from, to })
    }

    /// The file-level diff between a resolved range's endpoints.
    ///
    /// Status codes outside A/M/D (renames, copies) are skipped; they carry
    /// no invalidation signal.
    pub fn diff(&self, range: &ResolvedRange) -> GitResult<Vec<FileChange>> {
        let listing = run_git_stdout(
            &self.dir,
            &["diff", "--name-status", range.from.as_str(), range.to.as_str()],
        )?;
        Ok(listing.lines().filter_map(FileChange::parse_line).collect())
    }

    /// Enumerates every artifact in the checked-out tree.
    ///
    /// Reads the exercise source directory of the current checkout, so the
    /// enumeration reflects post-range state (sources added mid-range are
    /// included). Exclusion markers apply here exactly as in classification.
    pub fn enumerate_artifacts(&self, rules: &ClassifierRules) -> GitResult<BTreeSet<ArtifactId>> {
        let exercises_dir = self.dir.join("exercises");
        let read_dir = match std::fs::read_dir(&exercises_dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = BTreeSet::new();
        for entry in read_dir {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            let rel_path = format!("exercises/{}", name);
            if rules.is_exercise_source(&rel_path)
                && !rules.is_excluded(&rel_path)
                && let Some(id) = ArtifactId::from_source_path(&rel_path)
            {
                artifacts.insert(id);
            }
        }
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUpstream;
    use crate::types::ChangeKind;
    use tempfile::tempdir;

    fn mirror_for(upstream: &TestUpstream, dir: &Path) -> Mirror {
        Mirror::new(
            upstream.url(),
            dir.join("mirror"),
            upstream.default_branch(),
        )
    }

    #[test]
    fn sync_clones_when_absent() {
        let upstream = TestUpstream::new();
        upstream.commit_file("exercises/addition.html", "<html></html>", "add addition");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());

        mirror.sync().unwrap();
        assert!(mirror.dir().join("exercises/addition.html").exists());
    }

    #[test]
    fn sync_pulls_new_commits() {
        let upstream = TestUpstream::new();
        upstream.commit_file("exercises/addition.html", "<html></html>", "add addition");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());
        mirror.sync().unwrap();

        upstream.commit_file("exercises/subtraction.html", "<html></html>", "add subtraction");
        mirror.sync().unwrap();

        assert!(mirror.dir().join("exercises/subtraction.html").exists());
    }

    #[test]
    fn sync_recovers_from_detached_head() {
        let upstream = TestUpstream::new();
        let first = upstream.commit_file("a.txt", "1", "first");
        upstream.commit_file("b.txt", "2", "second");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());
        mirror.sync().unwrap();

        mirror.checkout_detached(&first).unwrap();
        mirror.sync().unwrap();

        assert_eq!(mirror.head_commit().unwrap(), upstream.head());
    }

    #[test]
    fn resolve_fills_unresolved_endpoints() {
        let upstream = TestUpstream::new();
        let first = upstream.commit_file("a.txt", "1", "first");
        let second = upstream.commit_file("b.txt", "2", "second");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());
        mirror.sync().unwrap();

        let resolved = mirror.resolve(&CommitRange::backfill(None)).unwrap();
        assert_eq!(resolved.from, first);
        assert_eq!(resolved.to, second);

        let partial = mirror
            .resolve(&CommitRange::backfill(Some(first.clone())))
            .unwrap();
        assert_eq!(partial.from, first);
        assert_eq!(partial.to, second);
    }

    #[test]
    fn diff_reports_name_status() {
        let upstream = TestUpstream::new();
        let first = upstream.commit_file("exercises/addition.html", "v1", "add");
        upstream.commit_file("exercises/addition.html", "v2", "modify");
        let third = upstream.commit_file("css/main.css", "body{}", "style");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());
        mirror.sync().unwrap();

        let changes = mirror
            .diff(&ResolvedRange {
                from: first,
                to: third,
            })
            .unwrap();

        assert!(changes.contains(&FileChange::new(
            "exercises/addition.html",
            ChangeKind::Modified
        )));
        assert!(changes.contains(&FileChange::new("css/main.css", ChangeKind::Added)));
    }

    #[test]
    fn enumerate_artifacts_reads_checkout_and_excludes() {
        let upstream = TestUpstream::new();
        upstream.commit_file("exercises/addition.html", "<html></html>", "add");
        upstream.commit_file("exercises/subtraction.html", "<html></html>", "add");
        upstream.commit_file("exercises/khan-exercise.html", "<html></html>", "template");
        upstream.commit_file("exercises/notes.txt", "n/a", "notes");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());
        mirror.sync().unwrap();

        let artifacts = mirror
            .enumerate_artifacts(&ClassifierRules::default())
            .unwrap();
        let expected: BTreeSet<_> = [ArtifactId::new("addition"), ArtifactId::new("subtraction")]
            .into_iter()
            .collect();
        assert_eq!(artifacts, expected);
    }

    #[test]
    fn enumerate_artifacts_empty_without_exercises_dir() {
        let upstream = TestUpstream::new();
        upstream.commit_file("README.md", "hi", "init");

        let dir = tempdir().unwrap();
        let mirror = mirror_for(&upstream, dir.path());
        mirror.sync().unwrap();

        let artifacts = mirror
            .enumerate_artifacts(&ClassifierRules::default())
            .unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn sync_fails_on_bad_url() {
        let dir = tempdir().unwrap();
        let mirror = Mirror::new(
            dir.path().join("no-such-upstream").to_string_lossy(),
            dir.path().join("mirror"),
            "main",
        );
        assert!(matches!(
            mirror.sync(),
            Err(GitError::CommandFailed { .. })
        ));
    }
}
