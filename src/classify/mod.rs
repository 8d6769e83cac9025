//! The change classifier: maps a range's file-level diff to an invalidation
//! plan.
//!
//! Classification is a pure function of the ordered change list and the set
//! of currently known artifacts. The rules, in evaluation order per change:
//!
//! 1. A global asset (script, stylesheet, shared image) added, modified, or
//!    deleted invalidates everything.
//! 2. An exercise source added or modified invalidates that one artifact,
//!    unless the path carries an exclusion marker.
//! 3. A shared utility modified invalidates everything. There is no
//!    dependency graph between utilities and individual exercises, so the
//!    classifier cannot narrow this; a full rebuild is the conservative
//!    answer.
//!
//! Deleted exercise sources are dropped: a removed source does not require a
//! regeneration, and published screenshots are never retracted here.

use std::collections::BTreeSet;

use regex::RegexSet;

use crate::types::{ArtifactId, ChangeKind, FileChange};

/// The decision of what to regenerate for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationPlan {
    /// Regenerate every known artifact.
    Full,
    /// Regenerate exactly this set (possibly empty).
    Partial(BTreeSet<ArtifactId>),
}

impl InvalidationPlan {
    /// Expands the plan against the current artifact enumeration.
    pub fn expand(&self, known: &BTreeSet<ArtifactId>) -> BTreeSet<ArtifactId> {
        match self {
            InvalidationPlan::Full => known.clone(),
            InvalidationPlan::Partial(set) => set.clone(),
        }
    }

    /// Returns true when nothing needs regenerating.
    pub fn is_empty(&self) -> bool {
        matches!(self, InvalidationPlan::Partial(set) if set.is_empty())
    }
}

/// Compiled path rules for the classifier.
///
/// Patterns are anchored at the start of the (repo-relative) path.
#[derive(Debug)]
pub struct ClassifierRules {
    global_assets: RegexSet,
    exercise_sources: RegexSet,
    shared_utilities: RegexSet,
    /// Exercise-source paths containing any of these markers are not
    /// artifacts (template/boilerplate pages that look like exercises).
    exclusion_markers: Vec<String>,
}

impl ClassifierRules {
    /// Builds a rule set from raw patterns.
    ///
    /// # Panics
    ///
    /// Panics if a pattern fails to compile; rules come from static defaults
    /// or operator configuration validated at startup.
    pub fn new(
        global_assets: &[&str],
        exercise_sources: &[&str],
        shared_utilities: &[&str],
        exclusion_markers: Vec<String>,
    ) -> Self {
        ClassifierRules {
            global_assets: Self::compile(global_assets),
            exercise_sources: Self::compile(exercise_sources),
            shared_utilities: Self::compile(shared_utilities),
            exclusion_markers,
        }
    }

    fn compile(patterns: &[&str]) -> RegexSet {
        let anchored: Vec<String> = patterns.iter().map(|p| format!("^(?:{})", p)).collect();
        RegexSet::new(&anchored).expect("classifier patterns must compile")
    }

    /// Returns true when the path is a shared resource affecting every
    /// artifact's rendering.
    pub fn is_global_asset(&self, path: &str) -> bool {
        self.global_assets.is_match(path)
    }

    /// Returns true when the path is an exercise source file, excluded or
    /// not.
    pub fn is_exercise_source(&self, path: &str) -> bool {
        self.exercise_sources.is_match(path)
    }

    /// Returns true when the path is a shared utility.
    pub fn is_shared_utility(&self, path: &str) -> bool {
        self.shared_utilities.is_match(path)
    }

    /// Returns true when an exercise-source path is excluded from artifact
    /// status.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclusion_markers.iter().any(|m| path.contains(m))
    }
}

impl Default for ClassifierRules {
    fn default() -> Self {
        ClassifierRules::new(
            &[r".*\.js", r"css/.*\.css", r"css/images/.*", r"images/.*"],
            &[r"exercises/.*\.html"],
            &[r"utils/.*\.js"],
            vec!["khan".to_string()],
        )
    }
}

/// Classifies a range's diff into an invalidation plan.
///
/// Pure: identical inputs always produce identical plans. Short-circuits to
/// [`InvalidationPlan::Full`] on the first change matching a full-rebuild
/// rule. `known_artifacts` is only consulted by the caller when expanding a
/// `Full` plan; it is taken here so the signature states the whole contract.
pub fn classify(
    rules: &ClassifierRules,
    changes: &[FileChange],
    _known_artifacts: &BTreeSet<ArtifactId>,
) -> InvalidationPlan {
    let mut stale = BTreeSet::new();

    for change in changes {
        if rules.is_global_asset(&change.path) {
            return InvalidationPlan::Full;
        }

        if matches!(change.kind, ChangeKind::Added | ChangeKind::Modified)
            && rules.is_exercise_source(&change.path)
            && !rules.is_excluded(&change.path)
            && let Some(id) = ArtifactId::from_source_path(&change.path)
        {
            stale.insert(id);
        }

        if change.kind == ChangeKind::Modified && rules.is_shared_utility(&change.path) {
            return InvalidationPlan::Full;
        }
    }

    InvalidationPlan::Partial(stale)
}
