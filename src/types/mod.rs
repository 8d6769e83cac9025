//! Core domain types.

mod ids;
mod range;

pub use ids::{ArtifactId, CommitId, InvalidCommitId};
pub use range::{ChangeKind, CommitRange, FileChange, ResolvedRange};
