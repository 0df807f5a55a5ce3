//! Repository history: commits, tags, and per-release commit windows.
//!
//! Reads history and tags with git2, pairs tracker releases with tags by
//! name, and splits the history into one commit window per matched release
//! using ancestry-range queries between consecutive release tags.

pub mod matching;
pub mod mining;
pub mod partition;

pub use matching::{match_releases_to_tags, MatchedRelease, TagMatches};
pub use mining::{CommitSource, GitHistory};
pub use partition::{partition_commits, PartitionError, PartitionMap, ReleaseWindow};
