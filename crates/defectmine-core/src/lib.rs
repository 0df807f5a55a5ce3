//! Core types, configuration, and error handling for defectmine.
//!
//! This crate provides the shared foundation used by all other defectmine crates:
//! - [`DefectmineError`] — unified error type using `thiserror`
//! - [`DefectmineConfig`] — configuration loaded from `.defectmine.toml`
//! - The dataset model: [`Release`], [`Tag`], [`Commit`], [`RawTicket`],
//!   [`TicketResolution`], [`Ticket`]
//! - [`ReleaseTimeline`] — the chronological release sequence and the shared
//!   release-date resolver

mod config;
mod error;
mod timeline;
mod types;

pub use config::{
    DefectmineConfig, GitConfig, JiraConfig, OutputConfig, PartitionConfig, ProjectConfig,
    ProportionConfig,
};
pub use error::DefectmineError;
pub use timeline::ReleaseTimeline;
pub use types::{
    Commit, IvStatus, OutputFormat, RawTicket, Release, Tag, Ticket, TicketResolution,
};

/// A convenience `Result` type for defectmine operations.
pub type Result<T> = std::result::Result<T, DefectmineError>;
