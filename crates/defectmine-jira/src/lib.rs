//! Jira ticket and release source.
//!
//! [`parse`] turns Jira REST JSON (project versions, issue search pages) into
//! [`Release`](defectmine_core::Release)s and
//! [`RawTicket`](defectmine_core::RawTicket)s; [`client`] pages through a live
//! Jira instance and feeds the same parsers.

pub mod client;
pub mod parse;

pub use client::JiraClient;
