//! Commit → ticket linking by key references in commit messages.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use defectmine_core::{Commit, RawTicket};
use regex::Regex;

/// Uppercase project prefix, a hyphen, and a number: `ABC-123`.
static TICKET_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]+-[0-9]+").expect("ticket key pattern is valid"));

/// Ticket key → commits referencing it, in scan order.
pub type TicketLinks = BTreeMap<String, Vec<Commit>>;

/// All non-overlapping ticket-key-shaped substrings of `message`.
///
/// # Examples
///
/// ```
/// use defectmine_dataset::linking::ticket_keys_in;
///
/// let keys: Vec<_> = ticket_keys_in("BOOKKEEPER-12, ZOOKEEPER-3: fix (see bk-4)").collect();
/// assert_eq!(keys, ["BOOKKEEPER-12", "ZOOKEEPER-3"]);
/// ```
pub fn ticket_keys_in(message: &str) -> impl Iterator<Item = &str> {
    TICKET_KEY.find_iter(message).map(|m| m.as_str())
}

/// Link commits to the known tickets their messages reference.
///
/// Only keys belonging to `tickets` are considered. A commit is linked to a
/// given ticket once, however many times its message repeats the key; a
/// commit mentioning several known keys is linked to each of them. Tickets
/// nobody references are absent from the result.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use defectmine_core::{Commit, RawTicket};
/// use defectmine_dataset::linking::link_commits_to_tickets;
///
/// let ticket = RawTicket {
///     id: "1".into(),
///     key: "PROJ-7".into(),
///     resolution: "Fixed".into(),
///     description: String::new(),
///     opening_version: None,
///     injected_version: None,
///     fix_versions: vec![],
/// };
/// let commit = Commit {
///     hash: "abc".into(),
///     author: "alice".into(),
///     timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
///     message: "PROJ-7: handle empty ledgers".into(),
/// };
/// let links = link_commits_to_tickets(&[commit], &[ticket]);
/// assert_eq!(links["PROJ-7"].len(), 1);
/// ```
pub fn link_commits_to_tickets(commits: &[Commit], tickets: &[RawTicket]) -> TicketLinks {
    let known: HashSet<&str> = tickets.iter().map(|t| t.key.as_str()).collect();
    let mut links = TicketLinks::new();

    for commit in commits {
        let mut seen: HashSet<&str> = HashSet::new();
        for key in ticket_keys_in(&commit.message) {
            if known.contains(key) && seen.insert(key) {
                links.entry(key.to_string()).or_default().push(commit.clone());
            }
        }
    }

    tracing::info!(
        tickets = links.len(),
        links = links.values().map(Vec::len).sum::<usize>(),
        "linked commits to tickets"
    );
    links
}
