//! Dataset construction: ticket linking, proportion estimation, and output.
//!
//! Links commits to the tickets their messages mention, estimates unknown
//! injected versions with the Proportion technique, derives affected-version
//! sets, and writes the reconciled dataset as JSON.

pub mod linking;
pub mod pipeline;
pub mod proportion;
pub mod report;

pub use linking::{link_commits_to_tickets, TicketLinks};
pub use pipeline::{build_dataset, BuildOptions, Dataset, DatasetInputs};
pub use proportion::{apply_proportion, ProportionEstimate, ProportionOutcome};
