//! Injected-version estimation with the Proportion technique.
//!
//! For tickets whose injected version (IV), opening version (OV) and fix
//! version (FV) are all known, `p = (FV - IV) / (FV - OV)`. The median of
//! those samples is then used to place the missing IVs:
//! `IV ≈ release_at(FV - (FV - OV) * p)`. Finally every resolved ticket gets
//! the releases in `[IV, FV)` as its affected versions.
//!
//! The proportion is aggregated over all tickets before any estimate is made;
//! the per-ticket estimation and affected-version steps run in parallel.

use chrono::{DateTime, Duration, Utc};
use defectmine_core::{IvStatus, RawTicket, Release, ReleaseTimeline, Ticket, TicketResolution};
use rayon::prelude::*;
use serde::Serialize;

/// Proportion used when no ticket yields a usable sample.
pub const DEFAULT_PROPORTION: f64 = 0.5;

/// The global proportion and how it was obtained.
///
/// # Examples
///
/// ```
/// use defectmine_dataset::proportion::{compute_proportion, DEFAULT_PROPORTION};
///
/// let estimate = compute_proportion(&[], DEFAULT_PROPORTION);
/// assert_eq!(estimate.p, 0.5);
/// assert!(estimate.defaulted);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProportionEstimate {
    /// Median of the usable samples, or the default.
    pub p: f64,
    /// Usable samples.
    pub samples: usize,
    /// Tickets with IV, OV and FV whose sample was excluded as degenerate
    /// (`FV - OV <= 0` or `FV - IV < 0`).
    pub degenerate: usize,
    /// `true` when no usable sample existed and `p` is the default.
    pub defaulted: bool,
}

/// The proportion sample a single ticket contributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// A usable ratio.
    Usable(f64),
    /// IV, OV and FV are known but the intervals are contradictory.
    Degenerate,
    /// IV, OV or FV is missing.
    Ineligible,
}

/// Compute a ticket's proportion sample from its last fix version.
pub fn proportion_sample(ticket: &RawTicket) -> Sample {
    let (Some(iv), Some(ov), Some(fv)) = (
        ticket.injected_version.as_ref(),
        ticket.opening_version.as_ref(),
        ticket.last_fix_version(),
    ) else {
        return Sample::Ineligible;
    };

    let fv_to_ov = fv.date - ov.date;
    let iv_to_fv = fv.date - iv.date;
    if fv_to_ov <= Duration::zero() || iv_to_fv < Duration::zero() {
        return Sample::Degenerate;
    }
    Sample::Usable(iv_to_fv.num_seconds() as f64 / fv_to_ov.num_seconds() as f64)
}

/// Median of `values`; the mean of the two central values for even counts.
///
/// # Examples
///
/// ```
/// use defectmine_dataset::proportion::median;
///
/// assert_eq!(median(vec![0.9, 0.1, 0.5]), Some(0.5));
/// assert_eq!(median(vec![0.4, 0.2, 0.8, 0.6]), Some(0.5));
/// assert_eq!(median(vec![]), None);
/// ```
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let middle = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[middle])
    } else {
        Some((values[middle - 1] + values[middle]) / 2.0)
    }
}

/// Aggregate the global proportion over `tickets`.
///
/// The result depends only on the set of samples, not on ticket order.
/// Falls back to `default_p` when no ticket yields a usable sample.
pub fn compute_proportion(tickets: &[RawTicket], default_p: f64) -> ProportionEstimate {
    let mut samples = Vec::new();
    let mut degenerate = 0;
    for ticket in tickets {
        match proportion_sample(ticket) {
            Sample::Usable(p) => samples.push(p),
            Sample::Degenerate => {
                tracing::debug!(ticket = %ticket.key, "excluding degenerate proportion sample");
                degenerate += 1;
            }
            Sample::Ineligible => {}
        }
    }

    let count = samples.len();
    match median(samples) {
        Some(p) => ProportionEstimate {
            p,
            samples: count,
            degenerate,
            defaulted: false,
        },
        None => {
            tracing::warn!(default_p, "no usable proportion samples; using default");
            ProportionEstimate {
                p: default_p,
                samples: 0,
                degenerate,
                defaulted: true,
            }
        }
    }
}

/// `FV - (FV - OV) * p`, with the subtracted span truncated to whole seconds.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use defectmine_dataset::proportion::estimated_injection_date;
///
/// let ov = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
/// let fv = Utc.with_ymd_and_hms(2020, 1, 11, 0, 0, 0).unwrap();
/// let iv = estimated_injection_date(ov, fv, 0.3);
/// assert_eq!(iv, Some(Utc.with_ymd_and_hms(2020, 1, 8, 0, 0, 0).unwrap()));
///
/// // the span times p leaves the representable date range
/// assert_eq!(estimated_injection_date(ov, fv, 1e12), None);
/// ```
pub fn estimated_injection_date(
    opening: DateTime<Utc>,
    fix: DateTime<Utc>,
    p: f64,
) -> Option<DateTime<Utc>> {
    // float-to-int casts saturate, so an oversized product ends up rejected below
    let seconds = ((fix - opening).num_seconds() as f64 * p) as i64;
    fix.checked_sub_signed(Duration::try_seconds(seconds)?)
}

/// Estimate the injected version of a ticket whose IV is unknown.
///
/// Returns `None` when the ticket lacks an opening or fix version. When the
/// release active at the estimated date is not strictly before the opening
/// version, no release was active then, or the estimated date is out of
/// range, the opening version is used.
pub fn estimate_injected_version(
    ticket: &RawTicket,
    p: f64,
    timeline: &ReleaseTimeline,
) -> Option<(Release, IvStatus)> {
    let ov = ticket.opening_version.as_ref()?;
    let fv = ticket.last_fix_version()?;

    let active = estimated_injection_date(ov.date, fv.date, p)
        .and_then(|date| timeline.release_at(date));
    match active {
        Some(release) if release.date < ov.date => {
            tracing::debug!(ticket = %ticket.key, iv = %release.name, "estimated injected version");
            Some((release.clone(), IvStatus::Estimated))
        }
        _ => {
            tracing::warn!(
                ticket = %ticket.key,
                opening = %ov.name,
                "could not place injected version before opening version; using opening version"
            );
            Some((ov.clone(), IvStatus::OpeningFallback))
        }
    }
}

/// Releases in `[injected.date, last_fix.date)`, in timeline order.
pub fn affected_versions(
    injected: &Release,
    last_fix: &Release,
    timeline: &ReleaseTimeline,
) -> Vec<Release> {
    timeline.between(injected.date, last_fix.date)
}

/// Resolve one ticket against a fixed proportion.
///
/// A known IV later than the opening version is replaced by the opening
/// version. Tickets without opening or fix versions stay unresolved unless
/// their IV was already known, in which case only the fix version is needed
/// for the affected versions.
pub fn resolve_ticket(raw: &RawTicket, p: f64, timeline: &ReleaseTimeline) -> TicketResolution {
    let injected = match (&raw.injected_version, &raw.opening_version) {
        (Some(iv), Some(ov)) if iv.date > ov.date => {
            tracing::debug!(ticket = %raw.key, "known injected version after opening version");
            Some((ov.clone(), IvStatus::OpeningFallback))
        }
        (Some(iv), _) => Some((iv.clone(), IvStatus::Known)),
        (None, _) => estimate_injected_version(raw, p, timeline),
    };

    let (injected_version, iv_status) = match injected {
        Some((release, status)) => (Some(release), status),
        None => (None, IvStatus::Unknown),
    };

    let affected_versions = match (&injected_version, raw.last_fix_version()) {
        (Some(iv), Some(fv)) => Some(affected_versions(iv, fv, timeline)),
        _ => None,
    };

    TicketResolution {
        injected_version,
        iv_status,
        affected_versions,
    }
}

/// Tickets resolved by [`apply_proportion`].
#[derive(Debug, Clone)]
pub struct ProportionOutcome {
    /// The proportion used for estimation.
    pub estimate: ProportionEstimate,
    /// Every input ticket merged with its resolution, in input order.
    pub tickets: Vec<Ticket>,
    /// Keys of tickets whose injected version could not be established.
    pub unresolved: Vec<String>,
}

/// Run the Proportion technique over a ticket batch.
///
/// Fix versions are sorted first, then the global proportion is computed
/// over the whole batch, and only then are tickets resolved (in parallel).
///
/// # Examples
///
/// ```
/// use defectmine_core::ReleaseTimeline;
/// use defectmine_dataset::proportion::apply_proportion;
///
/// let outcome = apply_proportion(Vec::new(), &ReleaseTimeline::default(), 0.5);
/// assert_eq!(outcome.estimate.p, 0.5);
/// assert!(outcome.tickets.is_empty());
/// ```
pub fn apply_proportion(
    mut tickets: Vec<RawTicket>,
    timeline: &ReleaseTimeline,
    default_p: f64,
) -> ProportionOutcome {
    for ticket in &mut tickets {
        ticket.sort_fix_versions();
    }

    let estimate = compute_proportion(&tickets, default_p);
    tracing::info!(
        p = estimate.p,
        samples = estimate.samples,
        degenerate = estimate.degenerate,
        "computed proportion"
    );

    let resolved: Vec<Ticket> = tickets
        .into_par_iter()
        .map(|raw| {
            let resolution = resolve_ticket(&raw, estimate.p, timeline);
            Ticket::new(raw, resolution)
        })
        .collect();

    let unresolved: Vec<String> = resolved
        .iter()
        .filter(|t| !t.resolution.iv_status.is_resolved())
        .map(|t| t.key().to_string())
        .collect();
    for key in &unresolved {
        tracing::warn!(ticket = %key, "ticket lacks opening or fix version; injected version unknown");
    }

    tracing::info!(
        tickets = resolved.len(),
        unresolved = unresolved.len(),
        "resolved injected and affected versions"
    );
    ProportionOutcome {
        estimate,
        tickets: resolved,
        unresolved,
    }
}
