//! Found/not-found decision for a single probe response.
//!
//! [`decide`] is a pure function of the response and the site's matching
//! rules. Both probe strategies feed it, so a static fetch and a rendered
//! page of the same site are judged identically.

use footprint_catalog::{CheckType, NoResultRule, SiteDefinition};
use footprint_core::ScanningConfig;

/// Generic "nothing here" phrases used by the secondary filter.
///
/// English only. On non-English sites they can hide genuine hits, so the
/// filter only runs when a site opts in or the operator forces it.
pub const GENERIC_NEGATIVE_PHRASES: [&str; 8] = [
    "not found",
    "404",
    "no such user",
    "page not found",
    "user not found",
    "does not exist",
    "doesn't exist",
    "no results",
];

/// Operator-level switches that affect every decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionPolicy {
    /// Apply the negative-phrase filter to every site
    pub force_negative_phrase_filter: bool,
}

impl DecisionPolicy {
    /// Policy taken from the scanning settings.
    #[must_use]
    pub fn from_config(config: &ScanningConfig) -> Self {
        Self {
            force_negative_phrase_filter: config.force_negative_phrase_filter,
        }
    }
}

/// Decide whether `body` served with `status` shows the target on `site`.
#[must_use]
pub fn decide(status: u16, body: &str, site: &SiteDefinition, policy: DecisionPolicy) -> bool {
    let body = body.to_lowercase();
    let primary = primary_rule(status, &body, site);

    let found = match site.check_type {
        CheckType::Negative => primary,
        CheckType::Positive => match &site.success_string {
            Some(success) => body.contains(&success.to_lowercase()),
            None => !primary,
        },
    };

    // Can only turn a hit into a miss
    if found && (site.negative_phrase_filter || policy.force_negative_phrase_filter) {
        return !contains_negative_phrase(&body);
    }
    found
}

fn primary_rule(status: u16, body: &str, site: &SiteDefinition) -> bool {
    match &site.no_result {
        Some(NoResultRule::Contains { needles }) => {
            !needles.iter().any(|needle| body.contains(needle.as_str()))
        }
        Some(NoResultRule::StatusCode { statuses }) => !statuses.contains(&status),
        None => {
            (200..300).contains(&status)
                && !site
                    .error_strings
                    .iter()
                    .any(|marker| body.contains(marker.as_str()))
        }
    }
}

fn contains_negative_phrase(body: &str) -> bool {
    GENERIC_NEGATIVE_PHRASES
        .iter()
        .any(|phrase| body.contains(phrase))
}
