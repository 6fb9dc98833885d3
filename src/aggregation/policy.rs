//! Source-tier policy applied before voting.

use crate::report::Report;
use serde::{Deserialize, Serialize};

/// How user reports and seed/system reports are combined.
///
/// Selected via `[aggregation].source_policy` in `config.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePolicy {
    /// Any user report in the window excludes every seed/system report.
    #[default]
    Override,
    /// All windowed reports vote, user reports at double weight.
    Blend,
}

impl SourcePolicy {
    pub fn select<'a>(self, windowed: &[&'a Report]) -> Vec<&'a Report> {
        match self {
            SourcePolicy::Override => select_authoritative_subset(windowed),
            SourcePolicy::Blend => windowed.to_vec(),
        }
    }
}

/// Returns exactly the user reports when any exist, otherwise every non-user report.
pub fn select_authoritative_subset<'a>(windowed: &[&'a Report]) -> Vec<&'a Report> {
    let (user, other): (Vec<&Report>, Vec<&Report>) =
        windowed.iter().copied().partition(|report| report.source.is_user());
    if user.is_empty() { other } else { user }
}
