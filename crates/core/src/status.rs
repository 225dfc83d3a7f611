//! Visit status vocabulary and the transition table.
//!
//! Visit statuses are owned by the booking peer and arrive as free strings. Two pieces of logic
//! live here:
//! - the projection of a status onto the three presentation groups, which is total and treats
//!   anything unknown (including statuses the booking peer adds in future) as `Past`;
//! - the closed set of transitions a user may request, each mapped to exactly one booking-peer
//!   status string.

use crate::error::VisitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ACTIVE_STATUSES: &[&str] = &["committed", "on_route", "on_scene"];
const UPCOMING_STATUSES: &[&str] = &["accepted", "scheduled", "requested"];

/// Presentation triage bucket derived from a visit status. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatusGroup {
    Active,
    Upcoming,
    Past,
}

impl VisitStatusGroup {
    /// Projects a visit status onto its group.
    ///
    /// `archived`, `completed`, a missing status and any unrecognised value all map to `Past`.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            Some(s) if ACTIVE_STATUSES.contains(&s) => VisitStatusGroup::Active,
            Some(s) if UPCOMING_STATUSES.contains(&s) => VisitStatusGroup::Upcoming,
            _ => VisitStatusGroup::Past,
        }
    }
}

/// A status change a user may request on a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VisitTransition {
    OnRoute,
    OnScene,
    Complete,
    Committed,
    Archived,
}

/// Every allowed transition and the booking-peer status it sends. Bijective.
pub const TRANSITION_TABLE: [(VisitTransition, &str); 5] = [
    (VisitTransition::OnRoute, "on_route"),
    (VisitTransition::OnScene, "on_scene"),
    (VisitTransition::Complete, "complete"),
    (VisitTransition::Committed, "committed"),
    (VisitTransition::Archived, "archived"),
];

impl VisitTransition {
    /// The booking peer's status string for this transition.
    pub fn booking_status(self) -> &'static str {
        match self {
            VisitTransition::OnRoute => "on_route",
            VisitTransition::OnScene => "on_scene",
            VisitTransition::Complete => "complete",
            VisitTransition::Committed => "committed",
            VisitTransition::Archived => "archived",
        }
    }

    /// Committing a visit assigns it to the shift team currently routed to it.
    pub fn requires_shift_team(self) -> bool {
        matches!(self, VisitTransition::Committed)
    }
}

impl FromStr for VisitTransition {
    type Err = VisitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TRANSITION_TABLE
            .iter()
            .find(|(_, status)| *status == s)
            .map(|(transition, _)| *transition)
            .ok_or_else(|| {
                if s.trim().is_empty() {
                    VisitError::InvalidArgument(
                        "visit status cannot be empty or unspecified".into(),
                    )
                } else {
                    VisitError::InvalidArgument(format!("visit status {s} does not exist"))
                }
            })
    }
}

impl TryFrom<String> for VisitTransition {
    type Error = VisitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VisitTransition> for String {
    fn from(value: VisitTransition) -> Self {
        value.booking_status().to_owned()
    }
}

impl fmt::Display for VisitTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.booking_status())
    }
}
