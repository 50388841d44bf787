//! Dispositions and downstream review-action codes

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Outcome of a prior-authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Granted,
    Denied,
    Partial,
    Pending,
    Cancelled,
    Unknown,
}

impl Disposition {
    /// All dispositions, in declaration order
    pub const ALL: [Disposition; 6] = [
        Disposition::Granted,
        Disposition::Denied,
        Disposition::Partial,
        Disposition::Pending,
        Disposition::Cancelled,
        Disposition::Unknown,
    ];

    /// Review action reported downstream; `None` for `Unknown`
    pub fn review_action(&self) -> Option<ReviewAction> {
        REVIEW_ACTIONS.get(self).copied()
    }

    /// Returns true if no further part can change this outcome
    pub fn is_final(&self) -> bool {
        !matches!(self, Disposition::Pending | Disposition::Unknown)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Disposition::Granted => "Granted",
            Disposition::Denied => "Denied",
            Disposition::Partial => "Partial",
            Disposition::Pending => "Pending",
            Disposition::Cancelled => "Cancelled",
            Disposition::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Disposition::ALL
            .into_iter()
            .find(|d| d.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown disposition: {}", s))
    }
}

/// Review-action codes understood by downstream utilization management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewAction {
    #[serde(rename = "A1")]
    Approved,
    #[serde(rename = "A2")]
    PartiallyApproved,
    #[serde(rename = "A3")]
    Denied,
    #[serde(rename = "A4")]
    Pended,
    #[serde(rename = "A6")]
    Cancelled,
}

impl ReviewAction {
    /// The wire code of this action
    pub fn code(&self) -> &'static str {
        match self {
            ReviewAction::Approved => "A1",
            ReviewAction::PartiallyApproved => "A2",
            ReviewAction::Denied => "A3",
            ReviewAction::Pended => "A4",
            ReviewAction::Cancelled => "A6",
        }
    }

    /// Parses a wire code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A1" => Some(ReviewAction::Approved),
            "A2" => Some(ReviewAction::PartiallyApproved),
            "A3" => Some(ReviewAction::Denied),
            "A4" => Some(ReviewAction::Pended),
            "A6" => Some(ReviewAction::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

static REVIEW_ACTIONS: Lazy<HashMap<Disposition, ReviewAction>> = Lazy::new(|| {
    HashMap::from([
        (Disposition::Granted, ReviewAction::Approved),
        (Disposition::Partial, ReviewAction::PartiallyApproved),
        (Disposition::Denied, ReviewAction::Denied),
        (Disposition::Pending, ReviewAction::Pended),
        (Disposition::Cancelled, ReviewAction::Cancelled),
    ])
});
