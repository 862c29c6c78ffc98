/// Phase definitions for tracking a pipeline run
///
/// A run moves through authentication, discovery, and a per-season /
/// per-division loop before summarizing.
use std::fmt;

/// Represents the current phase of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    NotStarted,

    // ===== Setup =====
    /// Acquiring the bearer credential
    Authenticating,

    /// Listing seasons from the source
    DiscoveringSeasons,

    // ===== Per-season loop =====
    /// Listing divisions of one season
    DiscoveringDivisions,

    /// A scrape request for one division is being paced or is in flight
    Scraping,

    /// Writing one division's scraped rows into the store
    Reconciling,

    // ===== Wind-down =====
    /// Taking the after-snapshot and building the report
    Summarizing,

    // ===== Terminal =====
    Done,

    /// Authentication failed (or the season list could not be read)
    Aborted,

    /// An operator stopped the run between divisions
    Cancelled,
}

impl RunPhase {
    /// Returns true if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Cancelled)
    }

    /// Checks whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: RunPhase) -> bool {
        use RunPhase::*;

        match (self, next) {
            (NotStarted, Authenticating) => true,
            (Authenticating, DiscoveringSeasons) => true,
            (DiscoveringSeasons, DiscoveringDivisions) => true,
            // Next season after an empty or failed division listing
            (DiscoveringDivisions, DiscoveringDivisions) => true,
            (DiscoveringDivisions, Scraping) => true,
            // Next division after a failure, or a retry
            (Scraping, Scraping) => true,
            (Scraping, Reconciling) => true,
            (Scraping, DiscoveringDivisions) => true,
            (Reconciling, Scraping) => true,
            (Reconciling, DiscoveringDivisions) => true,
            (Authenticating | DiscoveringSeasons | DiscoveringDivisions | Scraping, Aborted) => {
                true
            }
            (
                Authenticating | DiscoveringSeasons | DiscoveringDivisions | Scraping
                | Reconciling,
                Summarizing,
            ) => true,
            (Summarizing, Done | Cancelled) => true,
            _ => false,
        }
    }

    /// Short lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Authenticating => "authenticating",
            Self::DiscoveringSeasons => "discovering_seasons",
            Self::DiscoveringDivisions => "discovering_divisions",
            Self::Scraping => "scraping",
            Self::Reconciling => "reconciling",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
