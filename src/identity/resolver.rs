use crate::storage::{
    KeyPrefix, ReconciliationStore, ScrapedTeamRecord, StorageResult, TeamIdentity,
};
use std::collections::BTreeSet;

/// What the resolver decided for one scraped row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Linked to the identity every recurrence already shares
    Linked(i64),

    /// The row already had an identity; nothing changed
    AlreadyLinked(i64),

    /// No linked recurrence in another season
    Unresolved,

    /// Recurrences point at different identities; left for an operator
    Ambiguous(Vec<i64>),
}

/// Outcome of resolving a batch of rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub examined: u32,
    pub linked: u32,
    pub unresolved: u32,
    /// Row id and the conflicting identity ids
    pub ambiguous: Vec<(i64, Vec<i64>)>,
}

impl ResolutionReport {
    fn record(&mut self, team_id: i64, resolution: Resolution) {
        self.examined += 1;
        match resolution {
            Resolution::Linked(_) => self.linked += 1,
            Resolution::AlreadyLinked(_) => {}
            Resolution::Unresolved => self.unresolved += 1,
            Resolution::Ambiguous(candidates) => self.ambiguous.push((team_id, candidates)),
        }
    }
}

/// Links scraped rows to identities on exact recurrence only
///
/// A row is a recurrence of another when team name, division label and
/// league are identical and only the season differs. An unresolved row is
/// linked when its linked recurrences all point at a single identity. Names
/// that merely look alike are never matched.
pub struct IdentityResolver<'s, S: ReconciliationStore + ?Sized> {
    store: &'s mut S,
}

impl<'s, S: ReconciliationStore + ?Sized> IdentityResolver<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self { store }
    }

    /// Identities held by rows recurring in other seasons
    fn candidate_identities(&self, team: &ScrapedTeamRecord) -> StorageResult<BTreeSet<i64>> {
        let prefix = KeyPrefix::team(team.key.team_name.as_str())
            .division_label(team.key.division_label.as_str())
            .league(team.key.league_id.as_str());

        let recurrences = self.store.find_teams_by_natural_key_prefix(&prefix)?;

        Ok(recurrences
            .iter()
            .filter(|other| other.key.season_id != team.key.season_id)
            .filter_map(|other| other.identity_id)
            .collect())
    }

    /// Resolves one scraped row
    pub fn resolve_team(&mut self, team_id: i64) -> StorageResult<Resolution> {
        let team = self.store.get_scraped_team(team_id)?;

        if let Some(identity_id) = team.identity_id {
            return Ok(Resolution::AlreadyLinked(identity_id));
        }

        let candidates: Vec<i64> = self.candidate_identities(&team)?.into_iter().collect();

        match candidates.len() {
            0 => Ok(Resolution::Unresolved),
            1 => {
                let identity_id = candidates[0];
                self.store.link_to_identity(team.id, identity_id)?;
                tracing::debug!(
                    "Linked '{}' ({}) in season {} to identity {}",
                    team.key.team_name,
                    team.key.division_label,
                    team.key.season_id,
                    identity_id
                );
                Ok(Resolution::Linked(identity_id))
            }
            _ => {
                tracing::warn!(
                    "'{}' ({}) recurs under {} different identities; leaving unresolved",
                    team.key.team_name,
                    team.key.division_label,
                    candidates.len()
                );
                Ok(Resolution::Ambiguous(candidates))
            }
        }
    }

    /// Resolves a specific set of rows, in the given order
    pub fn resolve_teams(&mut self, team_ids: &[i64]) -> StorageResult<ResolutionReport> {
        let mut report = ResolutionReport::default();
        for &team_id in team_ids {
            let resolution = self.resolve_team(team_id)?;
            report.record(team_id, resolution);
        }
        Ok(report)
    }

    /// Resolves every row that has no identity yet
    pub fn resolve_all(&mut self) -> StorageResult<ResolutionReport> {
        let ids: Vec<i64> = self
            .store
            .list_unresolved_teams()?
            .into_iter()
            .map(|team| team.id)
            .collect();

        self.resolve_teams(&ids)
    }

    /// Operator link: attaches a row to the named identity, creating it if new
    pub fn link_manually(
        &mut self,
        team_id: i64,
        canonical_name: &str,
    ) -> StorageResult<TeamIdentity> {
        // Surface a missing row before creating an identity for it
        self.store.get_scraped_team(team_id)?;

        let identity = self.store.create_identity(canonical_name)?;
        self.store.link_to_identity(team_id, identity.id)?;

        tracing::info!(
            "Linked team row {} to identity '{}' ({})",
            team_id,
            identity.canonical_name,
            identity.id
        );

        Ok(identity)
    }
}
