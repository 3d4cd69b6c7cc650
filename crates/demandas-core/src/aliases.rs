//! Lookup tables mapping known spellings onto canonical teams and statuses.
//!
//! Keys are stored folded (see [`fold`]) so lookups are case- and
//! accent-insensitive. Built-in aliases cover the Portuguese labels found in
//! the source spreadsheets; configuration can add more.

use std::collections::HashMap;

use crate::ConfigError;
use crate::config::AliasConfig;
use crate::model::{Status, Team};
use crate::text::{fold, within_distance};

const TEAM_ALIASES: &[(&str, Team)] = &[
    ("JULIO", Team::Julio),
    ("EQUIPE JULIO", Team::Julio),
    ("TIME JULIO", Team::Julio),
    ("LEANDRO", Team::Leandro),
    ("EQUIPE LEANDRO", Team::Leandro),
    ("TIME LEANDRO", Team::Leandro),
    ("ADRIANO", Team::Adriano),
    ("EQUIPE ADRIANO", Team::Adriano),
    ("TIME ADRIANO", Team::Adriano),
];

const STATUS_ALIASES: &[(&str, Status)] = &[
    ("RESOLVED", Status::Resolved),
    ("RESOLVIDO", Status::Resolved),
    ("RESOLVIDA", Status::Resolved),
    ("CONCLUIDO", Status::Resolved),
    ("CONCLUIDA", Status::Resolved),
    ("FINALIZADO", Status::Resolved),
    ("FINALIZADA", Status::Resolved),
    ("APPROVED", Status::Approved),
    ("APROVADO", Status::Approved),
    ("APROVADA", Status::Approved),
    ("SETTLED", Status::Settled),
    ("QUITADO", Status::Settled),
    ("QUITADA", Status::Settled),
    ("QUITADO CLIENTE", Status::Settled),
    ("PENDING ACTIVE", Status::PendingActive),
    ("PENDENTE ATIVO", Status::PendingActive),
    ("PENDING RECEPTIVE", Status::PendingReceptive),
    ("PENDENTE RECEPTIVO", Status::PendingReceptive),
    ("PENDING", Status::Pending),
    ("PENDENTE", Status::Pending),
    ("IN ANALYSIS", Status::InAnalysis),
    ("EM ANALISE", Status::InAnalysis),
    ("ANALISE", Status::InAnalysis),
    ("IN PROGRESS", Status::InProgress),
    ("EM ANDAMENTO", Status::InProgress),
    ("ANDAMENTO", Status::InProgress),
];

/// Result of an edit-distance search over the alias keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzyMatch<T> {
    None,
    /// Every key within the distance maps to this one value.
    Unique(T),
    /// Keys within the distance map to different values.
    Ambiguous,
}

/// Team and status alias tables, plus the person → team roster, keyed by
/// folded text.
#[derive(Debug, Clone)]
pub struct AliasTable {
    team: HashMap<String, Team>,
    status: HashMap<String, Status>,
    roster: HashMap<String, Team>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AliasTable {
    /// Built-in aliases only.
    pub fn builtin() -> Self {
        let team = TEAM_ALIASES
            .iter()
            .map(|&(k, t)| (k.to_string(), t))
            .collect();
        let status = STATUS_ALIASES
            .iter()
            .map(|&(k, s)| (k.to_string(), s))
            .collect();
        Self {
            team,
            status,
            roster: HashMap::new(),
        }
    }

    /// Built-ins extended with configured aliases.
    ///
    /// Alias targets are folded and must name a canonical team (`JULIO`) or
    /// status (`pending_active`).
    pub fn from_config(config: &AliasConfig) -> Result<Self, ConfigError> {
        let mut table = Self::builtin();

        for (alias, target) in &config.team {
            let folded = fold(target);
            let team = Team::from_canonical(&folded).ok_or_else(|| {
                ConfigError::Invalid(format!("team alias {alias:?} targets unknown team {target:?}"))
            })?;
            table.team.insert(fold(alias), team);
        }

        for (alias, target) in &config.status {
            let folded = fold(target);
            let status = Status::ALL
                .into_iter()
                .find(|s| fold(s.as_str()) == folded)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "status alias {alias:?} targets unknown status {target:?}"
                    ))
                })?;
            table.status.insert(fold(alias), status);
        }

        for (person, target) in &config.roster {
            let team = Team::from_canonical(&fold(target)).ok_or_else(|| {
                ConfigError::Invalid(format!("roster entry {person:?} targets unknown team {target:?}"))
            })?;
            table.roster.insert(fold(person), team);
        }

        Ok(table)
    }

    /// Exact lookup of a raw team label.
    pub fn team(&self, raw: &str) -> Option<Team> {
        self.team.get(&fold(raw)).copied()
    }

    /// Exact lookup of a raw status label.
    pub fn status(&self, raw: &str) -> Option<Status> {
        self.status.get(&fold(raw)).copied()
    }

    /// Team of a responsible person, exact on folded name.
    pub fn team_for_person(&self, name: &str) -> Option<Team> {
        self.roster.get(&fold(name)).copied()
    }

    /// Edit-distance search for a team label that failed exact lookup.
    pub fn fuzzy_team(&self, raw: &str, max_distance: usize) -> FuzzyMatch<Team> {
        fuzzy_lookup(&self.team, &fold(raw), max_distance)
    }

    /// Edit-distance search for a status label that failed exact lookup.
    pub fn fuzzy_status(&self, raw: &str, max_distance: usize) -> FuzzyMatch<Status> {
        fuzzy_lookup(&self.status, &fold(raw), max_distance)
    }

    /// Number of (team, status) alias keys.
    pub fn key_counts(&self) -> (usize, usize) {
        (self.team.len(), self.status.len())
    }

    pub fn roster_len(&self) -> usize {
        self.roster.len()
    }
}

fn fuzzy_lookup<T: Copy + PartialEq>(
    table: &HashMap<String, T>,
    folded: &str,
    max_distance: usize,
) -> FuzzyMatch<T> {
    if folded.is_empty() {
        return FuzzyMatch::None;
    }

    let mut found: Option<T> = None;
    for (key, &value) in table {
        if !within_distance(key, folded, max_distance) {
            continue;
        }
        match found {
            None => found = Some(value),
            Some(prev) if prev == value => {}
            Some(_) => return FuzzyMatch::Ambiguous,
        }
    }

    match found {
        Some(value) => FuzzyMatch::Unique(value),
        None => FuzzyMatch::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn exact_lookup_is_case_and_accent_insensitive() {
        let table = AliasTable::builtin();
        assert_eq!(table.team("Júlio"), Some(Team::Julio));
        assert_eq!(table.team("  equipe leandro "), Some(Team::Leandro));
        assert_eq!(table.status("Em Análise"), Some(Status::InAnalysis));
        assert_eq!(table.status("CONCLUÍDO"), Some(Status::Resolved));
        assert_eq!(table.status("pending_active"), Some(Status::PendingActive));
        assert_eq!(table.status("quitado"), Some(Status::Settled));
    }

    #[test]
    fn exact_lookup_misses_typos() {
        let table = AliasTable::builtin();
        assert_eq!(table.team("Julho"), None);
        assert_eq!(table.status("RESOLVIDOS"), None);
    }

    #[test]
    fn fuzzy_finds_single_edit_typos() {
        let table = AliasTable::builtin();
        assert_eq!(table.fuzzy_team("Julho", 1), FuzzyMatch::Unique(Team::Julio));
        assert_eq!(table.fuzzy_team("leandr", 1), FuzzyMatch::Unique(Team::Leandro));
        assert_eq!(
            table.fuzzy_status("RESOLVIDOS", 1),
            FuzzyMatch::Unique(Status::Resolved)
        );
    }

    #[test]
    fn fuzzy_respects_distance() {
        let table = AliasTable::builtin();
        assert_eq!(table.fuzzy_team("UNKNOWN_TEAM_X", 1), FuzzyMatch::None);
        assert_eq!(table.fuzzy_team("JLHO", 1), FuzzyMatch::None);
        assert_eq!(table.fuzzy_team("JLHO", 2), FuzzyMatch::Unique(Team::Julio));
        assert_eq!(table.fuzzy_team("", 1), FuzzyMatch::None);
    }

    #[test]
    fn fuzzy_reports_ambiguity() {
        let mut team = BTreeMap::new();
        team.insert("JULIA".to_string(), "ADRIANO".to_string());
        let table = AliasTable::from_config(&AliasConfig {
            team,
            ..AliasConfig::default()
        })
        .unwrap();
        // One edit from both JULIO and JULIA.
        assert_eq!(table.fuzzy_team("JULIX", 1), FuzzyMatch::Ambiguous);
    }

    #[test]
    fn config_aliases_extend_builtins() {
        let mut team = BTreeMap::new();
        team.insert("Julinho".to_string(), "julio".to_string());
        let mut status = BTreeMap::new();
        status.insert("baixado".to_string(), "settled".to_string());

        let table = AliasTable::from_config(&AliasConfig {
            team,
            status,
            ..AliasConfig::default()
        })
        .unwrap();
        assert_eq!(table.team("JULINHO"), Some(Team::Julio));
        assert_eq!(table.status("Baixado"), Some(Status::Settled));
        assert_eq!(table.team("JULIO"), Some(Team::Julio));
    }

    #[test]
    fn config_alias_to_unknown_status_fails() {
        let mut status = BTreeMap::new();
        status.insert("x".to_string(), "archived".to_string());
        let err = AliasTable::from_config(&AliasConfig {
            status,
            ..AliasConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn roster_maps_people_to_teams() {
        let mut roster = BTreeMap::new();
        roster.insert("Ana Lídia".to_string(), "JULIO".to_string());
        roster.insert("VICTOR ADRIANO".to_string(), "adriano".to_string());
        let table = AliasTable::from_config(&AliasConfig {
            roster,
            ..AliasConfig::default()
        })
        .unwrap();
        assert_eq!(table.roster_len(), 2);
        assert_eq!(table.team_for_person(" ana lidia "), Some(Team::Julio));
        assert_eq!(table.team_for_person("Victor Adriano"), Some(Team::Adriano));
        assert_eq!(table.team_for_person("Adriano"), None);
        assert_eq!(AliasTable::builtin().team_for_person("Ana Lídia"), None);
    }
}
