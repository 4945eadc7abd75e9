use crate::error::{PropError, PropResult};
use crate::models::GameRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;
use tracing::debug;

/// Base statistics that may be combined, in the order used to name combined columns
const BASE_ORDER: [&str; 7] = ["PTS", "AST", "REB", "STL", "BLK", "TOV", "FG3M"];

/// Words that join two statistics in a prop label ("Points and Assists", "Puntos y Rebotes")
const CONNECTORS: [&str; 5] = ["and", "y", "más", "mas", "plus"];

/// Prop labels as bookmakers and the dashboard write them, mapped to stats API columns
const SYNONYMS: &[(&str, &str)] = &[
    // Spanish
    ("Puntos", "PTS"),
    ("Asistencias", "AST"),
    ("Rebotes", "REB"),
    ("Triples", "FG3M"),
    ("Robos", "STL"),
    ("Tapones", "BLK"),
    ("Bloqueos", "BLK"),
    ("Pérdidas", "TOV"),
    ("Pérdidas de balón", "TOV"),
    ("Puntos + Asistencias", "PTS_AST"),
    ("Puntos + Rebotes", "PTS_REB"),
    ("Asistencias + Rebotes", "AST_REB"),
    ("Puntos + Asistencias + Rebotes", "PTS_AST_REB"),
    ("Tapones + Robos", "STL_BLK"),
    ("Bloqueos + Robos", "STL_BLK"),
    // English
    ("Points", "PTS"),
    ("Assists", "AST"),
    ("Rebounds", "REB"),
    ("Threes", "FG3M"),
    ("Three Pointers Made", "FG3M"),
    ("Steals", "STL"),
    ("Blocks", "BLK"),
    ("Turnovers", "TOV"),
    ("Points + Assists", "PTS_AST"),
    ("Points + Rebounds", "PTS_REB"),
    ("Assists + Rebounds", "AST_REB"),
    ("Rebounds + Assists", "AST_REB"),
    ("Points + Assists + Rebounds", "PTS_AST_REB"),
    ("Points + Rebounds + Assists", "PTS_AST_REB"),
    ("Blocks + Steals", "STL_BLK"),
    ("Steals + Blocks", "STL_BLK"),
    // Abbreviations
    ("PTS", "PTS"),
    ("AST", "AST"),
    ("REB", "REB"),
    ("FG3M", "FG3M"),
    ("STL", "STL"),
    ("BLK", "BLK"),
    ("TOV", "TOV"),
    ("PRA", "PTS_AST_REB"),
    ("PTS+AST", "PTS_AST"),
    ("PTS+REB", "PTS_REB"),
    ("AST+REB", "AST_REB"),
    ("PTS+AST+REB", "PTS_AST_REB"),
    ("STL+BLK", "STL_BLK"),
];

/// Single-word names a composite label may be split into
const TOKENS: &[(&str, &str)] = &[
    ("puntos", "PTS"),
    ("points", "PTS"),
    ("point", "PTS"),
    ("pts", "PTS"),
    ("asistencias", "AST"),
    ("assists", "AST"),
    ("assist", "AST"),
    ("ast", "AST"),
    ("rebotes", "REB"),
    ("rebounds", "REB"),
    ("rebound", "REB"),
    ("reb", "REB"),
    ("robos", "STL"),
    ("steals", "STL"),
    ("steal", "STL"),
    ("stl", "STL"),
    ("tapones", "BLK"),
    ("bloqueos", "BLK"),
    ("blocks", "BLK"),
    ("block", "BLK"),
    ("blk", "BLK"),
    ("pérdidas", "TOV"),
    ("perdidas", "TOV"),
    ("turnovers", "TOV"),
    ("turnover", "TOV"),
    ("tov", "TOV"),
    ("triples", "FG3M"),
    ("threes", "FG3M"),
    ("three", "FG3M"),
    ("3pt", "FG3M"),
    ("fg3m", "FG3M"),
];

/// Labels offered by the dashboard form
pub const PROP_LABELS: [&str; 13] = [
    "Points",
    "Assists",
    "Rebounds",
    "Threes",
    "Steals",
    "Blocks",
    "Turnovers",
    "Points + Assists",
    "Points + Rebounds",
    "Assists + Rebounds",
    "Points + Assists + Rebounds",
    "Blocks + Steals",
    "Puntos + Rebotes",
];

/// Column (or sum of columns) a prop is settled on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldSpec {
    Single(String),
    Combined {
        name: String,
        components: Vec<String>,
    },
}

impl FieldSpec {
    /// Build a spec from base columns, ordering and naming them canonically
    pub fn from_bases(bases: &[&str]) -> FieldSpec {
        let mut ordered: Vec<&str> = bases.to_vec();
        ordered.sort_by_key(|b| BASE_ORDER.iter().position(|o| o == b).unwrap_or(usize::MAX));
        ordered.dedup();
        if ordered.len() == 1 {
            return FieldSpec::Single(ordered[0].to_string());
        }
        FieldSpec::Combined {
            name: ordered.join("_"),
            components: ordered.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Interpret a column name, splitting names such as "PTS_REB" into their bases
    fn from_column(column: &str) -> FieldSpec {
        let parts: Vec<&str> = column.split('_').collect();
        if parts.len() > 1 && parts.iter().all(|p| BASE_ORDER.contains(p)) {
            FieldSpec::from_bases(&parts)
        } else {
            FieldSpec::Single(column.to_string())
        }
    }

    pub fn column(&self) -> &str {
        match self {
            FieldSpec::Single(name) => name,
            FieldSpec::Combined { name, .. } => name,
        }
    }

    pub fn components(&self) -> Vec<&str> {
        match self {
            FieldSpec::Single(name) => vec![name.as_str()],
            FieldSpec::Combined { components, .. } => {
                components.iter().map(|c| c.as_str()).collect()
            }
        }
    }
}

/// Lowercase a label and collapse punctuation and connector words into `_`
/// "Puntos más Rebotes" -> "puntos_rebotes", "PTS+AST" -> "pts_ast"
pub fn normalize_label(label: &str) -> String {
    let spaced: String = label
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '+' | '&' | ',' | '/' | '_' | '-' | '.' => ' ',
            other => other,
        })
        .collect();

    spaced
        .split_whitespace()
        .filter(|token| !CONNECTORS.contains(token))
        .collect::<Vec<_>>()
        .join("_")
}

fn synonym_table() -> &'static HashMap<String, FieldSpec> {
    static TABLE: OnceLock<HashMap<String, FieldSpec>> = OnceLock::new();
    TABLE.get_or_init(|| {
        SYNONYMS
            .iter()
            .map(|(label, column)| (normalize_label(label), FieldSpec::from_column(column)))
            .collect()
    })
}

fn token_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| TOKENS.iter().copied().collect())
}

/// Sorted union of the column names present in the records
pub fn available_columns(records: &[GameRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.stats.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Maps free-text prop labels onto stat columns
#[derive(Debug, Clone, Copy, Default)]
pub struct PropResolver;

impl PropResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a label without looking at any data
    pub fn resolve(&self, label: &str) -> PropResult<FieldSpec> {
        let normalized = normalize_label(label);
        let unresolvable = || PropError::UnresolvableProp {
            label: label.to_string(),
            available: Vec::new(),
        };
        if normalized.is_empty() {
            return Err(unresolvable());
        }

        if let Some(spec) = synonym_table().get(&normalized) {
            return Ok(spec.clone());
        }

        // Composite decomposition: every token has to name a base statistic
        let bases: Option<Vec<&str>> = normalized
            .split('_')
            .map(|token| token_table().get(token).copied())
            .collect();
        match bases {
            Some(bases) if !bases.is_empty() => Ok(FieldSpec::from_bases(&bases)),
            _ => Err(unresolvable()),
        }
    }

    /// Resolve a label against a concrete game log, checking the field can be computed from it
    pub fn resolve_for(&self, label: &str, records: &[GameRecord]) -> PropResult<FieldSpec> {
        let columns = available_columns(records);
        let unresolvable = || PropError::UnresolvableProp {
            label: label.to_string(),
            available: columns.clone(),
        };

        let spec = match self.resolve(label) {
            Ok(spec) => spec,
            Err(_) => {
                let wanted = label.trim();
                let column = columns
                    .iter()
                    .find(|c| c.eq_ignore_ascii_case(wanted))
                    .ok_or_else(unresolvable)?;
                FieldSpec::Single(column.clone())
            }
        };

        let present = |name: &str| columns.iter().any(|c| c == name);
        if present(spec.column()) || spec.components().iter().all(|c| present(c)) {
            Ok(spec)
        } else {
            Err(unresolvable())
        }
    }

    /// Add a combined column to every record as the sum of its bases.
    /// Does nothing when the column already exists.
    pub fn materialize(&self, records: &mut [GameRecord], spec: &FieldSpec) -> PropResult<()> {
        let FieldSpec::Combined { name, components } = spec else {
            return Ok(());
        };
        if records.iter().any(|r| r.has_field(name)) {
            return Ok(());
        }

        let columns = available_columns(records);
        let missing: Vec<&String> = components
            .iter()
            .filter(|c| !columns.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(PropError::UnresolvableProp {
                label: name.clone(),
                available: columns,
            });
        }

        for record in records.iter_mut() {
            let total: f64 = components
                .iter()
                .map(|c| record.stat(c).unwrap_or(0.0))
                .sum();
            record.stats.insert(name.clone(), Some(total));
        }
        debug!("Synthesized column {} from {:?}", name, components);
        Ok(())
    }

    /// Typical bookmaker line for a prop, used to prefill forms
    pub fn default_line(&self, label: &str) -> f64 {
        let Ok(spec) = self.resolve(label) else {
            return 1.0;
        };
        match spec.column() {
            "PTS" => 20.0,
            "AST" | "REB" => 5.0,
            "FG3M" | "TOV" => 2.0,
            "STL" | "BLK" => 1.0,
            "PTS_AST" | "PTS_REB" => 25.0,
            "AST_REB" => 15.0,
            "PTS_AST_REB" => 35.0,
            "STL_BLK" => 3.0,
            _ => 1.0,
        }
    }
}
