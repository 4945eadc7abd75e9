use crate::models::{Direction, GameRecord, LocationFilter};
use crate::utils::prop_resolver::FieldSpec;
use serde::{Deserialize, Serialize};

/// Columns counting in-game events. A missing value in one of these means the event never happened.
const COUNTING_FIELDS: [&str; 15] = [
    "PTS", "AST", "REB", "OREB", "DREB", "STL", "BLK", "TOV", "FG3M", "FG3A", "FGM", "FGA", "FTM",
    "FTA", "PF",
];

/// Empirical hit rate of a prop over a game log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityResult {
    pub probability: f64,
    pub satisfied: usize,
    pub total: usize,
    /// Mean of the values the rate was computed over
    pub average: Option<f64>,
}

impl ProbabilityResult {
    /// Result for an empty sample. Means "insufficient data", not "never happens".
    pub fn zero() -> Self {
        Self {
            probability: 0.0,
            satisfied: 0,
            total: 0,
            average: None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.total == 0
    }

    pub fn as_triple(&self) -> (f64, usize, usize) {
        (self.probability, self.satisfied, self.total)
    }
}

/// True for countable events and any sum of them (PTS_REB, STL_BLK, ...)
pub fn is_counting_field(column: &str) -> bool {
    column.split('_').all(|part| COUNTING_FIELDS.contains(&part))
}

fn record_value(record: &GameRecord, field: &FieldSpec) -> Option<f64> {
    if record.has_field(field.column()) {
        return record.stat(field.column());
    }
    match field {
        FieldSpec::Single(_) => None,
        FieldSpec::Combined { components, .. } => {
            if components.iter().any(|c| record.has_field(c)) {
                Some(components.iter().map(|c| record.stat(c).unwrap_or(0.0)).sum())
            } else {
                None
            }
        }
    }
}

/// Values of `field` for the games passing the location filter.
/// Missing counting stats become 0; missing rates and percentages are dropped.
pub fn extract_values(
    records: &[GameRecord],
    field: &FieldSpec,
    location: LocationFilter,
) -> Vec<f64> {
    let zero_fill = is_counting_field(field.column());

    records
        .iter()
        .filter(|r| location.accepts(r.location))
        .filter_map(|r| {
            let value = record_value(r, field).filter(|v| v.is_finite());
            match value {
                Some(v) => Some(v),
                None if zero_fill => Some(0.0),
                None => None,
            }
        })
        .collect()
}

/// Frequency with which `values` land strictly over (or under) `threshold`
pub fn estimate_values(values: &[f64], threshold: f64, direction: Direction) -> ProbabilityResult {
    if values.is_empty() {
        return ProbabilityResult::zero();
    }

    let total = values.len();
    let satisfied = values
        .iter()
        .filter(|v| direction.is_satisfied(**v, threshold))
        .count();

    ProbabilityResult {
        probability: satisfied as f64 / total as f64,
        satisfied,
        total,
        average: Some(values.iter().sum::<f64>() / total as f64),
    }
}

/// Historical probability that a player's `field` clears (or stays under) `threshold`
pub fn estimate(
    records: &[GameRecord],
    field: &FieldSpec,
    threshold: f64,
    direction: Direction,
    location: LocationFilter,
) -> ProbabilityResult {
    let values = extract_values(records, field, location);
    estimate_values(&values, threshold, direction)
}

/// Same as [`estimate`] as a `(probability, satisfied, total)` triple for batch callers
pub fn historical_probability(
    records: &[GameRecord],
    field: &FieldSpec,
    threshold: f64,
    direction: Direction,
    location: LocationFilter,
) -> (f64, usize, usize) {
    estimate(records, field, threshold, direction, location).as_triple()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, SeasonType};

    fn game(location: Location, stats: &[(&str, Option<f64>)]) -> GameRecord {
        GameRecord {
            game_id: "0022400100".to_string(),
            game_date: "NOV 01, 2024".to_string(),
            matchup: match location {
                Location::Home => "DEN vs. UTA".to_string(),
                Location::Away => "DEN @ UTA".to_string(),
            },
            location,
            season: "2024-25".to_string(),
            season_type: SeasonType::RegularSeason,
            stats: stats.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    fn points() -> FieldSpec {
        FieldSpec::Single("PTS".to_string())
    }

    #[test]
    fn test_scenario_over_thirty() {
        let result = estimate_values(&[35.0, 28.0, 31.0, 19.0, 42.0], 30.0, Direction::Over);
        assert_eq!(result.satisfied, 3);
        assert_eq!(result.total, 5);
        assert!((result.probability - 0.6).abs() < 1e-12);
        assert!((result.average.unwrap() - 31.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_is_zero_result() {
        for threshold in [0.0, 10.5, -3.0] {
            let result = estimate_values(&[], threshold, Direction::Over);
            assert_eq!(result.as_triple(), (0.0, 0, 0));
            assert!(result.is_insufficient());
        }
    }

    #[test]
    fn test_over_plus_under_never_exceeds_one() {
        let values = [0.0, 2.0, 2.0, 5.0, 7.5, 7.5, 10.0, 13.0];
        let mut threshold = -1.0;
        while threshold <= 14.0 {
            let over = estimate_values(&values, threshold, Direction::Over);
            let under = estimate_values(&values, threshold, Direction::Under);
            assert!(over.probability + under.probability <= 1.0 + 1e-12);
            threshold += 0.5;
        }

        // Ties at the line count for neither side
        let over = estimate_values(&values, 7.5, Direction::Over);
        let under = estimate_values(&values, 7.5, Direction::Under);
        assert_eq!(over.satisfied + under.satisfied, values.len() - 2);
    }

    #[test]
    fn test_home_filter_with_no_home_games() {
        let records = vec![
            game(Location::Away, &[("PTS", Some(22.0))]),
            game(Location::Away, &[("PTS", Some(30.0))]),
        ];
        let result = estimate(&records, &points(), 20.0, Direction::Over, LocationFilter::HomeOnly);
        assert_eq!(result, ProbabilityResult::zero());
    }

    #[test]
    fn test_location_filter() {
        let records = vec![
            game(Location::Home, &[("PTS", Some(25.0))]),
            game(Location::Home, &[("PTS", Some(15.0))]),
            game(Location::Away, &[("PTS", Some(40.0))]),
        ];
        let home = estimate(&records, &points(), 20.0, Direction::Over, LocationFilter::HomeOnly);
        assert_eq!(home.as_triple(), (0.5, 1, 2));
        let away = estimate(&records, &points(), 20.0, Direction::Over, LocationFilter::AwayOnly);
        assert_eq!(away.as_triple(), (1.0, 1, 1));
        let all = historical_probability(&records, &points(), 20.0, Direction::Over, LocationFilter::All);
        assert_eq!(all.1, 2);
        assert_eq!(all.2, 3);
    }

    #[test]
    fn test_missing_counting_stat_is_zero() {
        let records = vec![
            game(Location::Home, &[("TOV", Some(3.0))]),
            game(Location::Home, &[("TOV", None)]),
            game(Location::Home, &[]),
        ];
        let tov = FieldSpec::Single("TOV".to_string());
        let result = estimate(&records, &tov, 1.5, Direction::Under, LocationFilter::All);
        assert_eq!(result.as_triple().1, 2);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn test_missing_percentage_is_dropped() {
        let records = vec![
            game(Location::Home, &[("FG_PCT", Some(0.55))]),
            game(Location::Home, &[("FG_PCT", None)]),
            game(Location::Away, &[("FG_PCT", Some(0.40))]),
        ];
        let pct = FieldSpec::Single("FG_PCT".to_string());
        let result = estimate(&records, &pct, 0.5, Direction::Over, LocationFilter::All);
        assert_eq!(result.total, 2);
        assert_eq!(result.satisfied, 1);
    }

    #[test]
    fn test_combined_field_without_materialized_column() {
        let records = vec![
            game(Location::Home, &[("STL", Some(2.0)), ("BLK", Some(1.0))]),
            game(Location::Away, &[("STL", Some(0.0)), ("BLK", None)]),
        ];
        let spec = FieldSpec::from_bases(&["BLK", "STL"]);
        assert_eq!(spec.column(), "STL_BLK");
        assert_eq!(extract_values(&records, &spec, LocationFilter::All), vec![3.0, 0.0]);
    }

    #[test]
    fn test_counting_field_classification() {
        assert!(is_counting_field("PTS"));
        assert!(is_counting_field("PTS_AST_REB"));
        assert!(!is_counting_field("FG_PCT"));
        assert!(!is_counting_field("MIN"));
        assert!(!is_counting_field("PLUS_MINUS"));
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let records: Vec<GameRecord> = (0..20)
            .map(|i| {
                let location = if i % 3 == 0 { Location::Away } else { Location::Home };
                game(location, &[("PTS", Some((i * 7 % 41) as f64))])
            })
            .collect();
        let first = estimate(&records, &points(), 18.5, Direction::Over, LocationFilter::HomeOnly);
        let second = estimate(&records, &points(), 18.5, Direction::Over, LocationFilter::HomeOnly);
        assert_eq!(first, second);
    }
}
