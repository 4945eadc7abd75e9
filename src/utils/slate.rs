use crate::models::{Direction, LocationFilter, PlayerInfo, PropOddsBook, SeasonType};
use crate::utils::ev_calculator::Recommendation;
use crate::utils::evaluation::{
    EstimationMode, PropEvaluator, PropReport, PropRequest, StatRecordSource,
};
use crate::utils::player_match::find_matching_player;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// Shared settings for every prop of a slate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlateOptions {
    pub season: String,
    pub season_types: Vec<SeasonType>,
    pub location: LocationFilter,
    pub mode: EstimationMode,
}

/// One evaluated leg of a bookmaker prop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlateRow {
    pub player: String,
    pub player_id: Option<String>,
    pub prop: String,
    pub direction: Direction,
    pub line: f64,
    pub odds: f64,
    pub implied_probability: f64,
    pub probability: Option<f64>,
    pub expected_value: Option<f64>,
    pub edge_percent: Option<f64>,
    pub kelly_fraction: Option<f64>,
    pub games: usize,
    pub recommendation: Option<Recommendation>,
    /// Why the leg could not be evaluated
    pub note: Option<String>,
}

impl SlateRow {
    fn unevaluated(
        player: &str,
        prop: &str,
        direction: Direction,
        line: f64,
        odds: f64,
        note: String,
    ) -> Self {
        Self {
            player: player.to_string(),
            player_id: None,
            prop: prop.to_string(),
            direction,
            line,
            odds,
            implied_probability: 1.0 / odds,
            probability: None,
            expected_value: None,
            edge_percent: None,
            kelly_fraction: None,
            games: 0,
            recommendation: None,
            note: Some(note),
        }
    }

    pub fn is_value_bet(&self) -> bool {
        self.recommendation == Some(Recommendation::Bet)
    }

    /// Format the row as a readable line
    pub fn format(&self) -> String {
        match (self.probability, self.expected_value) {
            (Some(probability), Some(ev)) => format!(
                "{} | {} {} {} @ {:.2} | EV: {:+.2} | Edge: {:+.1}% | Model: {:.1}% | Implied: {:.1}% | {} games",
                self.player,
                self.prop,
                self.direction,
                self.line,
                self.odds,
                ev,
                self.edge_percent.unwrap_or_default(),
                probability * 100.0,
                self.implied_probability * 100.0,
                self.games
            ),
            _ => format!(
                "{} | {} {} {} @ {:.2} | {}",
                self.player,
                self.prop,
                self.direction,
                self.line,
                self.odds,
                self.note.as_deref().unwrap_or("not evaluated")
            ),
        }
    }
}

/// Evaluate every quoted leg of the book, best expected value first.
/// Legs that cannot be evaluated are kept at the end with the reason.
pub fn analyze_slate<S: StatRecordSource + ?Sized>(
    source: &S,
    roster: &[PlayerInfo],
    book: &PropOddsBook,
    options: &SlateOptions,
) -> Vec<SlateRow> {
    let evaluator = PropEvaluator::new(source);
    let mut rows = Vec::new();

    for (player_name, entries) in book {
        let player = find_matching_player(roster, player_name);
        if player.is_none() {
            warn!("No player matching '{}' in the roster", player_name);
        }

        for entry in entries {
            for (direction, leg) in entry.legs() {
                let Some(player) = player else {
                    rows.push(SlateRow::unevaluated(
                        player_name,
                        &entry.prop,
                        direction,
                        leg.line,
                        leg.odds,
                        format!("Player '{}' not found", player_name),
                    ));
                    continue;
                };

                let request = PropRequest::new(&player.id, &entry.prop, leg.line, leg.odds)
                    .player_name(&player.name)
                    .direction(direction)
                    .location(options.location)
                    .season(&options.season)
                    .season_types(options.season_types.clone())
                    .mode(options.mode);

                let report = evaluator.report(&request);
                let row = match &report {
                    PropReport::Evaluated(evaluation) => SlateRow {
                        player: player.name.clone(),
                        player_id: Some(player.id.clone()),
                        prop: entry.prop.clone(),
                        direction,
                        line: leg.line,
                        odds: leg.odds,
                        implied_probability: evaluation.ev.implied_probability,
                        probability: Some(evaluation.probability()),
                        expected_value: Some(evaluation.ev.expected_value),
                        edge_percent: Some(evaluation.ev.edge_percent),
                        kelly_fraction: Some(evaluation.ev.kelly_fraction),
                        games: evaluation.history.total,
                        recommendation: Some(evaluation.ev.recommendation),
                        note: None,
                    },
                    PropReport::Failed { .. } => {
                        let mut row = SlateRow::unevaluated(
                            &player.name,
                            &entry.prop,
                            direction,
                            leg.line,
                            leg.odds,
                            report.render(),
                        );
                        row.player_id = Some(player.id.clone());
                        row
                    }
                };
                rows.push(row);
            }
        }
    }

    // Sort by EV (descending), unevaluated legs last
    rows.sort_by(|a, b| match (a.expected_value, b.expected_value) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows
}

/// The `top_n` positive-EV rows (all of them when `None`)
pub fn top_value_bets(rows: &[SlateRow], top_n: Option<usize>) -> Vec<SlateRow> {
    let bets = rows.iter().filter(|r| r.is_value_bet()).cloned();
    match top_n {
        Some(n) => bets.take(n).collect(),
        None => bets.collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::game_log_store::GameLogStore;
    use crate::models::{GameRecord, Location, PropLeg, PropOddsEntry};
    use std::collections::BTreeMap;

    fn games(points: &[f64], assists: f64) -> Vec<GameRecord> {
        points
            .iter()
            .enumerate()
            .map(|(i, pts)| GameRecord {
                game_id: format!("00224000{:02}", i),
                game_date: "DEC 25, 2024".to_string(),
                matchup: "DEN vs. PHX".to_string(),
                location: Location::Home,
                season: "2024-25".to_string(),
                season_type: SeasonType::RegularSeason,
                stats: BTreeMap::from([
                    ("PTS".to_string(), Some(*pts)),
                    ("AST".to_string(), Some(assists)),
                ]),
            })
            .collect()
    }

    fn entry(player: &str, prop: &str, over: Option<PropLeg>, under: Option<PropLeg>) -> PropOddsEntry {
        PropOddsEntry {
            player: player.to_string(),
            prop: prop.to_string(),
            over,
            under,
        }
    }

    fn fixture() -> (GameLogStore, PropOddsBook) {
        let mut store = GameLogStore::with_players(vec![
            PlayerInfo {
                id: "203999".to_string(),
                name: "Nikola Jokic".to_string(),
                team: "DEN".to_string(),
            },
            PlayerInfo {
                id: "1629029".to_string(),
                name: "Luka Doncic".to_string(),
                team: "DAL".to_string(),
            },
        ]);
        store.insert_games(
            "203999",
            "2024-25",
            SeasonType::RegularSeason,
            games(&[30.0, 22.0, 35.0, 28.0, 31.0], 10.0),
        );

        let mut book = PropOddsBook::new();
        book.insert(
            "Nikola Jokic".to_string(),
            vec![
                entry(
                    "Nikola Jokic",
                    "Points",
                    Some(PropLeg { line: 29.5, odds: 1.9 }),
                    Some(PropLeg { line: 29.5, odds: 1.9 }),
                ),
                entry("Nikola Jokic", "Assists", Some(PropLeg { line: 9.5, odds: 1.5 }), None),
                entry("Nikola Jokic", "Double doubles", Some(PropLeg { line: 0.5, odds: 1.3 }), None),
            ],
        );
        book.insert(
            "Luka Doncic".to_string(),
            vec![entry("Luka Doncic", "Points", Some(PropLeg { line: 30.5, odds: 1.85 }), None)],
        );
        book.insert(
            "Someone Else".to_string(),
            vec![entry("Someone Else", "Points", Some(PropLeg { line: 10.5, odds: 2.0 }), None)],
        );
        (store, book)
    }

    fn options() -> SlateOptions {
        SlateOptions {
            season: "2024-25".to_string(),
            season_types: vec![SeasonType::RegularSeason],
            location: LocationFilter::All,
            mode: EstimationMode::Frequency,
        }
    }

    #[test]
    fn test_slate_sorted_by_ev() {
        let (store, book) = fixture();
        let rows = analyze_slate(&store, store.players(), &book, &options());
        assert_eq!(rows.len(), 6);

        // Assists over 9.5 hits every game at 1.5: EV +0.5
        assert_eq!(rows[0].prop, "Assists");
        assert!((rows[0].expected_value.unwrap() - 0.5).abs() < 1e-9);

        let evaluated: Vec<f64> = rows.iter().filter_map(|r| r.expected_value).collect();
        assert_eq!(evaluated.len(), 3);
        assert!(evaluated.windows(2).all(|w| w[0] >= w[1]));
        assert!(rows[3..].iter().all(|r| r.expected_value.is_none() && r.note.is_some()));
    }

    #[test]
    fn test_failed_legs_keep_reason() {
        let (store, book) = fixture();
        let rows = analyze_slate(&store, store.players(), &book, &options());

        let doncic = rows.iter().find(|r| r.player == "Luka Doncic").unwrap();
        assert!(doncic.note.as_ref().unwrap().starts_with("No data available"));
        assert_eq!(doncic.player_id.as_deref(), Some("1629029"));

        let unknown = rows.iter().find(|r| r.player == "Someone Else").unwrap();
        assert!(unknown.player_id.is_none());
        assert!(unknown.format().contains("not found"));

        let double = rows.iter().find(|r| r.prop == "Double doubles").unwrap();
        assert!(double.note.as_ref().unwrap().contains("Available fields"));
    }

    #[test]
    fn test_top_value_bets() {
        let (store, book) = fixture();
        let rows = analyze_slate(&store, store.players(), &book, &options());
        let bets = top_value_bets(&rows, None);
        assert!(bets.iter().all(|r| r.expected_value.unwrap() > 0.0));
        assert_eq!(top_value_bets(&rows, Some(1)).len(), 1);
    }
}
