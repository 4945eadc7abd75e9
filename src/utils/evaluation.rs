use crate::error::{PropError, PropResult};
use crate::models::{
    current_season, find_team, validate_season, Direction, GameRecord, LocationFilter, NbaTeam,
    SeasonType,
};
use crate::utils::ev_calculator::{self, EvResult, StakeOutcome};
use crate::utils::monte_carlo::{simulate, SimulationConfig, SimulationResult};
use crate::utils::probability::{estimate, extract_values, ProbabilityResult};
use crate::utils::prop_resolver::{FieldSpec, PropResolver};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use tracing::{debug, info};

pub const PROBABILITY_LABEL: &str = "Historical probability:";
/// Probability the EV line was computed from (simulated in Monte Carlo mode)
pub const MODEL_PROBABILITY_LABEL: &str = "Model probability:";
pub const EXPECTED_VALUE_LABEL: &str = "Expected value per unit staked:";

/// Provider of per-game box scores for one player, season and season type
pub trait StatRecordSource {
    /// May return an empty list. Malformed upstream data is an error, never a shortened list.
    fn fetch_game_records(
        &self,
        player_id: &str,
        season: &str,
        season_type: SeasonType,
    ) -> PropResult<Vec<GameRecord>>;

    /// Games against one opponent, given by its abbreviation
    fn fetch_game_records_against(
        &self,
        player_id: &str,
        season: &str,
        season_type: SeasonType,
        opponent: &str,
    ) -> PropResult<Vec<GameRecord>> {
        Ok(self
            .fetch_game_records(player_id, season, season_type)?
            .into_iter()
            .filter(|r| r.opponent() == Some(opponent))
            .collect())
    }
}

/// How the hit probability fed into the EV calculation is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EstimationMode {
    #[default]
    Frequency,
    MonteCarlo(SimulationConfig),
}

/// Everything needed to evaluate one side of one prop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropRequest {
    pub player_id: String,
    pub player_name: String,
    pub label: String,
    pub threshold: f64,
    pub decimal_odds: f64,
    pub direction: Direction,
    pub location: LocationFilter,
    pub season: String,
    pub season_types: Vec<SeasonType>,
    /// Only games against this team (abbreviation, name or nickname)
    pub opponent: Option<String>,
    /// Amount wagered, for money figures next to the per-unit ones
    pub stake: Option<f64>,
    pub mode: EstimationMode,
}

impl PropRequest {
    /// Over bet across all regular season games of the current season
    pub fn new(
        player_id: impl Into<String>,
        label: impl Into<String>,
        threshold: f64,
        decimal_odds: f64,
    ) -> Self {
        let player_id = player_id.into();
        Self {
            player_name: player_id.clone(),
            player_id,
            label: label.into(),
            threshold,
            decimal_odds,
            direction: Direction::Over,
            location: LocationFilter::All,
            season: current_season(chrono::Local::now().date_naive()),
            season_types: vec![SeasonType::RegularSeason],
            opponent: None,
            stake: None,
            mode: EstimationMode::Frequency,
        }
    }

    pub fn player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = name.into();
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn location(mut self, location: LocationFilter) -> Self {
        self.location = location;
        self
    }

    pub fn season(mut self, season: impl Into<String>) -> Self {
        self.season = season.into();
        self
    }

    /// Repeated season types are dropped, keeping the first occurrence
    pub fn season_types(mut self, season_types: Vec<SeasonType>) -> Self {
        self.season_types = distinct(&season_types);
        self
    }

    pub fn opponent(mut self, team: impl Into<String>) -> Self {
        self.opponent = Some(team.into());
        self
    }

    pub fn stake(mut self, stake: f64) -> Self {
        self.stake = Some(stake);
        self
    }

    pub fn mode(mut self, mode: EstimationMode) -> Self {
        self.mode = mode;
        self
    }

    fn validate(&self) -> PropResult<()> {
        if self.player_id.trim().is_empty() {
            return Err(PropError::InvalidInput("player id is empty".to_string()));
        }
        if self.label.trim().is_empty() {
            return Err(PropError::InvalidInput("prop label is empty".to_string()));
        }
        if !self.threshold.is_finite() {
            return Err(PropError::InvalidInput(format!(
                "threshold {} is not a number",
                self.threshold
            )));
        }
        if !self.decimal_odds.is_finite() || self.decimal_odds <= 1.0 {
            return Err(PropError::InvalidOdds(self.decimal_odds));
        }
        if self.season_types.is_empty() {
            return Err(PropError::InvalidInput(
                "at least one season type is required".to_string(),
            ));
        }
        if let Some(stake) = self.stake {
            if !stake.is_finite() || stake <= 0.0 {
                return Err(PropError::InvalidInput(format!(
                    "stake {} must be a positive amount",
                    stake
                )));
            }
        }
        self.opponent_team()?;
        validate_season(&self.season)
    }

    fn opponent_team(&self) -> PropResult<Option<&'static NbaTeam>> {
        match &self.opponent {
            None => Ok(None),
            Some(text) => find_team(text)
                .map(Some)
                .ok_or_else(|| PropError::InvalidInput(format!("unknown team '{}'", text))),
        }
    }

    fn season_types_label(&self) -> String {
        distinct(&self.season_types)
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn distinct(season_types: &[SeasonType]) -> Vec<SeasonType> {
    let mut seen = Vec::with_capacity(season_types.len());
    for season_type in season_types {
        if !seen.contains(season_type) {
            seen.push(*season_type);
        }
    }
    seen
}

/// Hit rate restricted to one season type, for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonBreakdown {
    pub season_type: SeasonType,
    pub result: ProbabilityResult,
}

/// Outcome of a successful prop evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropEvaluation {
    pub request: PropRequest,
    pub field: FieldSpec,
    /// Empirical frequency over all requested season types
    pub history: ProbabilityResult,
    pub simulation: Option<SimulationResult>,
    pub ev: EvResult,
    pub stake: Option<StakeOutcome>,
    pub breakdown: Vec<SeasonBreakdown>,
}

impl PropEvaluation {
    /// Probability the EV figures were computed from
    pub fn probability(&self) -> f64 {
        self.ev.probability
    }

    pub fn render(&self) -> String {
        let req = &self.request;
        let verb = match req.direction {
            Direction::Over => "went over",
            Direction::Under => "stayed under",
        };
        let mut out = String::new();

        let _ = writeln!(out, "Bet analysis");
        let _ = writeln!(out, "------------");
        let _ = writeln!(out, "Player: {}", req.player_name);
        let _ = writeln!(out, "Prop: {} ({})", req.label, self.field.column());
        let _ = writeln!(out, "Bet: {} {}", req.direction, req.threshold);
        let _ = writeln!(out, "Odds: {:.2}", req.decimal_odds);
        let _ = writeln!(out, "Season: {}", req.season);
        let _ = writeln!(out, "Season types: {}", req.season_types_label());
        let _ = writeln!(out, "Location: {}", req.location);
        if let Some(opponent) = &req.opponent {
            let _ = writeln!(out, "Opponent: {}", opponent);
        }
        match req.mode {
            EstimationMode::Frequency => {
                let _ = writeln!(out, "Estimator: historical frequency");
            }
            EstimationMode::MonteCarlo(config) => {
                let _ = writeln!(
                    out,
                    "Estimator: Monte Carlo ({} draws, seed {})",
                    config.draws, config.seed
                );
            }
        }

        let _ = writeln!(out, "\nHistorical data");
        let _ = writeln!(out, "---------------");
        if let Some(average) = self.history.average {
            let _ = writeln!(out, "Average per game: {:.1}", average);
        }
        let _ = writeln!(out, "Games played: {}", self.history.total);
        let _ = writeln!(
            out,
            "Times {} {}: {} of {} ({:.1}%)",
            verb,
            req.threshold,
            self.history.satisfied,
            self.history.total,
            self.history.probability * 100.0
        );
        let _ = writeln!(
            out,
            "{} {:.1}%",
            PROBABILITY_LABEL,
            self.history.probability * 100.0
        );

        if let Some(sim) = &self.simulation {
            let _ = writeln!(out, "\nMonte Carlo simulation");
            let _ = writeln!(out, "----------------------");
            let _ = writeln!(out, "Simulated probability: {:.1}%", sim.probability * 100.0);
            let _ = writeln!(out, "Simulated mean: {:.1}", sim.mean);
            let _ = writeln!(out, "Simulated median: {:.1}", sim.median);
            let _ = writeln!(out, "Simulated std dev: {:.1}", sim.std_dev);
            let _ = writeln!(
                out,
                "95% interval: [{:.1}, {:.1}]",
                sim.interval.0, sim.interval.1
            );
        }

        if !self.breakdown.is_empty() {
            let _ = writeln!(out, "\nSeason type breakdown");
            let _ = writeln!(out, "---------------------");
            for entry in &self.breakdown {
                let _ = writeln!(out, "{}:", entry.season_type);
                if let Some(average) = entry.result.average {
                    let _ = writeln!(out, "- Average: {:.1}", average);
                }
                let _ = writeln!(
                    out,
                    "- Hit: {} of {} ({:.1}%)",
                    entry.result.satisfied,
                    entry.result.total,
                    entry.result.probability * 100.0
                );
            }
        }

        let _ = writeln!(out, "\nValue analysis");
        let _ = writeln!(out, "--------------");
        let _ = writeln!(
            out,
            "{} {:.1}%",
            MODEL_PROBABILITY_LABEL,
            self.ev.probability * 100.0
        );
        let _ = writeln!(
            out,
            "Implied probability: {:.1}%",
            self.ev.implied_probability * 100.0
        );
        let _ = writeln!(out, "Edge: {:+.1}%", self.ev.edge_percent);
        let _ = writeln!(out, "{} {:+.2}", EXPECTED_VALUE_LABEL, self.ev.expected_value);
        let _ = writeln!(out, "Kelly fraction: {:.1}%", self.ev.kelly_fraction * 100.0);
        let _ = writeln!(out, "Recommendation: {}", self.ev.recommendation);

        let _ = writeln!(out, "\nPer 1 unit staked:");
        let _ = writeln!(out, "- Win if it lands: {:.2} units", self.ev.potential_gain);
        let _ = writeln!(out, "- Loss if it misses: 1 unit");
        let _ = write!(out, "- Expected value: {:+.2} units", self.ev.expected_value);

        if let Some(stake) = &self.stake {
            let _ = writeln!(out, "\n\nStake of {:.2}:", stake.stake);
            let _ = writeln!(out, "- Win if it lands: {:.2}", stake.potential_gain);
            let _ = writeln!(out, "- Loss if it misses: {:.2}", stake.stake);
            let _ = write!(out, "- Expected value: {:+.2}", stake.expected_value);
        }
        out
    }
}

/// Result of [`PropEvaluator::report`]: an evaluation or the reason there is none
#[derive(Debug, Clone, PartialEq)]
pub enum PropReport {
    Evaluated(Box<PropEvaluation>),
    Failed {
        request: PropRequest,
        error: PropError,
    },
}

impl PropReport {
    pub fn evaluation(&self) -> Option<&PropEvaluation> {
        match self {
            PropReport::Evaluated(evaluation) => Some(evaluation),
            PropReport::Failed { .. } => None,
        }
    }

    pub fn expected_value(&self) -> Option<f64> {
        self.evaluation().map(|e| e.ev.expected_value)
    }

    pub fn probability(&self) -> Option<f64> {
        self.evaluation().map(|e| e.probability())
    }

    pub fn render(&self) -> String {
        let (request, error) = match self {
            PropReport::Evaluated(evaluation) => return evaluation.render(),
            PropReport::Failed { request, error } => (request, error),
        };
        match error {
            PropError::NoData { .. } => format!(
                "No data available for {} in {} ({}){}.",
                request.player_name,
                request.season,
                request.season_types_label(),
                request
                    .opponent
                    .as_ref()
                    .map(|team| format!(" against {}", team))
                    .unwrap_or_default()
            ),
            PropError::UnresolvableProp { available, .. } => format!(
                "Could not find a statistic for prop '{}'. Available fields: [{}]",
                request.label,
                available.join(", ")
            ),
            PropError::InsufficientSample { required, found } => format!(
                "Insufficient data to analyze {} for {}: {} valid games, {} required.",
                request.label, request.player_name, found, required
            ),
            PropError::InvalidOdds(odds) => format!(
                "Invalid odds {}: decimal odds must be greater than 1.0.",
                odds
            ),
            other => format!("Could not evaluate {}: {}", request.label, other),
        }
    }
}

/// Values a dashboard can pull back out of a rendered report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportMetrics {
    /// Raw hit rate over the sample
    pub historical_probability: f64,
    /// Probability behind `expected_value`
    pub probability: f64,
    pub expected_value: f64,
}

impl ReportMetrics {
    /// Read the labeled probability and EV lines of a report. `None` for failure messages.
    pub fn parse(report: &str) -> Option<Self> {
        let value_after = |label: &str| -> Option<f64> {
            report
                .lines()
                .find_map(|line| line.trim().strip_prefix(label))
                .and_then(|rest| rest.trim().trim_end_matches('%').parse::<f64>().ok())
        };
        Some(Self {
            historical_probability: value_after(PROBABILITY_LABEL)? / 100.0,
            probability: value_after(MODEL_PROBABILITY_LABEL)? / 100.0,
            expected_value: value_after(EXPECTED_VALUE_LABEL)?,
        })
    }
}

/// Runs the resolve, estimate and value pipeline for prop requests.
/// Holds no state between calls.
pub struct PropEvaluator<'a, S: StatRecordSource + ?Sized> {
    source: &'a S,
    resolver: PropResolver,
}

impl<'a, S: StatRecordSource + ?Sized> PropEvaluator<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            resolver: PropResolver::new(),
        }
    }

    fn load_records(
        &self,
        request: &PropRequest,
        season_types: &[SeasonType],
    ) -> PropResult<Vec<GameRecord>> {
        let opponent = request.opponent_team()?;
        let mut records = Vec::new();
        for season_type in season_types {
            let batch = match opponent {
                None => self.source.fetch_game_records(
                    &request.player_id,
                    &request.season,
                    *season_type,
                )?,
                Some(team) => self.source.fetch_game_records_against(
                    &request.player_id,
                    &request.season,
                    *season_type,
                    team.abbreviation,
                )?,
            };
            debug!(
                "{} games for {} in {} {}",
                batch.len(),
                request.player_name,
                request.season,
                season_type
            );
            records.extend(batch);
        }
        Ok(records)
    }

    /// Evaluate a prop, returning a typed error when no evaluation is possible
    pub fn evaluate_prop(&self, request: &PropRequest) -> PropResult<PropEvaluation> {
        request.validate()?;
        info!(
            "Evaluating {} {} {} for {}",
            request.label, request.direction, request.threshold, request.player_name
        );

        let season_types = distinct(&request.season_types);
        let mut records = self.load_records(request, &season_types)?;
        if records.is_empty() {
            return Err(PropError::NoData {
                player: request.player_name.clone(),
                seasons: format!("{} {}", request.season, request.season_types_label()),
            });
        }

        let field = self.resolver.resolve_for(&request.label, &records)?;
        self.resolver.materialize(&mut records, &field)?;

        let history = estimate(
            &records,
            &field,
            request.threshold,
            request.direction,
            request.location,
        );
        if history.is_insufficient() {
            return Err(PropError::InsufficientSample {
                required: 1,
                found: 0,
            });
        }

        let simulation = match request.mode {
            EstimationMode::Frequency => None,
            EstimationMode::MonteCarlo(config) => {
                let values = extract_values(&records, &field, request.location);
                Some(simulate(
                    &values,
                    request.threshold,
                    request.direction,
                    config,
                )?)
            }
        };
        let probability = simulation
            .as_ref()
            .map_or(history.probability, |sim| sim.probability);
        let ev = ev_calculator::evaluate(probability, request.decimal_odds)?;
        let stake = request.stake.map(|amount| ev.for_stake(amount)).transpose()?;

        let breakdown = season_types
            .into_iter()
            .filter_map(|season_type| {
                let subset: Vec<GameRecord> = records
                    .iter()
                    .filter(|r| r.season_type == season_type)
                    .cloned()
                    .collect();
                if subset.is_empty() {
                    return None;
                }
                Some(SeasonBreakdown {
                    season_type,
                    result: estimate(
                        &subset,
                        &field,
                        request.threshold,
                        request.direction,
                        request.location,
                    ),
                })
            })
            .collect();

        Ok(PropEvaluation {
            request: request.clone(),
            field,
            history,
            simulation,
            ev,
            stake,
            breakdown,
        })
    }

    /// Evaluate a prop, turning every failure into a displayable report
    pub fn report(&self, request: &PropRequest) -> PropReport {
        match self.evaluate_prop(request) {
            Ok(evaluation) => PropReport::Evaluated(Box::new(evaluation)),
            Err(error) => {
                debug!("Evaluation of {} failed: {}", request.label, error);
                PropReport::Failed {
                    request: request.clone(),
                    error,
                }
            }
        }
    }
}

/// Evaluate a prop bet and render the human-readable report
pub fn evaluate_prop_bet<S: StatRecordSource + ?Sized>(
    source: &S,
    request: &PropRequest,
) -> String {
    PropEvaluator::new(source).report(request).render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::game_log_store::GameLogStore;
    use crate::models::Location;
    use crate::utils::ev_calculator::Recommendation;

    const PLAYER: &str = "1628369";

    fn game(
        n: usize,
        location: Location,
        season_type: SeasonType,
        pts: f64,
        reb: f64,
    ) -> GameRecord {
        GameRecord {
            game_id: format!("00224{:05}", n),
            game_date: format!("JAN {:02}, 2025", n % 28 + 1),
            matchup: match location {
                Location::Home => "BOS vs. MIA".to_string(),
                Location::Away => "BOS @ MIA".to_string(),
            },
            location,
            season: "2024-25".to_string(),
            season_type,
            stats: [("PTS", Some(pts)), ("REB", Some(reb)), ("FG_PCT", None)]
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    fn store() -> GameLogStore {
        let mut store = GameLogStore::default();
        let regular = [35.0, 28.0, 31.0, 19.0, 42.0]
            .iter()
            .enumerate()
            .map(|(i, pts)| {
                let location = if i % 2 == 0 { Location::Home } else { Location::Away };
                game(i, location, SeasonType::RegularSeason, *pts, 8.0)
            })
            .collect();
        store.insert_games(PLAYER, "2024-25", SeasonType::RegularSeason, regular);
        store.insert_games(
            PLAYER,
            "2024-25",
            SeasonType::Playoffs,
            vec![
                game(10, Location::Away, SeasonType::Playoffs, 26.0, 11.0),
                game(11, Location::Away, SeasonType::Playoffs, 33.0, 6.0),
            ],
        );
        store
    }

    fn request(label: &str, threshold: f64, odds: f64) -> PropRequest {
        PropRequest::new(PLAYER, label, threshold, odds)
            .player_name("Jayson Tatum")
            .season("2024-25")
    }

    #[test]
    fn test_evaluate_regular_season_points() {
        let store = store();
        let evaluation = PropEvaluator::new(&store)
            .evaluate_prop(&request("Puntos", 30.0, 2.0))
            .unwrap();

        assert_eq!(evaluation.history.as_triple(), (0.6, 3, 5));
        assert!((evaluation.ev.expected_value - 0.2).abs() < 1e-12);
        assert_eq!(evaluation.ev.recommendation, Recommendation::Bet);
        assert_eq!(evaluation.breakdown.len(), 1);
    }

    #[test]
    fn test_evaluate_combined_prop_across_season_types() {
        let store = store();
        let req = request("Puntos + Rebotes", 38.5, 1.9)
            .season_types(vec![SeasonType::RegularSeason, SeasonType::Playoffs]);
        let evaluation = PropEvaluator::new(&store).evaluate_prop(&req).unwrap();

        // 43, 36, 39, 27, 50 | 37, 39
        assert_eq!(evaluation.field.column(), "PTS_REB");
        assert_eq!(evaluation.history.satisfied, 4);
        assert_eq!(evaluation.history.total, 7);
        assert_eq!(evaluation.breakdown.len(), 2);
        assert_eq!(evaluation.breakdown[1].season_type, SeasonType::Playoffs);
        assert_eq!(evaluation.breakdown[1].result.as_triple(), (0.5, 1, 2));
    }

    #[test]
    fn test_home_filter_and_under() {
        let store = store();
        let req = request("Points", 30.0, 2.5)
            .direction(Direction::Under)
            .location(LocationFilter::HomeOnly);
        let evaluation = PropEvaluator::new(&store).evaluate_prop(&req).unwrap();
        // Home games: 35, 31, 42
        assert_eq!(evaluation.history.as_triple(), (0.0, 0, 3));
        assert_eq!(evaluation.ev.recommendation, Recommendation::Pass);
        assert!((evaluation.ev.expected_value + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_data_report() {
        let store = store();
        let req = request("Points", 20.0, 1.9).season("2019-20");
        let report = PropEvaluator::new(&store).report(&req);
        assert!(matches!(
            report,
            PropReport::Failed {
                error: PropError::NoData { .. },
                ..
            }
        ));
        assert!(report.render().starts_with("No data available for Jayson Tatum"));
        assert_eq!(report.expected_value(), None);
    }

    #[test]
    fn test_unresolvable_prop_report_lists_fields() {
        let store = store();
        let report = PropEvaluator::new(&store).report(&request("Double doubles", 0.5, 3.0));
        let text = report.render();
        assert!(text.contains("Double doubles"));
        assert!(text.contains("FG_PCT, PTS, REB"));
    }

    #[test]
    fn test_insufficient_data_when_filter_empties_sample() {
        let store = store();
        let req = request("Points", 20.0, 1.9)
            .season_types(vec![SeasonType::Playoffs])
            .location(LocationFilter::HomeOnly);
        let err = PropEvaluator::new(&store).evaluate_prop(&req).unwrap_err();
        assert_eq!(err, PropError::InsufficientSample { required: 1, found: 0 });
    }

    #[test]
    fn test_invalid_odds_rejected_before_fetching() {
        let store = store();
        let err = PropEvaluator::new(&store)
            .evaluate_prop(&request("Points", 20.0, 1.0))
            .unwrap_err();
        assert_eq!(err, PropError::InvalidOdds(1.0));
    }

    #[test]
    fn test_invalid_input() {
        let store = store();
        let evaluator = PropEvaluator::new(&store);
        assert!(matches!(
            evaluator.evaluate_prop(&request("Points", f64::NAN, 1.9)),
            Err(PropError::InvalidInput(_))
        ));
        assert!(matches!(
            evaluator.evaluate_prop(&PropRequest::new("", "Points", 20.0, 1.9)),
            Err(PropError::InvalidInput(_))
        ));
        assert!(matches!(
            evaluator.evaluate_prop(&request("Points", 20.0, 1.9).season("2024")),
            Err(PropError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_monte_carlo_mode() {
        let store = store();
        let req = request("Points", 30.0, 2.0).mode(EstimationMode::MonteCarlo(
            SimulationConfig::default(),
        ));
        let evaluator = PropEvaluator::new(&store);
        let first = evaluator.evaluate_prop(&req).unwrap();
        let second = evaluator.evaluate_prop(&req).unwrap();

        let sim = first.simulation.as_ref().unwrap();
        assert_eq!(first.probability(), sim.probability);
        assert_eq!(first, second);
        assert!(first.render().contains("95% interval"));
    }

    #[test]
    fn test_monte_carlo_needs_two_games() {
        let store = store();
        let req = request("Points", 30.0, 2.0)
            .location(LocationFilter::AwayOnly)
            .season_types(vec![SeasonType::Playoffs])
            .mode(EstimationMode::MonteCarlo(SimulationConfig::default()));
        assert!(PropEvaluator::new(&store).evaluate_prop(&req).is_ok());

        let req = req.season_types(vec![SeasonType::RegularSeason]).location(LocationFilter::All);
        let mut single = GameLogStore::default();
        single.insert_games(
            PLAYER,
            "2024-25",
            SeasonType::RegularSeason,
            vec![game(1, Location::Home, SeasonType::RegularSeason, 30.0, 5.0)],
        );
        let err = PropEvaluator::new(&single).evaluate_prop(&req).unwrap_err();
        assert_eq!(err, PropError::InsufficientSample { required: 2, found: 1 });
    }

    #[test]
    fn test_report_metrics_round_trip() {
        let store = store();
        let text = evaluate_prop_bet(&store, &request("Puntos", 30.0, 2.0));
        let metrics = ReportMetrics::parse(&text).unwrap();
        assert!((metrics.probability - 0.6).abs() < 1e-9);
        assert!((metrics.expected_value - 0.2).abs() < 1e-9);

        let failed = evaluate_prop_bet(&store, &request("Puntos", 30.0, 2.0).season("2018-19"));
        assert!(ReportMetrics::parse(&failed).is_none());
    }

    #[test]
    fn test_repeated_season_types_counted_once() {
        let store = store();
        let req = request("Points", 30.0, 2.0)
            .season_types(vec![SeasonType::RegularSeason, SeasonType::Playoffs, SeasonType::RegularSeason]);
        assert_eq!(req.season_types, vec![SeasonType::RegularSeason, SeasonType::Playoffs]);

        // Also when the field is set directly
        let mut raw = request("Points", 30.0, 2.0);
        raw.season_types = vec![SeasonType::RegularSeason, SeasonType::Playoffs, SeasonType::RegularSeason];
        let evaluation = PropEvaluator::new(&store).evaluate_prop(&raw).unwrap();

        // 35, 28, 31, 19, 42 | 26, 33
        assert_eq!(evaluation.history.total, 7);
        assert_eq!(evaluation.history.satisfied, 4);
        let types: Vec<SeasonType> = evaluation.breakdown.iter().map(|b| b.season_type).collect();
        assert_eq!(types, vec![SeasonType::RegularSeason, SeasonType::Playoffs]);
        assert!(evaluation.render().contains("Season types: Regular Season, Playoffs\n"));
    }

    #[test]
    fn test_monte_carlo_report_metrics_match_ev() {
        let store = store();
        let req = request("Points", 30.0, 2.0)
            .mode(EstimationMode::MonteCarlo(SimulationConfig::default()));
        let evaluation = PropEvaluator::new(&store).evaluate_prop(&req).unwrap();
        let metrics = ReportMetrics::parse(&evaluation.render()).unwrap();

        assert!((metrics.historical_probability - 0.6).abs() < 1e-9);
        assert!((metrics.probability - evaluation.probability()).abs() < 0.001);
        assert!((metrics.expected_value - evaluation.ev.expected_value).abs() < 0.006);
        // Even odds: EV = 2p - 1
        assert!((metrics.expected_value - (2.0 * metrics.probability - 1.0)).abs() < 0.01);
    }

    #[test]
    fn test_opponent_filter() {
        let mut store = GameLogStore::default();
        let records = [(35.0, "BOS vs. NYK"), (18.0, "BOS @ MIA"), (29.0, "BOS @ NYK"), (40.0, "BOS vs. MIA")]
            .iter()
            .enumerate()
            .map(|(i, (pts, matchup))| {
                let mut record = game(i, Location::Home, SeasonType::RegularSeason, *pts, 5.0);
                record.matchup = matchup.to_string();
                record
            })
            .collect();
        store.insert_games(PLAYER, "2024-25", SeasonType::RegularSeason, records);
        let evaluator = PropEvaluator::new(&store);

        let knicks = evaluator
            .evaluate_prop(&request("Points", 30.0, 2.0).opponent("Knicks"))
            .unwrap();
        assert_eq!(knicks.history.as_triple(), (0.5, 1, 2));
        assert!(knicks.render().contains("Opponent: Knicks"));

        let report = evaluator.report(&request("Points", 30.0, 2.0).opponent("LAL"));
        assert!(report.render().ends_with("against LAL."));

        assert!(matches!(
            evaluator.evaluate_prop(&request("Points", 30.0, 2.0).opponent("Sonics")),
            Err(PropError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stake_amounts() {
        let store = store();
        let evaluator = PropEvaluator::new(&store);
        let evaluation = evaluator
            .evaluate_prop(&request("Puntos", 30.0, 2.0).stake(50.0))
            .unwrap();
        let stake = evaluation.stake.unwrap();
        assert!((stake.potential_gain - 50.0).abs() < 1e-9);
        assert!((stake.expected_value - 10.0).abs() < 1e-9);
        assert!(evaluation.render().contains("Stake of 50.00:\n- Win if it lands: 50.00"));

        assert!(evaluator.evaluate_prop(&request("Puntos", 30.0, 2.0)).unwrap().stake.is_none());
        assert!(matches!(
            evaluator.evaluate_prop(&request("Puntos", 30.0, 2.0).stake(0.0)),
            Err(PropError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_evaluations_do_not_leak_between_calls() {
        let store = store();
        let evaluator = PropEvaluator::new(&store);
        let combined = evaluator
            .evaluate_prop(&request("Points + Rebounds", 30.0, 1.9))
            .unwrap();
        assert_eq!(combined.field.column(), "PTS_REB");

        let records = store
            .fetch_game_records(PLAYER, "2024-25", SeasonType::RegularSeason)
            .unwrap();
        assert!(records.iter().all(|r| !r.has_field("PTS_REB")));
    }
}
