use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nba_props_ev::api::game_log_store::GameLogStore;
use nba_props_ev::api::odds_api::OddsApiClient;
use nba_props_ev::config::{parse_season_types, AppConfig};
use nba_props_ev::data::save_slate_to_csv;
use nba_props_ev::ev_calculator::{evaluate, parse_odds_text};
use nba_props_ev::evaluation::{evaluate_prop_bet, EstimationMode, PropRequest};
use nba_props_ev::monte_carlo::{simulate, SimulationConfig};
use nba_props_ev::slate::{top_value_bets, SlateOptions};
use nba_props_ev::{
    fetch_prop_slate, find_team, load_player_games, stats_client, Direction, LocationFilter,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nba-props")]
#[command(version = "0.1.0")]
#[command(about = "Probability and expected value of NBA player prop bets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by commands that read game logs
#[derive(Args)]
struct SampleArgs {
    /// Season like 2024-25 (default: NBA_SEASON or the current season)
    #[arg(long)]
    season: Option<String>,

    /// Comma separated season types, e.g. "Regular Season,Playoffs"
    #[arg(long)]
    season_types: Option<String>,

    /// all, home or away
    #[arg(long, default_value = "all")]
    location: LocationFilter,

    /// Estimate with a seeded Monte Carlo simulation instead of the raw hit rate
    #[arg(long)]
    monte_carlo: bool,

    #[arg(long)]
    draws: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

impl SampleArgs {
    /// Apply the overrides to the environment config
    fn apply(&self, config: &mut AppConfig) -> Result<EstimationMode> {
        if let Some(season) = &self.season {
            nba_props_ev::validate_season(season)?;
            config.season = season.clone();
        }
        if let Some(types) = &self.season_types {
            config.season_types = parse_season_types(types)?;
        }
        if let Some(draws) = self.draws {
            config.simulation.draws = draws;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = seed;
        }
        Ok(if self.monte_carlo {
            EstimationMode::MonteCarlo(config.simulation)
        } else {
            EstimationMode::Frequency
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one prop bet for one player
    Evaluate {
        /// Player name, partial names are matched
        #[arg(short, long)]
        player: String,

        /// Prop label, e.g. "Points", "Puntos + Rebotes", "PRA"
        #[arg(long)]
        prop: String,

        #[arg(short, long)]
        line: f64,

        /// Decimal (1.85), American (-110) or fractional (10/11) odds
        #[arg(short, long, allow_hyphen_values = true)]
        odds: String,

        #[arg(long, default_value = "over")]
        side: Direction,

        /// Only games against this team, e.g. "MIA" or "Miami Heat"
        #[arg(long)]
        vs: Option<String>,

        /// Amount to wager, adds money figures to the report
        #[arg(long)]
        stake: Option<f64>,

        #[command(flatten)]
        sample: SampleArgs,
    },
    /// Evaluate every prop of an odds sheet (or The Odds API when no sheet is given)
    Slate {
        /// CSV with player,prop,over_line,over_odds,under_line,under_odds
        #[arg(long)]
        odds_sheet: Option<PathBuf>,

        /// Only print the best N value bets
        #[arg(long)]
        top: Option<usize>,

        /// Write every evaluated leg to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        #[command(flatten)]
        sample: SampleArgs,
    },
    /// Run the Monte Carlo estimate on values given on the command line
    Simulate {
        /// Comma separated historical values, e.g. 35,28,31,19,42
        #[arg(long)]
        values: String,

        #[arg(short, long)]
        line: f64,

        #[arg(long, default_value = "over")]
        side: Direction,

        #[arg(long)]
        draws: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Expected value of a bet from a probability and odds
    Ev {
        /// Estimated probability between 0 and 1
        #[arg(short, long)]
        probability: f64,

        #[arg(short, long, allow_hyphen_values = true)]
        odds: String,

        #[arg(long)]
        stake: Option<f64>,
    },
    /// Show the remaining request quota of the Odds API key
    Usage,
}

fn parse_odds(text: &str) -> Result<f64> {
    parse_odds_text(text).with_context(|| format!("Cannot read odds '{}'", text))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command {
        Commands::Evaluate {
            player,
            prop,
            line,
            odds,
            side,
            vs,
            stake,
            sample,
        } => {
            let mode = sample.apply(&mut config)?;
            let odds = parse_odds(&odds)?;
            let opponent = match vs.as_deref() {
                Some(name) => Some(find_team(name).with_context(|| format!("Unknown team '{}'", name))?),
                None => None,
            };
            let client = stats_client(&config)?;
            let mut store = GameLogStore::default();
            let player = load_player_games(&config, &client, &mut store, &player, opponent).await?;

            let mut request = PropRequest::new(&player.id, &prop, line, odds)
                .player_name(&player.name)
                .direction(side)
                .location(sample.location)
                .season(&config.season)
                .season_types(config.season_types.clone())
                .mode(mode);
            if let Some(team) = opponent {
                request = request.opponent(team.abbreviation);
            }
            if let Some(stake) = stake {
                request = request.stake(stake);
            }
            println!("{}", evaluate_prop_bet(&store, &request));
        }
        Commands::Slate {
            odds_sheet,
            top,
            csv,
            sample,
        } => {
            let mode = sample.apply(&mut config)?;
            let options = SlateOptions {
                season: config.season.clone(),
                season_types: config.season_types.clone(),
                location: sample.location,
                mode,
            };

            println!("NBA Player Props EV ({})\n", config.season);
            let (_, slate) = fetch_prop_slate(&config, odds_sheet.as_deref(), &options).await?;

            let bets = top_value_bets(&slate.rows, top);
            if bets.is_empty() {
                println!("No positive EV props found.");
            } else {
                println!("Top {} Value Props:\n", bets.len());
                for (i, bet) in bets.iter().enumerate() {
                    println!("{}. {}", i + 1, bet.format());
                }
            }

            let skipped = slate.rows.iter().filter(|r| r.note.is_some()).count();
            if skipped > 0 {
                println!("\n{} legs could not be evaluated:", skipped);
                for row in slate.rows.iter().filter(|r| r.note.is_some()) {
                    println!("- {}", row.format());
                }
            }

            if let Some(path) = csv {
                save_slate_to_csv(&slate.rows, &path)?;
                println!("\nSaved slate to {}", path.display());
            }
        }
        Commands::Simulate {
            values,
            line,
            side,
            draws,
            seed,
        } => {
            let values = values
                .split(',')
                .map(|v| v.trim().parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .context("Values must be comma separated numbers")?;
            let sim_config = SimulationConfig {
                draws: draws.unwrap_or(config.simulation.draws),
                seed: seed.unwrap_or(config.simulation.seed),
            };
            let result = simulate(&values, line, side, sim_config)?;

            println!("Historical mean: {:.2}", result.historical.mean);
            println!("Historical median: {:.2}", result.historical.median);
            println!("Historical std dev: {:.2}", result.historical.std_dev);
            println!("Simulated mean: {:.2}", result.mean);
            println!(
                "95% interval: [{:.2}, {:.2}]",
                result.interval.0, result.interval.1
            );
            println!(
                "P({} {}) = {:.1}% over {} draws",
                side,
                line,
                result.probability * 100.0,
                result.draws
            );
        }
        Commands::Ev {
            probability,
            odds,
            stake,
        } => {
            let ev = evaluate(probability, parse_odds(&odds)?)?;
            println!("Implied probability: {:.1}%", ev.implied_probability * 100.0);
            println!("Edge: {:+.1}%", ev.edge_percent);
            println!("Expected value per unit staked: {:+.2}", ev.expected_value);
            println!("Kelly fraction: {:.1}%", ev.kelly_fraction * 100.0);
            println!("Recommendation: {}", ev.recommendation);
            if let Some(stake) = stake {
                let outcome = ev.for_stake(stake)?;
                println!("\nStake of {:.2}:", outcome.stake);
                println!("- Win if it lands: {:.2}", outcome.potential_gain);
                println!("- Expected value: {:+.2}", outcome.expected_value);
            }
        }
        Commands::Usage => {
            let api_key = config
                .odds_api_key
                .clone()
                .context("ODDS_API_KEY is not set")?;
            let usage = OddsApiClient::new(api_key).check_usage().await?;
            let show = |count: Option<u64>| count.map_or("unknown".to_string(), |c| c.to_string());
            println!("API requests remaining: {}", show(usage.remaining));
            println!("API requests used: {}", show(usage.used));
        }
    }

    Ok(())
}
