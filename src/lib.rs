pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

pub use api::*;
pub use error::{PropError, PropResult};
pub use models::*;
pub use utils::*;

use anyhow::{Context, Result};
use api::game_log_store::GameLogStore;
use api::nba_stats_api::NbaStatsClient;
use api::odds_api::OddsApiClient;
use api::odds_sheet::OddsSheet;
use chrono::{DateTime, Utc};
use config::AppConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use utils::data::{load_from_cache, save_to_cache};
use utils::slate::{analyze_slate, SlateOptions, SlateRow};

/// Everything the slate page and the `slate` command display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlateData {
    pub season: String,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<SlateRow>,
}

pub fn stats_client(config: &AppConfig) -> Result<NbaStatsClient> {
    Ok(NbaStatsClient::new(config.request_timeout)?.with_base_url(&config.nba_stats_base_url))
}

/// Load the roster of the configured season, from cache when allowed
pub async fn load_roster(
    config: &AppConfig,
    client: &NbaStatsClient,
    store: &mut GameLogStore,
) -> Result<()> {
    let cache_file = config.cache_file(&format!("players_{}.json", config.season));
    let players = if config.use_cache && cache_file.exists() {
        info!("Loading roster from {}", cache_file.display());
        load_from_cache(&cache_file)?
    } else {
        let season_type = config
            .season_types
            .first()
            .copied()
            .unwrap_or(SeasonType::RegularSeason);
        let players = client
            .fetch_players(&config.season, season_type)
            .await
            .context("Failed to fetch player list")?;
        save_to_cache(&players, &cache_file)?;
        players
    };
    store.set_players(players);
    Ok(())
}

/// Find a player by name and make sure their game logs (against `opponent` only, when given) are in the store
pub async fn load_player_games(
    config: &AppConfig,
    client: &NbaStatsClient,
    store: &mut GameLogStore,
    player_name: &str,
    opponent: Option<&NbaTeam>,
) -> Result<PlayerInfo> {
    if store.players().is_empty() {
        load_roster(config, client, store).await?;
    }
    let player = store
        .find_player(player_name)
        .cloned()
        .with_context(|| format!("No player matching '{}' in {}", player_name, config.season))?;
    store
        .load_player(client, &player.id, &config.season, &config.season_types, opponent)
        .await?;
    Ok(player)
}

/// Odds from a CSV sheet when given, otherwise player props from The Odds API
pub async fn load_odds_book(config: &AppConfig, odds_path: Option<&Path>) -> Result<PropOddsBook> {
    if let Some(path) = odds_path {
        return OddsSheet::load(path);
    }

    let cache_file = config.cache_file("prop_odds_cache.json");
    if config.use_cache && cache_file.exists() {
        info!("Loading prop odds from {}", cache_file.display());
        return load_from_cache(&cache_file);
    }

    let api_key = config
        .odds_api_key
        .clone()
        .context("ODDS_API_KEY not set and no odds sheet given")?;
    let book = OddsApiClient::new(api_key)
        .fetch_prop_book(2, None)
        .await
        .context("Failed to fetch player props")?;
    save_to_cache(&book, &cache_file)?;
    Ok(book)
}

/// Fetch odds and game logs, then evaluate every quoted prop
pub async fn fetch_prop_slate(
    config: &AppConfig,
    odds_path: Option<&Path>,
    options: &SlateOptions,
) -> Result<(GameLogStore, SlateData)> {
    let book = load_odds_book(config, odds_path).await?;
    let client = stats_client(config)?;

    let logs_cache = config.cache_file(&format!("game_logs_{}.json", config.season));
    let mut store: GameLogStore = if config.use_cache && logs_cache.exists() {
        load_from_cache(&logs_cache)?
    } else {
        GameLogStore::default()
    };
    load_roster(config, &client, &mut store).await?;

    for player_name in book.keys() {
        let Some(player) = store.find_player(player_name).cloned() else {
            continue;
        };
        if let Err(e) = store
            .load_player(&client, &player.id, &options.season, &options.season_types, None)
            .await
        {
            // The slate row will report the missing data
            warn!("{:#}", e);
        }
    }
    save_to_cache(&store, &logs_cache)?;

    let rows = analyze_slate(&store, store.players(), &book, options);
    info!("Evaluated {} prop legs", rows.len());
    Ok((
        store,
        SlateData {
            season: options.season.clone(),
            generated_at: Utc::now(),
            rows,
        },
    ))
}
