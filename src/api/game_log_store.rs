use crate::api::nba_stats_api::NbaStatsClient;
use crate::error::PropResult;
use crate::models::{GameRecord, NbaTeam, PlayerInfo, SeasonType};
use crate::utils::evaluation::StatRecordSource;
use crate::utils::player_match::find_matching_player;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Game logs and roster fetched ahead of evaluation, so the pipeline itself never touches the network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameLogStore {
    players: Vec<PlayerInfo>,
    /// Keyed by `player_id|season|season type`, plus `|vs TEAM` for opponent-only logs
    logs: HashMap<String, Vec<GameRecord>>,
}

fn log_key(player_id: &str, season: &str, season_type: SeasonType) -> String {
    format!("{}|{}|{}", player_id, season, season_type.as_str())
}

fn opponent_key(player_id: &str, season: &str, season_type: SeasonType, opponent: &str) -> String {
    format!("{}|vs {}", log_key(player_id, season, season_type), opponent)
}

impl GameLogStore {
    pub fn with_players(players: Vec<PlayerInfo>) -> Self {
        Self {
            players,
            logs: HashMap::new(),
        }
    }

    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    pub fn set_players(&mut self, players: Vec<PlayerInfo>) {
        self.players = players;
    }

    pub fn find_player(&self, name: &str) -> Option<&PlayerInfo> {
        find_matching_player(&self.players, name)
    }

    pub fn has_games(&self, player_id: &str, season: &str, season_type: SeasonType) -> bool {
        self.logs
            .contains_key(&log_key(player_id, season, season_type))
    }

    pub fn insert_games(
        &mut self,
        player_id: &str,
        season: &str,
        season_type: SeasonType,
        records: Vec<GameRecord>,
    ) {
        self.logs
            .insert(log_key(player_id, season, season_type), records);
    }

    /// Fetch whichever of the requested logs are not stored yet. With an opponent
    /// only the games against that team are fetched, unless the full log is already here.
    pub async fn load_player(
        &mut self,
        client: &NbaStatsClient,
        player_id: &str,
        season: &str,
        season_types: &[SeasonType],
        opponent: Option<&NbaTeam>,
    ) -> Result<()> {
        for season_type in season_types {
            if self.has_games(player_id, season, *season_type) {
                debug!("Using stored {} log for {}", season_type, player_id);
                continue;
            }
            let key = match opponent {
                Some(team) => opponent_key(player_id, season, *season_type, team.abbreviation),
                None => log_key(player_id, season, *season_type),
            };
            if self.logs.contains_key(&key) {
                debug!("Using stored {} log for {}", season_type, key);
                continue;
            }
            let records = client
                .fetch_game_records(player_id, season, *season_type, opponent.map(|t| t.id))
                .await
                .with_context(|| {
                    format!(
                        "Failed to fetch {} game log for player {}",
                        season_type, player_id
                    )
                })?;
            self.logs.insert(key, records);
        }
        Ok(())
    }

    /// Roster plus the stored logs of one player, so it can be filled without holding this store
    pub fn player_snapshot(&self, player_id: &str) -> GameLogStore {
        let prefix = format!("{}|", player_id);
        GameLogStore {
            players: self.players.clone(),
            logs: self
                .logs
                .iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .map(|(key, records)| (key.clone(), records.clone()))
                .collect(),
        }
    }

    /// Take over the logs of `other`, and its roster when this one has none
    pub fn merge(&mut self, other: GameLogStore) {
        if self.players.is_empty() {
            self.players = other.players;
        }
        self.logs.extend(other.logs);
    }
}

impl StatRecordSource for GameLogStore {
    fn fetch_game_records(
        &self,
        player_id: &str,
        season: &str,
        season_type: SeasonType,
    ) -> PropResult<Vec<GameRecord>> {
        Ok(self
            .logs
            .get(&log_key(player_id, season, season_type))
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_game_records_against(
        &self,
        player_id: &str,
        season: &str,
        season_type: SeasonType,
        opponent: &str,
    ) -> PropResult<Vec<GameRecord>> {
        if let Some(records) = self
            .logs
            .get(&opponent_key(player_id, season, season_type, opponent))
        {
            return Ok(records.clone());
        }
        Ok(self
            .fetch_game_records(player_id, season, season_type)?
            .into_iter()
            .filter(|r| r.opponent() == Some(opponent))
            .collect())
    }
}
