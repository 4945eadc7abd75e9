use crate::error::{PropError, PropResult};
use crate::models::{GameRecord, Location, PlayerInfo, SeasonType};
use crate::utils::retry::{retry, Permanent, RetryConfig};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

pub const NBA_STATS_BASE_URL: &str = "https://stats.nba.com/stats";

/// Text and identifier columns of the game log that are not stats
const NON_STAT_COLUMNS: [&str; 8] = [
    "SEASON_ID",
    "PLAYER_ID",
    "GAME_ID",
    "GAME_DATE",
    "MATCHUP",
    "WL",
    "VIDEO_AVAILABLE",
    "TEAM_ID",
];

/// stats.nba.com rejects requests that don't look like they come from the website
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        ),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.nba.com/"));
    headers.insert("Origin", HeaderValue::from_static("https://www.nba.com"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers
}

/// Rate limiting and server errors are worth another attempt; other client errors are not
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub struct NbaStatsClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl NbaStatsClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()
            .context("Failed to build NBA stats HTTP client")?;
        Ok(Self {
            client,
            base_url: NBA_STATS_BASE_URL.to_string(),
            retry: RetryConfig::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let url = url.as_str();
        retry(&self.retry, endpoint, || {
            let request = self.client.get(url).query(params);
            async move {
                let response = request
                    .send()
                    .await
                    .with_context(|| format!("Failed to reach {}", url))?;

                let status = response.status();
                if !status.is_success() {
                    let message = format!("NBA stats {} returned error: {}", endpoint, status);
                    if is_retryable_status(status) {
                        anyhow::bail!(message);
                    }
                    return Err(anyhow::Error::new(Permanent(message)));
                }

                response
                    .json::<Value>()
                    .await
                    .with_context(|| format!("Failed to parse {} response", endpoint))
            }
        })
        .await
    }

    /// Every player who appeared in the given season, with their id and team
    pub async fn fetch_players(
        &self,
        season: &str,
        season_type: SeasonType,
    ) -> Result<Vec<PlayerInfo>> {
        info!("Fetching player list for {} ({})", season, season_type);
        let params = [
            ("LeagueID", "00".to_string()),
            ("MeasureType", "Base".to_string()),
            ("PerMode", "PerGame".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", season_type.as_str().to_string()),
            ("LastNGames", "0".to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("PORound", "0".to_string()),
            ("PaceAdjust", "N".to_string()),
            ("Period", "0".to_string()),
            ("PlusMinus", "N".to_string()),
            ("Rank", "N".to_string()),
            ("TeamID", "0".to_string()),
        ];
        let payload = self.get_json("leaguedashplayerstats", &params).await?;
        let players = parse_players(&payload)?;
        debug!("{} players listed for {}", players.len(), season);
        Ok(players)
    }

    /// Per-game box scores of one player, optionally only against one opponent
    pub async fn fetch_game_records(
        &self,
        player_id: &str,
        season: &str,
        season_type: SeasonType,
        opponent_team_id: Option<&str>,
    ) -> Result<Vec<GameRecord>> {
        let params = [
            ("PlayerID", player_id.to_string()),
            ("LeagueID", "00".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", season_type.as_str().to_string()),
            ("OpponentTeamID", opponent_team_id.unwrap_or("0").to_string()),
            ("LastNGames", "0".to_string()),
            ("Month", "0".to_string()),
            ("PORound", "0".to_string()),
        ];
        let payload = self.get_json("playergamelog", &params).await?;
        let records = parse_game_log(&payload, season, season_type)?;
        info!(
            "Fetched {} games for player {} in {} ({})",
            records.len(),
            player_id,
            season,
            season_type
        );
        Ok(records)
    }
}

/// Header names and rows of the first result set of a stats payload
fn first_result_set(payload: &Value) -> PropResult<(Vec<String>, &Vec<Value>)> {
    let set = payload
        .get("resultSets")
        .and_then(|sets| sets.get(0))
        .ok_or_else(|| PropError::Upstream("payload has no resultSets".to_string()))?;

    let headers = set
        .get("headers")
        .and_then(Value::as_array)
        .ok_or_else(|| PropError::Upstream("result set has no headers".to_string()))?
        .iter()
        .map(|h| {
            h.as_str()
                .map(str::to_string)
                .ok_or_else(|| PropError::Upstream(format!("header {} is not a string", h)))
        })
        .collect::<PropResult<Vec<String>>>()?;

    let rows = set
        .get("rowSet")
        .and_then(Value::as_array)
        .ok_or_else(|| PropError::Upstream("result set has no rowSet".to_string()))?;

    Ok((headers, rows))
}

fn column_index(headers: &[String], name: &str) -> PropResult<usize> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| PropError::Upstream(format!("missing column {}", name)))
}

fn cell_text(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn row_cells(row: &Value, width: usize) -> PropResult<&Vec<Value>> {
    match row.as_array() {
        Some(cells) if cells.len() == width => Ok(cells),
        _ => Err(PropError::Upstream(format!(
            "row does not have {} cells: {}",
            width, row
        ))),
    }
}

/// Parse a `leaguedashplayerstats` payload into the roster
pub fn parse_players(payload: &Value) -> PropResult<Vec<PlayerInfo>> {
    let (headers, rows) = first_result_set(payload)?;
    let id_col = column_index(&headers, "PLAYER_ID")?;
    let name_col = column_index(&headers, "PLAYER_NAME")?;
    let team_col = column_index(&headers, "TEAM_ABBREVIATION").ok();

    rows.iter()
        .map(|row| {
            let cells = row_cells(row, headers.len())?;
            Ok(PlayerInfo {
                id: cell_text(&cells[id_col]),
                name: cell_text(&cells[name_col]),
                team: team_col.map(|c| cell_text(&cells[c])).unwrap_or_default(),
            })
        })
        .collect()
}

/// Parse a `playergamelog` payload. Every numeric column lands in `GameRecord::stats`.
pub fn parse_game_log(
    payload: &Value,
    season: &str,
    season_type: SeasonType,
) -> PropResult<Vec<GameRecord>> {
    let (headers, rows) = first_result_set(payload)?;
    let game_col = column_index(&headers, "GAME_ID")?;
    let date_col = column_index(&headers, "GAME_DATE")?;
    let matchup_col = column_index(&headers, "MATCHUP")?;

    let stat_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            let upper = h.to_ascii_uppercase();
            !NON_STAT_COLUMNS.contains(&upper.as_str())
        })
        .map(|(i, h)| (i, h.to_ascii_uppercase()))
        .collect();

    rows.iter()
        .map(|row| {
            let cells = row_cells(row, headers.len())?;
            let matchup = cell_text(&cells[matchup_col]);
            let location = Location::from_matchup(&matchup).ok_or_else(|| {
                PropError::Upstream(format!("cannot tell home or away from '{}'", matchup))
            })?;

            let mut stats = BTreeMap::new();
            for (i, name) in &stat_cols {
                match &cells[*i] {
                    Value::Number(n) => {
                        stats.insert(name.clone(), n.as_f64());
                    }
                    Value::Null => {
                        stats.insert(name.clone(), None);
                    }
                    Value::String(s) => {
                        if let Ok(v) = s.trim().parse::<f64>() {
                            stats.insert(name.clone(), Some(v));
                        }
                    }
                    _ => {}
                }
            }

            Ok(GameRecord {
                game_id: cell_text(&cells[game_col]),
                game_date: cell_text(&cells[date_col]),
                matchup,
                location,
                season: season.to_string(),
                season_type,
                stats,
            })
        })
        .collect()
}
