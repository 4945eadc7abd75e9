use crate::models::{PropLeg, PropOddsBook, PropOddsEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

const ODDS_API_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const SPORT_KEY: &str = "basketball_nba";

/// Player prop markets and the label they are evaluated under
const PROP_MARKETS: [(&str, &str); 11] = [
    ("player_points", "Points"),
    ("player_rebounds", "Rebounds"),
    ("player_assists", "Assists"),
    ("player_threes", "Threes"),
    ("player_blocks", "Blocks"),
    ("player_steals", "Steals"),
    ("player_turnovers", "Turnovers"),
    ("player_points_rebounds_assists", "Points + Rebounds + Assists"),
    ("player_points_rebounds", "Points + Rebounds"),
    ("player_points_assists", "Points + Assists"),
    ("player_rebounds_assists", "Rebounds + Assists"),
];

/// Upcoming game from the events endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct OddsApiEvent {
    pub id: String,
    pub commence_time: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,
}

/// Odds of a single event
#[derive(Debug, Deserialize)]
struct OddsApiEventOdds {
    #[serde(default)]
    bookmakers: Vec<OddsApiBookmaker>,
}

#[derive(Debug, Deserialize)]
struct OddsApiBookmaker {
    key: String,
    markets: Vec<OddsApiMarket>,
}

#[derive(Debug, Deserialize)]
struct OddsApiMarket {
    key: String,
    outcomes: Vec<OddsApiOutcome>,
}

/// For player props `name` is Over/Under and `description` is the player
#[derive(Debug, Deserialize)]
struct OddsApiOutcome {
    name: String,
    description: Option<String>,
    price: f64,
    point: Option<f64>,
}

fn market_label(key: &str) -> Option<&'static str> {
    PROP_MARKETS
        .iter()
        .find(|(market, _)| *market == key)
        .map(|(_, label)| *label)
}

/// Turn one event's bookmaker quotes into prop entries, taking the first bookmaker
/// (or `preferred` when it quotes) for every player and prop
fn entries_from_event(event: OddsApiEventOdds, preferred: Option<&str>) -> Vec<PropOddsEntry> {
    let mut bookmakers = event.bookmakers;
    if let Some(preferred) = preferred {
        bookmakers.sort_by_key(|b| b.key != preferred);
    }

    let mut entries: Vec<PropOddsEntry> = Vec::new();
    for bookmaker in bookmakers {
        for market in bookmaker.markets {
            let Some(label) = market_label(&market.key) else {
                continue;
            };
            for outcome in market.outcomes {
                let (Some(player), Some(line)) = (outcome.description, outcome.point) else {
                    continue;
                };
                let leg = PropLeg {
                    line,
                    odds: outcome.price,
                };

                let position = entries
                    .iter()
                    .position(|e| e.player == player && e.prop == label);
                let entry = match position {
                    Some(i) => &mut entries[i],
                    None => {
                        entries.push(PropOddsEntry {
                            player,
                            prop: label.to_string(),
                            over: None,
                            under: None,
                        });
                        let last = entries.len() - 1;
                        &mut entries[last]
                    }
                };

                // Legs already quoted by an earlier bookmaker win
                match outcome.name.as_str() {
                    "Over" if entry.over.is_none() => entry.over = Some(leg),
                    "Under" if entry.under.is_none() => entry.under = Some(leg),
                    _ => {}
                }
            }
        }
    }
    entries
}

/// Request quota reported in The Odds API response headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiUsage {
    pub remaining: Option<u64>,
    pub used: Option<u64>,
}

impl ApiUsage {
    fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let count = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
        };
        Self {
            remaining: count("x-requests-remaining"),
            used: count("x-requests-used"),
        }
    }
}

pub struct OddsApiClient {
    api_key: String,
    client: reqwest::Client,
}

impl OddsApiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch NBA games starting within the next `days` days
    pub async fn fetch_events(&self, days: i64) -> Result<Vec<OddsApiEvent>> {
        let url = format!("{}/sports/{}/events", ODDS_API_BASE_URL, SPORT_KEY);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to fetch events from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        let events: Vec<OddsApiEvent> = response
            .json()
            .await
            .context("Failed to parse Odds API events")?;

        let now = Utc::now();
        let horizon = now + chrono::Duration::days(days);
        Ok(events
            .into_iter()
            .filter(|e| e.commence_time > now && e.commence_time <= horizon)
            .collect())
    }

    /// Fetch player prop quotes (decimal odds) for one game
    pub async fn fetch_event_props(
        &self,
        event_id: &str,
        bookmaker: Option<&str>,
    ) -> Result<Vec<PropOddsEntry>> {
        let url = format!(
            "{}/sports/{}/events/{}/odds",
            ODDS_API_BASE_URL, SPORT_KEY, event_id
        );
        let markets = PROP_MARKETS
            .iter()
            .map(|(market, _)| *market)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("regions", "us,eu"),
                ("markets", markets.as_str()),
                ("oddsFormat", "decimal"),
            ])
            .send()
            .await
            .context("Failed to fetch player props from The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        let odds: OddsApiEventOdds = response
            .json()
            .await
            .context("Failed to parse Odds API player props")?;
        let entries = entries_from_event(odds, bookmaker);
        debug!("{} prop entries for event {}", entries.len(), event_id);
        Ok(entries)
    }

    /// Player props for every game in the next `days` days, grouped by player
    pub async fn fetch_prop_book(&self, days: i64, bookmaker: Option<&str>) -> Result<PropOddsBook> {
        let events = self.fetch_events(days).await?;
        info!("Fetching player props for {} games", events.len());

        let mut book = PropOddsBook::new();
        for event in events {
            match self.fetch_event_props(&event.id, bookmaker).await {
                Ok(entries) => {
                    for entry in entries {
                        book.entry(entry.player.clone()).or_default().push(entry);
                    }
                }
                Err(e) => warn!(
                    "Skipping {} @ {}: {:#}",
                    event.away_team, event.home_team, e
                ),
            }
        }
        Ok(book)
    }

    /// Requests left on the API key. The sports listing does not count against the quota.
    pub async fn check_usage(&self) -> Result<ApiUsage> {
        let url = format!("{}/sports", ODDS_API_BASE_URL);

        let response = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to reach The Odds API")?;

        if !response.status().is_success() {
            anyhow::bail!("Odds API returned error: {}", response.status());
        }

        let usage = ApiUsage::from_headers(response.headers());
        debug!(
            "Odds API usage: {:?} used, {:?} remaining",
            usage.used, usage.remaining
        );
        Ok(usage)
    }
}
