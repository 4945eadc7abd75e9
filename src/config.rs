use crate::api::nba_stats_api::NBA_STATS_BASE_URL;
use crate::models::{current_season, validate_season, SeasonType};
use crate::utils::monte_carlo::SimulationConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub nba_stats_base_url: String,
    pub odds_api_key: Option<String>,
    pub cache_dir: PathBuf,
    pub use_cache: bool,
    pub season: String,
    pub season_types: Vec<SeasonType>,
    pub simulation: SimulationConfig,
    pub request_timeout: Duration,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nba_stats_base_url: NBA_STATS_BASE_URL.to_string(),
            odds_api_key: None,
            cache_dir: PathBuf::from("cache"),
            use_cache: false,
            season: current_season(chrono::Local::now().date_naive()),
            season_types: vec![SeasonType::RegularSeason],
            simulation: SimulationConfig::default(),
            request_timeout: Duration::from_secs(60),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Comma separated season types, e.g. "Regular Season,Playoffs"
pub fn parse_season_types(text: &str) -> Result<Vec<SeasonType>> {
    let mut types: Vec<SeasonType> = Vec::new();
    for name in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let season_type = SeasonType::from_str(name)?;
        if !types.contains(&season_type) {
            types.push(season_type);
        }
    }
    if types.is_empty() {
        anyhow::bail!("no season types in '{}'", text);
    }
    Ok(types)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = get("NBA_STATS_BASE_URL") {
            config.nba_stats_base_url = url.trim_end_matches('/').to_string();
        }
        config.odds_api_key = get("ODDS_API_KEY").filter(|k| !k.trim().is_empty());
        if let Some(dir) = get("CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(flag) = get("USE_CACHE") {
            config.use_cache = matches!(flag.trim(), "1" | "true" | "yes");
        }
        if let Some(season) = get("NBA_SEASON") {
            validate_season(&season)?;
            config.season = season;
        }
        if let Some(types) = get("NBA_SEASON_TYPES") {
            config.season_types =
                parse_season_types(&types).context("Invalid NBA_SEASON_TYPES")?;
        }
        if let Some(draws) = get("MC_DRAWS") {
            config.simulation.draws = draws.trim().parse().context("Invalid MC_DRAWS")?;
        }
        if let Some(seed) = get("MC_SEED") {
            config.simulation.seed = seed.trim().parse().context("Invalid MC_SEED")?;
        }
        if let Some(secs) = get("REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().context("Invalid REQUEST_TIMEOUT_SECS")?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        Ok(config)
    }

    pub fn cache_file(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.nba_stats_base_url, NBA_STATS_BASE_URL);
        assert_eq!(config.simulation, SimulationConfig::default());
        assert_eq!(config.season_types, vec![SeasonType::RegularSeason]);
        assert!(config.odds_api_key.is_none());
        assert!(!config.use_cache);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NBA_SEASON", "2023-24"),
            ("NBA_SEASON_TYPES", "Regular Season, Playoffs"),
            ("MC_DRAWS", "5000"),
            ("USE_CACHE", "1"),
            ("CACHE_DIR", "/tmp/props"),
        ]))
        .unwrap();
        assert_eq!(config.season, "2023-24");
        assert_eq!(
            config.season_types,
            vec![SeasonType::RegularSeason, SeasonType::Playoffs]
        );
        assert_eq!(config.simulation.draws, 5000);
        assert!(config.use_cache);
        assert_eq!(config.cache_file("logs.json"), PathBuf::from("/tmp/props/logs.json"));
    }

    #[test]
    fn test_repeated_season_types_are_dropped() {
        assert_eq!(
            parse_season_types("Regular Season,Playoffs,Regular").unwrap(),
            vec![SeasonType::RegularSeason, SeasonType::Playoffs]
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(AppConfig::from_lookup(lookup(&[("NBA_SEASON", "2024")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("MC_SEED", "abc")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("NBA_SEASON_TYPES", " , ")])).is_err());
    }
}
