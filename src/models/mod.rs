use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PropError;

/// Phase of the NBA calendar a game belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeasonType {
    #[serde(rename = "Regular Season")]
    RegularSeason,
    #[serde(rename = "Playoffs")]
    Playoffs,
    #[serde(rename = "Pre Season")]
    PreSeason,
    #[serde(rename = "All Star")]
    AllStar,
}

impl SeasonType {
    pub const ALL: [SeasonType; 4] = [
        SeasonType::RegularSeason,
        SeasonType::Playoffs,
        SeasonType::PreSeason,
        SeasonType::AllStar,
    ];

    /// Value expected by the stats API `SeasonType` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::RegularSeason => "Regular Season",
            SeasonType::Playoffs => "Playoffs",
            SeasonType::PreSeason => "Pre Season",
            SeasonType::AllStar => "All Star",
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonType {
    type Err = PropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "regularseason" | "regular" => Ok(SeasonType::RegularSeason),
            "playoffs" | "playoff" => Ok(SeasonType::Playoffs),
            "preseason" => Ok(SeasonType::PreSeason),
            "allstar" => Ok(SeasonType::AllStar),
            _ => Err(PropError::InvalidInput(format!("unknown season type '{}'", s))),
        }
    }
}

/// Where a game was played from the player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Home,
    Away,
}

impl Location {
    /// Derive the location from a box-score matchup such as "BOS vs. LAL" or "BOS @ LAL"
    pub fn from_matchup(matchup: &str) -> Option<Location> {
        if matchup.contains('@') {
            Some(Location::Away)
        } else if matchup.contains("vs") {
            Some(Location::Home)
        } else {
            None
        }
    }
}

/// Restriction of the analysis to home games, away games, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LocationFilter {
    #[default]
    All,
    HomeOnly,
    AwayOnly,
}

impl LocationFilter {
    pub fn accepts(&self, location: Location) -> bool {
        match self {
            LocationFilter::All => true,
            LocationFilter::HomeOnly => location == Location::Home,
            LocationFilter::AwayOnly => location == Location::Away,
        }
    }
}

impl fmt::Display for LocationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LocationFilter::All => "All games",
            LocationFilter::HomeOnly => "Home only",
            LocationFilter::AwayOnly => "Away only",
        })
    }
}

impl FromStr for LocationFilter {
    type Err = PropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" | "both" => Ok(LocationFilter::All),
            "home" | "home-only" | "home_only" => Ok(LocationFilter::HomeOnly),
            "away" | "away-only" | "away_only" => Ok(LocationFilter::AwayOnly),
            _ => Err(PropError::InvalidInput(format!(
                "unknown location filter '{}'",
                s
            ))),
        }
    }
}

/// Side of a threshold bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Over,
    Under,
}

impl Direction {
    /// Strict comparison: a value equal to the line never satisfies either side
    pub fn is_satisfied(&self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Over => value > threshold,
            Direction::Under => value < threshold,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Over => "Over",
            Direction::Under => "Under",
        })
    }
}

impl FromStr for Direction {
    type Err = PropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "over" | "o" | "más" | "mas" => Ok(Direction::Over),
            "under" | "u" | "menos" => Ok(Direction::Under),
            _ => Err(PropError::InvalidInput(format!("unknown direction '{}'", s))),
        }
    }
}

/// One row of a player's per-game box score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub game_date: String,
    pub matchup: String,
    pub location: Location,
    pub season: String,
    pub season_type: SeasonType,
    /// Numeric columns keyed by their stats API name (PTS, AST, FG_PCT, ...).
    /// `None` means the upstream cell was empty or not a number.
    pub stats: BTreeMap<String, Option<f64>>,
}

impl GameRecord {
    pub fn has_field(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied().flatten()
    }

    /// Opponent abbreviation, the last token of "BOS vs. MIA" or "BOS @ MIA"
    pub fn opponent(&self) -> Option<&str> {
        self.matchup
            .split_whitespace()
            .last()
            .filter(|team| !team.contains('@') && !team.starts_with("vs"))
    }
}

/// A player as listed by the league dashboard endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub team: String,
}

/// An NBA franchise with its stats API id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NbaTeam {
    pub abbreviation: &'static str,
    pub name: &'static str,
    pub id: &'static str,
}

const fn team(abbreviation: &'static str, name: &'static str, id: &'static str) -> NbaTeam {
    NbaTeam {
        abbreviation,
        name,
        id,
    }
}

pub const NBA_TEAMS: [NbaTeam; 30] = [
    team("ATL", "Atlanta Hawks", "1610612737"),
    team("BOS", "Boston Celtics", "1610612738"),
    team("BKN", "Brooklyn Nets", "1610612751"),
    team("CHA", "Charlotte Hornets", "1610612766"),
    team("CHI", "Chicago Bulls", "1610612741"),
    team("CLE", "Cleveland Cavaliers", "1610612739"),
    team("DAL", "Dallas Mavericks", "1610612742"),
    team("DEN", "Denver Nuggets", "1610612743"),
    team("DET", "Detroit Pistons", "1610612765"),
    team("GSW", "Golden State Warriors", "1610612744"),
    team("HOU", "Houston Rockets", "1610612745"),
    team("IND", "Indiana Pacers", "1610612754"),
    team("LAC", "Los Angeles Clippers", "1610612746"),
    team("LAL", "Los Angeles Lakers", "1610612747"),
    team("MEM", "Memphis Grizzlies", "1610612763"),
    team("MIA", "Miami Heat", "1610612748"),
    team("MIL", "Milwaukee Bucks", "1610612749"),
    team("MIN", "Minnesota Timberwolves", "1610612750"),
    team("NOP", "New Orleans Pelicans", "1610612740"),
    team("NYK", "New York Knicks", "1610612752"),
    team("OKC", "Oklahoma City Thunder", "1610612760"),
    team("ORL", "Orlando Magic", "1610612753"),
    team("PHI", "Philadelphia 76ers", "1610612755"),
    team("PHX", "Phoenix Suns", "1610612756"),
    team("POR", "Portland Trail Blazers", "1610612757"),
    team("SAC", "Sacramento Kings", "1610612758"),
    team("SAS", "San Antonio Spurs", "1610612759"),
    team("TOR", "Toronto Raptors", "1610612761"),
    team("UTA", "Utah Jazz", "1610612762"),
    team("WAS", "Washington Wizards", "1610612764"),
];

/// Look a team up by abbreviation ("MIA"), full name ("Miami Heat") or nickname ("Heat")
pub fn find_team(text: &str) -> Option<&'static NbaTeam> {
    let key = text.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    NBA_TEAMS.iter().find(|t| {
        t.abbreviation.eq_ignore_ascii_case(&key)
            || t.name.to_lowercase() == key
            || t.name.to_lowercase().ends_with(&format!(" {}", key))
    })
}

/// Over or under quote for a single line
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropLeg {
    pub line: f64,
    pub odds: f64,
}

/// Bookmaker quote for one prop of one player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropOddsEntry {
    pub player: String,
    pub prop: String,
    pub over: Option<PropLeg>,
    pub under: Option<PropLeg>,
}

impl PropOddsEntry {
    /// Present legs with the direction they quote
    pub fn legs(&self) -> Vec<(Direction, PropLeg)> {
        let mut legs = Vec::with_capacity(2);
        if let Some(over) = self.over {
            legs.push((Direction::Over, over));
        }
        if let Some(under) = self.under {
            legs.push((Direction::Under, under));
        }
        legs
    }
}

/// Odds grouped by player name
pub type PropOddsBook = BTreeMap<String, Vec<PropOddsEntry>>;

/// Season containing the given date, e.g. "2024-25" for any date from July 2024 to June 2025
pub fn current_season(today: NaiveDate) -> String {
    let year = today.year();
    let start = if today.month() >= 7 { year } else { year - 1 };
    format!("{}-{:02}", start, (start + 1) % 100)
}

/// Check a season string has the `YYYY-YY` shape and consecutive years
pub fn validate_season(season: &str) -> Result<(), PropError> {
    let invalid = || PropError::InvalidInput(format!("season '{}' must look like YYYY-YY", season));
    let (start, end) = season.split_once('-').ok_or_else(invalid)?;
    if start.len() != 4 || end.len() != 2 {
        return Err(invalid());
    }
    let start: i32 = start.parse().map_err(|_| invalid())?;
    let end: i32 = end.parse().map_err(|_| invalid())?;
    if (start + 1) % 100 != end {
        return Err(invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_season() {
        let oct = NaiveDate::from_ymd_opt(2024, 10, 22).unwrap();
        assert_eq!(current_season(oct), "2024-25");
        let feb = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(current_season(feb), "2024-25");
        let century = NaiveDate::from_ymd_opt(2099, 12, 1).unwrap();
        assert_eq!(current_season(century), "2099-00");
    }

    #[test]
    fn test_validate_season() {
        assert!(validate_season("2023-24").is_ok());
        assert!(validate_season("2023-25").is_err());
        assert!(validate_season("23-24").is_err());
        assert!(validate_season("2023/24").is_err());
    }

    #[test]
    fn test_location_from_matchup() {
        assert_eq!(Location::from_matchup("BOS vs. LAL"), Some(Location::Home));
        assert_eq!(Location::from_matchup("BOS @ LAL"), Some(Location::Away));
        assert_eq!(Location::from_matchup("BOS LAL"), None);
    }

    #[test]
    fn test_season_type_parsing() {
        assert_eq!(
            "Regular Season".parse::<SeasonType>().unwrap(),
            SeasonType::RegularSeason
        );
        assert_eq!("playoffs".parse::<SeasonType>().unwrap(), SeasonType::Playoffs);
        assert_eq!("Pre-Season".parse::<SeasonType>().unwrap(), SeasonType::PreSeason);
        assert!("Summer League".parse::<SeasonType>().is_err());
    }

    #[test]
    fn test_direction_ties_satisfy_neither() {
        assert!(!Direction::Over.is_satisfied(30.0, 30.0));
        assert!(!Direction::Under.is_satisfied(30.0, 30.0));
        assert!(Direction::Over.is_satisfied(30.5, 30.0));
        assert!(Direction::Under.is_satisfied(29.5, 30.0));
    }

    #[test]
    fn test_parse_direction_and_location() {
        assert_eq!("Under".parse::<Direction>().unwrap(), Direction::Under);
        assert_eq!("más".parse::<Direction>().unwrap(), Direction::Over);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!("home".parse::<LocationFilter>().unwrap(), LocationFilter::HomeOnly);
        assert_eq!("".parse::<LocationFilter>().unwrap(), LocationFilter::All);
    }

    #[test]
    fn test_find_team() {
        assert_eq!(find_team("mia").map(|t| t.id), Some("1610612748"));
        assert_eq!(find_team("Los Angeles Lakers").map(|t| t.abbreviation), Some("LAL"));
        assert_eq!(find_team("Trail Blazers").map(|t| t.abbreviation), Some("POR"));
        assert!(find_team("Seattle").is_none());
        assert!(find_team(" ").is_none());
    }

    #[test]
    fn test_record_opponent() {
        let mut record = GameRecord {
            game_id: "0022400061".to_string(),
            game_date: "OCT 22, 2024".to_string(),
            matchup: "BOS vs. NYK".to_string(),
            location: Location::Home,
            season: "2024-25".to_string(),
            season_type: SeasonType::RegularSeason,
            stats: BTreeMap::new(),
        };
        assert_eq!(record.opponent(), Some("NYK"));
        record.matchup = "BOS @ WAS".to_string();
        assert_eq!(record.opponent(), Some("WAS"));
        record.matchup = String::new();
        assert_eq!(record.opponent(), None);
    }
}
