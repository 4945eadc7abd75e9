pub mod game_log_store;
pub mod nba_stats_api;
pub mod odds_api;
pub mod odds_sheet;
