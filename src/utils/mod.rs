pub mod data;
pub mod ev_calculator;
pub mod evaluation;
pub mod monte_carlo;
pub mod player_match;
pub mod probability;
pub mod prop_resolver;
pub mod retry;
pub mod slate;
