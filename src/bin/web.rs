use askama::Template;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Local};
use nba_props_ev::api::game_log_store::GameLogStore;
use nba_props_ev::api::nba_stats_api::NbaStatsClient;
use nba_props_ev::config::AppConfig;
use nba_props_ev::evaluation::{EstimationMode, PropEvaluator, PropRequest};
use nba_props_ev::prop_resolver::{PropResolver, PROP_LABELS};
use nba_props_ev::slate::{SlateOptions, SlateRow};
use nba_props_ev::{
    fetch_prop_slate, find_team, load_player_games, stats_client, Direction, LocationFilter,
    SlateData,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Custom filters for formatting
mod filters {
    pub fn format_percent(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.1}%", value * 100.0))
    }

    pub fn opt_percent(value: &Option<f64>) -> ::askama::Result<String> {
        Ok(value
            .map(|v| format!("{:.1}%", v * 100.0))
            .unwrap_or_else(|| "-".to_string()))
    }

    pub fn opt_ev(value: &Option<f64>) -> ::askama::Result<String> {
        Ok(value
            .map(|v| format!("{:+.2}", v))
            .unwrap_or_else(|| "-".to_string()))
    }

    pub fn format_money(value: &f64) -> ::askama::Result<String> {
        Ok(format!("{:.2}", value))
    }
}

/// One evaluation made from the dashboard
#[derive(Debug, Clone)]
struct HistoryEntry {
    timestamp: DateTime<Local>,
    player: String,
    prop: String,
    side: Direction,
    line: f64,
    odds: f64,
    opponent: Option<String>,
    probability: Option<f64>,
    expected_value: Option<f64>,
    /// Expected value of the stake, when one was given
    stake_value: Option<f64>,
}

impl HistoryEntry {
    fn time(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M").to_string()
    }

    fn opponent_label(&self) -> &str {
        self.opponent.as_deref().unwrap_or("-")
    }
}

struct AppState {
    config: AppConfig,
    client: NbaStatsClient,
    store: RwLock<GameLogStore>,
    slate: RwLock<Option<SlateData>>,
    history: RwLock<Vec<HistoryEntry>>,
}

type SharedState = Arc<AppState>;

#[derive(Template)]
#[template(path = "home.html")]
struct HomeTemplate {
    active_page: String,
    season: String,
    generated_at: String,
    value_count: usize,
    rows: Vec<SlateRow>,
    skipped: Vec<SlateRow>,
}

#[derive(Template)]
#[template(path = "evaluate.html")]
struct EvaluateTemplate {
    active_page: String,
    labels: Vec<String>,
    player: String,
    prop: String,
    line: String,
    odds: String,
    side: String,
    location: String,
    opponent: String,
    stake: String,
    monte_carlo: bool,
    report: Option<String>,
}

#[derive(Template)]
#[template(path = "history.html")]
struct HistoryTemplate {
    active_page: String,
    entries: Vec<HistoryEntry>,
}

struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

async fn home(State(state): State<SharedState>) -> impl IntoResponse {
    let slate = state.slate.read().await;

    let data = match slate.as_ref() {
        Some(d) => d.clone(),
        None => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "Slate not loaded").into_response();
        }
    };

    let (rows, skipped): (Vec<SlateRow>, Vec<SlateRow>) =
        data.rows.into_iter().partition(|r| r.note.is_none());
    let template = HomeTemplate {
        active_page: "home".to_string(),
        season: data.season,
        generated_at: data
            .generated_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        value_count: rows.iter().filter(|r| r.is_value_bet()).count(),
        rows,
        skipped,
    };

    HtmlTemplate(template).into_response()
}

/// Query of the evaluation form. Every field is text so an empty input is not a rejection.
#[derive(Debug, Default, Deserialize)]
struct EvaluateQuery {
    player: Option<String>,
    prop: Option<String>,
    line: Option<String>,
    odds: Option<String>,
    side: Option<String>,
    location: Option<String>,
    opponent: Option<String>,
    stake: Option<String>,
    monte_carlo: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn run_evaluation(
    state: &AppState,
    query: &EvaluateQuery,
    player: &str,
    prop: &str,
    line: f64,
) -> anyhow::Result<(String, HistoryEntry)> {
    let odds_text = non_empty(&query.odds).unwrap_or("");
    let odds = nba_props_ev::ev_calculator::parse_odds_text(odds_text)
        .ok_or_else(|| anyhow::anyhow!("Cannot read odds '{}'", odds_text))?;
    let side: Direction = non_empty(&query.side).unwrap_or("over").parse()?;
    let location: LocationFilter = non_empty(&query.location).unwrap_or("all").parse()?;
    let mode = if query.monte_carlo.is_some() {
        EstimationMode::MonteCarlo(state.config.simulation)
    } else {
        EstimationMode::Frequency
    };
    let opponent = match non_empty(&query.opponent) {
        Some(name) => Some(find_team(name).ok_or_else(|| anyhow::anyhow!("Unknown team '{}'", name))?),
        None => None,
    };
    let stake = match non_empty(&query.stake) {
        Some(text) => Some(
            text.replace(',', ".")
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("Invalid stake '{}'", text))?,
        ),
        None => None,
    };

    // Fetch into a copy so other requests are not blocked on the stats API
    let mut local = {
        let store = state.store.read().await;
        match store.find_player(player) {
            Some(found) => store.player_snapshot(&found.id),
            None => GameLogStore::with_players(store.players().to_vec()),
        }
    };
    let info = load_player_games(&state.config, &state.client, &mut local, player, opponent).await?;

    let mut request = PropRequest::new(&info.id, prop, line, odds)
        .player_name(&info.name)
        .direction(side)
        .location(location)
        .season(&state.config.season)
        .season_types(state.config.season_types.clone())
        .mode(mode);
    if let Some(team) = opponent {
        request = request.opponent(team.abbreviation);
    }
    if let Some(stake) = stake {
        request = request.stake(stake);
    }
    let report = PropEvaluator::new(&local).report(&request);
    state.store.write().await.merge(local);

    let entry = HistoryEntry {
        timestamp: Local::now(),
        player: info.name,
        prop: prop.to_string(),
        side,
        line,
        odds,
        opponent: request.opponent.clone(),
        probability: report.probability(),
        expected_value: report.expected_value(),
        stake_value: report
            .evaluation()
            .and_then(|e| e.stake)
            .map(|s| s.expected_value),
    };
    Ok((report.render(), entry))
}

async fn evaluate_page(
    State(state): State<SharedState>,
    Query(query): Query<EvaluateQuery>,
) -> impl IntoResponse {
    let resolver = PropResolver::new();
    let prop = non_empty(&query.prop).unwrap_or(PROP_LABELS[0]).to_string();
    let line = non_empty(&query.line)
        .map(str::to_string)
        .unwrap_or_else(|| resolver.default_line(&prop).to_string());

    let report = match non_empty(&query.player) {
        None => None,
        Some(player) => match line.replace(',', ".").parse::<f64>() {
            Err(_) => Some(format!("Invalid line '{}'", line)),
            Ok(value) => match run_evaluation(&state, &query, player, &prop, value).await {
                Ok((report, entry)) => {
                    state.history.write().await.push(entry);
                    Some(report)
                }
                Err(e) => {
                    error!("Evaluation failed: {:#}", e);
                    Some(format!("Error: {:#}", e))
                }
            },
        },
    };

    let template = EvaluateTemplate {
        active_page: "evaluate".to_string(),
        labels: PROP_LABELS.iter().map(|l| l.to_string()).collect(),
        player: non_empty(&query.player).unwrap_or_default().to_string(),
        prop,
        line,
        odds: non_empty(&query.odds).unwrap_or("1.90").to_string(),
        side: non_empty(&query.side).unwrap_or("over").to_lowercase(),
        location: non_empty(&query.location).unwrap_or("all").to_lowercase(),
        opponent: non_empty(&query.opponent).unwrap_or_default().to_string(),
        stake: non_empty(&query.stake).unwrap_or_default().to_string(),
        monte_carlo: query.monte_carlo.is_some(),
        report,
    };

    HtmlTemplate(template).into_response()
}

async fn history(State(state): State<SharedState>) -> impl IntoResponse {
    let mut entries = state.history.read().await.clone();
    entries.reverse();

    HtmlTemplate(HistoryTemplate {
        active_page: "history".to_string(),
        entries,
    })
    .into_response()
}

async fn clear_history(State(state): State<SharedState>) -> Redirect {
    state.history.write().await.clear();
    Redirect::to("/history")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let odds_sheet = std::env::var("ODDS_SHEET").ok().map(PathBuf::from);
    let options = SlateOptions {
        season: config.season.clone(),
        season_types: config.season_types.clone(),
        location: LocationFilter::All,
        mode: EstimationMode::Frequency,
    };

    println!("Fetching prop slate...");

    // Fetch data on startup
    let (store, slate) = match fetch_prop_slate(&config, odds_sheet.as_deref(), &options).await {
        Ok((store, slate)) => {
            println!("Slate loaded successfully");
            println!("  - {} prop legs evaluated", slate.rows.len());
            println!(
                "  - {} positive EV props",
                slate.rows.iter().filter(|r| r.is_value_bet()).count()
            );
            (store, Some(slate))
        }
        Err(e) => {
            eprintln!("Error fetching slate: {:#}", e);
            eprintln!("Server will start but the slate page will show an error");
            (GameLogStore::default(), None)
        }
    };

    let state = Arc::new(AppState {
        client: stats_client(&config)?,
        store: RwLock::new(store),
        slate: RwLock::new(slate),
        history: RwLock::new(Vec::new()),
        config,
    });

    let addr = state.config.bind_addr.clone();
    info!("Starting web server at http://{}", addr);
    println!("Press Ctrl+C to stop\n");

    let app = Router::new()
        .nest_service("/static", ServeDir::new("static"))
        .route("/", get(home))
        .route("/evaluate", get(evaluate_page))
        .route("/history", get(history))
        .route("/history/clear", post(clear_history))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
