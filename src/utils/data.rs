use crate::utils::slate::SlateRow;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Save any serializable data to a JSON cache file, creating the cache directory if needed
pub fn save_to_cache<T: Serialize + ?Sized>(data: &T, cache_file: impl AsRef<Path>) -> Result<()> {
    let cache_file = cache_file.as_ref();
    if let Some(dir) = cache_file.parent() {
        std::fs::create_dir_all(dir).context("Failed to create cache directory")?;
    }
    let json = serde_json::to_string_pretty(data).context("Failed to serialize cache data")?;
    std::fs::write(cache_file, json)
        .with_context(|| format!("Failed to write cache file {}", cache_file.display()))?;
    Ok(())
}

/// Load data from a JSON cache file
pub fn load_from_cache<T: DeserializeOwned>(cache_file: impl AsRef<Path>) -> Result<T> {
    let cache_file = cache_file.as_ref();
    let json = std::fs::read_to_string(cache_file)
        .with_context(|| format!("Failed to read cache file {}", cache_file.display()))?;
    serde_json::from_str(&json).context("Failed to deserialize cache data")
}

/// Save slate rows to CSV
pub fn save_slate_to_csv(rows: &[SlateRow], filename: impl AsRef<Path>) -> Result<()> {
    let mut writer = csv::Writer::from_path(filename.as_ref()).context("Failed to create CSV file")?;

    writer.write_record([
        "Player",
        "Prop",
        "Side",
        "Line",
        "Odds",
        "Model Probability (%)",
        "Implied Probability (%)",
        "Expected Value",
        "Edge (%)",
        "Kelly (%)",
        "Games",
        "Recommendation",
        "Note",
    ])?;

    let pct = |v: Option<f64>| v.map(|v| format!("{:.1}", v * 100.0)).unwrap_or_default();
    for row in rows {
        writer.write_record([
            row.player.clone(),
            row.prop.clone(),
            row.direction.to_string(),
            row.line.to_string(),
            format!("{:.2}", row.odds),
            pct(row.probability),
            format!("{:.1}", row.implied_probability * 100.0),
            row.expected_value
                .map(|v| format!("{:+.3}", v))
                .unwrap_or_default(),
            row.edge_percent
                .map(|v| format!("{:.1}", v))
                .unwrap_or_default(),
            pct(row.kelly_fraction),
            row.games.to_string(),
            row.recommendation
                .map(|r| r.to_string())
                .unwrap_or_default(),
            row.note.clone().unwrap_or_default(),
        ])?;
    }

    writer.flush().context("Failed to write CSV file")?;
    Ok(())
}
