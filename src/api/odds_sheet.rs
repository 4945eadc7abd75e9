use crate::models::{PropLeg, PropOddsBook, PropOddsEntry};
use crate::utils::ev_calculator::parse_odds_text;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One line of the odds sheet as written by hand. Odds may be decimal, American or fractional.
#[derive(Debug, Deserialize)]
struct SheetRow {
    player: String,
    prop: String,
    #[serde(default)]
    over_line: String,
    #[serde(default)]
    over_odds: String,
    #[serde(default)]
    under_line: String,
    #[serde(default)]
    under_odds: String,
}

fn parse_leg(line: &str, odds: &str, row: usize, side: &str) -> Result<Option<PropLeg>> {
    let (line, odds) = (line.trim(), odds.trim());
    if line.is_empty() && odds.is_empty() {
        return Ok(None);
    }
    if line.is_empty() || odds.is_empty() {
        bail!("Row {}: {} needs both a line and odds", row, side);
    }

    let line: f64 = line
        .replace(',', ".")
        .parse()
        .with_context(|| format!("Row {}: invalid {} line '{}'", row, side, line))?;
    let odds = parse_odds_text(odds)
        .filter(|o| *o > 1.0)
        .with_context(|| format!("Row {}: invalid {} odds '{}'", row, side, odds))?;

    Ok(Some(PropLeg { line, odds }))
}

/// Bookmaker lines typed into a CSV file:
/// `player,prop,over_line,over_odds,under_line,under_odds`
pub struct OddsSheet;

impl OddsSheet {
    pub fn load(path: impl AsRef<Path>) -> Result<PropOddsBook> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open odds sheet {}", path.display()))?;
        let book = Self::from_reader(file)?;
        info!(
            "Loaded odds for {} players from {}",
            book.len(),
            path.display()
        );
        Ok(book)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<PropOddsBook> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut book = PropOddsBook::new();
        for (i, row) in csv_reader.deserialize::<SheetRow>().enumerate() {
            // Header is line 1
            let row_number = i + 2;
            let row = row.with_context(|| format!("Row {}: malformed odds row", row_number))?;
            if row.player.is_empty() || row.prop.is_empty() {
                warn!("Row {}: skipping row without player or prop", row_number);
                continue;
            }

            let entry = PropOddsEntry {
                over: parse_leg(&row.over_line, &row.over_odds, row_number, "over")?,
                under: parse_leg(&row.under_line, &row.under_odds, row_number, "under")?,
                player: row.player,
                prop: row.prop,
            };
            if entry.legs().is_empty() {
                warn!(
                    "Row {}: no odds for {} {}",
                    row_number, entry.player, entry.prop
                );
                continue;
            }
            book.entry(entry.player.clone()).or_default().push(entry);
        }
        Ok(book)
    }
}
