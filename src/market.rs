//! Prediction-market comparison: joins stored Kalshi pregame prices onto the unified
//! games and summarises how they differ from the Vegas-implied probabilities.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::correlation::pearson;
use crate::error::{AnalysisError, AnalysisResult};
use crate::export::write_csv;
use crate::games::{GameRecord, load_games, missing_columns, non_blank};

pub const MERGED_CSV: &str = "nfl_unified_with_kalshi.csv";
pub const SUMMARY_TXT: &str = "kalshi_summary.txt";

pub const MARKET_COLUMNS: &[&str] = &[
    "game_id",
    "kalshi_ticker",
    "pregame_home_prob_kalshi",
    "pregame_away_prob_kalshi",
    "prob_change_home",
    "prob_change_away",
    "data_quality_flag",
];

/// First season with listed Kalshi NFL markets.
const KALSHI_FIRST_SEASON: i32 = 2021;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketRecord {
    pub game_id: String,
    pub kalshi_ticker: Option<String>,
    pub pregame_home_prob_kalshi: Option<f64>,
    pub pregame_away_prob_kalshi: Option<f64>,
    pub prob_change_home: Option<f64>,
    pub prob_change_away: Option<f64>,
    pub data_quality_flag: Option<String>,
}

/// One unified game with its (optional) market columns and the derived comparison fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedGame {
    pub game_id: String,
    pub season: Option<i32>,
    pub home_team: String,
    pub away_team: String,
    pub home_prob: Option<f64>,
    pub away_prob: Option<f64>,
    pub first_td_team: Option<String>,
    pub winner: Option<String>,
    pub opening_possession_team: Option<String>,
    pub kalshi_ticker: Option<String>,
    pub pregame_home_prob_kalshi: Option<f64>,
    pub pregame_away_prob_kalshi: Option<f64>,
    pub prob_change_home: Option<f64>,
    pub prob_change_away: Option<f64>,
    pub data_quality_flag: Option<String>,
    pub kalshi_vs_vegas_home_diff: Option<f64>,
    pub kalshi_vs_vegas_away_diff: Option<f64>,
    pub kalshi_vs_vegas_home_abs_diff: Option<f64>,
    pub kalshi_vs_vegas_away_abs_diff: Option<f64>,
    pub kalshi_total_prob_change: Option<f64>,
    pub has_kalshi_data: u8,
    pub has_complete_kalshi_data: u8,
    pub kalshi_era: u8,
    pub home_scored_first_td: u8,
    pub away_scored_first_td: u8,
}

impl MergedGame {
    pub fn has_kalshi_data(&self) -> bool {
        self.has_kalshi_data == 1
    }

    pub fn has_complete_kalshi_data(&self) -> bool {
        self.has_complete_kalshi_data == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifferenceStats {
    pub games: usize,
    pub home_mean: f64,
    pub home_std: f64,
    pub away_mean: f64,
    pub away_std: f64,
    pub home_abs_mean: f64,
    pub away_abs_mean: f64,
    pub home_corr: f64,
    pub away_corr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbabilityShift {
    pub games: usize,
    pub home_change: f64,
    pub away_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstTdShift {
    pub overall: ProbabilityShift,
    pub total_change: f64,
    pub home_scored_first: Option<ProbabilityShift>,
    pub away_scored_first: Option<ProbabilityShift>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonCoverage {
    pub season: i32,
    pub total_games: usize,
    pub with_kalshi: usize,
    pub complete_kalshi: usize,
    pub kalshi_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub total_games: usize,
    pub with_kalshi: usize,
    pub complete_kalshi: usize,
    pub differences: Option<DifferenceStats>,
    pub first_td: Option<FirstTdShift>,
    pub seasons: Vec<SeasonCoverage>,
}

pub fn load_market(path: &Path) -> AnalysisResult<Vec<MarketRecord>> {
    if !path.exists() {
        return Err(AnalysisError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let csv_err = |source: csv::Error| AnalysisError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|err| csv_err(csv::Error::from(err)))?;
    read_market(file, path)
}

pub fn read_market<R: std::io::Read>(reader: R, origin: &Path) -> AnalysisResult<Vec<MarketRecord>> {
    let csv_err = |source: csv::Error| AnalysisError::Csv {
        path: origin.to_path_buf(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    let missing = missing_columns(&headers, MARKET_COLUMNS);
    if !missing.is_empty() {
        return Err(AnalysisError::Schema { missing });
    }
    rdr.deserialize::<MarketRecord>()
        .map(|row| row.map_err(csv_err))
        .collect()
}

/// Left join on `game_id`: every game is kept, in input order. When the market file has
/// several rows for one game the first one wins.
pub fn merge(games: &[GameRecord], market: &[MarketRecord]) -> Vec<MergedGame> {
    let mut by_game: HashMap<&str, &MarketRecord> = HashMap::new();
    for record in market {
        match by_game.entry(record.game_id.as_str()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(_) => warn!(game = %record.game_id, "duplicate market row ignored"),
        }
    }
    games
        .iter()
        .map(|g| merged_game(g, by_game.get(g.game_id.as_str()).copied()))
        .collect()
}

fn merged_game(game: &GameRecord, market: Option<&MarketRecord>) -> MergedGame {
    let field = |f: fn(&MarketRecord) -> Option<f64>| market.and_then(f);
    let kalshi_home = field(|m| m.pregame_home_prob_kalshi);
    let kalshi_away = field(|m| m.pregame_away_prob_kalshi);
    let change_home = field(|m| m.prob_change_home);
    let change_away = field(|m| m.prob_change_away);
    let ticker = market.and_then(|m| non_blank(m.kalshi_ticker.as_deref()).map(str::to_string));
    let flag = market.and_then(|m| m.data_quality_flag.clone());

    let home_diff = diff(kalshi_home, game.home_prob);
    let away_diff = diff(kalshi_away, game.away_prob);
    let first_td = non_blank(game.first_td_team.as_deref());

    MergedGame {
        game_id: game.game_id.clone(),
        season: game.season,
        home_team: game.home_team.clone(),
        away_team: game.away_team.clone(),
        home_prob: game.home_prob,
        away_prob: game.away_prob,
        first_td_team: game.first_td_team.clone(),
        winner: game.winner.clone(),
        opening_possession_team: game.opening_possession_team.clone(),
        has_kalshi_data: u8::from(ticker.is_some()),
        has_complete_kalshi_data: u8::from(flag.as_deref().map(str::trim) == Some("complete")),
        kalshi_ticker: ticker,
        pregame_home_prob_kalshi: kalshi_home,
        pregame_away_prob_kalshi: kalshi_away,
        prob_change_home: change_home,
        prob_change_away: change_away,
        data_quality_flag: flag,
        kalshi_vs_vegas_home_diff: home_diff,
        kalshi_vs_vegas_away_diff: away_diff,
        kalshi_vs_vegas_home_abs_diff: home_diff.map(f64::abs),
        kalshi_vs_vegas_away_abs_diff: away_diff.map(f64::abs),
        kalshi_total_prob_change: change_home.zip(change_away).map(|(h, a)| h + a),
        kalshi_era: u8::from(game.season.is_some_and(|s| s >= KALSHI_FIRST_SEASON)),
        home_scored_first_td: u8::from(first_td == Some(game.home_team.trim())),
        away_scored_first_td: u8::from(first_td == Some(game.away_team.trim())),
    }
}

fn diff(kalshi: Option<f64>, vegas: Option<f64>) -> Option<f64> {
    Some(kalshi? - vegas?)
}

pub fn summarize(merged: &[MergedGame]) -> MarketSummary {
    let with_kalshi: Vec<&MergedGame> = merged.iter().filter(|g| g.has_kalshi_data()).collect();
    let complete: Vec<&MergedGame> = merged
        .iter()
        .filter(|g| g.has_complete_kalshi_data())
        .collect();

    MarketSummary {
        total_games: merged.len(),
        with_kalshi: with_kalshi.len(),
        complete_kalshi: complete.len(),
        differences: difference_stats(&with_kalshi),
        first_td: first_td_shift(&complete),
        seasons: season_coverage(merged),
    }
}

fn difference_stats(games: &[&MergedGame]) -> Option<DifferenceStats> {
    if games.is_empty() {
        return None;
    }
    let home: Vec<f64> = games.iter().filter_map(|g| g.kalshi_vs_vegas_home_diff).collect();
    let away: Vec<f64> = games.iter().filter_map(|g| g.kalshi_vs_vegas_away_diff).collect();
    let home_abs: Vec<f64> = home.iter().map(|d| d.abs()).collect();
    let away_abs: Vec<f64> = away.iter().map(|d| d.abs()).collect();
    let (vegas_home, kalshi_home): (Vec<f64>, Vec<f64>) = games
        .iter()
        .filter_map(|g| g.home_prob.zip(g.pregame_home_prob_kalshi))
        .unzip();
    let (vegas_away, kalshi_away): (Vec<f64>, Vec<f64>) = games
        .iter()
        .filter_map(|g| g.away_prob.zip(g.pregame_away_prob_kalshi))
        .unzip();

    Some(DifferenceStats {
        games: games.len(),
        home_mean: mean(&home),
        home_std: sample_std(&home),
        away_mean: mean(&away),
        away_std: sample_std(&away),
        home_abs_mean: mean(&home_abs),
        away_abs_mean: mean(&away_abs),
        home_corr: pearson(&vegas_home, &kalshi_home),
        away_corr: pearson(&vegas_away, &kalshi_away),
    })
}

fn shift(games: &[&MergedGame]) -> Option<ProbabilityShift> {
    if games.is_empty() {
        return None;
    }
    let home: Vec<f64> = games.iter().filter_map(|g| g.prob_change_home).collect();
    let away: Vec<f64> = games.iter().filter_map(|g| g.prob_change_away).collect();
    Some(ProbabilityShift {
        games: games.len(),
        home_change: mean(&home),
        away_change: mean(&away),
    })
}

fn first_td_shift(complete: &[&MergedGame]) -> Option<FirstTdShift> {
    let overall = shift(complete)?;
    let totals: Vec<f64> = complete.iter().filter_map(|g| g.kalshi_total_prob_change).collect();
    let home_first: Vec<&MergedGame> = complete
        .iter()
        .copied()
        .filter(|g| g.home_scored_first_td == 1)
        .collect();
    let away_first: Vec<&MergedGame> = complete
        .iter()
        .copied()
        .filter(|g| g.away_scored_first_td == 1)
        .collect();
    Some(FirstTdShift {
        overall,
        total_change: mean(&totals),
        home_scored_first: shift(&home_first),
        away_scored_first: shift(&away_first),
    })
}

fn season_coverage(merged: &[MergedGame]) -> Vec<SeasonCoverage> {
    let mut seasons: BTreeMap<i32, (usize, usize, usize)> = BTreeMap::new();
    for g in merged {
        let Some(season) = g.season else {
            continue;
        };
        let entry = seasons.entry(season).or_default();
        entry.0 += 1;
        entry.1 += usize::from(g.has_kalshi_data);
        entry.2 += usize::from(g.has_complete_kalshi_data);
    }
    seasons
        .into_iter()
        .map(|(season, (total, with, complete))| SeasonCoverage {
            season,
            total_games: total,
            with_kalshi: with,
            complete_kalshi: complete,
            kalshi_pct: (with as f64 / total as f64 * 1000.0).round() / 10.0,
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

pub fn render_summary(summary: &MarketSummary) -> String {
    let pct = |n: usize| {
        if summary.total_games == 0 {
            0.0
        } else {
            n as f64 / summary.total_games as f64 * 100.0
        }
    };
    let mut out = String::new();
    let _ = writeln!(out, "KALSHI VS VEGAS SUMMARY");
    let _ = writeln!(out, "=======================");
    let _ = writeln!(out, "Total games: {}", summary.total_games);
    let _ = writeln!(
        out,
        "Games with Kalshi data: {} ({:.1}%)",
        summary.with_kalshi,
        pct(summary.with_kalshi)
    );
    let _ = writeln!(
        out,
        "Games with complete Kalshi data: {} ({:.1}%)",
        summary.complete_kalshi,
        pct(summary.complete_kalshi)
    );

    let _ = writeln!(out);
    match &summary.differences {
        Some(d) => {
            let _ = writeln!(out, "Probability Differences (Kalshi - Vegas), {} games:", d.games);
            let _ = writeln!(out, "  Home team mean difference: {:.4}", d.home_mean);
            let _ = writeln!(out, "  Home team std difference: {:.4}", d.home_std);
            let _ = writeln!(out, "  Away team mean difference: {:.4}", d.away_mean);
            let _ = writeln!(out, "  Away team std difference: {:.4}", d.away_std);
            let _ = writeln!(out, "  Home team mean abs difference: {:.4}", d.home_abs_mean);
            let _ = writeln!(out, "  Away team mean abs difference: {:.4}", d.away_abs_mean);
            let _ = writeln!(out, "  Home team correlation: {:.4}", d.home_corr);
            let _ = writeln!(out, "  Away team correlation: {:.4}", d.away_corr);
        }
        None => {
            let _ = writeln!(out, "No games with Kalshi data found.");
        }
    }

    let _ = writeln!(out);
    match &summary.first_td {
        Some(f) => {
            let _ = writeln!(out, "First TD Impact on Kalshi Odds ({} games):", f.overall.games);
            let _ = writeln!(out, "  Home team avg probability change: {:.4}", f.overall.home_change);
            let _ = writeln!(out, "  Away team avg probability change: {:.4}", f.overall.away_change);
            let _ = writeln!(out, "  Total probability change: {:.4}", f.total_change);
            for (label, side) in [
                ("Home", &f.home_scored_first),
                ("Away", &f.away_scored_first),
            ] {
                if let Some(s) = side {
                    let _ = writeln!(out, "  When {label} Team Scored First TD ({} games):", s.games);
                    let _ = writeln!(out, "    Home probability change: {:.4}", s.home_change);
                    let _ = writeln!(out, "    Away probability change: {:.4}", s.away_change);
                }
            }
        }
        None => {
            let _ = writeln!(out, "No games with complete Kalshi data found.");
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Season Breakdown:");
    let _ = writeln!(
        out,
        "{:<8}{:>12}{:>12}{:>16}{:>12}",
        "season", "Total_Games", "With_Kalshi", "Complete_Kalshi", "Kalshi_Pct"
    );
    for s in &summary.seasons {
        let _ = writeln!(
            out,
            "{:<8}{:>12}{:>12}{:>16}{:>12.1}",
            s.season, s.total_games, s.with_kalshi, s.complete_kalshi, s.kalshi_pct
        );
    }
    out
}

#[derive(Debug)]
pub struct MarketOutputs {
    pub merged_path: PathBuf,
    pub summary_path: PathBuf,
    pub summary: MarketSummary,
}

/// Loads both inputs, merges them and writes the merged CSV plus the text summary.
pub fn run_market_comparison(games: &Path, market: &Path, output_dir: &Path) -> Result<MarketOutputs> {
    let table = load_games(games)?;
    let market_rows = load_market(market)?;
    info!(
        games = table.games.len(),
        market_rows = market_rows.len(),
        "loaded market comparison inputs"
    );

    let merged = merge(&table.games, &market_rows);
    let summary = summarize(&merged);
    info!(
        with_kalshi = summary.with_kalshi,
        complete = summary.complete_kalshi,
        "merged market data"
    );
    if summary.with_kalshi == 0 {
        warn!("no games with Kalshi data found");
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("create output directory {}", output_dir.display()))?;
    let merged_path = output_dir.join(MERGED_CSV);
    write_csv(&merged_path, &merged)?;
    let summary_path = output_dir.join(SUMMARY_TXT);
    fs::write(&summary_path, render_summary(&summary))
        .with_context(|| format!("write {}", summary_path.display()))?;

    Ok(MarketOutputs {
        merged_path,
        summary_path,
        summary,
    })
}
