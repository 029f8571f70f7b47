use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AnalysisError, AnalysisResult};
use crate::odds::moneyline_to_probability;

pub const REQUIRED_COLUMNS: &[&str] = &[
    "home_prob",
    "away_prob",
    "first_td_team",
    "winner",
    "opening_possession_team",
    "game_id",
    "season",
    "home_team",
    "away_team",
];

/// One completed game as stored in the unified dataset.
///
/// Only the required columns plus a few optional odds columns are read; any other column
/// in the file is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub season: Option<i32>,
    pub home_team: String,
    pub away_team: String,
    pub home_prob: Option<f64>,
    pub away_prob: Option<f64>,
    pub first_td_team: Option<String>,
    pub winner: Option<String>,
    pub opening_possession_team: Option<String>,
    #[serde(default)]
    pub home_moneyline: Option<f64>,
    #[serde(default)]
    pub away_moneyline: Option<f64>,
    #[serde(default)]
    pub spread_line: Option<f64>,
}

impl GameRecord {
    pub fn home_probability(&self) -> Option<f64> {
        resolve_probability(self.home_prob, self.home_moneyline)
    }

    pub fn away_probability(&self) -> Option<f64> {
        resolve_probability(self.away_prob, self.away_moneyline)
    }

    /// First-TD team, winner and opening possession are all known. Tied games have no
    /// winner and fail this check.
    pub fn has_outcomes(&self) -> bool {
        non_blank(self.first_td_team.as_deref()).is_some()
            && non_blank(self.winner.as_deref()).is_some()
            && non_blank(self.opening_possession_team.as_deref()).is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.has_outcomes() && self.home_probability().is_some() && self.away_probability().is_some()
    }
}

#[derive(Debug, Clone)]
pub struct GameTable {
    pub path: PathBuf,
    pub games: Vec<GameRecord>,
}

impl GameTable {
    pub fn complete_games(&self) -> usize {
        self.games.iter().filter(|g| g.is_complete()).count()
    }
}

pub fn load_games(path: &Path) -> AnalysisResult<GameTable> {
    if !path.exists() {
        return Err(AnalysisError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|err| AnalysisError::Csv {
        path: path.to_path_buf(),
        source: csv::Error::from(err),
    })?;
    let games = read_games(file, path)?;
    Ok(GameTable {
        path: path.to_path_buf(),
        games,
    })
}

/// Parses game rows from any reader. `origin` is only used in error messages.
pub fn read_games<R: std::io::Read>(reader: R, origin: &Path) -> AnalysisResult<Vec<GameRecord>> {
    let csv_err = |source: csv::Error| AnalysisError::Csv {
        path: origin.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();
    check_columns(&headers)?;

    let mut out = Vec::new();
    for row in rdr.deserialize::<GameRecord>() {
        let mut game = row.map_err(csv_err)?;
        discard_invalid_prices(&mut game);
        out.push(game);
    }
    Ok(out)
}

/// Blanks probabilities outside (0, 1) and moneylines inside (-100, 100) so the
/// complete-case rules treat them as missing.
fn discard_invalid_prices(game: &mut GameRecord) {
    let id = game.game_id.as_str();
    reject_unless(id, "home_prob", &mut game.home_prob, is_probability);
    reject_unless(id, "away_prob", &mut game.away_prob, is_probability);
    reject_unless(id, "home_moneyline", &mut game.home_moneyline, is_moneyline);
    reject_unless(id, "away_moneyline", &mut game.away_moneyline, is_moneyline);
}

fn reject_unless(game_id: &str, column: &str, slot: &mut Option<f64>, valid: fn(f64) -> bool) {
    if let Some(value) = slot.filter(|v| !valid(*v)) {
        warn!(game = game_id, column, value, "dropping out-of-range price");
        *slot = None;
    }
}

/// Fails with every missing required column at once.
pub fn check_columns(headers: &StringRecord) -> AnalysisResult<()> {
    let missing = missing_columns(headers, REQUIRED_COLUMNS);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalysisError::Schema { missing })
    }
}

pub fn missing_columns(headers: &StringRecord, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|col| !headers.iter().any(|h| h.trim() == **col))
        .map(|col| col.to_string())
        .collect()
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn is_probability(p: f64) -> bool {
    p > 0.0 && p < 1.0
}

/// American prices have magnitude of at least 100.
fn is_moneyline(price: f64) -> bool {
    price.is_finite() && price.abs() >= 100.0
}

fn resolve_probability(prob: Option<f64>, moneyline: Option<f64>) -> Option<f64> {
    prob.filter(|p| is_probability(*p)).or_else(|| {
        moneyline
            .filter(|m| is_moneyline(*m))
            .map(moneyline_to_probability)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "game_id,season,home_team,away_team,home_prob,away_prob,first_td_team,winner,opening_possession_team";

    fn parse(body: &str) -> AnalysisResult<Vec<GameRecord>> {
        read_games(body.as_bytes(), Path::new("inline.csv"))
    }

    #[test]
    fn reads_rows_and_blank_cells() {
        let raw = format!(
            "{HEADER}\n2023_01_DET_KC,2023,KC,DET,0.78,0.26,DET,DET,KC\n2023_01_X_Y,2023,Y,X,,0.4,Y,,X\n"
        );
        let games = parse(&raw).expect("rows parse");
        assert_eq!(games.len(), 2);
        assert!(games[0].is_complete());
        assert_eq!(games[1].home_prob, None);
        assert_eq!(games[1].winner, None);
        assert!(!games[1].has_outcomes());
    }

    #[test]
    fn schema_error_lists_every_missing_column() {
        let raw = "game_id,home_team,away_team,home_prob\n1,A,B,0.5\n";
        let err = parse(raw).unwrap_err();
        match err {
            AnalysisError::Schema { missing } => {
                assert_eq!(
                    missing,
                    vec![
                        "away_prob",
                        "first_td_team",
                        "winner",
                        "opening_possession_team",
                        "season"
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn moneyline_fills_missing_probability() {
        let raw = format!(
            "{HEADER},home_moneyline,away_moneyline,spread_line\n1,2022,A,B,,,A,A,B,-110,100,2.5\n"
        );
        let games = parse(&raw).expect("rows parse");
        let g = &games[0];
        assert!((g.home_probability().unwrap() - 0.5238).abs() < 1e-4);
        assert_eq!(g.away_probability(), Some(0.5));
        assert!(g.is_complete());
    }

    #[test]
    fn out_of_range_probabilities_count_as_missing() {
        let raw = format!(
            "{HEADER},home_moneyline,away_moneyline\n\
             g1,2023,KC,DET,1.5,-0.2,KC,KC,DET,,\n\
             g2,2023,KC,DET,0,1,KC,KC,DET,-150,130\n"
        );
        let games = parse(&raw).expect("rows parse");
        assert_eq!(games[0].home_prob, None);
        assert_eq!(games[0].away_prob, None);
        assert_eq!(games[0].home_probability(), None);
        assert!(!games[0].is_complete());

        // Boundary probabilities fall back to valid moneylines.
        assert_eq!(games[1].home_probability(), Some(0.6));
        assert!((games[1].away_probability().unwrap() - 100.0 / 230.0).abs() < 1e-12);

        let panel = crate::panel::build_panel(&games).expect("second game survives");
        assert_eq!(panel.len(), 2);
        assert!(panel.observations().iter().all(|o| o.game_id == "g2"));
    }

    #[test]
    fn moneylines_inside_the_even_band_are_rejected() {
        let raw = format!(
            "{HEADER},home_moneyline,away_moneyline\n\
             g1,2023,KC,DET,,,KC,KC,DET,0,50\n\
             g2,2023,KC,DET,,0.45,KC,KC,DET,-99.5,\n"
        );
        let games = parse(&raw).expect("rows parse");
        assert_eq!(games[0].home_moneyline, None);
        assert_eq!(games[0].away_moneyline, None);
        assert_eq!(games[0].home_probability(), None);
        assert_eq!(games[0].away_probability(), None);
        assert_eq!(games[1].home_probability(), None);

        let panel = crate::panel::build_panel(&games).expect("one side survives");
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.observations()[0].team, "DET");
        assert_eq!(panel.observations()[0].pregame_prob, 0.45);
    }

    #[test]
    fn in_memory_records_are_range_checked_too() {
        let game = GameRecord {
            game_id: "g".to_string(),
            season: Some(2023),
            home_team: "KC".to_string(),
            away_team: "DET".to_string(),
            home_prob: Some(1.5),
            away_prob: Some(0.3),
            first_td_team: Some("KC".to_string()),
            winner: Some("KC".to_string()),
            opening_possession_team: Some("KC".to_string()),
            home_moneyline: Some(50.0),
            away_moneyline: None,
            spread_line: None,
        };
        assert_eq!(game.home_probability(), None);
        assert_eq!(game.away_probability(), Some(0.3));
    }

    #[test]
    fn missing_file_is_reported_with_path() {
        let err = load_games(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }
}
