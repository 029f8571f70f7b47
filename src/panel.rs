use serde::Serialize;

use crate::error::{AnalysisError, AnalysisResult};
use crate::games::{GameRecord, non_blank};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Home,
    Away,
}

/// One (game, team) row of the modeling panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamObservation {
    pub game_id: String,
    pub season: Option<i32>,
    pub team: String,
    pub side: Side,
    pub pregame_prob: f64,
    pub scored_first_td: bool,
    pub won: bool,
    pub got_ball_first: bool,
}

impl TeamObservation {
    pub fn scored_first_td_f64(&self) -> f64 {
        indicator(self.scored_first_td)
    }

    pub fn won_f64(&self) -> f64 {
        indicator(self.won)
    }

    pub fn got_ball_first_f64(&self) -> f64 {
        indicator(self.got_ball_first)
    }
}

/// Immutable team-game panel: all home-keyed rows first, then all away-keyed rows.
#[derive(Debug, Clone)]
pub struct Panel {
    observations: Vec<TeamObservation>,
    games_used: usize,
}

impl Panel {
    pub fn observations(&self) -> &[TeamObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Games that contributed at least one observation.
    pub fn games_used(&self) -> usize {
        self.games_used
    }

    pub fn pregame(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.pregame_prob).collect()
    }

    pub fn won(&self) -> Vec<f64> {
        self.observations.iter().map(TeamObservation::won_f64).collect()
    }

    pub fn scored_first_td(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(TeamObservation::scored_first_td_f64)
            .collect()
    }

    pub fn got_ball_first(&self) -> Vec<f64> {
        self.observations
            .iter()
            .map(TeamObservation::got_ball_first_f64)
            .collect()
    }
}

pub fn build_panel(games: &[GameRecord]) -> AnalysisResult<Panel> {
    let usable: Vec<&GameRecord> = games.iter().filter(|g| g.has_outcomes()).collect();

    let home = usable
        .iter()
        .map(|g| observation(g, Side::Home))
        .collect::<Vec<_>>();
    let away = usable
        .iter()
        .map(|g| observation(g, Side::Away))
        .collect::<Vec<_>>();

    let observations: Vec<TeamObservation> = home.into_iter().chain(away).flatten().collect();
    if observations.is_empty() {
        return Err(AnalysisError::EmptyPanel);
    }

    let games_used = usable
        .iter()
        .filter(|g| g.home_probability().is_some() || g.away_probability().is_some())
        .count();
    Ok(Panel {
        observations,
        games_used,
    })
}

/// `None` when the side's pregame probability is missing.
fn observation(game: &GameRecord, side: Side) -> Option<TeamObservation> {
    let (team, prob) = match side {
        Side::Home => (game.home_team.trim(), game.home_probability()?),
        Side::Away => (game.away_team.trim(), game.away_probability()?),
    };
    let is_team = |value: Option<&String>| non_blank(value.map(String::as_str)) == Some(team);

    Some(TeamObservation {
        game_id: game.game_id.clone(),
        season: game.season,
        team: team.to_string(),
        side,
        pregame_prob: prob,
        scored_first_td: is_team(game.first_td_team.as_ref()),
        won: is_team(game.winner.as_ref()),
        got_ball_first: is_team(game.opening_possession_team.as_ref()),
    })
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn game(id: &str, home_prob: Option<f64>, first_td: &str, winner: &str, ball: &str) -> GameRecord {
        GameRecord {
            game_id: id.to_string(),
            season: Some(2023),
            home_team: "KC".to_string(),
            away_team: "DET".to_string(),
            home_prob,
            away_prob: Some(0.3),
            first_td_team: Some(first_td.to_string()),
            winner: (!winner.is_empty()).then(|| winner.to_string()),
            opening_possession_team: Some(ball.to_string()),
            home_moneyline: None,
            away_moneyline: None,
            spread_line: None,
        }
    }

    #[test]
    fn two_rows_per_game_home_first() {
        let games = vec![
            game("g1", Some(0.7), "KC", "KC", "DET"),
            game("g2", Some(0.6), "DET", "DET", "KC"),
        ];
        let panel = build_panel(&games).unwrap();
        assert_eq!(panel.len(), 4);
        let sides: Vec<Side> = panel.observations().iter().map(|o| o.side).collect();
        assert_eq!(sides, vec![Side::Home, Side::Home, Side::Away, Side::Away]);
        assert_eq!(panel.games_used(), 2);
    }

    #[test]
    fn pairs_are_complementary() {
        let games = vec![
            game("g1", Some(0.7), "KC", "KC", "DET"),
            game("g2", Some(0.6), "DET", "DET", "KC"),
            game("g3", Some(0.5), "DET", "KC", "DET"),
        ];
        let panel = build_panel(&games).unwrap();
        let mut by_game: HashMap<&str, Vec<&TeamObservation>> = HashMap::new();
        for obs in panel.observations() {
            by_game.entry(obs.game_id.as_str()).or_default().push(obs);
        }
        for (_, pair) in by_game {
            assert_eq!(pair.len(), 2);
            let td: f64 = pair.iter().map(|o| o.scored_first_td_f64()).sum();
            let ball: f64 = pair.iter().map(|o| o.got_ball_first_f64()).sum();
            let won: f64 = pair.iter().map(|o| o.won_f64()).sum();
            assert_eq!(td, 1.0);
            assert_eq!(ball, 1.0);
            assert_eq!(won, 1.0);
        }
    }

    #[test]
    fn missing_probability_drops_only_that_side() {
        let games = vec![game("g1", None, "KC", "KC", "DET")];
        let panel = build_panel(&games).unwrap();
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.observations()[0].team, "DET");
    }

    #[test]
    fn tied_games_are_excluded() {
        let games = vec![game("tie", Some(0.5), "KC", "", "DET")];
        assert!(matches!(build_panel(&games), Err(AnalysisError::EmptyPanel)));
    }
}
