use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::games::GameRecord;
use crate::logit::sigmoid;
use crate::odds::moneyline_to_probability;

const TEAMS: [&str; 32] = [
    "ARI", "ATL", "BAL", "BUF", "CAR", "CHI", "CIN", "CLE", "DAL", "DEN", "DET", "GB", "HOU",
    "IND", "JAX", "KC", "LA", "LAC", "LV", "MIA", "MIN", "NE", "NO", "NYG", "NYJ", "PHI", "PIT",
    "SEA", "SF", "TB", "TEN", "WAS",
];

const HOME_EDGE: f64 = 0.15;
/// Half the bookmaker margin, added to each side's fair probability.
const HALF_VIG: f64 = 0.0225;
const FIRST_TD_LOG_ODDS: f64 = 0.8;
const POSSESSION_LOG_ODDS: f64 = 0.3;
const TIE_RATE: f64 = 0.003;

/// Deterministic unified-game rows for offline runs and tests.
///
/// Pregame probabilities come from rounded moneylines so they carry vig the way real
/// closing lines do. Opening possession is a fair coin; the first TD leans toward the
/// stronger side and the side receiving the kickoff; the winner leans toward the stronger
/// side and the first-TD scorer.
pub fn generate_games(n: usize, seed: u64) -> Vec<GameRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|i| synth_game(i, &mut rng)).collect()
}

fn synth_game(index: usize, rng: &mut impl Rng) -> GameRecord {
    let season = 2020 + (index % 5) as i32;
    let week = 1 + (index / 5) % 18;
    let home_idx = rng.gen_range(0..TEAMS.len());
    let away_idx = (home_idx + rng.gen_range(1..TEAMS.len())) % TEAMS.len();
    let (home, away) = (TEAMS[home_idx], TEAMS[away_idx]);

    let strength = rng.gen_range(-2.2..2.2) + HOME_EDGE;
    let fair_home = sigmoid(strength);
    let home_line = moneyline(fair_home + HALF_VIG);
    let away_line = moneyline(1.0 - fair_home + HALF_VIG);

    let home_ball = rng.gen_bool(0.5);
    let side = |flag: bool| if flag { 1.0 } else { -1.0 };
    let home_first_td = rng.gen_bool(sigmoid(0.9 * strength + POSSESSION_LOG_ODDS * side(home_ball)));
    let home_wins = rng.gen_bool(sigmoid(strength + FIRST_TD_LOG_ODDS * side(home_first_td)));
    let tie = rng.gen_bool(TIE_RATE);

    let pick = |flag: bool| (if flag { home } else { away }).to_string();
    GameRecord {
        game_id: format!("{season}_{week:02}_{away}_{home}"),
        season: Some(season),
        home_team: home.to_string(),
        away_team: away.to_string(),
        home_prob: Some(moneyline_to_probability(home_line)),
        away_prob: Some(moneyline_to_probability(away_line)),
        first_td_team: Some(pick(home_first_td)),
        winner: (!tie).then(|| pick(home_wins)),
        opening_possession_team: Some(pick(home_ball)),
        home_moneyline: Some(home_line),
        away_moneyline: Some(away_line),
        spread_line: None,
    }
}

/// American price for an implied probability, rounded to the nearest dollar.
fn moneyline(p: f64) -> f64 {
    let p = p.clamp(0.01, 0.99);
    let price = if p >= 0.5 {
        -100.0 * p / (1.0 - p)
    } else {
        100.0 * (1.0 - p) / p
    };
    price.round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_games() {
        assert_eq!(generate_games(50, 7), generate_games(50, 7));
        assert_ne!(generate_games(50, 7), generate_games(50, 8));
    }

    #[test]
    fn rows_are_internally_consistent() {
        for g in generate_games(200, 3) {
            assert_ne!(g.home_team, g.away_team);
            let teams = [g.home_team.as_str(), g.away_team.as_str()];
            assert!(teams.contains(&g.first_td_team.as_deref().unwrap()));
            assert!(teams.contains(&g.opening_possession_team.as_deref().unwrap()));
            let (h, a) = (g.home_prob.unwrap(), g.away_prob.unwrap());
            assert!(h > 0.0 && h < 1.0 && a > 0.0 && a < 1.0);
            assert!(h + a > 1.0, "prices should carry vig");
        }
    }
}
