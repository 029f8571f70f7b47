use serde::Serialize;
use tracing::warn;

use crate::correlation::{partial_correlation, pearson};
use crate::panel::{Panel, TeamObservation};

pub const TIER_LABELS: [&str; 10] = [
    "0-10%", "10-20%", "20-30%", "30-40%", "40-50%", "50-60%", "60-70%", "70-80%", "80-90%",
    "90-100%",
];

/// Tier index for a pregame probability. Bins are right-closed and the first bin also
/// takes 0; values outside [0, 1] have no tier.
pub fn tier_of(p: f64) -> Option<usize> {
    if !(0.0..=1.0).contains(&p) {
        return None;
    }
    (1..=10).find(|k| p <= f64::from(*k) / 10.0).map(|k| (k - 1) as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCell {
    pub scored_first_td: bool,
    pub got_ball_first: bool,
    pub win_rate: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    pub tier: &'static str,
    pub n: usize,
    /// Non-empty cells ordered by (TD, ball).
    pub cells: Vec<TierCell>,
    /// Win-rate difference in percentage points from the first TD, among teams that
    /// received the opening kickoff.
    pub impact_got_ball: Option<f64>,
    pub impact_no_ball: Option<f64>,
}

impl TierSummary {
    pub fn cell(&self, scored_first_td: bool, got_ball_first: bool) -> Option<&TierCell> {
        self.cells
            .iter()
            .find(|c| c.scored_first_td == scored_first_td && c.got_ball_first == got_ball_first)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierCorrelation {
    pub tier: &'static str,
    pub firsttd_corr: f64,
    pub firsttd_partial_corr: f64,
    pub ball_corr: f64,
    pub ball_partial_corr: f64,
    pub n: usize,
}

fn tier_members(panel: &Panel) -> Vec<Vec<&TeamObservation>> {
    let mut tiers: Vec<Vec<&TeamObservation>> = vec![Vec::new(); TIER_LABELS.len()];
    for obs in panel.observations() {
        match tier_of(obs.pregame_prob) {
            Some(idx) => tiers[idx].push(obs),
            None => warn!(game = %obs.game_id, p = obs.pregame_prob, "pregame probability outside [0, 1]"),
        }
    }
    tiers
}

/// Win rates for each tier and {TD, ball} cell, with the per-tier first-TD impacts.
pub fn tier_summaries(panel: &Panel) -> Vec<TierSummary> {
    tier_members(panel)
        .into_iter()
        .zip(TIER_LABELS)
        .map(|(members, tier)| {
            let cells = tally_cells(&members);
            TierSummary {
                tier,
                n: members.len(),
                impact_got_ball: impact(&cells, true),
                impact_no_ball: impact(&cells, false),
                cells,
            }
        })
        .collect()
}

fn tally_cells(members: &[&TeamObservation]) -> Vec<TierCell> {
    let mut out = Vec::new();
    for scored_first_td in [false, true] {
        for got_ball_first in [false, true] {
            let (count, wins) = members
                .iter()
                .filter(|o| o.scored_first_td == scored_first_td && o.got_ball_first == got_ball_first)
                .fold((0usize, 0usize), |(n, w), o| (n + 1, w + usize::from(o.won)));
            if count > 0 {
                out.push(TierCell {
                    scored_first_td,
                    got_ball_first,
                    win_rate: wins as f64 / count as f64,
                    count,
                });
            }
        }
    }
    out
}

fn impact(cells: &[TierCell], got_ball_first: bool) -> Option<f64> {
    let find = |td: bool| {
        cells
            .iter()
            .find(|c| c.scored_first_td == td && c.got_ball_first == got_ball_first)
    };
    let (base, lift) = (find(false)?, find(true)?);
    Some((lift.win_rate - base.win_rate) * 100.0)
}

/// Within-tier simple and partial correlations, for tiers with at least `min_obs`
/// observations.
pub fn tier_correlations(panel: &Panel, min_obs: usize) -> Vec<TierCorrelation> {
    tier_members(panel)
        .into_iter()
        .zip(TIER_LABELS)
        .filter_map(|(members, tier)| {
            if members.len() < min_obs {
                if !members.is_empty() {
                    warn!(tier, n = members.len(), min_obs, "tier too small for correlations");
                }
                return None;
            }
            let pregame: Vec<f64> = members.iter().map(|o| o.pregame_prob).collect();
            let won: Vec<f64> = members.iter().map(|o| o.won_f64()).collect();
            let td: Vec<f64> = members.iter().map(|o| o.scored_first_td_f64()).collect();
            let ball: Vec<f64> = members.iter().map(|o| o.got_ball_first_f64()).collect();
            Some(TierCorrelation {
                tier,
                firsttd_corr: pearson(&td, &won),
                firsttd_partial_corr: partial_correlation(&td, &won, &[&pregame, &ball]),
                ball_corr: pearson(&ball, &won),
                ball_partial_corr: partial_correlation(&ball, &won, &[&pregame, &td]),
                n: members.len(),
            })
        })
        .collect()
}

/// Smallest and largest empirical first-TD impact (percentage points, split by opening
/// possession) among observations with pregame probability in `[lo, hi]`.
pub fn empirical_impact_range(panel: &Panel, lo: f64, hi: f64) -> Option<(f64, f64)> {
    let members: Vec<&TeamObservation> = panel
        .observations()
        .iter()
        .filter(|o| o.pregame_prob >= lo && o.pregame_prob <= hi)
        .collect();
    let cells = tally_cells(&members);
    let impacts: Vec<f64> = [true, false]
        .into_iter()
        .filter_map(|ball| impact(&cells, ball))
        .collect();
    if impacts.is_empty() {
        return None;
    }
    let min = impacts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = impacts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}
