use approx::assert_abs_diff_eq;

use first_td_impact::config::AnalysisSettings;
use first_td_impact::correlation::{first_order_partial, partial_correlation, pearson};
use first_td_impact::effects::marginal_effects;
use first_td_impact::export::write_marginal_effects;
use first_td_impact::games::GameRecord;
use first_td_impact::models::{ModelSpec, SCORED_FIRST_TD, fit_model, fit_suite};
use first_td_impact::panel::build_panel;
use first_td_impact::synthetic::generate_games;
use first_td_impact::{AnalysisError, FitFailure};

/// Team A (0.70) scores first and wins every game; team B (0.30) never does.
fn dominant_team_games() -> Vec<GameRecord> {
    (0..4)
        .map(|i| {
            let a_home = i % 2 == 0;
            let (home, away) = if a_home { ("AAA", "BBB") } else { ("BBB", "AAA") };
            let (home_prob, away_prob) = if a_home { (0.70, 0.30) } else { (0.30, 0.70) };
            GameRecord {
                game_id: format!("2023_0{}_{away}_{home}", i + 1),
                season: Some(2023),
                home_team: home.to_string(),
                away_team: away.to_string(),
                home_prob: Some(home_prob),
                away_prob: Some(away_prob),
                first_td_team: Some("AAA".to_string()),
                winner: Some("AAA".to_string()),
                opening_possession_team: Some(if i < 2 { "AAA" } else { "BBB" }.to_string()),
                home_moneyline: None,
                away_moneyline: None,
                spread_line: None,
            }
        })
        .collect()
}

#[test]
fn perfect_separation_yields_large_first_td_coefficient() {
    let panel = build_panel(&dominant_team_games()).expect("panel");
    assert_eq!(panel.len(), 8);

    let basic = fit_model(&panel, ModelSpec::Basic, AnalysisSettings::default().logit_options())
        .expect("separation is flagged, not fatal");
    assert!(basic.fit.perfect_separation);
    let td = basic
        .fit
        .coefficient(SCORED_FIRST_TD)
        .expect("coefficient present")
        .estimate;
    assert!(td > 10.0, "first TD coefficient {td} should be large");

    let r = pearson(&panel.scored_first_td(), &panel.won());
    assert_eq!(r, 1.0);
}

#[test]
fn rank_deficient_design_without_separation_is_fatal() {
    // Pregame and first TD move together but the winner does not follow either.
    let mut games = dominant_team_games();
    games[0].winner = Some("BBB".to_string());
    games[3].winner = Some("BBB".to_string());
    let panel = build_panel(&games).expect("panel");

    let err = fit_model(&panel, ModelSpec::Basic, AnalysisSettings::default().logit_options())
        .unwrap_err();
    match err {
        AnalysisError::ModelFit { model, reason } => {
            assert_eq!(model, "Model 1 (Basic)");
            assert!(matches!(reason, FitFailure::Singular { rank: 2, columns: 3 }));
        }
        other => panic!("expected a model-fit failure, got {other}"),
    }
}

#[test]
fn three_point_grid_exports_three_finite_rows() {
    let panel = build_panel(&generate_games(900, 4)).expect("panel");
    let suite = fit_suite(&panel, AnalysisSettings::default().logit_options()).expect("fit");
    let rows = marginal_effects(&suite, &[0.20, 0.50, 0.80]).expect("valid grid");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("first_td_marginal_effects.csv");
    write_marginal_effects(&path, &rows).expect("export");

    let mut rdr = csv::Reader::from_path(&path).expect("readable");
    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.expect("record")).collect();
    assert_eq!(records.len(), 3);
    for (record, expected) in records.iter().zip([0.20, 0.50, 0.80]) {
        let p: f64 = record[0].parse().expect("pregame_prob");
        assert_abs_diff_eq!(p, expected, epsilon = 1e-12);
        for col in 1..4 {
            let v: f64 = record[col].parse().expect("numeric effect");
            assert!(v.is_finite());
        }
    }
}

#[test]
fn grid_outside_unit_interval_is_rejected() {
    let panel = build_panel(&generate_games(400, 8)).expect("panel");
    let suite = fit_suite(&panel, AnalysisSettings::default().logit_options()).expect("fit");
    let err = marginal_effects(&suite, &[0.2, 1.0]).unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidGrid { value } if value == 1.0));
}

#[test]
fn pregame_only_partial_matches_closed_form_on_panel() {
    let panel = build_panel(&generate_games(500, 13)).expect("panel");
    let (td, won, pregame) = (panel.scored_first_td(), panel.won(), panel.pregame());

    let residualised = partial_correlation(&td, &won, &[&pregame]);
    let closed_form = first_order_partial(
        pearson(&td, &won),
        pearson(&td, &pregame),
        pearson(&won, &pregame),
    );
    assert_abs_diff_eq!(residualised, closed_form, epsilon = 1e-10);
    assert_abs_diff_eq!(
        partial_correlation(&td, &won, &[]),
        pearson(&td, &won),
        epsilon = 1e-12
    );
}
