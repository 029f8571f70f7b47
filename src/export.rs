use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use tracing::{error, info};

use crate::correlation::CorrelationReport;
use crate::effects::{InteractionEffect, MarginalEffect, WinProbabilityPoint};
use crate::logit::Coefficient;
use crate::models::ModelSpec;
use crate::pipeline::AnalysisRun;
use crate::report;
use crate::strata::TierCorrelation;

pub const TIER_CORRELATIONS_CSV: &str = "controlled_first_td_results.csv";
pub const MARGINAL_EFFECTS_CSV: &str = "first_td_marginal_effects.csv";
pub const MARGINAL_EFFECTS_1PCT_CSV: &str = "first_td_marginal_effects_1pct.csv";
pub const WIN_PROBABILITIES_CSV: &str = "first_td_win_probabilities.csv";
pub const WIN_PROBABILITIES_5PCT_CSV: &str = "first_td_win_probabilities_5pct.csv";
pub const INTERACTION_EFFECTS_CSV: &str = "interaction_effects.csv";
pub const TIER_WIN_RATES_CSV: &str = "tier_win_rates.csv";
pub const MODEL_SUMMARIES_TXT: &str = "model_summaries.txt";
pub const RUN_SUMMARY_JSON: &str = "run_summary.json";
pub const WORKBOOK_XLSX: &str = "first_td_analysis.xlsx";

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub errors: Vec<String>,
}

impl ExportReport {
    /// Records the outcome of one artifact; failures are kept and logged, never raised.
    fn record(&mut self, path: PathBuf, description: &str, outcome: Result<()>) {
        match outcome {
            Ok(()) => {
                info!(path = %path.display(), "saved {description}");
                self.written.push(path);
            }
            Err(err) => {
                error!(path = %path.display(), "failed to save {description}: {err:#}");
                self.errors.push(format!("{description} ({}): {err:#}", path.display()));
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct TierWinRateRow<'a> {
    tier: &'a str,
    scored_first_td: u8,
    got_ball_first: u8,
    win_rate: f64,
    count: usize,
    impact_got_ball: Option<f64>,
    impact_no_ball: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ModelStats {
    pub name: &'static str,
    pub n_obs: usize,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub pseudo_r2: f64,
    pub llr_p_value: f64,
    pub converged: bool,
    pub perfect_separation: bool,
    pub coefficients: Vec<Coefficient>,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub input: String,
    pub games_loaded: usize,
    pub complete_games: usize,
    pub games_used: usize,
    pub observations: usize,
    pub insufficient_data: bool,
    pub models: Vec<ModelStats>,
    pub selected_model: &'static str,
    pub interaction_p_value: f64,
    pub interaction_significant: bool,
    pub correlations: CorrelationReport,
    pub tier_correlations: Vec<TierCorrelation>,
}

impl RunSummary {
    pub fn from_run(run: &AnalysisRun) -> Self {
        let models = ModelSpec::ALL
            .into_iter()
            .map(|spec| {
                let fit = &run.suite.get(spec).fit;
                ModelStats {
                    name: spec.label(),
                    n_obs: fit.n_obs,
                    log_likelihood: fit.log_likelihood,
                    aic: fit.aic,
                    bic: fit.bic,
                    pseudo_r2: fit.pseudo_r2,
                    llr_p_value: fit.llr_p_value,
                    converged: fit.converged,
                    perfect_separation: fit.perfect_separation,
                    coefficients: fit.coefficients.clone(),
                }
            })
            .collect();
        let p = run.suite.interaction_p_value();
        Self {
            generated_at: Utc::now().to_rfc3339(),
            input: run.settings.input.display().to_string(),
            games_loaded: run.games_loaded,
            complete_games: run.complete_games,
            games_used: run.panel.games_used(),
            observations: run.panel.len(),
            insufficient_data: run.insufficient_data,
            models,
            selected_model: run.suite.selected.label(),
            interaction_p_value: p,
            interaction_significant: p < run.settings.significance,
            correlations: run.correlations.clone(),
            tier_correlations: run.tier_correlations.clone(),
        }
    }
}

/// Writes every artifact of `run` into `dir`. Each artifact is attempted independently.
pub fn export_all(run: &AnalysisRun, dir: &Path) -> ExportReport {
    let mut exported = ExportReport::default();
    if let Err(err) = fs::create_dir_all(dir) {
        exported
            .errors
            .push(format!("create output directory {}: {err}", dir.display()));
        error!(dir = %dir.display(), "cannot create output directory: {err}");
        return exported;
    }

    let path = dir.join(TIER_CORRELATIONS_CSV);
    let outcome = write_csv(&path, &run.tier_correlations);
    exported.record(path, "tier-specific correlation results", outcome);

    let path = dir.join(MARGINAL_EFFECTS_CSV);
    let outcome = write_marginal_effects(&path, &run.marginal_coarse);
    exported.record(path, "marginal effects (5% intervals)", outcome);

    let path = dir.join(MARGINAL_EFFECTS_1PCT_CSV);
    let outcome = write_marginal_effects(&path, &run.marginal_fine);
    exported.record(path, "marginal effects (1% intervals)", outcome);

    let path = dir.join(WIN_PROBABILITIES_CSV);
    let outcome = write_csv(&path, &run.win_prob_fine);
    exported.record(path, "win probability data (1% intervals)", outcome);

    let path = dir.join(WIN_PROBABILITIES_5PCT_CSV);
    let outcome = write_csv(&path, &run.win_prob_coarse);
    exported.record(path, "win probability data (5% intervals)", outcome);

    if let Some(effects) = &run.interaction {
        let path = dir.join(INTERACTION_EFFECTS_CSV);
        let outcome = write_csv(&path, effects);
        exported.record(path, "interaction effects data", outcome);
    }

    let path = dir.join(TIER_WIN_RATES_CSV);
    let outcome = write_csv(&path, &tier_win_rate_rows(run));
    exported.record(path, "tier win rates", outcome);

    let path = dir.join(MODEL_SUMMARIES_TXT);
    let outcome = fs::write(&path, report::model_summaries(run))
        .with_context(|| format!("write {}", path.display()));
    exported.record(path, "model summaries", outcome);

    let path = dir.join(RUN_SUMMARY_JSON);
    let outcome = write_json(&path, &RunSummary::from_run(run));
    exported.record(path, "run summary", outcome);

    if run.settings.write_workbook {
        let path = dir.join(WORKBOOK_XLSX);
        let outcome = write_workbook(&path, run);
        exported.record(path, "analysis workbook", outcome);
    }

    exported
}

pub fn write_marginal_effects(path: &Path, rows: &[MarginalEffect]) -> Result<()> {
    write_csv(path, rows)
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("open {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("serialize row into {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value).context("encode run summary")?;
    fs::write(path, body).with_context(|| format!("write {}", path.display()))
}

fn tier_win_rate_rows(run: &AnalysisRun) -> Vec<TierWinRateRow<'_>> {
    let mut rows = Vec::new();
    for tier in &run.tiers {
        for (scored_first_td, got_ball_first) in
            [(false, false), (false, true), (true, false), (true, true)]
        {
            if let Some(cell) = tier.cell(scored_first_td, got_ball_first) {
                rows.push(TierWinRateRow {
                    tier: tier.tier,
                    scored_first_td: u8::from(scored_first_td),
                    got_ball_first: u8::from(got_ball_first),
                    win_rate: cell.win_rate,
                    count: cell.count,
                    impact_got_ball: tier.impact_got_ball,
                    impact_no_ball: tier.impact_no_ball,
                });
            }
        }
    }
    rows
}

fn write_workbook(path: &Path, run: &AnalysisRun) -> Result<()> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("TierCorrelations")?;
        write_rows(sheet, &tier_correlation_rows(&run.tier_correlations))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("MarginalEffects5pct")?;
        write_rows(sheet, &marginal_rows(&run.marginal_coarse))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("MarginalEffects1pct")?;
        write_rows(sheet, &marginal_rows(&run.marginal_fine))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("WinProb5pct")?;
        write_rows(sheet, &win_prob_rows(&run.win_prob_coarse))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("WinProb1pct")?;
        write_rows(sheet, &win_prob_rows(&run.win_prob_fine))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Coefficients")?;
        write_rows(sheet, &coefficient_rows(run))?;
    }
    if let Some(effects) = &run.interaction {
        let sheet = workbook.add_worksheet();
        sheet.set_name("InteractionEffects")?;
        write_rows(sheet, &interaction_rows(effects))?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn header(cols: &[&str]) -> Vec<String> {
    cols.iter().map(|c| c.to_string()).collect()
}

fn tier_correlation_rows(rows: &[TierCorrelation]) -> Vec<Vec<String>> {
    let mut out = vec![header(&[
        "Tier",
        "First TD r",
        "First TD partial r",
        "Got Ball r",
        "Got Ball partial r",
        "N",
    ])];
    out.extend(rows.iter().map(|r| {
        vec![
            r.tier.to_string(),
            format!("{:.4}", r.firsttd_corr),
            format!("{:.4}", r.firsttd_partial_corr),
            format!("{:.4}", r.ball_corr),
            format!("{:.4}", r.ball_partial_corr),
            r.n.to_string(),
        ]
    }));
    out
}

fn marginal_rows(rows: &[MarginalEffect]) -> Vec<Vec<String>> {
    let mut out = vec![header(&[
        "Pregame Prob",
        "Effect (got ball, pp)",
        "Effect (no ball, pp)",
        "Average (pp)",
    ])];
    out.extend(rows.iter().map(|r| {
        vec![
            format!("{:.2}", r.pregame_prob),
            format!("{:.3}", r.effect_got_ball),
            format!("{:.3}", r.effect_no_ball),
            format!("{:.3}", r.avg_effect),
        ]
    }));
    out
}

fn win_prob_rows(rows: &[WinProbabilityPoint]) -> Vec<Vec<String>> {
    let mut out = vec![header(&[
        "Pregame Prob",
        "Win % without first TD",
        "Win % with first TD",
        "Difference (pp)",
    ])];
    out.extend(rows.iter().map(|r| {
        vec![
            format!("{:.2}", r.pregame_prob),
            format!("{:.2}", r.prob_no_first_td),
            format!("{:.2}", r.prob_with_first_td),
            format!("{:.3}", r.difference),
        ]
    }));
    out
}

fn coefficient_rows(run: &AnalysisRun) -> Vec<Vec<String>> {
    let mut out = vec![header(&[
        "Model", "Term", "Coef", "Std Err", "z", "P>|z|", "CI Low", "CI High", "AIC",
    ])];
    for spec in ModelSpec::ALL {
        let fit = &run.suite.get(spec).fit;
        for c in &fit.coefficients {
            out.push(vec![
                spec.label().to_string(),
                c.name.clone(),
                format!("{:.4}", c.estimate),
                format!("{:.4}", c.std_error),
                format!("{:.3}", c.z),
                format!("{:.4}", c.p_value),
                format!("{:.4}", c.ci_low),
                format!("{:.4}", c.ci_high),
                format!("{:.2}", fit.aic),
            ]);
        }
    }
    out
}

fn interaction_rows(rows: &[InteractionEffect]) -> Vec<Vec<String>> {
    let mut out = vec![header(&["Pregame Prob", "Log-odds effect", "Odds ratio"])];
    out.extend(rows.iter().map(|r| {
        vec![
            format!("{:.2}", r.pregame_prob),
            format!("{:.4}", r.log_odds_effect),
            format!("{:.4}", r.odds_ratio),
        ]
    }));
    out
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
