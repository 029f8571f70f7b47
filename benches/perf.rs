use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use first_td_impact::correlation::correlation_report;
use first_td_impact::effects::{fine_grid, marginal_effects};
use first_td_impact::logit::LogitOptions;
use first_td_impact::models::fit_suite;
use first_td_impact::panel::{Panel, build_panel};
use first_td_impact::strata::{tier_correlations, tier_summaries};
use first_td_impact::synthetic::generate_games;

fn sample_panel() -> Panel {
    build_panel(&generate_games(1300, 42)).unwrap()
}

fn bench_panel_build(c: &mut Criterion) {
    let games = generate_games(1300, 42);
    c.bench_function("panel_build", |b| {
        b.iter(|| {
            let panel = build_panel(black_box(&games)).unwrap();
            black_box(panel.len());
        })
    });
}

fn bench_fit_suite(c: &mut Criterion) {
    let panel = sample_panel();
    c.bench_function("fit_suite", |b| {
        b.iter(|| {
            let suite = fit_suite(black_box(&panel), LogitOptions::default()).unwrap();
            black_box(suite.selected);
        })
    });
}

fn bench_correlations(c: &mut Criterion) {
    let panel = sample_panel();
    c.bench_function("correlation_report", |b| {
        b.iter(|| {
            let report = correlation_report(black_box(&panel), 0.01);
            black_box(report.change);
        })
    });
}

fn bench_marginal_effects_fine(c: &mut Criterion) {
    let panel = sample_panel();
    let suite = fit_suite(&panel, LogitOptions::default()).unwrap();
    let grid = fine_grid();
    c.bench_function("marginal_effects_1pct", |b| {
        b.iter(|| {
            let rows = marginal_effects(black_box(&suite), black_box(&grid)).unwrap();
            black_box(rows.len());
        })
    });
}

fn bench_strata(c: &mut Criterion) {
    let panel = sample_panel();
    c.bench_function("tier_tables", |b| {
        b.iter(|| {
            let tiers = tier_summaries(black_box(&panel));
            let corr = tier_correlations(black_box(&panel), 50);
            black_box((tiers.len(), corr.len()));
        })
    });
}

criterion_group!(
    benches,
    bench_panel_build,
    bench_fit_suite,
    bench_correlations,
    bench_marginal_effects_fine,
    bench_strata
);
criterion_main!(benches);
