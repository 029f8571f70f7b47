use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use first_td_impact::config::{AnalysisSettings, Cli, Command, MarketArgs};
use first_td_impact::effects::effect_at;
use first_td_impact::export::export_all;
use first_td_impact::market::run_market_comparison;
use first_td_impact::pipeline;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Analyze(args) => analyze(AnalysisSettings::from(args)),
        Command::Market(args) => market(args),
    }
}

fn analyze(settings: AnalysisSettings) -> Result<()> {
    settings.validate()?;
    let run = pipeline::analyze(&settings)
        .with_context(|| format!("analysis of {} failed", settings.input.display()))?;

    info!(
        games = run.complete_games,
        observations = run.panel.len(),
        best = run.suite.selected.label(),
        "analysis complete"
    );
    if let Some(mid) = effect_at(&run.marginal_coarse, 0.5) {
        info!(
            got_ball = %format!("{:+.1}pp", mid.effect_got_ball),
            no_ball = %format!("{:+.1}pp", mid.effect_no_ball),
            "first TD effect at 50% pregame"
        );
    }

    let report = export_all(&run, &settings.output_dir);
    println!("Analysis artifacts written to {}", settings.output_dir.display());
    for path in &report.written {
        println!("  {}", path.display());
    }
    if !report.errors.is_empty() {
        for err in &report.errors {
            warn!("{err}");
        }
        bail!("{} artifact(s) failed to export", report.errors.len());
    }
    Ok(())
}

fn market(args: MarketArgs) -> Result<()> {
    let outputs = run_market_comparison(&args.games, &args.market, &args.output_dir)?;
    println!("Merged dataset: {}", outputs.merged_path.display());
    println!("Summary: {}", outputs.summary_path.display());
    println!(
        "Games with Kalshi data: {}/{} ({} complete)",
        outputs.summary.with_kalshi, outputs.summary.total_games, outputs.summary.complete_kalshi
    );
    Ok(())
}
