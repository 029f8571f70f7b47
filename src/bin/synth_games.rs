use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use first_td_impact::export::write_csv;
use first_td_impact::synthetic::generate_games;

/// Write a seeded synthetic unified-games CSV for offline runs
#[derive(Parser, Debug)]
#[command(name = "synth_games", about)]
struct Args {
    /// Number of games to generate
    #[arg(long, default_value = "1300")]
    games: usize,

    #[arg(long, default_value = "2024")]
    seed: u64,

    #[arg(long, default_value = "results/data/nfl_unified_data.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }

    let games = generate_games(args.games, args.seed);
    write_csv(&args.output, &games)?;

    let ties = games.iter().filter(|g| g.winner.is_none()).count();
    println!("Synthetic games written");
    println!("Path: {}", args.output.display());
    println!("Games: {} (ties: {ties})", games.len());
    println!("Seed: {}", args.seed);
    Ok(())
}
