//! RosterLab CLI: roster allocation and history maintenance commands.
//!
//! Commands:
//! - `allocate`: pick a roster per configured formation from a market snapshot
//! - `history apply`: fold an end-of-round update file into the history blob
//! - `history show`: summarize the history blob
//! - `formations`: list the built-in formations
//! - `demo`: run the full pipeline on a seeded synthetic market

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rosterlab_core::domain::{CandidateId, Formation};
use rosterlab_core::oracle::{LinearOracle, ScoringOracle};
use rosterlab_core::synthetic::SyntheticMarket;
use rosterlab_runner::{
    export_json, export_roster_csv, load_history, load_round_updates, load_snapshot, render_report, run_selection,
    save_history, SelectionConfig, SelectionReport,
};

#[derive(Parser)]
#[command(name = "rosterlab", about = "RosterLab CLI: budget-constrained roster selection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a roster for every configured formation.
    Allocate {
        /// Path to the TOML selection config.
        #[arg(long)]
        config: PathBuf,

        /// Market snapshot (.csv or .json).
        #[arg(long)]
        snapshot: PathBuf,

        /// History blob. A missing file means no history yet.
        #[arg(long, default_value = "history.json")]
        history: PathBuf,

        /// Linear oracle parameters (JSON). Without it the composite score is used.
        #[arg(long)]
        oracle: Option<PathBuf>,

        /// Write the full report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write the best roster as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Evaluate formations one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// History blob maintenance.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// List the built-in formations.
    Formations,
    /// Run the pipeline on a seeded synthetic market.
    Demo {
        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Candidates per category.
        #[arg(long, default_value_t = 30)]
        size: usize,

        /// Budget in currency units.
        #[arg(long, default_value_t = 140.0)]
        budget: f64,

        /// Formations to evaluate. Defaults to every preset.
        #[arg(long, num_args = 1..)]
        formations: Vec<String>,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Append one round of outcomes and save atomically.
    Apply {
        /// History blob to update (created if missing).
        #[arg(long, default_value = "history.json")]
        history: PathBuf,

        /// End-of-round update file (.csv or .json).
        #[arg(long)]
        round: PathBuf,

        /// Rounds kept per candidate.
        #[arg(long, default_value_t = rosterlab_core::history::DEFAULT_WINDOW)]
        window: usize,
    },
    /// Print the round counter and per-candidate series lengths.
    Show {
        #[arg(long, default_value = "history.json")]
        history: PathBuf,

        #[arg(long, default_value_t = rosterlab_core::history::DEFAULT_WINDOW)]
        window: usize,

        /// Print the full series for one candidate.
        #[arg(long)]
        id: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Allocate {
            config,
            snapshot,
            history,
            oracle,
            json,
            csv,
            sequential,
        } => run_allocate(&config, &snapshot, &history, oracle.as_deref(), json, csv, !sequential),
        Commands::History { action } => match action {
            HistoryAction::Apply { history, round, window } => run_history_apply(&history, &round, window),
            HistoryAction::Show { history, window, id } => run_history_show(&history, window, id),
        },
        Commands::Formations => {
            run_formations();
            Ok(())
        }
        Commands::Demo {
            seed,
            size,
            budget,
            formations,
        } => run_demo(seed, size, budget, formations),
    }
}

fn run_allocate(
    config_path: &Path,
    snapshot_path: &Path,
    history_path: &Path,
    oracle_path: Option<&Path>,
    json_out: Option<PathBuf>,
    csv_out: Option<PathBuf>,
    parallel: bool,
) -> Result<()> {
    let config = SelectionConfig::from_file(config_path)?;
    let records = load_snapshot(snapshot_path)?;
    let history = load_history(history_path, config.history_window)?;
    let oracle = oracle_path.map(load_oracle).transpose()?;

    info!(
        candidates = records.len(),
        round = history.round(),
        oracle = ?oracle.as_ref().map(|o| o.name()),
        "starting allocation"
    );
    let report = run_selection(
        &config,
        &records,
        &history,
        oracle.as_ref().map(|o| o as &dyn ScoringOracle),
        parallel,
    )?;
    print!("{}", render_report(&report));
    write_outputs(&report, json_out, csv_out)
}

fn load_oracle(path: &Path) -> Result<LinearOracle> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading oracle parameters {}", path.display()))?;
    Ok(LinearOracle::from_json_str(&raw)?)
}

fn write_outputs(report: &SelectionReport, json_out: Option<PathBuf>, csv_out: Option<PathBuf>) -> Result<()> {
    if let Some(path) = json_out {
        fs::write(&path, export_json(report)?).with_context(|| format!("writing {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    if let Some(path) = csv_out {
        let Some(best) = report.best_roster() else {
            bail!("no formation completed; nothing to write to {}", path.display());
        };
        fs::write(&path, export_roster_csv(best)?).with_context(|| format!("writing {}", path.display()))?;
        println!("Roster saved to: {}", path.display());
    }
    Ok(())
}

fn run_history_apply(history_path: &Path, round_path: &Path, window: usize) -> Result<()> {
    if window == 0 {
        bail!("--window must be at least 1");
    }
    let mut table = load_history(history_path, window)?;
    let updates = load_round_updates(round_path)?;
    table.apply_round(&updates);
    save_history(history_path, &table)?;
    println!(
        "Applied {} updates; history now at round {} with {} candidates",
        updates.len(),
        table.round(),
        table.len()
    );
    Ok(())
}

fn run_history_show(history_path: &Path, window: usize, id: Option<u32>) -> Result<()> {
    let table = load_history(history_path, window.max(1))?;
    println!("History: {}", history_path.display());
    println!("Round: {}", table.round());
    println!("Window: {}", table.window());
    println!("Candidates: {}", table.len());

    if let Some(raw) = id {
        let series = table.series(CandidateId(raw));
        if series.is_empty() {
            println!("No entries for candidate {raw}");
            return Ok(());
        }
        println!();
        println!("{:<6} {:>9} {:>6} {:>8}", "Entry", "Outcome", "Played", "dPrice");
        println!("{}", "-".repeat(32));
        for (i, e) in series.iter().enumerate() {
            println!(
                "{:<6} {:>9.2} {:>6} {:>8.2}",
                i + 1,
                e.outcome,
                if e.participated { "yes" } else { "no" },
                e.price_delta
            );
        }
    }
    Ok(())
}

fn run_formations() {
    println!("{:<8} {}", "Name", "Slots");
    println!("{}", "-".repeat(40));
    for formation in Formation::presets() {
        let slots: Vec<String> = formation
            .slots
            .iter()
            .map(|(category, n)| format!("{}={}", category.code(), n))
            .collect();
        println!("{:<8} {}", formation.name, slots.join(" "));
    }
}

fn run_demo(seed: u64, size: usize, budget: f64, formations: Vec<String>) -> Result<()> {
    let round = SyntheticMarket::new(seed).with_size(size).generate();
    let mut config = SelectionConfig::with_budget(budget);
    config.formations = if formations.is_empty() {
        Formation::presets().into_iter().map(|f| f.name).collect()
    } else {
        formations
    };
    config.validate()?;

    info!(seed, candidates = round.records.len(), "synthetic market generated");
    let report = run_selection(&config, &round.records, &round.history, None, true)?;
    print!("{}", render_report(&report));
    if let Some(best) = report.best_roster() {
        println!("Digest: {}", best.digest()?);
    }
    Ok(())
}
