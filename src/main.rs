use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use fantasy_cycling::{
    parse_schedule, run, sync_all, HttpFeed, LeagueConfig, RaceCatalog, RawInputs, RunOutcome,
    Standings,
};

const HISTORY_ROWS: usize = 10;
const TOP_RIDERS: usize = 3;

struct Args {
    data_dir: PathBuf,
    config: Option<PathBuf>,
    verbose: bool,
    sync: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        data_dir: env::var("FANTASY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".")),
        config: None,
        verbose: false,
        sync: false,
    };

    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            "--sync" => args.sync = true,
            "--config" => {
                let path = iter.next().context("--config needs a file path")?;
                args.config = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => {
                bail!("Unknown option: {}\nUsage: fantasy-cycling [DATA_DIR] [--config FILE] [--sync] [-v]", other)
            }
            other => args.data_dir = PathBuf::from(other),
        }
    }

    Ok(args)
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    let config = match &args.config {
        Some(path) => LeagueConfig::from_file(path)?,
        None => LeagueConfig::default(),
    };

    tracing::info!("Loading league data from {}", args.data_dir.display());
    let mut inputs = RawInputs::load_dir(&args.data_dir)?;

    if args.sync {
        inputs = sync_live_results(inputs)?;
    }

    match run(&inputs, &config)? {
        RunOutcome::NoData { reason } => {
            println!("No data to score: {}", reason);
        }
        RunOutcome::Scored(standings) => print_standings(&standings),
    }

    Ok(())
}

fn sync_live_results(inputs: RawInputs) -> Result<RawInputs> {
    let Some(schedule) = inputs.schedule.as_deref() else {
        tracing::warn!("No schedule, nothing to sync");
        return Ok(inputs);
    };

    let races = parse_schedule(&mut &schedule[..], "schedule.csv")?;
    let (catalog, _) = RaceCatalog::from_races(races.records);

    let report = sync_all(&HttpFeed::new()?, &catalog);
    println!("{}", report.summary());
    Ok(report.apply(inputs))
}

fn print_standings(standings: &Standings) {
    println!("🚴 Fantasy Cycling Standings");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🏆 Leaderboard");
    for (place, total) in standings.ranked().iter().enumerate() {
        println!("  {}. {:<20} {:>5} pts", place + 1, total.owner, total.points);
    }

    println!("\n⭐ Top scorers");
    for owner in &standings.owners {
        println!("  {}", owner);
        let top = standings.top_riders(owner, TOP_RIDERS);
        if top.is_empty() {
            println!("     (no points yet)");
        }
        for rider in top {
            println!("     {:<28} {:>5} pts", rider.rider, rider.points);
        }
    }

    println!("\n📅 Recent results");
    for entry in standings.history().into_iter().take(HISTORY_ROWS) {
        let date = entry
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undated".to_string());
        let race = match &entry.stage {
            Some(stage) => format!("{} {}", entry.race_name, stage),
            None => entry.race_name.clone(),
        };
        println!(
            "  {}  {:<30} #{:<3} {:<24} {:<12} {:>3} pts",
            date, race, entry.rank, entry.rider, entry.owner, entry.points
        );
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Dropped: {} race not in catalog, {} not rostered, {} ambiguous",
        standings.drops.race_not_in_catalog, standings.drops.not_rostered, standings.drops.ambiguous
    );

    for conflict in standings.roster_conflicts.iter().chain(standings.conflicts.iter()) {
        println!("⚠️  {}", conflict);
    }

    if !standings.quality.is_clean() {
        println!("{}", standings.quality.summary());
        for issue in &standings.quality.issues {
            println!("  {}", issue);
        }
    }
}
