//! photogen-runner: headless event generation.
//!
//! Usage:
//!   photogen-runner --config config/jpsi_photoproduction.json --events 10000
//!   photogen-runner --config cfg.json --events 5000 --seed 7 --db run.db
//!   photogen-runner --config cfg.json --events 5000 --jsonl events.jsonl

use anyhow::{Context, Result};
use photogen_core::{
    config::Config,
    output::{EventSink, JsonLinesSink, MemorySink},
    pipeline::{Pipeline, RunStats},
    registry,
    store::{EventStore, StoreSink},
};
use std::env;
use std::fs::File;
use std::io::BufWriter;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = string_arg(&args, "--config").unwrap_or("config/jpsi_photoproduction.json");
    let events = parse_arg(&args, "--events", 1000u64);
    let db = string_arg(&args, "--db");
    let jsonl = string_arg(&args, "--jsonl");

    let mut config = Config::load(config_path)?;
    if let Some(seed) = string_arg(&args, "--seed") {
        let seed: u64 = seed.parse().with_context(|| format!("invalid --seed '{seed}'"))?;
        config.set("seed", serde_json::json!(seed))?;
    }

    let mut pipeline = Pipeline::build(&config, registry::global())?;
    let run_id = uuid::Uuid::new_v4().to_string();

    println!("photogen-runner");
    println!("  run_id:  {run_id}");
    println!("  config:  {config_path}");
    println!("  seed:    {}", pipeline.seed());
    println!("  events:  {events}");
    println!("  mode:    {:?}", pipeline.mode());
    println!();

    let stats = match (db, jsonl) {
        (Some(db), _) => {
            let store = EventStore::open(db)?;
            store.migrate()?;
            store.insert_run(&run_id, pipeline.seed(), env!("CARGO_PKG_VERSION"), &config.value().to_string())?;
            let stats = run(&mut pipeline, events, &mut StoreSink::new(&store, run_id.clone()))?;
            store.save_summary(&run_id, &stats)?;
            stats
        }
        (None, Some(path)) => {
            let file = File::create(path).with_context(|| format!("Failed to create {path}"))?;
            run(&mut pipeline, events, &mut JsonLinesSink::new(BufWriter::new(file)))?
        }
        (None, None) => run(&mut pipeline, events, &mut MemorySink::new())?,
    };

    print_summary(&run_id, &stats);
    Ok(())
}

fn run(pipeline: &mut Pipeline, events: u64, sink: &mut dyn EventSink) -> Result<RunStats> {
    Ok(pipeline.run(events, sink)?)
}

fn print_summary(run_id: &str, stats: &RunStats) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  trials:         {}", stats.n_trials);
    println!("  accepted:       {}", stats.n_accepted);
    println!("  events:         {}", stats.n_events);
    println!(
        "  cross section:  {:.5e} ± {:.2e}",
        stats.total_cross_section(),
        stats.cross_section_error()
    );
    println!("  acceptance:     {:.5}", stats.acceptance());
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
