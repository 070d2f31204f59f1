//! feature-runner: headless batch runner for the credit feature pipeline.
//!
//! Usage:
//!   feature-runner --db bureau.db
//!   feature-runner --db run.db --synthetic 500 --seed 12345
//!   feature-runner --synthetic 200 --json

use anyhow::{Context, Result};
use credit_features_core::{
    config::FeatureConfig,
    manifest::RunManifest,
    pipeline::{FeaturePipeline, FeatureSet, CLIENT_FEATURE_TABLE},
    store::FeatureStore,
    synthetic::{self, SyntheticShape},
};
use std::env;

#[derive(serde::Serialize)]
struct RunSummary<'a> {
    run_id: &'a str,
    db: &'a str,
    clients: usize,
    loans_with_history: usize,
    clients_with_applications: usize,
    manifest: &'a RunManifest,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let synthetic_clients = parse_arg(&args, "--synthetic", 0usize);
    let json_mode = args.iter().any(|a| a == "--json");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    if !json_mode {
        println!("credit features - feature-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        if synthetic_clients > 0 {
            println!("  synthetic: {synthetic_clients} clients, seed {seed}");
        }
        println!();
    }

    let config = FeatureConfig::load_or_default(data_dir)?;
    let pipeline = FeaturePipeline::new(config)?;

    let store = FeatureStore::open(db).with_context(|| format!("opening {db}"))?;
    store.migrate()?;

    if synthetic_clients > 0 {
        let shape = SyntheticShape {
            clients: synthetic_clients,
            ..SyntheticShape::default()
        };
        let inputs = synthetic::generate(seed, &shape);
        store.replace_inputs(&inputs, pipeline.config())?;
        log::info!("runner: wrote synthetic snapshot ({:?})", inputs.row_counts());
    }

    let inputs = store
        .load_inputs(pipeline.config())
        .context("loading source tables")?;
    let set = pipeline.run(&inputs);
    store.write_feature_set(&set)?;

    let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
    let manifest = pipeline.manifest(run_id.clone(), &inputs, &set);
    store.insert_run_manifest(&manifest, env!("CARGO_PKG_VERSION"))?;

    if json_mode {
        let summary = RunSummary {
            run_id: &run_id,
            db,
            clients: set.client_features.len(),
            loans_with_history: set.loan_balance.len(),
            clients_with_applications: set.previous_application.len(),
            manifest: &manifest,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&store, &set, &manifest)?;
    }

    Ok(())
}

fn print_summary(store: &FeatureStore, set: &FeatureSet, manifest: &RunManifest) -> Result<()> {
    let rows = &manifest.input_rows;
    let stored_clients = store.feature_row_count(CLIENT_FEATURE_TABLE)?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:              {}", manifest.run_id);
    println!("  balance records:     {}", rows.loan_balance);
    println!("  bureau loans:        {}", rows.loans);
    println!("  prev applications:   {}", rows.previous_applications);
    println!("  OTHER statuses:      {}", manifest.other_status_records);
    if !manifest.missing_optional_columns.is_empty() {
        println!("  missing columns:     {}", manifest.missing_optional_columns.join(", "));
    }
    println!();
    for table in &manifest.tables {
        println!(
            "  {:<40} {:>8} rows  {:>3} columns",
            table.name,
            table.rows,
            table.columns.len()
        );
    }
    println!();

    let recent_dpd = set.client_features.iter().filter(|r| r.has_recent_dpd == 1).count();
    println!("  clients stored:      {stored_clients}");
    println!("  recent delinquency:  {recent_dpd}");
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
