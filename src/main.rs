//! RuleForge: load a dataset, optionally squash it, and evaluate a rule
//!
//! This is the main entrypoint that orchestrates data loading, squashing,
//! and rule metric reporting.

use anyhow::Result;
use clap::Parser;
use ruleforge::{Args, Dataset, Rule, Squasher};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.verbose {
        println!("RuleForge - Numerical Association Rule Mining");
        println!("=============================================\n");
    }

    let start_time = Instant::now();

    let data_start = Instant::now();
    let dataset = Dataset::from_csv(&args.input)?;
    println!(
        "✓ Data loaded: {} transactions, {} features",
        dataset.len(),
        dataset.features().len()
    );
    if args.verbose {
        println!("  Loading time: {:.2}s", data_start.elapsed().as_secs_f64());
        for feature in dataset.features() {
            println!("  {}", feature);
        }
    }

    let dataset = match args.threshold {
        Some(threshold) => run_squash(&args, &dataset, threshold)?,
        None => dataset,
    };

    if let Some((antecedent, consequent)) = args.parse_rule(dataset.features())? {
        let metrics = args.parse_metrics()?;
        let rule = Rule::new(antecedent, consequent, dataset.transactions())?;

        println!("\n=== Rule ===");
        println!("{}", rule);
        for metric in metrics {
            println!("{}: {:.4}", metric, rule.metric(metric));
        }
    } else if args.threshold.is_none() {
        println!("\n{}", dataset);
    }

    if args.verbose {
        println!(
            "\nTotal processing time: {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

/// Squash the dataset and print the result
fn run_squash(args: &Args, dataset: &Dataset, threshold: f64) -> Result<Dataset> {
    let squasher = Squasher::new(threshold, args.similarity)?;

    if args.verbose {
        println!("\nSquashing with threshold {} ({})", threshold, args.similarity);
    }

    let squash_start = Instant::now();
    let squashed = squasher.squash(dataset);
    let reduction = if dataset.is_empty() {
        0.0
    } else {
        (1.0 - squashed.len() as f64 / dataset.len() as f64) * 100.0
    };

    println!(
        "✓ Squashed {} transactions into {} ({:.1}% reduction)",
        dataset.len(),
        squashed.len(),
        reduction
    );
    if args.verbose {
        println!("  Squashing time: {:.2}s", squash_start.elapsed().as_secs_f64());
    }
    println!("\n{}", squashed);

    Ok(squashed)
}

/// Log to stderr, filtered by `RULEFORGE_LOG` when set
fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("RULEFORGE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
