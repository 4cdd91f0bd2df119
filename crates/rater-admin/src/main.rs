//! # Rater Admin
//!
//! Operator tooling for the question difficulty table.
//!
//! ## Usage
//! ```bash
//! # Create unrated records for every image in the question bucket mirror
//! rater-admin bootstrap --catalog assets/questions/
//!
//! # Compare the catalog with the store and print a summary
//! rater-admin report --catalog assets/questions/
//!
//! # Pin a tier, recompute everything, dump the table
//! rater-admin set cat.png hard
//! rater-admin recalculate
//! rater-admin export --output difficulties.json
//!
//! # Drop the running service's snapshot
//! rater-admin clear-cache --service http://127.0.0.1:8080
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use quizrank_common::Difficulty;
use rater::config::{AppConfig, ConfigOverrides};
use rater::report::{DifficultySummary, merge_catalog, recomputed_rate};
use rater::state::AppState;
use rater::{DifficultyService, Outcome};

mod catalog;

/// Quizrank Rater Admin
#[derive(Parser, Debug)]
#[command(name = "rater-admin")]
#[command(author, version, about = "Manage question difficulty records", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/rater.toml")]
    config: String,

    /// Record store base URL (overrides config)
    #[arg(long, env = "STORE_URL")]
    store_url: Option<String>,

    /// Record store service key (overrides config)
    #[arg(long, env = "STORE_API_KEY", hide_env_values = true)]
    store_api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create zero-attempt records for catalog files that have none
    Bootstrap {
        /// Directory of question images or a file with one name per line
        #[arg(long)]
        catalog: PathBuf,

        /// Parallel store calls
        #[arg(long, default_value = "8")]
        concurrency: usize,
    },

    /// Run the store's bulk recompute of every classification
    Recalculate,

    /// Dump records as JSON
    Export {
        /// Maximum rows to read
        #[arg(long)]
        max_rows: Option<usize>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Pin a question to a tier (unrated, easy, medium, hard)
    Set { file: String, difficulty: Difficulty },

    /// Print one question's record
    Show { file: String },

    /// Join the catalog with the store and summarize
    Report {
        /// Directory of question images or a file with one name per line
        #[arg(long)]
        catalog: PathBuf,

        /// Maximum rows to read
        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Ask a running rater to drop its cached snapshot
    ClearCache {
        /// Rater base URL
        #[arg(long, default_value = "http://127.0.0.1:8080", env = "RATER_URL")]
        service: String,
    },
}

/// Per-outcome counts of a bootstrap run
#[derive(Debug, Default, PartialEq, Eq)]
struct BootstrapTally {
    created: usize,
    existing: usize,
    failed: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let overrides = ConfigOverrides {
        store_url: args.store_url.clone(),
        api_key: args.store_api_key.clone(),
        listen_addr: None,
    };
    let config = AppConfig::load(&args.config, &overrides)?;

    if let Command::ClearCache { service } = &args.command {
        return clear_remote_cache(service).await;
    }

    let state = AppState::new(config.clone())?;
    let service = state.service;
    let default_rows = config.cache.max_rows;

    match args.command {
        Command::Bootstrap { catalog, concurrency } => {
            let files = catalog::read_catalog(&catalog)?;
            println!("📋 {} question files in {}", files.len(), catalog.display());

            let start = Instant::now();
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let tally = bootstrap_all(service, files, concurrency, &pb).await;
            pb.finish_and_clear();

            println!("✅ Bootstrap finished in {:.2?}", start.elapsed());
            println!("   Created: {}", tally.created);
            println!("   Already present: {}", tally.existing);
            if !tally.failed.is_empty() {
                println!("❌ Failed: {}", tally.failed.len());
                for file in &tally.failed {
                    println!("   - {file}");
                }
                std::process::exit(2);
            }
        }

        Command::Recalculate => {
            let count = service
                .try_recalculate_all()
                .await
                .context("Bulk recompute failed")?;
            println!("✅ Recalculated difficulties, {count} rows changed");
        }

        Command::Export { max_rows, output } => {
            let records = service
                .try_load_all(max_rows.unwrap_or(default_rows))
                .await
                .context("Failed to load records")?;
            let json = serde_json::to_string_pretty(&records)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("📁 {} records written to {}", records.len(), path.display());
                }
                None => println!("{json}"),
            }
        }

        Command::Set { file, difficulty } => {
            let outcome = service
                .try_set_manual_difficulty(&file, difficulty)
                .await
                .with_context(|| format!("Failed to pin {file}"))?;
            if outcome == Outcome::NotFound {
                println!("❌ No record for {file}, record an attempt or bootstrap it first");
                std::process::exit(1);
            }
            println!("✅ Pinned {file} as {difficulty}");
        }

        Command::Show { file } => {
            match service
                .try_get_one(&file)
                .await
                .with_context(|| format!("Failed to read {file}"))?
            {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => {
                    println!("❌ No record for {file}");
                    std::process::exit(1);
                }
            }
        }

        Command::Report { catalog, max_rows } => {
            let files = catalog::read_catalog(&catalog)?;
            let records = service
                .try_load_all(max_rows.unwrap_or(default_rows))
                .await
                .context("Failed to load records")?;
            print_report(&files, records);
        }

        Command::ClearCache { .. } => unreachable!("handled before connecting to the store"),
    }

    Ok(())
}

/// Bootstrap every file with at most `concurrency` calls in flight
async fn bootstrap_all(
    service: Arc<DifficultyService>,
    files: Vec<String>,
    concurrency: usize,
    pb: &ProgressBar,
) -> BootstrapTally {
    let mut results = stream::iter(files)
        .map(|file| {
            let service = service.clone();
            async move {
                let result = service.try_bootstrap_unrated(&file).await;
                (file, result)
            }
        })
        .buffer_unordered(concurrency.max(1));

    let mut tally = BootstrapTally::default();
    while let Some((file, result)) = results.next().await {
        match result {
            Ok(Outcome::Created) => tally.created += 1,
            Ok(_) => tally.existing += 1,
            Err(e) => {
                tracing::warn!(question_file = %file, kind = e.kind(), error = %e, "Bootstrap failed");
                tally.failed.push(file);
            }
        }
        pb.inc(1);
    }

    tally.failed.sort();
    tally
}

fn print_report(files: &[String], records: Vec<quizrank_common::QuestionRecord>) {
    let summary = DifficultySummary::from_records(&records);
    let merge = merge_catalog(files, records);

    println!("📊 Difficulty report");
    println!("====================");
    println!("Catalog files: {}", files.len());
    println!("Tracked records: {}", summary.questions);
    for tier in Difficulty::ALL {
        println!("   {:<8} {}", tier.as_str(), summary.count(tier));
    }
    println!("Pinned: {}", summary.pinned);
    println!(
        "Attempts: {} ({} correct, {:.2}%)",
        summary.total_attempts, summary.correct_attempts, summary.success_rate
    );

    let untracked: Vec<_> = merge.untracked().map(|e| e.file.as_str()).collect();
    if !untracked.is_empty() {
        println!();
        println!("⚠️  {} catalog files without a record (run bootstrap):", untracked.len());
        for file in untracked {
            println!("   - {file}");
        }
    }

    let drifted: Vec<_> = merge
        .entries
        .iter()
        .filter(|e| e.tracked && (recomputed_rate(&e.record) - e.record.success_rate).abs() > 0.01)
        .collect();
    if !drifted.is_empty() {
        println!();
        println!("⚠️  {} records whose stored rate disagrees with their counters:", drifted.len());
        for entry in drifted {
            println!(
                "   - {} stored {:.2}% vs {:.2}%",
                entry.file,
                entry.record.success_rate,
                recomputed_rate(&entry.record)
            );
        }
    }

    if !merge.orphans.is_empty() {
        println!();
        println!("🗑️  {} records not in the catalog:", merge.orphans.len());
        for record in &merge.orphans {
            println!("   - {}", record.question_file);
        }
    }
}

async fn clear_remote_cache(service_url: &str) -> Result<()> {
    let url = format!("{}/admin/cache/clear", service_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "Rater answered {} for {url}",
        response.status()
    );
    println!("✅ Cache cleared on {service_url}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rater::ServiceConfig;
    use rater::store::MemoryStore;
    use rater::store::memory::Fault;

    fn service_over(store: Arc<MemoryStore>) -> Arc<DifficultyService> {
        Arc::new(DifficultyService::new(store, ServiceConfig::default()))
    }

    #[tokio::test]
    async fn test_bootstrap_all_counts_outcomes() {
        let store = Arc::new(MemoryStore::new());
        let service = service_over(store.clone());
        service.record_attempt("b.png", true).await;

        let files: Vec<String> = ["a.png", "b.png", "c.png"].map(String::from).to_vec();
        let tally = bootstrap_all(service.clone(), files.clone(), 2, &ProgressBar::hidden()).await;
        assert_eq!(tally.created, 2);
        assert_eq!(tally.existing, 1);
        assert!(tally.failed.is_empty());
        assert_eq!(store.len().await, 3);

        // Second run changes nothing
        let again = bootstrap_all(service, files, 4, &ProgressBar::hidden()).await;
        assert_eq!(again.created, 0);
        assert_eq!(again.existing, 3);
    }

    #[tokio::test]
    async fn test_bootstrap_all_reports_failures() {
        let store = Arc::new(MemoryStore::new());
        store.set_fault(Some(Fault::Offline)).await;
        let service = service_over(store);

        let files = vec!["z.png".to_string(), "y.png".to_string()];
        let tally = bootstrap_all(service, files, 0, &ProgressBar::hidden()).await;
        assert_eq!(tally.created, 0);
        assert_eq!(tally.failed, ["y.png", "z.png"]);
    }

    #[test]
    fn test_cli_parses_set() {
        let args = Args::try_parse_from(["rater-admin", "set", "cat.png", "hard"]).unwrap();
        match args.command {
            Command::Set { file, difficulty } => {
                assert_eq!(file, "cat.png");
                assert_eq!(difficulty, Difficulty::Hard);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Args::try_parse_from(["rater-admin", "set", "cat.png", "unrated"]).is_ok());
        assert!(Args::try_parse_from(["rater-admin", "set", "cat.png", "extreme"]).is_err());
    }
}
