use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use cache_verify::{last_run, CacheLayout, LockedFile, VerifyOptions};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[clap(name = "cache-verify", about = "Verify and garbage-collect a content-addressed cache")]
struct Cli {
    /// Path to the cache root.
    cache: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full verification and garbage-collection pipeline.
    Verify {
        /// Maximum number of concurrent integrity checks.
        #[clap(long)]
        concurrency: Option<usize>,
    },
    /// Print the timestamp of the last successful verification run.
    Status,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Verify { concurrency } => run_verify(&cli.cache, concurrency).await,
        Command::Status => run_status(&cli.cache).await,
    }
}

/// Only the CLI takes an advisory file lock around a run - the library
/// itself holds no in-process lock, so concurrent library callers are free
/// to run `verify` themselves however they see fit.
async fn run_verify(cache: &PathBuf, concurrency: Option<usize>) -> Result<()> {
    let layout = CacheLayout::new(cache);
    let lock_path = layout.root.join(".cache-verify.lock");

    // `LockedFile::acquire` polls synchronously; run it on a blocking thread
    // so it doesn't stall the async runtime while waiting.
    let acquire_path = lock_path.clone();
    let _lock = tokio::task::spawn_blocking(move || {
        LockedFile::acquire(&acquire_path, Duration::from_secs(60))
    })
    .await
    .context("lock task panicked")?
    .with_context(|| format!("another verify run already holds the lock at {:?}", lock_path))?;

    let mut options = VerifyOptions::new();
    if let Some(concurrency) = concurrency {
        options = options.with_concurrency(concurrency);
    }

    let stats = cache_verify::verify_with(
        cache,
        options,
        &cache_verify::TokioFs,
        &cache_verify::Sha2Checker,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn run_status(cache: &PathBuf) -> Result<()> {
    let layout = CacheLayout::new(cache);
    match last_run(&cache_verify::TokioFs, &layout).await? {
        Some(millis) => println!("last verified at {} (epoch ms)", millis),
        None => println!("never verified"),
    }
    Ok(())
}
