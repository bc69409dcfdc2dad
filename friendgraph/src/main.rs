use anyhow::{Context, anyhow};
use clap::ArgMatches;
use friendgraph::commands::command_argument_builder;
use friendgraph::handlers::{
    config_from_matches, format_duration, init_tracing, initialize_database, open_database,
    parse_seed_argument, print_crawl_summary, progress_message,
};
use friendgraph_core::config::{Config, resolve_database_path};
use friendgraph_core::data::Database;
use friendgraph_core::engine::Engine;
use friendgraph_core::graph::GraphArtifact;
use friendgraph_core::model::{Depth, JobStatus};
use friendgraph_scanner::SteamApiClient;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    let result = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("serve", primary_command)) => handle_serve(primary_command).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn handle_init(args: &ArgMatches) -> anyhow::Result<()> {
    let dir = args
        .get_one::<String>("PATH")
        .context("missing database directory")?;
    let mut force = args.get_flag("force");

    let db_path = resolve_database_path(dir);
    if Database::exists(&db_path) && !force {
        println!("[WARNING] A database already exists at {}", db_path.display());
        println!("This operation will delete every stored crawl.");
        print!("Do you want to continue? [y/N]: ");
        io::stdout().flush()?;

        let mut response = String::new();
        io::stdin().read_line(&mut response)?;
        let response = response.trim().to_lowercase();
        if response != "y" && response != "yes" {
            println!("\nInitialization cancelled.");
            return Ok(());
        }
        force = true;
    }

    let db_path = initialize_database(dir, force).map_err(|e| anyhow!(e))?;
    println!("✓ friendgraph initialization complete!");
    println!("✓ Database: {}", db_path.display());
    Ok(())
}

/// Opens the configured database and wires it to the Steam Web API.
fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let db = open_database(&config.database_path()).map_err(|e| anyhow!(e))?;
    let client = SteamApiClient::with_base_url(
        config.steam_api_key.clone(),
        &config.steam_api_url,
        config.request_timeout_secs,
    )?;
    Ok(Engine::new(db, Arc::new(client), config)?)
}

async fn handle_serve(args: &ArgMatches) -> anyhow::Result<()> {
    init_tracing();

    let config = config_from_matches(args).map_err(|e| anyhow!(e))?;
    info!(
        "Starting friendgraph {} (database: {})",
        env!("CARGO_PKG_VERSION"),
        config.database_path().display()
    );

    let engine = Arc::new(build_engine(&config)?);
    friendgraph::serve(engine, config.listen_addr).await
}

async fn handle_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    init_tracing();

    let config = config_from_matches(args).map_err(|e| anyhow!(e))?;
    let steam_id = args
        .get_one::<String>("steamid")
        .context("missing --steamid")?;
    let steam_id = parse_seed_argument(steam_id).map_err(|e| anyhow!(e))?;
    let level = args.get_one::<i64>("level").copied().unwrap_or(2);
    let depth = Depth::from_level(level)?;

    let engine = build_engine(&config)?;
    if !quiet {
        println!("\nCrawling the friends of {}", steam_id);
        println!("Workers: {}", config.workers);
        println!("Level: {}\n", depth.level());
    }

    let started = Instant::now();
    let crawl_ids = engine.submit(std::slice::from_ref(&steam_id), depth).await?;
    let crawl_id = crawl_ids.first().context("no crawl was started")?;

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("crawl {}", crawl_id));

    let wait = engine.wait_for(crawl_id);
    tokio::pin!(wait);
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let job = loop {
        tokio::select! {
            job = &mut wait => break job?,
            _ = ticker.tick() => {
                if let Ok(job) = engine.status(crawl_id) {
                    spinner.set_message(progress_message(&job));
                }
            }
        }
    };
    spinner.finish_and_clear();

    let artifact = match job.state() {
        JobStatus::Completed => {
            let payload = engine.graph(crawl_id)?;
            Some(serde_json::from_str::<GraphArtifact>(&payload)?)
        }
        _ => None,
    };

    if !quiet {
        print_crawl_summary(&job, artifact.as_ref());
        println!("Finished in {}", format_duration(started.elapsed()));
    }

    match job.state() {
        JobStatus::Failed => Err(anyhow!(
            "crawl {} failed: {}",
            job.crawl_id,
            job.failure.as_deref().unwrap_or("unknown error")
        )),
        _ => Ok(()),
    }
}
