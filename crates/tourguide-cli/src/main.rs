mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tourguide_cache::config::loader::load_config;
use tourguide_cache::{CacheManager, create_cache_manager, init_tracing_with_level};

use cli::{Cli, Commands, Entity, InvalidateArgs};
use output::{print_error, print_success, print_warning};

#[tokio::main]
async fn main() {
    // .env is optional
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    init_tracing_with_level(&config.logging.level);

    let cache = create_cache_manager(&config);

    match &cli.command {
        Commands::Health => {
            if cache.check_backend_health().await {
                print_success(&format!("{} backend is healthy", cache.stats().mode));
            } else if cache.stats().mode == "memory" {
                print_warning("no backend configured, running in-memory only");
            } else {
                anyhow::bail!("cache backend is unreachable");
            }
        }
        Commands::Stats => {
            cache.check_backend_health().await;
            output::print_stats(&cache.stats());
        }
        Commands::Get(args) => {
            let value: Option<Value> = cache.get(&args.key).await?;
            match value {
                Some(value) => output::print_value(&value),
                None => print_warning(&format!("{} is not cached", args.key)),
            }
        }
        Commands::Delete(args) => {
            cache.delete(&args.key).await?;
            print_success(&format!("Deleted {}", args.key));
        }
        Commands::Invalidate(args) => {
            invalidate(&cache, args).await?;
            print_success("Invalidation complete");
        }
        Commands::Flush(args) => {
            if cache.invalidation().all(args.confirm).await? {
                print_success("Flushed cache backend");
            } else if args.confirm {
                print_warning("In-memory store cleared; backend unavailable, nothing flushed");
            } else {
                print_warning("In-memory store cleared; pass --confirm to flush the backend");
            }
        }
    }

    Ok(())
}

async fn invalidate(cache: &CacheManager, args: &InvalidateArgs) -> Result<()> {
    let invalidation = cache.invalidation();
    let id = if args.entity.needs_id() {
        args.id
            .as_deref()
            .context("this invalidation needs an identifier")?
    } else {
        ""
    };

    match args.entity {
        Entity::Student => invalidation.student(id).await?,
        Entity::Tourist => invalidation.tourist(id).await?,
        Entity::Request => invalidation.request(id).await?,
        Entity::Match => invalidation.matching(id).await?,
        Entity::Verification => invalidation.verification(id).await?,
        Entity::Students => invalidation.students_list().await?,
        Entity::Dashboards => invalidation.dashboards().await?,
        Entity::Analytics => invalidation.analytics().await?,
    }
    tracing::debug!("invalidation finished");
    Ok(())
}
