// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::{error, info, warn, LevelFilter};
use std::sync::Arc;
use wealth_manager::client::{cancel_pair, LoadState, PortfolioClient};
use wealth_manager::config::{Config, StoreBackend};
use wealth_manager::dashboard::{self, HoldingsTable, SortColumn};
use wealth_manager::service::PortfolioService;
use wealth_manager::{api, db, seed};

#[derive(Parser)]
#[command(name = "wealth_manager", about = "Portfolio dashboard API and client")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API (default)
    Serve {
        /// Import the sample portfolio before listening
        #[arg(long)]
        seed: bool,
    },
    /// Import the sample portfolio, replacing what is stored
    Seed {
        /// Delete all portfolio data instead of importing
        #[arg(short, long)]
        destroy: bool,
    },
    /// Fetch the dashboard from a running API and print it
    Dashboard {
        /// Only show holdings whose symbol or name contains this
        #[arg(long)]
        search: Option<String>,
        /// Column to sort by; repeat to toggle direction
        #[arg(long)]
        sort: Vec<SortColumn>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve { seed: false }) {
        Command::Serve { seed } => serve(config, seed).await,
        Command::Seed { destroy } => seed_command(config, destroy).await,
        Command::Dashboard { search, sort } => dashboard_command(config, search, sort).await,
    }
}

async fn serve(config: Config, seed_first: bool) -> Result<()> {
    let store = db::open(&config.store)
        .await
        .context("Failed to initialize database")?;
    info!("Connected to database...");

    let service = Arc::new(PortfolioService::new(store.clone()));
    if seed_first {
        service
            .seed_portfolio(seed::sample_portfolio())
            .await
            .context("Failed to import sample data")?;
    }

    let routes = api::routes(service);
    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(config.addr(), async {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Could not listen for Ctrl-C; stop the process to shut down.");
                std::future::pending::<()>().await;
            }
        })
        .context("Failed to bind server address")?;

    info!("Server running on http://{}", addr);
    server.await;

    info!("Shutting down...");
    store.close().await.context("Failed to close database")?;
    Ok(())
}

async fn seed_command(config: Config, destroy: bool) -> Result<()> {
    if config.store == StoreBackend::Memory {
        warn!("STORE_BACKEND is memory; seeded data disappears when this command exits.");
    }
    let store = db::open(&config.store)
        .await
        .context("Failed to initialize database")?;
    let service = PortfolioService::new(store.clone());

    if destroy {
        service
            .destroy_portfolio()
            .await
            .context("Error destroying data")?;
        info!("Data Destroyed!");
    } else {
        service
            .seed_portfolio(seed::sample_portfolio())
            .await
            .context("Error importing data")?;
        info!("Data Imported!");
    }

    store.close().await.context("Failed to close database")?;
    Ok(())
}

async fn dashboard_command(config: Config, search: Option<String>, sort: Vec<SortColumn>) -> Result<()> {
    let client = PortfolioClient::new(config.api_base_url.as_str());
    let (handle, token) = cancel_pair();

    let load = client.load_dashboard(&token);
    let result = tokio::select! {
        result = load => result,
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            info!("Dashboard load abandoned.");
            return Ok(());
        }
    };

    match LoadState::from_result(result) {
        LoadState::Ready(data) => {
            let mut table = HoldingsTable::new();
            if let Some(term) = search {
                table.set_search(term);
            }
            for column in sort {
                table.select_column(column);
            }
            print!("{}", dashboard::render(&data, &table)?);
            Ok(())
        }
        LoadState::Failed(message) => anyhow::bail!(message),
    }
}
