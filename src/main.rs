use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use weatherdeck_core::{AppError, City, Config};
use weatherdeck_dashboard::{AppContext, Dashboard, TerminalRenderer};

/// Offline-first weather dashboard.
#[derive(Debug, Parser)]
#[command(name = "weatherdeck")]
#[command(about = "Offline-first weather dashboard", long_about = None)]
struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, env = "WEATHERDECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show a card for every tracked city.
    Show,
    /// Track a new city.
    Add {
        /// Provider city key (e.g. 924938).
        key: String,
        /// Display label (e.g. "Kyiv, UA").
        label: String,
    },
    /// Stop tracking a city.
    Remove {
        key: String,
    },
    /// Show cards, then fetch every forecast again.
    Refresh,
    /// List tracked cities.
    Cities,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    weatherdeck_core::init()?;

    let cli = Cli::parse();
    let (config, _) = Config::load_validated(cli.config.as_deref())?;
    let context = AppContext::build(config).await?;
    if !context.is_store_durable() {
        eprintln!("Saved cities are unavailable. Changes will last for this session only.");
    }

    let mut dashboard = Dashboard::new(context, TerminalRenderer::stdout());

    match cli.command {
        Commands::Show => dashboard.startup().await,
        Commands::Add { key, label } => {
            dashboard.startup().await;
            let city = City::new(key, label);
            if !dashboard.add_city(city.clone()).await {
                println!("{} is already tracked", city);
            }
        }
        Commands::Remove { key } => {
            if dashboard.remove_city(&key).await {
                println!("Removed {}", key);
            } else {
                println!("{} is not tracked", key);
            }
        }
        Commands::Refresh => {
            dashboard.startup().await;
            report(&mut dashboard).await;
            dashboard.refresh();
        }
        Commands::Cities => {
            let mut cursor = dashboard.context().store().list();
            while let Some(city) = cursor.next_city().await {
                println!("{}", city?);
            }
        }
    }

    report(&mut dashboard).await;
    dashboard.shutdown();
    tracing::info!("Weatherdeck finished");

    Ok(())
}

/// Wait for outstanding fetches and print a line for each one that failed.
async fn report(dashboard: &mut Dashboard<TerminalRenderer<std::io::Stdout>>) {
    for (key, outcome) in dashboard.settle().await {
        if let Err(e) = outcome.network {
            let err = AppError::from(e);
            if outcome.provisional_delivered {
                eprintln!("{}: {} (showing cached forecast)", key, err.user_message());
            } else {
                eprintln!("{}: {}", key, err.user_message());
            }
        }
    }
}
