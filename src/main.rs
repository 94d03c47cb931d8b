use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tresses::{
    app::{admin, setup},
    config::Config,
    db::Database,
    logging, metrics, server,
    state::AppState,
    types::OrderStatus,
};

#[derive(Parser)]
#[command(name = "tresses")]
#[command(about = "Hair-care storefront and back-office API")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply schema migrations
    Migrate,
    /// Create an admin account, or promote an existing user
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Administrator")]
        name: String,
    },
    /// Insert the demo catalog
    Seed,
    /// Write all orders as CSV
    ExportOrders {
        /// Only orders in this status
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn open_state(config: Config) -> Result<AppState> {
    let db = Database::open(&config.database.path)
        .with_context(|| format!("failed to open database {}", config.database.path))?;
    AppState::from_config(db, config).context("failed to wire services")
}

async fn serve(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.server.port);
    metrics::init_metrics(config.metrics.port);
    let state = open_state(config)?;

    let purged = state.db.purge_expired_sessions()?;
    if purged > 0 {
        info!("Purged {} expired session(s)", purged);
    }
    if state.db.count_admins()? == 0 {
        warn!("No admin accounts exist yet; run `tresses create-admin`");
    }

    server::start_server(state, port).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Serve { port } => serve(config, port).await?,
        Commands::Migrate => {
            let span = tracing::info_span!("migrate");
            let _enter = span.enter();
            // Opening runs every pending migration.
            Database::open(&config.database.path)
                .with_context(|| format!("failed to migrate {}", config.database.path))?;
            info!("Database is up to date");
        }
        Commands::CreateAdmin {
            email,
            password,
            name,
        } => {
            let span = tracing::info_span!("create_admin", %email);
            let _enter = span.enter();
            let state = open_state(config)?;
            let user = setup::create_admin(&state, &email, &password, &name)
                .context("failed to create admin")?;
            println!("Admin ready: {} ({})", user.email, user.id);
        }
        Commands::Seed => {
            let span = tracing::info_span!("seed");
            let _enter = span.enter();
            let state = open_state(config)?;
            let added = setup::seed_catalog(&state).context("failed to seed catalog")?;
            println!("Added {} demo product(s)", added);
        }
        Commands::ExportOrders { status, output } => {
            let span = tracing::info_span!("export_orders");
            let _enter = span.enter();
            let state = open_state(config)?;
            let csv = admin::export_orders_csv(&state, status).context("failed to export orders")?;
            std::fs::write(&output, csv)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Wrote {}", output.display());
        }
    }
    Ok(())
}
