use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feedstore::{api, config::Config, db};

#[derive(Parser)]
#[command(name = "fdst")]
#[command(about = "Versioned feed metadata store")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database file (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Apply pending schema migrations and exit
    Migrate {
        /// SQLite database file (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        write: bool,
    },
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(&config.log_filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(config: &Config, db_override: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let path = match db_override {
        Some(path) => path,
        None => config.database_path()?,
    };
    tracing::debug!(path = %path.display(), "opening database");

    let db = db::Database::open(path)?;
    db.migrate()?;
    Ok(db)
}

async fn serve(config: &Config, port: Option<u16>, db_override: Option<PathBuf>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.port);
    tracing::info!("Starting feedstore server on port {}", port);

    let db = open_database(config, db_override)?;
    let app = api::create_router(db);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("feedstore listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load();
    init_tracing(&config);

    match cli.command {
        Some(Commands::Serve { port, db }) => serve(&config, port, db).await?,
        Some(Commands::Migrate { db }) => {
            open_database(&config, db)?;
            tracing::info!("Migrations applied");
        }
        Some(Commands::Config { write }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                config.save()?;
                tracing::info!(path = %feedstore::config::config_path()?.display(), "Configuration written");
            }
        }
        // Default: start server
        None => serve(&config, None, None).await?,
    }

    Ok(())
}
