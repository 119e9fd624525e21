use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fieldops::config::Config;
use fieldops::directory::PgActorDirectory;
use fieldops::engine::Engine;
use fieldops::http;
use fieldops::notify::{Notifier, PgNotificationSink, jobs_changed_channel};
use fieldops::store::{PgJobStore, run_migrations};

#[derive(Parser, Debug)]
#[command(name = "fieldops", about = "Field-service job lifecycle service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FIELDOPS_LOG")
                .unwrap_or_else(|_| EnvFilter::new("fieldops=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            run_migrations(&config.database.url).await?;
            tracing::info!("migrations up to date");
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    run_migrations(&config.database.url).await?;

    let store = Arc::new(PgJobStore::new(&config.database).await?);
    let directory = Arc::new(PgActorDirectory::new(store.pool()));
    let notifier = Notifier::spawn(Arc::new(PgNotificationSink::new(store.pool())));

    let engine = Arc::new(Engine::new(
        store,
        directory,
        notifier,
        jobs_changed_channel(),
    ));

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "fieldops listening");

    axum::serve(listener, http::router(engine)).await?;
    Ok(())
}
