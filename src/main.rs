use assent::{settings, storage, web};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use migration::MigratorTrait;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "assent", version, about = "Consent record management service")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database)
    let db = storage::init(&settings.database).await?;

    if settings.database.run_migrations {
        migration::Migrator::up(&db, None).await.into_diagnostic()?;
        tracing::info!("Database migrations applied");
    }

    // start web server
    web::serve(settings, db).await?;
    Ok(())
}
