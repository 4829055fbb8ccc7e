//! Point d'entrée CLI pour parcel-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use parcel_pg::cli::{self, Commands};
use parcel_pg::Bounds;

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Importer des parcelles cadastrales vers PostGIS ou GeoJSON
#[derive(Parser)]
#[command(name = "parcel-pg")]
#[command(author, version)]
#[command(about = "Importer des parcelles cadastrales (GeoJSON, shapefile zippé) vers PostGIS ou GeoJSON")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Import {
            path,
            config,
            dry_run,
            json,
            report,
            db,
        } => {
            info!(path = %path.display(), dry_run, "Import");
            cli::cmd_import(&path, config.as_deref(), dry_run, json, report.as_deref(), db).await?;
        }
        Commands::ToGeojson {
            path,
            output,
            config,
        } => {
            info!(path = %path.display(), output = %output.display(), "Export vers GeoJSON");
            // Conversion CPU (rayon) hors du runtime async
            tokio::task::spawn_blocking(move || {
                cli::cmd_to_geojson(&path, &output, config.as_deref())
            })
            .await??;
        }
        Commands::InitSchema {
            config,
            drop_table,
            skip_indexes,
            db,
        } => {
            cli::cmd_init_schema(config.as_deref(), drop_table, skip_indexes, db).await?;
        }
        Commands::Bounds {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
            output,
            config,
            db,
        } => {
            let bounds = Bounds::new(min_lng, min_lat, max_lng, max_lat);
            cli::cmd_bounds(bounds, output.as_deref(), config.as_deref(), db).await?;
        }
        Commands::Area {
            path,
            config,
            local,
            db,
        } => {
            cli::cmd_area(&path, config.as_deref(), local, db).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs sur stderr : stdout reste exploitable (--json, bounds)
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
