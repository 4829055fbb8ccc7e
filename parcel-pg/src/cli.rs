//! Définition et implémentation des commandes CLI
//!
//! - `import` : GeoJSON / shapefile zippé -> PostGIS (ou mémoire avec `--dry-run`)
//! - `to-geojson` : normalisation vers GeoJSON, sans base
//! - `init-schema` : création du schéma et de la table
//! - `bounds` : parcelles dans une emprise
//! - `area` : surface géodésique des parcelles d'un fichier

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use rayon::prelude::*;
use tracing::{info, warn};

use parcel_ingest::{Extraction, Ingestor, SourceFormat};

use crate::config::Config;
use crate::export::pool::{create_pool, test_connection, DatabaseConfig, DatabaseOverrides};
use crate::import::import_extraction;
use crate::report::ImportReport;
use crate::store::{Bounds, MemoryStore, ParcelStore, PgStore};

/// Options de connexion PostgreSQL (défauts : variables PG*)
#[derive(Args, Debug, Clone, Default)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / persil)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

impl From<DbArgs> for DatabaseOverrides {
    fn from(args: DbArgs) -> Self {
        Self {
            host: args.host,
            database: args.database,
            user: args.user,
            password: args.password,
            port: args.port,
            ssl: args.ssl,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import parcels (GeoJSON or zipped shapefile) into PostGIS
    Import {
        /// Path to a .geojson/.json/.zip file or a directory of them
        #[arg(short, long)]
        path: PathBuf,

        /// JSON config (schema, table, aliases, transform)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use an in-memory store instead of PostGIS
        #[arg(long)]
        dry_run: bool,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,

        /// Save reports to a JSON file
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Normalize parcels to GeoJSON (no database required)
    ToGeojson {
        /// Path to a .geojson/.json/.zip file or a directory of them
        #[arg(short, long)]
        path: PathBuf,

        /// Output directory for GeoJSON files
        #[arg(short, long)]
        output: PathBuf,

        /// JSON config (aliases, transform)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Create the schema, parcel table and indexes
    InitSchema {
        /// JSON config (schema, table)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Drop the parcel table first
        #[arg(long)]
        drop_table: bool,

        /// Skip index creation
        #[arg(long)]
        skip_indexes: bool,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Print stored parcels intersecting a lon/lat envelope as GeoJSON
    Bounds {
        #[arg(long, allow_hyphen_values = true)]
        min_lng: f64,
        #[arg(long, allow_hyphen_values = true)]
        min_lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_lng: f64,
        #[arg(long, allow_hyphen_values = true)]
        max_lat: f64,

        /// Write the FeatureCollection to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON config (schema, table)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Compute the geodesic area (m²) of each parcel of a file
    Area {
        /// Path to a .geojson/.json/.zip file
        #[arg(short, long)]
        path: PathBuf,

        /// JSON config (aliases, transform)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Compute locally instead of asking PostGIS
        #[arg(long)]
        local: bool,

        #[command(flatten)]
        db: DbArgs,
    },
}

/// Exécute la commande import
pub async fn cmd_import(
    path: &Path,
    config_path: Option<&Path>,
    dry_run: bool,
    json: bool,
    report_path: Option<&Path>,
    db: DbArgs,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let ingestor = config.ingestor();
    let inputs = collect_inputs(path)?;

    if inputs.is_empty() {
        anyhow::bail!("No .geojson, .json or .zip files found in {}", path.display());
    }

    info!(
        path = %path.display(),
        files = inputs.len(),
        dry_run,
        transform = %ingestor.normalizer().transform().description(),
        "Starting import"
    );

    let reports = if dry_run {
        let store = MemoryStore::new();
        let reports = import_files(&store, &ingestor, &inputs).await;
        info!(stored = store.len(), "Dry run complete, nothing written");
        reports
    } else {
        let store = connect(&config, db).await?;
        store.create_schema(false).await?;
        store.create_indexes().await?;
        import_files(&store, &ingestor, &inputs).await
    };

    if json {
        let json = match reports.as_slice() {
            [single] => serde_json::to_string_pretty(single)?,
            many => serde_json::to_string_pretty(many)?,
        };
        println!("{}", json);
    } else {
        for report in &reports {
            report.display();
        }
        if reports.len() > 1 {
            for report in &reports {
                println!("{}", report.summary());
            }
        }
    }

    if let Some(report_path) = report_path {
        match reports.as_slice() {
            [single] => single.save_to_file(report_path)?,
            many => std::fs::write(report_path, serde_json::to_string_pretty(many)?)
                .with_context(|| format!("Failed to save report to {}", report_path.display()))?,
        }
    }

    let rejected = reports.iter().filter(|r| !r.success).count();
    if rejected > 0 {
        anyhow::bail!("{} of {} files rejected", rejected, reports.len());
    }
    Ok(())
}

/// Importe chaque fichier comme un lot indépendant
async fn import_files<S: ParcelStore>(
    store: &S,
    ingestor: &Ingestor,
    inputs: &[PathBuf],
) -> Vec<ImportReport> {
    let mut reports = Vec::with_capacity(inputs.len());

    for input in inputs {
        let source = input.display().to_string();
        let report = match ingest_file(ingestor, input) {
            Ok(extraction) => import_extraction(store, &extraction).await.with_source(source),
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(file = %source, error = %message, "File rejected");
                let mut report = ImportReport::rejected(message).with_source(source);
                report.finalize(Duration::ZERO);
                report
            }
        };
        reports.push(report);
    }

    reports
}

/// Exporte un fichier ou un dossier en GeoJSON normalisé
pub fn cmd_to_geojson(path: &Path, output: &Path, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let ingestor = config.ingestor();

    std::fs::create_dir_all(output)?;

    if path.is_dir() {
        export_directory(&ingestor, path, output)
    } else {
        let output_file = output.join(output_name(path));
        let (records, errors) = export_file(&ingestor, path, &output_file)?;
        println!(
            "Export complete: {} parcels, {} errors -> {}",
            records,
            errors,
            output.display()
        );
        Ok(())
    }
}

/// Exporte un dossier en parallèle (un lot par fichier)
fn export_directory(ingestor: &Ingestor, path: &Path, output: &Path) -> Result<()> {
    let inputs = collect_inputs(path)?;

    if inputs.is_empty() {
        anyhow::bail!("No .geojson, .json or .zip files found in {}", path.display());
    }

    info!("Found {} files to export", inputs.len());

    let success_count = AtomicUsize::new(0);
    let failed_count = AtomicUsize::new(0);
    let record_count = AtomicUsize::new(0);
    let error_count = AtomicUsize::new(0);

    inputs
        .par_iter()
        .for_each(|input| match export_file(ingestor, input, &output_path(path, input, output)) {
            Ok((records, errors)) => {
                success_count.fetch_add(1, Ordering::Relaxed);
                record_count.fetch_add(records, Ordering::Relaxed);
                error_count.fetch_add(errors, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Failed to export {}: {:#}", input.display(), e);
                failed_count.fetch_add(1, Ordering::Relaxed);
            }
        });

    let failed = failed_count.load(Ordering::Relaxed);
    println!(
        "Export complete: {}/{} files, {} parcels, {} feature errors",
        success_count.load(Ordering::Relaxed),
        inputs.len(),
        record_count.load(Ordering::Relaxed),
        error_count.load(Ordering::Relaxed)
    );

    if failed > 0 {
        warn!("{} files failed", failed);
    }

    Ok(())
}

/// Normalise un fichier et écrit le résultat dans `output_file`
fn export_file(ingestor: &Ingestor, input: &Path, output_file: &Path) -> Result<(usize, usize)> {
    let extraction = ingest_file(ingestor, input)?;

    if let Some(parent) = output_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    crate::export::geojson::export_to_geojson(&extraction.records, &output_file)?;

    for error in &extraction.errors {
        warn!(file = %input.display(), "{}", error);
    }
    info!(
        "Exported {} parcels from {} to {}",
        extraction.records.len(),
        input.display(),
        output_file.display()
    );

    Ok((extraction.records.len(), extraction.errors.len()))
}

/// Crée la table des parcelles
pub async fn cmd_init_schema(
    config_path: Option<&Path>,
    drop_table: bool,
    skip_indexes: bool,
    db: DbArgs,
) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let store = connect(&config, db).await?;

    store.create_schema(drop_table).await?;
    if !skip_indexes {
        store.create_indexes().await?;
    }

    println!("Schema ready: {}", store.qualified_table());
    Ok(())
}

/// Parcelles stockées dans une emprise, en FeatureCollection
pub async fn cmd_bounds(
    bounds: Bounds,
    output: Option<&Path>,
    config_path: Option<&Path>,
    db: DbArgs,
) -> Result<()> {
    if !bounds.is_valid() {
        anyhow::bail!("Invalid bounds: {:?}", bounds);
    }

    let config = Config::load_or_default(config_path)?;
    let store = connect(&config, db).await?;
    let parcels = store.parcels_in_bounds(bounds).await?;
    info!(count = parcels.len(), "Parcels found in bounds");

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            let mut writer = std::io::BufWriter::new(file);
            crate::export::geojson::write_stored(&mut writer, &parcels)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            crate::export::geojson::write_stored(&mut stdout, &parcels)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

/// Surface de chaque parcelle d'un fichier
pub async fn cmd_area(path: &Path, config_path: Option<&Path>, local: bool, db: DbArgs) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let extraction = ingest_file(&config.ingestor(), path)?;

    if local {
        print_areas(&MemoryStore::new(), &extraction).await
    } else {
        print_areas(&connect(&config, db).await?, &extraction).await
    }
}

async fn print_areas<S: ParcelStore>(store: &S, extraction: &Extraction) -> Result<()> {
    println!("parcel_id\tarea_m2\tluas_peta");
    for record in &extraction.records {
        let area = match store.geometry_area(record.geometry()).await {
            Ok(area) => area,
            Err(e) => {
                warn!(parcel_id = %record.parcel_id(), error = %e, "Area not computed");
                continue;
            }
        };
        let declared = record
            .attributes()
            .luas_peta
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{:.2}\t{}", record.parcel_id(), area, declared);
    }
    for error in &extraction.errors {
        warn!("{}", error);
    }
    Ok(())
}

async fn connect(config: &Config, db: DbArgs) -> Result<PgStore> {
    let mut db_config = DatabaseConfig::from_env();
    db_config.apply(db.into())?;
    info!(
        "Database: {}@{}:{}/{} (SSL: {:?})",
        db_config.user, db_config.host, db_config.port, db_config.dbname, db_config.ssl_mode
    );

    let pool = create_pool(&db_config).await?;
    test_connection(&pool).await?;

    Ok(PgStore::new(pool, config.schema.clone(), config.table.clone()))
}

/// Lit un fichier et le traite selon son extension
pub fn ingest_file(ingestor: &Ingestor, path: &Path) -> Result<Extraction> {
    let format = SourceFormat::from_path(path).with_context(|| {
        format!(
            "Unsupported file type: {} (expected .geojson, .json or .zip)",
            path.display()
        )
    })?;
    let bytes =
        std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;

    ingestor
        .ingest(format, &bytes)
        .with_context(|| format!("Failed to process {}", path.display()))
}

/// Chemin de sortie d'une entrée : même sous-dossier relatif que sous `root`
fn output_path(root: &Path, input: &Path, output: &Path) -> PathBuf {
    let relative_dir = input
        .strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new(""));
    output.join(relative_dir).join(output_name(input))
}

/// Nom du fichier GeoJSON produit pour une entrée
fn output_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    format!("{}.geojson", stem)
}

/// Collecte récursivement les fichiers pris en charge, triés
fn collect_inputs(path: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    if path.is_file() {
        if SourceFormat::from_path(path).is_some() {
            inputs.push(path.to_path_buf());
        }
        return Ok(inputs);
    }

    for entry in std::fs::read_dir(path).with_context(|| format!("Cannot read {}", path.display()))? {
        let entry_path = entry?.path();

        if entry_path.is_dir() {
            inputs.extend(collect_inputs(&entry_path)?);
        } else if SourceFormat::from_path(&entry_path).is_some() {
            inputs.push(entry_path);
        }
    }

    inputs.sort();
    Ok(inputs)
}
