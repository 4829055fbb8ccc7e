//! # parcel-pg
//!
//! Import de parcelles cadastrales (GeoJSON, shapefiles zippés) vers PostGIS.
//!
//! ## Features
//!
//! - Passerelle de stockage PostGIS avec pool de connexions, ou en mémoire
//! - Import séquentiel, une erreur par parcelle sans interrompre le lot
//! - Rapport d'import (texte ou JSON)
//! - Export GeoJSON standalone
//!
//! ## Usage CLI
//!
//! ```bash
//! # Import vers PostGIS
//! parcel-pg import --path ./persil.zip
//! parcel-pg import --path ./uploads/ --json
//!
//! # Essai à blanc (stockage en mémoire)
//! parcel-pg import --path ./persil.geojson --dry-run
//!
//! # Export GeoJSON (sans base de données)
//! parcel-pg to-geojson --path ./uploads/ --output ./geojson/
//! ```

pub mod cli;
pub mod config;
pub mod export;
pub mod import;
pub mod report;
pub mod store;

pub use config::Config;
pub use export::pool::{create_pool, DatabaseConfig};
pub use import::import_extraction;
pub use report::{ImportReport, ImportStatus};
pub use store::{Bounds, MemoryStore, ParcelStore, PgStore, StorageError, StoredParcel};
