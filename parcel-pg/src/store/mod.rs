//! Passerelle de persistance des parcelles
//!
//! Deux implémentations de `ParcelStore` : PostGIS (`PgStore`) et mémoire
//! (`MemoryStore`, pour les essais à blanc et les tests).

pub mod memory;
pub mod postgres;

use geo::{Geometry, MultiPolygon, Rect};
use parcel_ingest::ParcelRecord;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Erreurs de stockage ; un rejet n'interrompt jamais le lot
#[derive(Debug, Error)]
pub enum StorageError {
    /// Le stockage a refusé l'enregistrement (contrainte, géométrie invalide...)
    #[error("Parcel {parcel_id} rejected: {reason}")]
    Rejected { parcel_id: String, reason: String },

    /// Géométrie refusée par un calcul
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Base injoignable ou pool épuisé
    #[error("Storage unavailable: {0}")]
    Connection(String),

    /// Résultat de requête illisible
    #[error("Failed to decode stored parcel: {0}")]
    Decode(String),
}

/// Emprise rectangulaire en lon/lat (degrés)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Coordonnées finies et min <= max sur les deux axes
    pub fn is_valid(&self) -> bool {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lng <= self.max_lng
            && self.min_lat <= self.max_lat
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            (self.min_lng, self.min_lat),
            (self.max_lng, self.max_lat),
        )
    }
}

/// Parcelle relue depuis le stockage
#[derive(Debug, Clone, PartialEq)]
pub struct StoredParcel {
    pub parcel_id: String,
    /// Attributs canoniques, inconnus inclus (même forme que `ParcelRecord::properties_json`)
    pub properties: serde_json::Value,
    pub geometry: Geometry<f64>,
}

/// Opérations de stockage utilisées par l'import et la CLI
#[allow(async_fn_in_trait)]
pub trait ParcelStore {
    /// Insère une parcelle et renvoie l'identifiant stocké
    async fn insert_parcel(&self, record: &ParcelRecord) -> Result<String, StorageError>;

    /// Parcelles dont la géométrie intersecte l'emprise
    async fn parcels_in_bounds(&self, bounds: Bounds) -> Result<Vec<StoredParcel>, StorageError>;

    /// Surface géodésique en m²
    async fn geometry_area(&self, geometry: &MultiPolygon<f64>) -> Result<f64, StorageError>;
}
