//! Types d'erreurs pour le crate parcel-ingest

use thiserror::Error;

/// Erreurs fatales : le lot entier est rejeté, aucun enregistrement produit
#[derive(Debug, Error)]
pub enum IngestError {
    /// Les octets reçus ne sont ni du JSON/GeoJSON ni une archive ZIP lisible
    #[error("Parse error in {source_kind}: {reason}")]
    Parse {
        source_kind: &'static str,
        reason: String,
    },

    /// Archive shapefile incomplète
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl IngestError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse(source_kind: &'static str, reason: impl Into<String>) -> Self {
        Self::Parse {
            source_kind,
            reason: reason.into(),
        }
    }
}

/// Structure d'archive invalide (fatal pour le lot)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    /// Membre obligatoire absent (`.shp` ou `.dbf`)
    #[error("Missing required member in archive: .{0}")]
    MissingMember(&'static str),

    /// Membre présent mais illisible
    #[error("Unreadable archive member {name}: {reason}")]
    UnreadableMember { name: String, reason: String },
}

/// Erreur sur une feature isolée : la feature est ignorée, le lot continue
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    /// Feature sans géométrie
    #[error("Feature has no geometry")]
    MissingGeometry,

    /// Feature GeoJSON mal formée
    #[error("Invalid feature: {0}")]
    InvalidFeature(String),

    /// Type de géométrie autre que Polygon/MultiPolygon
    #[error("Unsupported geometry type: {0} (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry(String),

    /// Polygone sans coordonnées
    #[error("Empty polygon geometry")]
    EmptyGeometry,

    /// Enregistrement shapefile illisible
    #[error("Shapefile decode error: {0}")]
    Decode(String),
}
