//! # parcel-ingest
//!
//! Ingestion de parcelles cadastrales depuis des fichiers GeoJSON ou des
//! shapefiles zippés.
//!
//! ## Features
//!
//! - Mapping des dialectes de noms d'attributs vers un schéma canonique
//! - Détection géographique / projeté et conversion UTM -> lon/lat
//! - Géométries toujours en `MultiPolygon` (types `geo`)
//! - Erreurs par feature accumulées, sans interrompre le lot
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parcel_ingest::process_geojson;
//!
//! let extraction = process_geojson(&text)?;
//! println!("{} parcelles, {} erreurs", extraction.records.len(), extraction.errors.len());
//!
//! for record in &extraction.records {
//!     println!("{}: {:?}", record.parcel_id(), record.attributes().pemilik);
//! }
//! ```

pub mod archive;
pub mod collection;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod prj;
pub mod shp;
pub mod types;

pub use error::{ArchiveError, IngestError, MappingError};
pub use fields::FieldMapper;
pub use geometry::{CoordinateTransform, GeometryNormalizer};
pub use prj::ProjectionInfo;
pub use types::{
    AttrValue, Extraction, FeatureError, ParcelAttributes, ParcelRecord, Properties, RawFeature,
    SourceFormat,
};

use std::path::Path;

use tracing::{info, warn};

impl SourceFormat {
    /// Format déduit de l'extension (`.zip`, `.json`, `.geojson`)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "zip" => Some(SourceFormat::Shapefile),
            "json" | "geojson" => Some(SourceFormat::GeoJson),
            _ => None,
        }
    }
}

/// Identifiant généré pour une parcelle sans identifiant source
pub fn generated_id(batch_timestamp_ms: i64, index: usize) -> String {
    format!("PARCEL_{}_{}", batch_timestamp_ms, index)
}

/// Chaîne d'ingestion : mapping des attributs, normalisation, identifiants
///
/// Sans état mutable : un même `Ingestor` peut traiter plusieurs lots.
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    mapper: FieldMapper,
    normalizer: GeometryNormalizer,
    /// Horodatage imposé (tests) ; sinon pris au début de chaque lot
    batch_timestamp: Option<i64>,
}

impl Ingestor {
    pub fn new(mapper: FieldMapper, normalizer: GeometryNormalizer) -> Self {
        Self {
            mapper,
            normalizer,
            batch_timestamp: None,
        }
    }

    /// Fixe l'horodatage utilisé pour les identifiants générés
    pub fn with_batch_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.batch_timestamp = Some(timestamp_ms);
        self
    }

    pub fn mapper(&self) -> &FieldMapper {
        &self.mapper
    }

    pub fn normalizer(&self) -> &GeometryNormalizer {
        &self.normalizer
    }

    fn batch_stamp(&self) -> i64 {
        self.batch_timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
    }

    /// Traite un texte GeoJSON
    ///
    /// # Errors
    ///
    /// `IngestError::Parse` si le texte n'est pas du JSON ou pas une
    /// FeatureCollection / Feature. Les erreurs par feature sont dans
    /// `Extraction::errors`.
    pub fn process_geojson(&self, text: &str) -> Result<Extraction, IngestError> {
        let raw = collection::decode(text)?;
        Ok(self.assemble(SourceFormat::GeoJson, raw, None))
    }

    /// Traite un payload GeoJSON brut (BOM UTF-8/UTF-16 accepté)
    pub fn process_geojson_bytes(&self, bytes: &[u8]) -> Result<Extraction, IngestError> {
        let text = collection::decode_text(bytes)?;
        self.process_geojson(&text)
    }

    /// Traite une archive ZIP contenant un shapefile
    ///
    /// # Errors
    ///
    /// `IngestError::Parse` si les octets ne sont pas un ZIP ou si les
    /// en-têtes `.shp`/`.dbf` sont illisibles, `IngestError::Archive` si
    /// `.shp` ou `.dbf` manque.
    pub fn extract_shapefile(&self, zip_bytes: &[u8]) -> Result<Extraction, IngestError> {
        let archive = archive::extract(zip_bytes)?;

        let projection = archive.prj.as_deref().and_then(prj::parse);
        match &projection {
            Some(info) if info.conflicts_with_default() => warn!(
                projection = %info.name,
                zone = ?info.utm_zone,
                transform = %self.normalizer.transform().description(),
                "Declared projection differs from the assumed UTM zone 47N"
            ),
            Some(info) => info!(projection = %info.name, epsg = ?info.epsg, "Shapefile projection"),
            None if archive.prj.is_some() => warn!("Unreadable .prj ignored"),
            None => {}
        }

        let raw = shp::decode(&archive)?;
        Ok(self.assemble(SourceFormat::Shapefile, raw, projection))
    }

    /// Traite des octets selon leur format
    pub fn ingest(&self, format: SourceFormat, bytes: &[u8]) -> Result<Extraction, IngestError> {
        match format {
            SourceFormat::GeoJson => self.process_geojson_bytes(bytes),
            SourceFormat::Shapefile => self.extract_shapefile(bytes),
        }
    }

    /// Mappe, normalise et identifie les features décodées d'un lot
    fn assemble(
        &self,
        format: SourceFormat,
        raw: Vec<RawFeature>,
        projection: Option<ProjectionInfo>,
    ) -> Extraction {
        let stamp = self.batch_stamp();
        let mut extraction = Extraction::new(format);
        extraction.projection = projection;
        extraction.feature_count = raw.len();

        for (index, feature) in raw.into_iter().enumerate() {
            match self.build_record(index, feature, stamp) {
                Ok(record) => extraction.records.push(record),
                Err(error) => {
                    warn!(index, error = %error.error, "Feature skipped");
                    extraction.errors.push(error);
                }
            }
        }

        info!(
            format = ?format,
            features = extraction.feature_count,
            records = extraction.records.len(),
            errors = extraction.errors.len(),
            "Batch extracted"
        );
        extraction
    }

    /// Construit l'enregistrement d'une feature, ou son erreur
    pub fn build_record(
        &self,
        index: usize,
        feature: RawFeature,
        batch_timestamp_ms: i64,
    ) -> Result<ParcelRecord, FeatureError> {
        let attributes = self.mapper.map(&feature.properties);

        let geometry = feature
            .geometry
            .and_then(|g| self.normalizer.normalize_parcel(g))
            .map_err(|error| FeatureError {
                index,
                parcel_id: attributes.derived_id().map(str::to_string),
                error,
            })?;

        let parcel_id = attributes
            .derived_id()
            .map(str::to_string)
            .unwrap_or_else(|| generated_id(batch_timestamp_ms, index));

        Ok(ParcelRecord::new(parcel_id, attributes, geometry))
    }
}

/// Traite un texte GeoJSON avec la configuration par défaut
pub fn process_geojson(text: &str) -> Result<Extraction, IngestError> {
    Ingestor::default().process_geojson(text)
}

/// Traite une archive shapefile zippée avec la configuration par défaut
pub fn extract_shapefile(zip_bytes: &[u8]) -> Result<Extraction, IngestError> {
    Ingestor::default().extract_shapefile(zip_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};

    fn square_feature(props: &[(&str, AttrValue)]) -> RawFeature {
        RawFeature::new(
            props.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            Geometry::Polygon(polygon![
                (x: 98.6, y: 3.6),
                (x: 98.61, y: 3.6),
                (x: 98.61, y: 3.61),
                (x: 98.6, y: 3.6),
            ]),
        )
    }

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("a/persil.ZIP")),
            Some(SourceFormat::Shapefile)
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("persil.geojson")),
            Some(SourceFormat::GeoJson)
        );
        assert_eq!(SourceFormat::from_path(Path::new("persil.json")), Some(SourceFormat::GeoJson));
        assert_eq!(SourceFormat::from_path(Path::new("persil.csv")), None);
        assert_eq!(SourceFormat::from_path(Path::new("persil")), None);
    }

    #[test]
    fn test_identifier_precedence() {
        let ingestor = Ingestor::default();
        let cases: [(Vec<(&str, AttrValue)>, &str); 4] = [
            (vec![("PARCEL_ID", "P-1".into()), ("NIB", "N-1".into()), ("HAK", "H-1".into())], "P-1"),
            (vec![("NIB", "N-1".into()), ("HAK", "H-1".into())], "N-1"),
            (vec![("HAK", "H-1".into())], "H-1"),
            (vec![("PARCEL_ID", "-".into()), ("HAK", "H-1".into())], "H-1"),
        ];
        for (props, expected) in cases {
            let record = ingestor.build_record(0, square_feature(&props), 1).unwrap();
            assert_eq!(record.parcel_id(), expected);
        }
    }

    #[test]
    fn test_generated_ids_share_batch_stamp() {
        let ingestor = Ingestor::default();
        let a = ingestor.build_record(0, square_feature(&[]), 1700000000000).unwrap();
        let b = ingestor.build_record(1, square_feature(&[]), 1700000000000).unwrap();
        assert_eq!(a.parcel_id(), "PARCEL_1700000000000_0");
        assert_eq!(b.parcel_id(), "PARCEL_1700000000000_1");
        assert_eq!(a.attributes().parcel_id.as_deref(), Some("PARCEL_1700000000000_0"));
    }

    #[test]
    fn test_error_carries_derived_id() {
        let feature = RawFeature::failed(
            [("NIB".to_string(), AttrValue::from("N-9"))].into_iter().collect(),
            MappingError::MissingGeometry,
        );
        let err = Ingestor::default().build_record(4, feature, 1).unwrap_err();
        assert_eq!(err.index, 4);
        assert_eq!(err.parcel_id.as_deref(), Some("N-9"));
        assert_eq!(err.error, MappingError::MissingGeometry);
    }

    #[test]
    fn test_assemble_counts() {
        let ingestor = Ingestor::default().with_batch_timestamp(42);
        let raw = vec![
            square_feature(&[]),
            RawFeature::failed(Properties::new(), MappingError::EmptyGeometry),
            square_feature(&[]),
        ];
        let extraction = ingestor.assemble(SourceFormat::GeoJson, raw, None);
        assert_eq!(extraction.feature_count, 3);
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.errors.len(), 1);
        assert_eq!(extraction.errors[0].index, 1);
        assert_eq!(extraction.records[1].parcel_id(), "PARCEL_42_2");
    }
}
