//! Stockage en mémoire (essais à blanc, tests)

use std::sync::Mutex;

use geo::{GeodesicArea, Geometry, Intersects, MultiPolygon};
use parcel_ingest::ParcelRecord;
use tracing::debug;

use super::{Bounds, ParcelStore, StorageError, StoredParcel};

struct Entry {
    parcel_id: String,
    properties: serde_json::Value,
    geometry: MultiPolygon<f64>,
}

/// Stockage volatil ; refuse les doublons de `parcel_id` comme la contrainte UNIQUE
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Entry>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Connection("memory store lock poisoned".into()))
    }

    /// Nombre de parcelles stockées
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identifiants dans l'ordre d'insertion
    pub fn parcel_ids(&self) -> Vec<String> {
        self.lock()
            .map(|entries| entries.iter().map(|e| e.parcel_id.clone()).collect())
            .unwrap_or_default()
    }
}

impl ParcelStore for MemoryStore {
    async fn insert_parcel(&self, record: &ParcelRecord) -> Result<String, StorageError> {
        let mut entries = self.lock()?;

        if record.geometry().0.is_empty() {
            return Err(StorageError::Rejected {
                parcel_id: record.parcel_id().to_string(),
                reason: "empty geometry".into(),
            });
        }
        if entries.iter().any(|e| e.parcel_id == record.parcel_id()) {
            return Err(StorageError::Rejected {
                parcel_id: record.parcel_id().to_string(),
                reason: "duplicate parcel_id".into(),
            });
        }

        entries.push(Entry {
            parcel_id: record.parcel_id().to_string(),
            properties: record.properties_json(),
            geometry: record.geometry().clone(),
        });
        debug!(parcel_id = record.parcel_id(), total = entries.len(), "Parcel stored in memory");

        Ok(record.parcel_id().to_string())
    }

    async fn parcels_in_bounds(&self, bounds: Bounds) -> Result<Vec<StoredParcel>, StorageError> {
        let envelope = bounds.to_rect().to_polygon();
        let entries = self.lock()?;

        Ok(entries
            .iter()
            .filter(|e| e.geometry.intersects(&envelope))
            .map(|e| StoredParcel {
                parcel_id: e.parcel_id.clone(),
                properties: e.properties.clone(),
                geometry: Geometry::MultiPolygon(e.geometry.clone()),
            })
            .collect())
    }

    async fn geometry_area(&self, geometry: &MultiPolygon<f64>) -> Result<f64, StorageError> {
        if geometry.0.is_empty() {
            return Err(StorageError::InvalidGeometry("empty MultiPolygon".into()));
        }
        Ok(geometry.geodesic_area_unsigned())
    }
}
