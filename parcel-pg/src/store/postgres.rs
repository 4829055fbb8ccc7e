//! Stockage PostGIS

use anyhow::{Context, Result};
use deadpool_postgres::Pool;
use geo::{Geometry, MultiPolygon};
use geozero::geojson::GeoJson;
use geozero::ToGeo;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, warn};

use parcel_ingest::fields::DEFAULT_STATUS;
use parcel_ingest::ParcelRecord;

use super::{Bounds, ParcelStore, StorageError, StoredParcel};
use crate::export::geojson::geometry_to_geojson;

/// Colonnes attributaires, dans l'ordre des paramètres d'insertion
const COLUMNS: &[&str] = &[
    "parcel_id",
    "provinsi",
    "kabupaten",
    "kecamatan",
    "desa",
    "nib",
    "nomor_su",
    "hak",
    "tipe_hak",
    "nomor_sk",
    "tanggal_sk",
    "tanggal_terbit_hak",
    "tanggal_berakhir_hak",
    "luas_tertulis",
    "luas_peta",
    "pemilik",
    "tipe_pemilik",
    "penggunaan",
    "pemanfaatan",
    "status_penggunaan",
    "kasus",
    "pihak_bersengketa",
    "penyelesaian",
    "hasil",
    "catatan_perbaikan",
    "nomor_peta",
    "status",
    "keterangan",
    "extra",
];

/// Table de parcelles dans PostGIS (SRID 4326)
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    schema: String,
    table: String,
}

impl PgStore {
    pub fn new(pool: Pool, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// Crée le schéma, l'extension PostGIS et la table des parcelles
    pub async fn create_schema(&self, drop_existing: bool) -> Result<()> {
        let client = self.pool.get().await?;

        if drop_existing {
            client
                .execute(&format!("DROP TABLE IF EXISTS {} CASCADE", self.qualified_table()), &[])
                .await
                .context("Failed to drop table")?;
        }

        client
            .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema), &[])
            .await
            .context("Failed to create schema")?;

        // Peut nécessiter des droits superuser : on vérifie alors que l'extension existe
        if let Err(e) = client
            .execute("CREATE EXTENSION IF NOT EXISTS postgis", &[])
            .await
        {
            warn!("CREATE EXTENSION postgis failed (will check if already installed): {e}");
            let exists = client
                .query_opt("SELECT 1 FROM pg_extension WHERE extname = 'postgis'", &[])
                .await
                .context("Failed to check pg_extension")?
                .is_some();
            if !exists {
                return Err(anyhow::anyhow!(
                    "PostGIS extension is not installed and could not be created: {e}"
                ));
            }
        }

        client
            .execute(&self.create_table_sql(), &[])
            .await
            .with_context(|| format!("Failed to create table {}", self.qualified_table()))?;

        info!("Created table {}", self.qualified_table());
        Ok(())
    }

    /// Index spatial et index sur les identifiants juridiques
    pub async fn create_indexes(&self) -> Result<()> {
        let client = self.pool.get().await?;

        client
            .execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_{}_geom ON {} USING GIST (geometry)",
                    self.schema,
                    self.table,
                    self.qualified_table()
                ),
                &[],
            )
            .await
            .with_context(|| format!("Failed to create geometry index on {}", self.qualified_table()))?;

        client
            .execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_{}_nib ON {} (nib)",
                    self.schema,
                    self.table,
                    self.qualified_table()
                ),
                &[],
            )
            .await
            .with_context(|| format!("Failed to create nib index on {}", self.qualified_table()))?;

        Ok(())
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGSERIAL PRIMARY KEY,
                parcel_id TEXT NOT NULL UNIQUE,
                provinsi TEXT,
                kabupaten TEXT,
                kecamatan TEXT,
                desa TEXT,
                nib TEXT,
                nomor_su TEXT,
                hak TEXT,
                tipe_hak TEXT,
                nomor_sk TEXT,
                tanggal_sk DATE,
                tanggal_terbit_hak DATE,
                tanggal_berakhir_hak DATE,
                luas_tertulis DOUBLE PRECISION,
                luas_peta DOUBLE PRECISION,
                pemilik TEXT,
                tipe_pemilik TEXT,
                penggunaan TEXT,
                pemanfaatan TEXT,
                status_penggunaan TEXT,
                kasus TEXT,
                pihak_bersengketa TEXT[] NOT NULL DEFAULT '{{}}',
                penyelesaian TEXT,
                hasil TEXT,
                catatan_perbaikan TEXT,
                nomor_peta TEXT,
                status TEXT NOT NULL DEFAULT '{}',
                keterangan TEXT,
                extra JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                geometry geometry(MultiPolygon, 4326) NOT NULL,
                created_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
            self.qualified_table(),
            DEFAULT_STATUS
        )
    }

    fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("${}", i)).collect();
        format!(
            "INSERT INTO {} ({}, geometry) VALUES ({}, ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON(${}::text), 4326))) RETURNING parcel_id",
            self.qualified_table(),
            COLUMNS.join(", "),
            placeholders.join(", "),
            COLUMNS.len() + 1
        )
    }

    fn bounds_sql(&self) -> String {
        // Colonnes canoniques + extra aplati : même forme que ParcelRecord::properties_json
        format!(
            "SELECT t.parcel_id, (to_jsonb(t) - 'id' - 'geometry' - 'created_at' - 'extra') || t.extra, \
             ST_AsGeoJSON(t.geometry) \
             FROM {} t \
             WHERE ST_Intersects(t.geometry, ST_MakeEnvelope($1, $2, $3, $4, 4326)) \
             ORDER BY t.id",
            self.qualified_table()
        )
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StorageError> {
        self.pool
            .get()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

/// Erreur serveur (contrainte, géométrie refusée) ou perte de connexion
fn classify_error(error: tokio_postgres::Error, parcel_id: &str) -> StorageError {
    match error.as_db_error() {
        Some(db) => StorageError::Rejected {
            parcel_id: parcel_id.to_string(),
            reason: db.message().to_string(),
        },
        None => StorageError::Connection(error.to_string()),
    }
}

impl ParcelStore for PgStore {
    async fn insert_parcel(&self, record: &ParcelRecord) -> Result<String, StorageError> {
        let a = record.attributes();
        let parcel_id = record.parcel_id();

        let geometry = geometry_to_geojson(&Geometry::MultiPolygon(record.geometry().clone()))
            .map_err(|e| StorageError::Rejected {
                parcel_id: parcel_id.to_string(),
                reason: e.to_string(),
            })?;
        let extra = serde_json::to_value(&a.extra).map_err(|e| StorageError::Rejected {
            parcel_id: parcel_id.to_string(),
            reason: e.to_string(),
        })?;
        let status = a.status.as_deref().unwrap_or(DEFAULT_STATUS);

        let params: [&(dyn ToSql + Sync); 30] = [
            &parcel_id,
            &a.provinsi,
            &a.kabupaten,
            &a.kecamatan,
            &a.desa,
            &a.nib,
            &a.nomor_su,
            &a.hak,
            &a.tipe_hak,
            &a.nomor_sk,
            &a.tanggal_sk,
            &a.tanggal_terbit_hak,
            &a.tanggal_berakhir_hak,
            &a.luas_tertulis,
            &a.luas_peta,
            &a.pemilik,
            &a.tipe_pemilik,
            &a.penggunaan,
            &a.pemanfaatan,
            &a.status_penggunaan,
            &a.kasus,
            &a.pihak_bersengketa,
            &a.penyelesaian,
            &a.hasil,
            &a.catatan_perbaikan,
            &a.nomor_peta,
            &status,
            &a.keterangan,
            &extra,
            &geometry,
        ];

        let client = self.client().await?;
        let row = client
            .query_one(&self.insert_sql(), &params)
            .await
            .map_err(|e| classify_error(e, parcel_id))?;

        let stored: String = row
            .try_get(0)
            .map_err(|e| StorageError::Decode(e.to_string()))?;
        debug!(parcel_id = %stored, table = %self.qualified_table(), "Parcel inserted");
        Ok(stored)
    }

    async fn parcels_in_bounds(&self, bounds: Bounds) -> Result<Vec<StoredParcel>, StorageError> {
        let client = self.client().await?;
        let rows = client
            .query(
                &self.bounds_sql(),
                &[&bounds.min_lng, &bounds.min_lat, &bounds.max_lng, &bounds.max_lat],
            )
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let parcel_id: String = row
                    .try_get(0)
                    .map_err(|e| StorageError::Decode(e.to_string()))?;
                let properties: serde_json::Value = row
                    .try_get(1)
                    .map_err(|e| StorageError::Decode(e.to_string()))?;
                let geometry_text: String = row
                    .try_get(2)
                    .map_err(|e| StorageError::Decode(e.to_string()))?;
                let geometry = GeoJson(&geometry_text)
                    .to_geo()
                    .map_err(|e| StorageError::Decode(format!("{}: {}", parcel_id, e)))?;

                Ok(StoredParcel {
                    parcel_id,
                    properties,
                    geometry,
                })
            })
            .collect()
    }

    async fn geometry_area(&self, geometry: &MultiPolygon<f64>) -> Result<f64, StorageError> {
        let text = geometry_to_geojson(&Geometry::MultiPolygon(geometry.clone()))
            .map_err(|e| StorageError::InvalidGeometry(e.to_string()))?;

        let client = self.client().await?;
        let row = client
            .query_one(
                "SELECT ST_Area(ST_SetSRID(ST_GeomFromGeoJSON($1::text), 4326)::geography)",
                &[&text],
            )
            .await
            .map_err(|e| match e.as_db_error() {
                Some(db) => StorageError::InvalidGeometry(db.message().to_string()),
                None => StorageError::Connection(e.to_string()),
            })?;

        row.try_get::<_, Option<f64>>(0)
            .map_err(|e| StorageError::Decode(e.to_string()))?
            .ok_or_else(|| StorageError::InvalidGeometry("area is NULL".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pool::{create_pool, DatabaseConfig};

    // Le pool est paresseux : aucune connexion n'est ouverte ici
    async fn store() -> PgStore {
        let pool = create_pool(&DatabaseConfig::default()).await.unwrap();
        PgStore::new(pool, "kadaster", "persil")
    }

    #[tokio::test]
    async fn test_insert_sql_placeholders() {
        let sql = store().await.insert_sql();
        assert!(sql.starts_with("INSERT INTO kadaster.persil (parcel_id, provinsi"));
        assert!(sql.contains("$29, ST_Multi(ST_SetSRID(ST_GeomFromGeoJSON($30::text), 4326))"));
        assert!(sql.ends_with("RETURNING parcel_id"));
        assert_eq!(COLUMNS.len() + 1, 30);
    }

    #[tokio::test]
    async fn test_create_table_sql() {
        let sql = store().await.create_table_sql();
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS kadaster.persil"));
        assert!(sql.contains("parcel_id TEXT NOT NULL UNIQUE"));
        assert!(sql.contains("geometry geometry(MultiPolygon, 4326) NOT NULL"));
        assert!(sql.contains("DEFAULT 'active'"));
        assert!(sql.contains("TEXT[] NOT NULL DEFAULT '{}'"));
        for column in COLUMNS {
            assert!(sql.contains(&format!("{} ", column)), "missing column {}", column);
        }
    }

    #[tokio::test]
    async fn test_bounds_sql() {
        let sql = store().await.bounds_sql();
        assert!(sql.contains("ST_MakeEnvelope($1, $2, $3, $4, 4326)"));
        assert!(sql.contains("FROM kadaster.persil t"));
    }
}
