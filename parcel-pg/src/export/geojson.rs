//! Export GeoJSON avec geozero (streaming)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;

use parcel_ingest::ParcelRecord;

use crate::store::StoredParcel;

const HEADER: &str = r#"{"type":"FeatureCollection","crs":{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::4326"}},"features":["#;

/// Géométrie en texte GeoJSON
pub fn geometry_to_geojson(geometry: &Geometry<f64>) -> geozero::error::Result<String> {
    let mut buf = Vec::new();
    let mut writer = GeoJsonWriter::new(&mut buf);
    geometry.process_geom(&mut writer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Écrit les parcelles normalisées d'un lot dans un fichier FeatureCollection
pub fn export_to_geojson(records: &[ParcelRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_records(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

/// FeatureCollection des enregistrements d'un lot
pub fn write_records<W: Write>(writer: &mut W, records: &[ParcelRecord]) -> Result<()> {
    writer.write_all(HEADER.as_bytes())?;
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        let geometry = Geometry::MultiPolygon(record.geometry().clone());
        write_feature(writer, record.parcel_id(), &record.properties_json(), &geometry)?;
    }
    write!(writer, "]}}")?;
    Ok(())
}

/// FeatureCollection de parcelles relues depuis le stockage
pub fn write_stored<W: Write>(writer: &mut W, parcels: &[StoredParcel]) -> Result<()> {
    writer.write_all(HEADER.as_bytes())?;
    for (i, parcel) in parcels.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, &parcel.parcel_id, &parcel.properties, &parcel.geometry)?;
    }
    write!(writer, "]}}")?;
    Ok(())
}

fn write_feature<W: Write>(
    writer: &mut W,
    id: &str,
    properties: &serde_json::Value,
    geometry: &Geometry<f64>,
) -> Result<()> {
    write!(writer, r#"{{"type":"Feature","id":"#)?;
    serde_json::to_writer(&mut *writer, id)?;

    write!(writer, r#","geometry":"#)?;
    let mut geom_writer = GeoJsonWriter::new(&mut *writer);
    geometry.process_geom(&mut geom_writer)?;

    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, properties)?;
    write!(writer, "}}")?;

    Ok(())
}
