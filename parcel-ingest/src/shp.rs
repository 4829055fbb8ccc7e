//! Décodage des couples (géométrie, enregistrement dBase) d'un shapefile

use std::io::Cursor;

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use shapefile::dbase::{self, FieldValue};
use shapefile::{PolygonRing, Shape};
use tracing::{debug, warn};

use crate::archive::ShapefileArchive;
use crate::error::{IngestError, MappingError};
use crate::types::{AttrValue, Properties, RawFeature};

/// Décode toutes les features d'une archive, dans l'ordre du fichier
///
/// Une erreur de lecture en cours de flux est reportée sur la feature
/// concernée et termine la lecture : les features déjà décodées sont gardées.
pub fn decode(archive: &ShapefileArchive) -> Result<Vec<RawFeature>, IngestError> {
    let shape_reader = shapefile::ShapeReader::new(Cursor::new(archive.shp.as_slice()))
        .map_err(|e| IngestError::parse("shp", e.to_string()))?;
    let dbase_reader = dbase::Reader::new(Cursor::new(archive.dbf.as_slice()))
        .map_err(|e| IngestError::parse("dbf", e.to_string()))?;

    let mut reader = shapefile::Reader::new(shape_reader, dbase_reader);
    let mut features = Vec::new();

    for result in reader.iter_shapes_and_records() {
        match result {
            Ok((shape, record)) => {
                let properties = record_properties(record);
                let geometry = shape_to_geometry(shape);
                features.push(RawFeature {
                    properties,
                    geometry,
                });
            }
            Err(e) => {
                warn!(
                    index = features.len(),
                    error = %e,
                    "Shapefile stream interrupted, remaining records skipped"
                );
                features.push(RawFeature::failed(
                    Properties::new(),
                    MappingError::Decode(e.to_string()),
                ));
                break;
            }
        }
    }

    debug!(count = features.len(), layer = %archive.name, "Shapefile decoded");
    Ok(features)
}

/// Attributs dBase vers le sac de propriétés
pub fn record_properties(record: dbase::Record) -> Properties {
    record
        .into_iter()
        .map(|(name, value)| (name, field_value(value)))
        .collect()
}

/// Valeur dBase vers `AttrValue`
pub fn field_value(value: FieldValue) -> AttrValue {
    match value {
        // Remplissage à largeur fixe
        FieldValue::Character(Some(s)) => match s.trim_end() {
            "" => AttrValue::Null,
            trimmed => AttrValue::String(trimmed.to_string()),
        },
        FieldValue::Character(None) => AttrValue::Null,
        FieldValue::Numeric(Some(n)) => AttrValue::Number(n),
        FieldValue::Numeric(None) => AttrValue::Null,
        FieldValue::Logical(Some(b)) => AttrValue::Bool(b),
        FieldValue::Logical(None) => AttrValue::Null,
        FieldValue::Date(Some(date)) => AttrValue::String(format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            date.month(),
            date.day()
        )),
        FieldValue::Date(None) => AttrValue::Null,
        // Passage par le texte pour éviter 0.1 -> 0.10000000149011612
        FieldValue::Float(Some(f)) => AttrValue::Number(f.to_string().parse().unwrap_or(f as f64)),
        FieldValue::Float(None) => AttrValue::Null,
        FieldValue::Integer(i) => AttrValue::Number(i as f64),
        FieldValue::Currency(c) => AttrValue::Number(c),
        FieldValue::DateTime(dt) => AttrValue::String(format!(
            "{:04}-{:02}-{:02}",
            dt.date().year(),
            dt.date().month(),
            dt.date().day()
        )),
        FieldValue::Double(d) => AttrValue::Number(d),
        FieldValue::Memo(s) => AttrValue::String(s),
    }
}

/// Anneaux d'un polygone shapefile : (extérieur ?, coordonnées)
macro_rules! rings_of {
    ($polygon:expr) => {
        $polygon
            .rings()
            .iter()
            .map(|ring| {
                let coords: Vec<Coord<f64>> =
                    ring.points().iter().map(|p| Coord { x: p.x, y: p.y }).collect();
                (matches!(ring, PolygonRing::Outer(_)), coords)
            })
            .collect::<Vec<_>>()
    };
}

/// Géométrie `geo` d'une forme shapefile ; seuls les polygones sont acceptés
pub fn shape_to_geometry(shape: Shape) -> Result<Geometry<f64>, MappingError> {
    let rings = match shape {
        Shape::Polygon(p) => rings_of!(p),
        Shape::PolygonM(p) => rings_of!(p),
        Shape::PolygonZ(p) => rings_of!(p),
        Shape::NullShape => return Err(MappingError::MissingGeometry),
        Shape::Point(_) | Shape::PointM(_) | Shape::PointZ(_) => {
            return Err(MappingError::UnsupportedGeometry("Point".into()))
        }
        Shape::Polyline(_) | Shape::PolylineM(_) | Shape::PolylineZ(_) => {
            return Err(MappingError::UnsupportedGeometry("LineString".into()))
        }
        Shape::Multipoint(_) | Shape::MultipointM(_) | Shape::MultipointZ(_) => {
            return Err(MappingError::UnsupportedGeometry("MultiPoint".into()))
        }
        Shape::Multipatch(_) => return Err(MappingError::UnsupportedGeometry("Multipatch".into())),
    };

    group_rings(rings).map(Geometry::MultiPolygon)
}

/// Regroupe les anneaux : chaque trou est rattaché à l'extérieur qui le précède
fn group_rings(rings: Vec<(bool, Vec<Coord<f64>>)>) -> Result<MultiPolygon<f64>, MappingError> {
    let mut polygons: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();

    for (outer, coords) in rings {
        if coords.is_empty() {
            continue;
        }
        let ring = LineString::new(coords);
        match polygons.last_mut() {
            Some((_, holes)) if !outer => holes.push(ring),
            // Trou orphelin : traité comme un extérieur
            _ => polygons.push((ring, Vec::new())),
        }
    }

    if polygons.is_empty() {
        return Err(MappingError::EmptyGeometry);
    }

    Ok(MultiPolygon::new(
        polygons
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    ))
}
