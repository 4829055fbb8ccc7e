//! Décodage des payloads GeoJSON (FeatureCollection ou Feature isolée)

use std::borrow::Cow;

use encoding_rs::Encoding;
use geo::Geometry;
use serde_json::Value;
use tracing::debug;

use crate::error::{IngestError, MappingError};
use crate::types::{AttrValue, Properties, RawFeature};

/// Décode des octets en texte : BOM UTF-8/UTF-16 reconnu et retiré, UTF-8 sinon
pub fn decode_text(bytes: &[u8]) -> Result<Cow<'_, str>, IngestError> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        debug!(encoding = encoding.name(), "BOM detected");
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        if had_errors {
            return Err(IngestError::parse(
                "geojson",
                format!("payload is not valid {}", encoding.name()),
            ));
        }
        return Ok(text);
    }

    encoding_rs::UTF_8
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| IngestError::parse("geojson", "payload is not valid UTF-8"))
}

/// Extrait les features d'un texte GeoJSON, dans l'ordre du document
///
/// Chaque feature est décodée séparément : une feature mal formée donne une
/// entrée en échec sans bloquer les suivantes.
pub fn decode(text: &str) -> Result<Vec<RawFeature>, IngestError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let root: Value =
        serde_json::from_str(text).map_err(|e| IngestError::parse("geojson", e.to_string()))?;

    let Value::Object(mut root) = root else {
        return Err(IngestError::parse(
            "geojson",
            "expected FeatureCollection or Feature",
        ));
    };

    let kind = root.get("type").and_then(Value::as_str).map(str::to_string);
    let values = match kind.as_deref() {
        Some("FeatureCollection") => match root.remove("features") {
            Some(Value::Array(features)) => features,
            _ => {
                return Err(IngestError::parse(
                    "geojson",
                    "FeatureCollection without a features array",
                ))
            }
        },
        Some("Feature") => vec![Value::Object(root)],
        Some(other) => {
            return Err(IngestError::parse(
                "geojson",
                format!("expected FeatureCollection or Feature, got {}", other),
            ))
        }
        None => {
            return Err(IngestError::parse(
                "geojson",
                "expected FeatureCollection or Feature",
            ))
        }
    };

    debug!(count = values.len(), "GeoJSON features found");
    Ok(values.into_iter().map(decode_feature).collect())
}

/// Propriétés brutes d'une feature JSON, même si elle est invalide par ailleurs
fn raw_properties(value: &Value) -> Properties {
    value
        .get("properties")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), AttrValue::from(v.clone())))
                .collect()
        })
        .unwrap_or_default()
}

fn decode_feature(value: Value) -> RawFeature {
    let properties = raw_properties(&value);

    let feature = match geojson::Feature::from_json_value(value) {
        Ok(feature) => feature,
        Err(e) => {
            return RawFeature::failed(properties, MappingError::InvalidFeature(e.to_string()))
        }
    };

    let Some(geometry) = feature.geometry else {
        return RawFeature::failed(properties, MappingError::MissingGeometry);
    };

    match Geometry::<f64>::try_from(geometry) {
        Ok(geometry) => RawFeature::new(properties, geometry),
        Err(e) => RawFeature::failed(properties, MappingError::InvalidFeature(e.to_string())),
    }
}
