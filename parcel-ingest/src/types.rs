//! Types de données pour le crate parcel-ingest

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use geo::{Geometry, MultiPolygon};
use serde::Serialize;

use crate::error::MappingError;
use crate::prj::ProjectionInfo;

/// Valeur d'attribut brute (somme fermée des types rencontrés en entrée)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<AttrValue>),
}

/// Sac de propriétés brutes d'une feature (nom d'attribut -> valeur)
pub type Properties = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// Rendu texte d'une valeur scalaire, `None` pour null
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Null => None,
            AttrValue::Bool(b) => Some(b.to_string()),
            AttrValue::Number(n) => Some(format_number(*n)),
            AttrValue::String(s) => Some(s.clone()),
            AttrValue::Array(items) => serde_json::to_string(items).ok(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

impl From<serde_json::Value> for AttrValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => AttrValue::Null,
            serde_json::Value::Bool(b) => AttrValue::Bool(b),
            serde_json::Value::Number(n) => {
                n.as_f64().map(AttrValue::Number).unwrap_or(AttrValue::Null)
            }
            serde_json::Value::String(s) => AttrValue::String(s),
            serde_json::Value::Array(items) => {
                AttrValue::Array(items.into_iter().map(AttrValue::from).collect())
            }
            // Les objets imbriqués sont conservés sous forme de texte JSON
            serde_json::Value::Object(obj) => {
                AttrValue::String(serde_json::Value::Object(obj).to_string())
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

/// Formate un nombre sans partie décimale superflue ("2500" et non "2500.0")
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Attributs canoniques d'une parcelle, tels que produits par le `FieldMapper`
///
/// Tous les champs sont optionnels : c'est un enregistrement partiel. Les
/// attributs dont le nom n'est pas reconnu sont conservés dans `extra` sous
/// leur nom en minuscules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParcelAttributes {
    pub parcel_id: Option<String>,

    // Localisation administrative
    pub provinsi: Option<String>,
    pub kabupaten: Option<String>,
    pub kecamatan: Option<String>,
    pub desa: Option<String>,

    // Identifiants juridiques
    pub nib: Option<String>,
    pub nomor_su: Option<String>,
    pub hak: Option<String>,
    pub tipe_hak: Option<String>,
    pub nomor_sk: Option<String>,
    pub tanggal_sk: Option<NaiveDate>,
    pub tanggal_terbit_hak: Option<NaiveDate>,
    pub tanggal_berakhir_hak: Option<NaiveDate>,

    // Surfaces (m²)
    pub luas_tertulis: Option<f64>,
    pub luas_peta: Option<f64>,

    // Propriété
    pub pemilik: Option<String>,
    pub tipe_pemilik: Option<String>,

    // Occupation du sol
    pub penggunaan: Option<String>,
    pub pemanfaatan: Option<String>,
    pub status_penggunaan: Option<String>,

    // Litiges
    pub kasus: Option<String>,
    pub pihak_bersengketa: Vec<String>,
    pub penyelesaian: Option<String>,
    pub hasil: Option<String>,
    pub catatan_perbaikan: Option<String>,

    // Suivi
    pub nomor_peta: Option<String>,
    pub status: Option<String>,
    pub keterangan: Option<String>,

    /// Attributs non reconnus (clé en minuscules)
    #[serde(flatten)]
    pub extra: BTreeMap<String, AttrValue>,
}

impl ParcelAttributes {
    /// Réexprime les attributs sous forme de sac de propriétés (noms canoniques)
    pub fn to_properties(&self) -> Properties {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(k, v)| (k, AttrValue::from(v)))
                .collect(),
            _ => Properties::new(),
        }
    }

    /// Valeur non vide d'un champ identifiant
    fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Identifiant dérivé des attributs : `parcel_id`, puis `nib`, puis `hak`
    pub fn derived_id(&self) -> Option<&str> {
        Self::non_empty(&self.parcel_id)
            .or_else(|| Self::non_empty(&self.nib))
            .or_else(|| Self::non_empty(&self.hak))
    }
}

/// Parcelle normalisée, prête à être stockée
///
/// Construite une seule fois par feature d'entrée et jamais modifiée ensuite.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelRecord {
    parcel_id: String,
    attributes: ParcelAttributes,
    geometry: MultiPolygon<f64>,
}

impl ParcelRecord {
    /// Assemble un enregistrement ; `parcel_id` est reporté dans les attributs
    pub fn new(parcel_id: String, mut attributes: ParcelAttributes, geometry: MultiPolygon<f64>) -> Self {
        attributes.parcel_id = Some(parcel_id.clone());
        Self {
            parcel_id,
            attributes,
            geometry,
        }
    }

    pub fn parcel_id(&self) -> &str {
        &self.parcel_id
    }

    pub fn attributes(&self) -> &ParcelAttributes {
        &self.attributes
    }

    /// Géométrie en lon/lat, toujours un MultiPolygon
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Propriétés sérialisées en JSON (pour l'export et le stockage)
    pub fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.attributes).unwrap_or(serde_json::Value::Null)
    }
}

/// Feature décodée d'une source, avant mapping et normalisation
#[derive(Debug, Clone)]
pub struct RawFeature {
    pub properties: Properties,
    pub geometry: Result<Geometry<f64>, MappingError>,
}

impl RawFeature {
    pub fn new(properties: Properties, geometry: Geometry<f64>) -> Self {
        Self {
            properties,
            geometry: Ok(geometry),
        }
    }

    /// Feature inexploitable ; les propriétés servent encore à nommer l'erreur
    pub fn failed(properties: Properties, error: MappingError) -> Self {
        Self {
            properties,
            geometry: Err(error),
        }
    }
}

/// Erreur rattachée à une feature précise du lot
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureError {
    /// Position de la feature dans l'entrée
    pub index: usize,
    /// Identifiant dérivé des attributs, s'il a pu être déterminé
    pub parcel_id: Option<String>,
    pub error: MappingError,
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parcel_id {
            Some(id) => write!(f, "feature {} ({}): {}", self.index, id, self.error),
            None => write!(f, "feature {}: {}", self.index, self.error),
        }
    }
}

/// Format de l'upload d'origine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    GeoJson,
    Shapefile,
}

/// Résultat d'extraction d'un lot : enregistrements et erreurs, dans l'ordre d'entrée
#[derive(Debug, Clone)]
pub struct Extraction {
    pub format: SourceFormat,

    /// Nombre de features rencontrées en entrée
    pub feature_count: usize,

    /// Enregistrements normalisés
    pub records: Vec<ParcelRecord>,

    /// Erreurs non fatales, une au plus par feature
    pub errors: Vec<FeatureError>,

    /// Projection déclarée par le `.prj` (shapefile uniquement, informatif)
    pub projection: Option<ProjectionInfo>,
}

impl Extraction {
    pub(crate) fn new(format: SourceFormat) -> Self {
        Self {
            format,
            feature_count: 0,
            records: Vec::new(),
            errors: Vec::new(),
            projection: None,
        }
    }
}
