//! Normalisation des géométries de parcelles
//!
//! Détecte si les coordonnées sont géographiques (lon/lat) ou projetées
//! (UTM, en mètres) par un test de magnitude sur le premier sommet, convertit
//! au besoin, et promeut systématiquement `Polygon` en `MultiPolygon`.

pub mod utm;

use geo::{Coord, Geometry, MapCoords, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Au-delà de cette valeur absolue, une composante ne peut pas être un degré
pub const PROJECTED_THRESHOLD: f64 = 1000.0;

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }
}

/// Système de coordonnées détecté
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    /// Longitude/latitude (type WGS84)
    Geographic,
    /// Est/nord en mètres (type UTM)
    Projected,
}

/// Classe un sommet par magnitude : projeté si |x| ou |y| dépasse 1000
pub fn classify(coord: Coord<f64>) -> CoordinateSystem {
    if coord.x.abs() > PROJECTED_THRESHOLD || coord.y.abs() > PROJECTED_THRESHOLD {
        CoordinateSystem::Projected
    } else {
        CoordinateSystem::Geographic
    }
}

/// Premier sommet du premier anneau du premier polygone
fn first_coord(geometry: &Geometry<f64>) -> Option<Coord<f64>> {
    match geometry {
        Geometry::Polygon(p) => p.exterior().0.first().copied(),
        Geometry::MultiPolygon(mp) => mp.0.first().and_then(|p| p.exterior().0.first().copied()),
        _ => None,
    }
}

/// Système de coordonnées d'une géométrie polygonale (géographique si vide)
pub fn detect(geometry: &Geometry<f64>) -> CoordinateSystem {
    first_coord(geometry)
        .map(classify)
        .unwrap_or(CoordinateSystem::Geographic)
}

/// Conversion appliquée aux coordonnées projetées
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateTransform {
    /// Approximation linéaire zone 47N (défaut)
    #[default]
    Approximate,
    /// Transverse Mercator inverse exacte pour une zone UTM connue
    Utm { zone: u8, south: bool },
}

impl CoordinateTransform {
    /// Convertit un sommet projeté en (lon, lat) degrés
    pub fn to_geographic(&self, coord: Coord<f64>) -> Coord<f64> {
        let (x, y) = match *self {
            CoordinateTransform::Approximate => utm::approximate_to_geographic(coord.x, coord.y),
            CoordinateTransform::Utm { zone, south } => {
                utm::utm_to_geographic(coord.x, coord.y, zone, south).to_degrees()
            }
        };
        Coord { x, y }
    }

    pub fn description(&self) -> String {
        match self {
            CoordinateTransform::Approximate => "approximate (zone 47N, linear)".to_string(),
            CoordinateTransform::Utm { zone, south } => {
                format!("UTM zone {}{}", zone, if *south { "S" } else { "N" })
            }
        }
    }
}

/// Nom GeoJSON du type de géométrie
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Normaliseur de géométries (sans état, réutilisable entre lots)
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryNormalizer {
    transform: CoordinateTransform,
}

impl GeometryNormalizer {
    pub fn new(transform: CoordinateTransform) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> CoordinateTransform {
        self.transform
    }

    /// Normalise une géométrie
    ///
    /// Les types non polygonaux sont rendus tels quels. Les polygones sont
    /// convertis si leurs coordonnées sont projetées et toujours rendus en
    /// `MultiPolygon`.
    pub fn normalize(&self, geometry: Geometry<f64>) -> Geometry<f64> {
        let system = detect(&geometry);

        let multi = match geometry {
            Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            Geometry::MultiPolygon(mp) => mp,
            other => return other,
        };

        match system {
            CoordinateSystem::Geographic => Geometry::MultiPolygon(multi),
            CoordinateSystem::Projected => {
                let transform = self.transform;
                Geometry::MultiPolygon(multi.map_coords(|c| transform.to_geographic(c)))
            }
        }
    }

    /// Normalise une géométrie de parcelle, qui doit être polygonale et non vide
    pub fn normalize_parcel(&self, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>, MappingError> {
        let geometry = match geometry {
            Geometry::Rect(r) => Geometry::Polygon(r.to_polygon()),
            Geometry::Triangle(t) => Geometry::Polygon(t.to_polygon()),
            other => other,
        };

        match self.normalize(geometry) {
            Geometry::MultiPolygon(mp) => {
                if mp.0.is_empty() || mp.0.iter().all(|p| p.exterior().0.is_empty()) {
                    Err(MappingError::EmptyGeometry)
                } else {
                    Ok(mp)
                }
            }
            other => Err(MappingError::UnsupportedGeometry(
                geometry_type_name(&other).to_string(),
            )),
        }
    }
}

/// Normalise avec la conversion par défaut
pub fn normalize(geometry: Geometry<f64>) -> Geometry<f64> {
    GeometryNormalizer::default().normalize(geometry)
}
