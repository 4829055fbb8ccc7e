//! Conversion UTM -> géographique
//!
//! Deux variantes :
//! - `approximate_to_geographic` : approximation linéaire à constantes fixes
//!   (méridien central 99°E, zone 47N), sans correction d'ellipsoïde. C'est la
//!   conversion par défaut. Erreur de l'ordre du kilomètre en bord de zone :
//!   inutilisable pour un levé topographique.
//! - `utm_to_geographic` : transverse Mercator inverse complète sur WGS84, pour
//!   les appelants qui connaissent leur zone.

use super::Geographic;

/// Demi-grand axe WGS84 (m)
const WGS84_A: f64 = 6378137.0;

/// Première excentricité au carré, f = 1/298.257223563
const WGS84_E2: f64 = 2.0 / 298.257223563 - 1.0 / (298.257223563 * 298.257223563);

/// Méridien central supposé (zone UTM 47N)
pub const CENTRAL_MERIDIAN_DEG: f64 = 99.0;

/// Faux est UTM
pub const FALSE_EASTING: f64 = 500000.0;

/// Facteur d'échelle UTM
pub const SCALE_FACTOR: f64 = 0.9996;

/// Mètres par degré (à l'équateur)
pub const METERS_PER_DEGREE: f64 = 111319.9;

/// Approximation linéaire : (est, nord) en mètres -> (lon, lat) en degrés
pub fn approximate_to_geographic(easting: f64, northing: f64) -> (f64, f64) {
    let lon = CENTRAL_MERIDIAN_DEG + ((easting - FALSE_EASTING) / SCALE_FACTOR) / METERS_PER_DEGREE;
    let lat = (northing / SCALE_FACTOR) / METERS_PER_DEGREE;
    (lon, lat)
}

/// Convertit UTM vers coordonnées géographiques WGS84
pub fn utm_to_geographic(x: f64, y: f64, zone: u8, south: bool) -> Geographic {
    let a = WGS84_A;
    let e2 = WGS84_E2;
    let ep2 = e2 / (1.0 - e2);

    let y0 = if south { 10000000.0 } else { 0.0 };

    // Longitude centrale de la zone
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let x = x - FALSE_EASTING;
    let y = y - y0;

    // Latitude d'empreinte
    let m = y / SCALE_FACTOR;
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));

    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
    let t1 = tan_phi1.powi(2);
    let c1 = ep2 * cos_phi1.powi(2);
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
    let d = x / (n1 * SCALE_FACTOR);

    let lat = phi1
        - (n1 * tan_phi1 / r1)
            * (d.powi(2) / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2) - 252.0 * ep2 - 3.0 * c1.powi(2))
                    * d.powi(6)
                    / 720.0);

    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2 + 24.0 * t1.powi(2))
                * d.powi(5)
                / 120.0)
            / cos_phi1;

    Geographic::new(lon, lat)
}
