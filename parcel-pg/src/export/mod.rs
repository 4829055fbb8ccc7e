//! Sorties : GeoJSON et connexion PostgreSQL

pub mod geojson;
pub mod pool;
