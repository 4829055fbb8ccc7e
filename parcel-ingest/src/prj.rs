//! Lecture informative des fichiers `.prj` (WKT ESRI)
//!
//! La projection déclarée n'est jamais utilisée pour convertir les
//! coordonnées : elle est seulement journalisée et remontée dans l'`Extraction`.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Zone UTM supposée par la conversion approximative
pub const EXPECTED_UTM_ZONE: u8 = 47;

/// Projection déclarée par un `.prj`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionInfo {
    /// Nom du système (`PROJCS[...]` ou `GEOGCS[...]`)
    pub name: String,

    /// Code EPSG si présent dans une clause `AUTHORITY`
    pub epsg: Option<u32>,

    /// Zone UTM et hémisphère sud
    pub utm_zone: Option<(u8, bool)>,
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*(?:PROJCS|GEOGCS)\s*\[\s*"([^"]*)""#).expect("valid regex"))
}

fn authority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"AUTHORITY\s*\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]\s*\]\s*$"#).expect("valid regex")
    })
}

fn utm_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)UTM[_ ]?zone[_ ]?(\d{1,2})\s*([NS])?").expect("valid regex"))
}

/// Zone UTM déduite d'un code EPSG WGS84 (326xx nord, 327xx sud)
fn zone_from_epsg(epsg: u32) -> Option<(u8, bool)> {
    match epsg {
        32601..=32660 => Some(((epsg - 32600) as u8, false)),
        32701..=32760 => Some(((epsg - 32700) as u8, true)),
        _ => None,
    }
}

/// Parse le contenu d'un `.prj` ; `None` si vide ou illisible
pub fn parse(data: &[u8]) -> Option<ProjectionInfo> {
    let content = String::from_utf8_lossy(data);
    let content = content.trim();

    let name = name_re().captures(content)?.get(1)?.as_str().to_string();

    let epsg = authority_re()
        .captures(content)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    let utm_zone = utm_re()
        .captures(&name)
        .and_then(|c| {
            let zone: u8 = c.get(1)?.as_str().parse().ok()?;
            let south = c
                .get(2)
                .map(|m| m.as_str().eq_ignore_ascii_case("S"))
                .unwrap_or(false);
            Some((zone, south))
        })
        .or_else(|| epsg.and_then(zone_from_epsg));

    Some(ProjectionInfo {
        name,
        epsg,
        utm_zone,
    })
}

impl ProjectionInfo {
    /// Vrai si la projection déclarée diffère de l'hypothèse zone 47N
    pub fn conflicts_with_default(&self) -> bool {
        matches!(self.utm_zone, Some((zone, south)) if zone != EXPECTED_UTM_ZONE || south)
    }
}
