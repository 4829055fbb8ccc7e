//! Coercitions de valeurs : surfaces, dates, parties en litige, texte

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::AttrValue;

/// Formats de date acceptés, essayés dans l'ordre
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y%m%d",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Vrai pour les sentinelles "vide" : chaîne vide ou tiret seul
pub fn is_placeholder(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == "-"
}

/// Valeur texte, `None` si null, vide ou tiret
pub fn text(value: &AttrValue) -> Option<String> {
    value.as_text().filter(|s| !is_placeholder(s))
}

/// Surface en m² : nombre fini, ou chaîne dont on garde la partie numérique de tête
///
/// "1,487.5 m2" -> 1487.5 ; "-" -> None ; "abc" -> None
pub fn area(value: &AttrValue) -> Option<f64> {
    match value {
        AttrValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
        AttrValue::String(s) => parse_area(s),
        _ => None,
    }
}

fn parse_area(raw: &str) -> Option<f64> {
    let mut digits = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        match c {
            '0'..='9' | '.' => digits.push(c),
            '-' if digits.is_empty() => digits.push(c),
            // Séparateurs de milliers
            ',' | '_' | '\'' | ' ' => continue,
            // Début de l'unité (m2, ha, m²...)
            _ if !digits.is_empty() => break,
            // Préfixe non numérique ("±", "Rp"...)
            _ => continue,
        }
    }

    if digits.is_empty() || digits == "-" {
        return None;
    }

    fast_float::parse::<f64, _>(&digits)
        .ok()
        .filter(|n| n.is_finite())
}

/// Date calendaire, réémise au format ISO par la sérialisation
pub fn date(value: &AttrValue) -> Option<NaiveDate> {
    match value {
        AttrValue::String(s) if !is_placeholder(s) => parse_date(s.trim()),
        // Date dBase compacte stockée en numérique (20240115)
        AttrValue::Number(n) if n.fract() == 0.0 && (1e7..1e8).contains(n) => {
            NaiveDate::parse_from_str(&format!("{}", *n as i64), "%Y%m%d").ok()
        }
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })
}

/// Liste des parties en litige, toujours un tableau
///
/// Tolère les anciennes saisies où le tableau était encodé en JSON dans une chaîne.
pub fn parties(value: &AttrValue) -> Vec<String> {
    match value {
        AttrValue::Array(items) => items.iter().filter_map(AttrValue::as_text).collect(),
        AttrValue::String(s) => {
            let s = s.trim();
            if is_placeholder(s) || s == "[]" {
                return Vec::new();
            }
            if s.starts_with('[') {
                return match serde_json::from_str::<Vec<serde_json::Value>>(s) {
                    Ok(items) => items
                        .into_iter()
                        .filter_map(|v| AttrValue::from(v).as_text())
                        .collect(),
                    Err(_) => vec![s.to_string()],
                };
            }
            vec![s.to_string()]
        }
        _ => Vec::new(),
    }
}

/// Collapse les sentinelles textuelles en null, laisse le reste intact
pub fn passthrough(value: AttrValue) -> AttrValue {
    match value {
        AttrValue::String(s) if is_placeholder(&s) => AttrValue::Null,
        other => other,
    }
}
