//! Rapport d'import d'un lot
//!
//! Les erreurs de mapping et les rejets du stockage sont comptés
//! séparément des parcelles importées ; seul un échantillon des premières
//! erreurs est conservé.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use parcel_ingest::{FeatureError, SourceFormat};

/// Nombre maximal d'erreurs conservées dans le rapport
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Statut global de l'import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    /// Toutes les parcelles importées
    Success,
    /// Import avec des erreurs non fatales
    PartialSuccess,
    /// Aucune parcelle importée, ou lot rejeté
    Failed,
}

/// Étape à laquelle une parcelle a été perdue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorStage {
    /// Attributs ou géométrie inexploitables
    Mapping,
    /// Refus du stockage
    Storage,
}

/// Erreur rattachée à une parcelle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportError {
    pub parcel_id: Option<String>,
    /// Position dans le fichier d'entrée
    pub index: Option<usize>,
    pub message: String,
    pub stage: ErrorStage,
}

impl From<&FeatureError> for ImportError {
    fn from(error: &FeatureError) -> Self {
        Self {
            parcel_id: error.parcel_id.clone(),
            index: Some(error.index),
            message: error.error.to_string(),
            stage: ErrorStage::Mapping,
        }
    }
}

/// Rapport complet d'import
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    /// Le lot a été traité (faux seulement pour une erreur fatale)
    pub success: bool,
    /// Parcelles acceptées par le stockage
    pub imported: usize,
    /// Erreurs de mapping + rejets du stockage
    pub failed: usize,
    pub total: usize,
    /// Premières erreurs (au plus `MAX_REPORTED_ERRORS`)
    pub errors: Vec<ImportError>,
    pub message: String,

    pub status: ImportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<SourceFormat>,
    pub duration_secs: f64,
}

impl Default for ImportReport {
    fn default() -> Self {
        Self {
            success: true,
            imported: 0,
            failed: 0,
            total: 0,
            errors: Vec::new(),
            message: String::new(),
            status: ImportStatus::Success,
            source: None,
            format: None,
            duration_secs: 0.0,
        }
    }
}

impl ImportReport {
    pub fn new(format: SourceFormat) -> Self {
        Self {
            format: Some(format),
            ..Default::default()
        }
    }

    /// Rapport d'un lot rejeté entièrement (fichier illisible, archive incomplète)
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: ImportStatus::Failed,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Enregistre une parcelle importée
    pub fn record_import(&mut self) {
        self.imported += 1;
    }

    /// Enregistre une erreur ; seules les premières sont conservées
    pub fn record_error(&mut self, error: ImportError) {
        self.failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(error);
        }
    }

    /// Calcule le total, le statut et le message
    pub fn finalize(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
        self.total = self.imported + self.failed;

        self.status = if !self.success || (self.imported == 0 && self.failed > 0) {
            ImportStatus::Failed
        } else if self.failed > 0 {
            ImportStatus::PartialSuccess
        } else {
            ImportStatus::Success
        };

        if self.success {
            self.message = format!(
                "Imported {} of {} parcels ({} failed)",
                self.imported, self.total, self.failed
            );
        }
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        match &self.source {
            Some(source) => println!("IMPORT REPORT - {}", source),
            None => println!("IMPORT REPORT"),
        }
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        if let Some(format) = self.format {
            println!("Format: {:?}", format);
        }
        println!("Duration: {:.2}s", self.duration_secs);
        println!("\n{}", self.message);

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({} of {}) ---", self.errors.len(), self.failed);
            for e in &self.errors {
                let location = match (e.index, &e.parcel_id) {
                    (Some(i), Some(id)) => format!("[#{} {}]", i, id),
                    (Some(i), None) => format!("[#{}]", i),
                    (None, Some(id)) => format!("[{}]", id),
                    _ => String::new(),
                };
                println!("  {:?} {} {}", e.stage, location, e.message);
            }
            if self.failed > self.errors.len() {
                println!("  ... and {} more", self.failed - self.errors.len());
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        match &self.source {
            Some(source) => format!("{}: {}", source, self.message),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_ingest::MappingError;

    fn storage_error(i: usize) -> ImportError {
        ImportError {
            parcel_id: Some(format!("P-{}", i)),
            index: Some(i),
            message: "duplicate parcel_id".to_string(),
            stage: ErrorStage::Storage,
        }
    }

    #[test]
    fn test_import_report_default() {
        let report = ImportReport::default();
        assert!(report.success);
        assert_eq!(report.status, ImportStatus::Success);
        assert_eq!(report.imported, 0);
    }

    #[test]
    fn test_finalize_message() {
        let mut report = ImportReport::new(SourceFormat::GeoJson);
        report.record_import();
        report.record_import();
        report.record_import();
        report.record_error(storage_error(3));
        report.finalize(Duration::from_millis(5));

        assert_eq!(report.total, 4);
        assert_eq!(report.status, ImportStatus::PartialSuccess);
        assert_eq!(report.message, "Imported 3 of 4 parcels (1 failed)");
    }

    #[test]
    fn test_error_sample_capped() {
        let mut report = ImportReport::new(SourceFormat::Shapefile);
        for i in 0..25 {
            report.record_error(storage_error(i));
        }
        report.finalize(Duration::ZERO);

        assert_eq!(report.failed, 25);
        assert_eq!(report.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(report.errors[9].index, Some(9));
        assert_eq!(report.status, ImportStatus::Failed);
        assert!(report.success);
    }

    #[test]
    fn test_rejected_report() {
        let mut report = ImportReport::rejected("Missing required member in archive: .dbf")
            .with_source("persil.zip");
        report.finalize(Duration::ZERO);

        assert!(!report.success);
        assert_eq!(report.status, ImportStatus::Failed);
        assert_eq!(report.message, "Missing required member in archive: .dbf");
        assert_eq!(report.summary(), "persil.zip: Missing required member in archive: .dbf");
    }

    #[test]
    fn test_mapping_error_conversion() {
        let feature_error = FeatureError {
            index: 2,
            parcel_id: Some("N-2".into()),
            error: MappingError::UnsupportedGeometry("LineString".into()),
        };
        let error = ImportError::from(&feature_error);
        assert_eq!(error.stage, ErrorStage::Mapping);
        assert_eq!(error.index, Some(2));
        assert!(error.message.contains("LineString"));
    }

    #[test]
    fn test_json_shape() {
        let mut report = ImportReport::new(SourceFormat::GeoJson);
        report.record_error(storage_error(0));
        report.finalize(Duration::ZERO);

        let json = serde_json::to_value(&report).unwrap();
        for key in ["success", "imported", "failed", "total", "errors", "message"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["errors"][0]["stage"], "storage");
        assert_eq!(json["format"], "geojson");
        assert!(json.get("source").is_none());
    }
}
