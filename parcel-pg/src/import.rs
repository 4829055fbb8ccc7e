//! Import séquentiel d'un lot extrait vers le stockage

use std::time::Instant;

use tracing::{debug, info, warn};

use parcel_ingest::Extraction;

use crate::report::{ErrorStage, ImportError, ImportReport};
use crate::store::ParcelStore;

/// Insère les parcelles d'un lot une par une, dans l'ordre d'entrée
///
/// Un rejet du stockage n'empêche pas les insertions suivantes ; aucune
/// transaction ne couvre le lot et rien n'est rejoué. Les erreurs de mapping
/// et les rejets sont rapportés à leur position dans l'entrée.
pub async fn import_extraction<S: ParcelStore>(store: &S, extraction: &Extraction) -> ImportReport {
    let started_at = Instant::now();
    let mut report = ImportReport::new(extraction.format);

    let mut errors = extraction.errors.iter().peekable();
    let mut records = extraction.records.iter();
    let mut index = 0;

    loop {
        if let Some(error) = errors.next_if(|e| e.index <= index) {
            report.record_error(ImportError::from(error));
            index = error.index + 1;
            continue;
        }

        let Some(record) = records.next() else {
            break;
        };

        match store.insert_parcel(record).await {
            Ok(stored_id) => {
                debug!(index, parcel_id = %stored_id, "Parcel imported");
                report.record_import();
            }
            Err(e) => {
                warn!(index, parcel_id = record.parcel_id(), error = %e, "Parcel rejected by storage");
                report.record_error(ImportError {
                    parcel_id: Some(record.parcel_id().to_string()),
                    index: Some(index),
                    message: e.to_string(),
                    stage: ErrorStage::Storage,
                });
            }
        }
        index += 1;
    }

    // Erreurs au-delà du dernier enregistrement
    for error in errors {
        report.record_error(ImportError::from(error));
    }

    report.finalize(started_at.elapsed());
    info!(
        imported = report.imported,
        failed = report.failed,
        total = report.total,
        "{}",
        report.message
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use parcel_ingest::process_geojson;

    fn feature(props: &str, geometry: &str) -> String {
        format!(
            r#"{{"type":"Feature","properties":{},"geometry":{}}}"#,
            props, geometry
        )
    }

    const SQUARE: &str =
        r#"{"type":"Polygon","coordinates":[[[98.6,3.6],[98.61,3.6],[98.61,3.61],[98.6,3.6]]]}"#;
    const LINE: &str = r#"{"type":"LineString","coordinates":[[98.6,3.6],[98.7,3.7]]}"#;

    #[tokio::test]
    async fn test_errors_interleaved_in_input_order() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{},{},{},{}]}}"#,
            feature(r#"{"NIB":"A"}"#, SQUARE),
            feature(r#"{"NIB":"B"}"#, LINE),
            feature(r#"{"NIB":"A"}"#, SQUARE),
            feature(r#"{"NIB":"C"}"#, SQUARE),
        );
        let extraction = process_geojson(&text).unwrap();
        let store = MemoryStore::new();

        let report = import_extraction(&store, &extraction).await;
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.total, 4);

        let stages: Vec<(Option<usize>, ErrorStage)> =
            report.errors.iter().map(|e| (e.index, e.stage)).collect();
        assert_eq!(
            stages,
            vec![(Some(1), ErrorStage::Mapping), (Some(2), ErrorStage::Storage)]
        );
        assert_eq!(store.parcel_ids(), vec!["A", "C"]);
        assert_eq!(report.message, "Imported 2 of 4 parcels (2 failed)");
    }

    #[tokio::test]
    async fn test_trailing_mapping_error() {
        let text = format!(
            r#"{{"type":"FeatureCollection","features":[{},{}]}}"#,
            feature("{}", SQUARE),
            feature("{}", LINE),
        );
        let extraction = process_geojson(&text).unwrap();
        let report = import_extraction(&MemoryStore::new(), &extraction).await;
        assert_eq!(report.imported, 1);
        assert_eq!(report.errors[0].index, Some(1));
    }
}
