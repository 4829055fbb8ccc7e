//! Tests d'intégration : lots GeoJSON et archives shapefile construites en mémoire

use std::io::{Cursor, Write};

use parcel_ingest::{
    extract_shapefile, process_geojson, ArchiveError, IngestError, Ingestor,
    MappingError, SourceFormat,
};
use zip::write::SimpleFileOptions;

const PRJ_47N: &str = r#"PROJCS["WGS_1984_UTM_Zone_47N",GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]],PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",99.0],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#;

// ---------------------------------------------------------------------------
// Construction de fichiers shapefile minimaux
// ---------------------------------------------------------------------------

enum TestShape {
    /// Anneaux : extérieurs en sens horaire, trous en sens antihoraire
    Polygon(Vec<Vec<(f64, f64)>>),
    Null,
}

fn square_cw(x: f64, y: f64, size: f64) -> Vec<(f64, f64)> {
    vec![
        (x, y),
        (x, y + size),
        (x + size, y + size),
        (x + size, y),
        (x, y),
    ]
}

fn square_ccw(x: f64, y: f64, size: f64) -> Vec<(f64, f64)> {
    let mut ring = square_cw(x, y, size);
    ring.reverse();
    ring
}

fn bbox(points: &[(f64, f64)]) -> [f64; 4] {
    if points.is_empty() {
        return [0.0; 4];
    }
    let mut b = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
    for &(x, y) in points {
        b[0] = b[0].min(x);
        b[1] = b[1].min(y);
        b[2] = b[2].max(x);
        b[3] = b[3].max(y);
    }
    b
}

fn shape_content(shape: &TestShape) -> Vec<u8> {
    let mut out = Vec::new();
    match shape {
        TestShape::Null => out.extend_from_slice(&0i32.to_le_bytes()),
        TestShape::Polygon(rings) => {
            let points: Vec<(f64, f64)> = rings.iter().flatten().copied().collect();
            out.extend_from_slice(&5i32.to_le_bytes());
            for v in bbox(&points) {
                out.extend_from_slice(&v.to_le_bytes());
            }
            out.extend_from_slice(&(rings.len() as i32).to_le_bytes());
            out.extend_from_slice(&(points.len() as i32).to_le_bytes());
            let mut start = 0i32;
            for ring in rings {
                out.extend_from_slice(&start.to_le_bytes());
                start += ring.len() as i32;
            }
            for (x, y) in points {
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
            }
        }
    }
    out
}

fn shp_bytes(shapes: &[TestShape]) -> Vec<u8> {
    let mut records = Vec::new();
    let mut all_points = Vec::new();
    for (i, shape) in shapes.iter().enumerate() {
        if let TestShape::Polygon(rings) = shape {
            all_points.extend(rings.iter().flatten().copied());
        }
        let content = shape_content(shape);
        records.extend_from_slice(&((i + 1) as i32).to_be_bytes());
        records.extend_from_slice(&((content.len() / 2) as i32).to_be_bytes());
        records.extend_from_slice(&content);
    }

    let mut header = Vec::with_capacity(100);
    header.extend_from_slice(&9994i32.to_be_bytes());
    header.extend_from_slice(&[0u8; 20]);
    header.extend_from_slice(&(((100 + records.len()) / 2) as i32).to_be_bytes());
    header.extend_from_slice(&1000i32.to_le_bytes());
    header.extend_from_slice(&5i32.to_le_bytes());
    for v in bbox(&all_points) {
        header.extend_from_slice(&v.to_le_bytes());
    }
    header.extend_from_slice(&[0u8; 32]);
    assert_eq!(header.len(), 100);

    header.extend_from_slice(&records);
    header
}

/// Champs dBase : (nom, type, longueur)
fn dbf_bytes(fields: &[(&str, u8, u8)], rows: &[Vec<&str>]) -> Vec<u8> {
    let record_len: u16 = 1 + fields.iter().map(|f| f.2 as u16).sum::<u16>();
    let header_len: u16 = 32 + 32 * fields.len() as u16 + 1;

    let mut out = Vec::new();
    out.push(0x03);
    out.extend_from_slice(&[124, 1, 15]);
    out.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(&record_len.to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);

    for (name, kind, len) in fields {
        let mut descriptor = [0u8; 32];
        descriptor[..name.len()].copy_from_slice(name.as_bytes());
        descriptor[11] = *kind;
        descriptor[16] = *len;
        descriptor[17] = if *kind == b'N' { 2 } else { 0 };
        out.extend_from_slice(&descriptor);
    }
    out.push(0x0D);

    for row in rows {
        out.push(b' ');
        for ((_, kind, len), value) in fields.iter().zip(row) {
            let len = *len as usize;
            let cell = if *kind == b'N' {
                format!("{:>width$}", value, width = len)
            } else {
                format!("{:<width$}", value, width = len)
            };
            out.extend_from_slice(&cell.as_bytes()[..len]);
        }
    }
    out.push(0x1A);
    out
}

fn zip_of(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const FIELDS: &[(&str, u8, u8)] = &[("PEMILIK", b'C', 30), ("LUASPETA", b'C', 16), ("NIB", b'C', 20)];

// ---------------------------------------------------------------------------
// GeoJSON
// ---------------------------------------------------------------------------

fn polygon_feature(props: &str, x: f64, y: f64, size: f64) -> String {
    let ring: Vec<String> = square_cw(x, y, size)
        .iter()
        .map(|(x, y)| format!("[{},{}]", x, y))
        .collect();
    format!(
        r#"{{"type":"Feature","properties":{},"geometry":{{"type":"Polygon","coordinates":[[{}]]}}}}"#,
        props,
        ring.join(",")
    )
}

fn collection(features: &[String]) -> String {
    format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    )
}

#[test]
fn test_geojson_end_to_end() {
    let text = collection(&[polygon_feature(
        r#"{"PEMILIK":"Ahmad","LUASPETA":"2500"}"#,
        98.6,
        3.6,
        0.001,
    )]);

    let extraction = process_geojson(&text).unwrap();
    assert_eq!(extraction.format, SourceFormat::GeoJson);
    assert_eq!(extraction.feature_count, 1);
    assert!(extraction.errors.is_empty());
    assert_eq!(extraction.records.len(), 1);

    let record = &extraction.records[0];
    assert_eq!(record.attributes().pemilik.as_deref(), Some("Ahmad"));
    assert_eq!(record.attributes().luas_peta, Some(2500.0));
    assert_eq!(record.attributes().status.as_deref(), Some("active"));
    assert!(record.parcel_id().starts_with("PARCEL_"));
    assert!(record.parcel_id().ends_with("_0"));
    assert_eq!(record.geometry().0.len(), 1);
    assert_eq!(record.geometry().0[0].exterior().0[0].x, 98.6);

    let json = record.properties_json();
    assert_eq!(json["pemilik"], "Ahmad");
    assert_eq!(json["luas_peta"], 2500.0);
    assert_eq!(json["pihak_bersengketa"], serde_json::json!([]));
}

#[test]
fn test_line_string_feature_is_isolated() {
    let line = r#"{"type":"Feature","properties":{"NIB":"N-2"},"geometry":{"type":"LineString","coordinates":[[98.6,3.6],[98.7,3.7]]}}"#;
    let text = collection(&[
        polygon_feature(r#"{"NIB":"N-0"}"#, 98.6, 3.6, 0.001),
        polygon_feature(r#"{"NIB":"N-1"}"#, 98.7, 3.6, 0.001),
        line.to_string(),
        polygon_feature(r#"{"NIB":"N-3"}"#, 98.8, 3.6, 0.001),
    ]);

    let extraction = process_geojson(&text).unwrap();
    assert_eq!(extraction.records.len(), 3);
    assert_eq!(extraction.errors.len(), 1);

    let error = &extraction.errors[0];
    assert_eq!(error.index, 2);
    assert_eq!(error.parcel_id.as_deref(), Some("N-2"));
    assert_eq!(error.error, MappingError::UnsupportedGeometry("LineString".into()));

    let ids: Vec<&str> = extraction.records.iter().map(|r| r.parcel_id()).collect();
    assert_eq!(ids, vec!["N-0", "N-1", "N-3"]);
}

#[test]
fn test_generated_ids_are_distinct() {
    let text = collection(&[
        polygon_feature("{}", 98.6, 3.6, 0.001),
        polygon_feature(r#"{"PEMILIK":"Siti"}"#, 98.7, 3.6, 0.001),
    ]);
    let extraction = process_geojson(&text).unwrap();
    assert_eq!(extraction.records.len(), 2);

    let a = extraction.records[0].parcel_id();
    let b = extraction.records[1].parcel_id();
    assert_ne!(a, b);
    assert!(a.ends_with("_0") && b.ends_with("_1"));
    // Même horodatage de lot
    assert_eq!(a.trim_end_matches("_0"), b.trim_end_matches("_1"));
}

#[test]
fn test_projected_geojson_converted() {
    let text = collection(&[polygon_feature(r#"{"NIB":"UTM-1"}"#, 450000.0, 500000.0, 50.0)]);
    let extraction = process_geojson(&text).unwrap();
    let c = extraction.records[0].geometry().0[0].exterior().0[0];
    assert!((c.x - 98.55).abs() < 0.01, "x={}", c.x);
    assert!((c.y - 4.49).abs() < 0.01, "y={}", c.y);
}

#[test]
fn test_geojson_bytes_with_bom() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(polygon_feature(r#"{"HAK":"HM-7"}"#, 98.6, 3.6, 0.001).as_bytes());

    let extraction = Ingestor::default().process_geojson_bytes(&bytes).unwrap();
    assert_eq!(extraction.records.len(), 1);
    assert_eq!(extraction.records[0].parcel_id(), "HM-7");
}

#[test]
fn test_invalid_geojson_is_fatal() {
    assert!(matches!(
        process_geojson("this is not json"),
        Err(IngestError::Parse { .. })
    ));
    assert!(matches!(
        process_geojson(r#"{"type":"Point","coordinates":[1,2]}"#),
        Err(IngestError::Parse { .. })
    ));
}

// ---------------------------------------------------------------------------
// Shapefile
// ---------------------------------------------------------------------------

#[test]
fn test_shapefile_end_to_end() {
    let shapes = vec![
        TestShape::Polygon(vec![
            square_cw(463000.0, 397000.0, 100.0),
            square_ccw(463020.0, 397020.0, 10.0),
        ]),
        TestShape::Null,
        TestShape::Polygon(vec![square_cw(98.6, 3.6, 0.001)]),
    ];
    let shp = shp_bytes(&shapes);
    let dbf = dbf_bytes(
        FIELDS,
        &[
            vec!["Ahmad", "1,487.5 m2", "12010203"],
            vec!["Budi", "-", "12010204"],
            vec!["Siti", "", ""],
        ],
    );
    let zip = zip_of(&[
        ("persil/persil.shp", &shp[..]),
        ("persil/persil.dbf", &dbf[..]),
        ("persil/persil.prj", PRJ_47N.as_bytes()),
    ]);

    let extraction = Ingestor::default()
        .with_batch_timestamp(1700000000000)
        .extract_shapefile(&zip)
        .unwrap();

    assert_eq!(extraction.format, SourceFormat::Shapefile);
    assert_eq!(extraction.feature_count, 3);
    assert_eq!(extraction.records.len(), 2);
    assert_eq!(extraction.errors.len(), 1);
    assert_eq!(extraction.errors[0].index, 1);
    assert_eq!(extraction.errors[0].parcel_id.as_deref(), Some("12010204"));
    assert_eq!(extraction.errors[0].error, MappingError::MissingGeometry);

    let projection = extraction.projection.as_ref().unwrap();
    assert_eq!(projection.utm_zone, Some((47, false)));

    let first = &extraction.records[0];
    assert_eq!(first.parcel_id(), "12010203");
    assert_eq!(first.attributes().pemilik.as_deref(), Some("Ahmad"));
    assert_eq!(first.attributes().luas_peta, Some(1487.5));
    let polygon = &first.geometry().0[0];
    assert_eq!(polygon.interiors().len(), 1);
    let c = polygon.exterior().0[0];
    assert!((c.x - 98.66).abs() < 0.05, "x={}", c.x);
    assert!((c.y - 3.57).abs() < 0.05, "y={}", c.y);

    let third = &extraction.records[1];
    assert_eq!(third.parcel_id(), "PARCEL_1700000000000_2");
    assert_eq!(third.attributes().nib, None);
    assert_eq!(third.geometry().0[0].exterior().0[0].x, 98.6);
}

#[test]
fn test_shapefile_truncated_stream_keeps_prior_records() {
    let shapes = vec![
        TestShape::Polygon(vec![square_cw(98.6, 3.6, 0.001)]),
        TestShape::Polygon(vec![square_cw(98.7, 3.6, 0.001)]),
    ];
    let mut shp = shp_bytes(&shapes);
    shp.truncate(shp.len() - 40);
    let dbf = dbf_bytes(FIELDS, &[vec!["A", "1", "N-0"], vec!["B", "2", "N-1"]]);
    let zip = zip_of(&[("persil.shp", &shp[..]), ("persil.dbf", &dbf[..])]);

    let extraction = extract_shapefile(&zip).unwrap();
    assert_eq!(extraction.records.len(), 1);
    assert_eq!(extraction.records[0].parcel_id(), "N-0");
    assert_eq!(extraction.errors.len(), 1);
    assert_eq!(extraction.errors[0].index, 1);
    assert!(matches!(extraction.errors[0].error, MappingError::Decode(_)));
    assert!(extraction.projection.is_none());
}

#[test]
fn test_shapefile_missing_dbf() {
    let shp = shp_bytes(&[TestShape::Polygon(vec![square_cw(98.6, 3.6, 0.001)])]);
    let zip = zip_of(&[("persil.shp", &shp[..]), ("persil.prj", PRJ_47N.as_bytes())]);
    assert!(matches!(
        extract_shapefile(&zip),
        Err(IngestError::Archive(ArchiveError::MissingMember("dbf")))
    ));
}

#[test]
fn test_shapefile_not_a_zip() {
    assert!(matches!(
        extract_shapefile(b"PK but not really"),
        Err(IngestError::Parse { .. })
    ));
}

#[test]
fn test_ingest_dispatch_by_format() {
    let shp = shp_bytes(&[TestShape::Polygon(vec![square_cw(98.6, 3.6, 0.001)])]);
    let dbf = dbf_bytes(FIELDS, &[vec!["Dewi", "350", "N-9"]]);
    let zip = zip_of(&[("PERSIL.SHP", &shp[..]), ("PERSIL.DBF", &dbf[..])]);

    let ingestor = Ingestor::default();
    let extraction = ingestor.ingest(SourceFormat::Shapefile, &zip).unwrap();
    assert_eq!(extraction.records[0].parcel_id(), "N-9");
    assert_eq!(
        extraction.records[0].attributes().luas_peta,
        Some(350.0)
    );

    let geojson = polygon_feature(r#"{"NIB":"N-10"}"#, 98.6, 3.6, 0.001);
    let extraction = ingestor.ingest(SourceFormat::GeoJson, geojson.as_bytes()).unwrap();
    assert_eq!(extraction.records[0].parcel_id(), "N-10");
    assert_eq!(extraction.records[0].geometry().0.len(), 1);
}
