//! Table de correspondance des noms d'attributs vers le schéma canonique
//!
//! Clés en MAJUSCULES (la résolution met la clé d'entrée en majuscules avant
//! la recherche). Trois dialectes observés :
//! - codes abrégés du cadastre indonésien (dont les troncatures dBase à 10 caractères)
//! - noms canoniques snake_case
//! - alias anglais hérités (`owner_name`, `land_use`, `area_sqm`, ...)
//!
//! Les noms canoniques se résolvent vers eux-mêmes même sans entrée explicite
//! (repli sur la clé en minuscules), ce qui rend le mapping idempotent.

/// Noms canoniques des champs d'une parcelle
pub const CANONICAL_FIELDS: &[&str] = &[
    "parcel_id",
    "provinsi",
    "kabupaten",
    "kecamatan",
    "desa",
    "nib",
    "nomor_su",
    "hak",
    "tipe_hak",
    "nomor_sk",
    "tanggal_sk",
    "tanggal_terbit_hak",
    "tanggal_berakhir_hak",
    "luas_tertulis",
    "luas_peta",
    "pemilik",
    "tipe_pemilik",
    "penggunaan",
    "pemanfaatan",
    "status_penggunaan",
    "kasus",
    "pihak_bersengketa",
    "penyelesaian",
    "hasil",
    "catatan_perbaikan",
    "nomor_peta",
    "status",
    "keterangan",
];

/// Alias (MAJUSCULES) -> nom canonique
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    // Identité
    ("PARCEL_ID", "parcel_id"),
    ("PARCELID", "parcel_id"),
    ("ID_BIDANG", "parcel_id"),
    ("IDBIDANG", "parcel_id"),
    ("ID_PERSIL", "parcel_id"),
    // Localisation administrative
    ("PROVINSI", "provinsi"),
    ("PROV", "provinsi"),
    ("PROPINSI", "provinsi"),
    ("PROVINCE", "provinsi"),
    ("KABUPATEN", "kabupaten"),
    ("KAB", "kabupaten"),
    ("KABKOTA", "kabupaten"),
    ("KAB_KOTA", "kabupaten"),
    ("REGENCY", "kabupaten"),
    ("KECAMATAN", "kecamatan"),
    ("KEC", "kecamatan"),
    ("DISTRICT", "kecamatan"),
    ("DESA", "desa"),
    ("KELURAHAN", "desa"),
    ("DESAKEL", "desa"),
    ("DESA_KEL", "desa"),
    ("VILLAGE", "desa"),
    // Identifiants juridiques
    ("NIB", "nib"),
    ("NO_NIB", "nib"),
    ("SU", "nomor_su"),
    ("NO_SU", "nomor_su"),
    ("NOMORSU", "nomor_su"),
    ("SURVEY_NO", "nomor_su"),
    ("HAK", "hak"),
    ("NO_HAK", "hak"),
    ("NOMORHAK", "hak"),
    ("CERTIFICATE", "hak"),
    ("CERTIFICATE_NUMBER", "hak"),
    ("TIPEHAK", "tipe_hak"),
    ("TIPE_HAK", "tipe_hak"),
    ("JENIS_HAK", "tipe_hak"),
    ("RIGHTS_TYPE", "tipe_hak"),
    ("NO_SK", "nomor_sk"),
    ("NOMORSK", "nomor_sk"),
    ("NOSK", "nomor_sk"),
    ("TGL_SK", "tanggal_sk"),
    ("TGLSK", "tanggal_sk"),
    ("TANGGALSK", "tanggal_sk"),
    ("TGLTERBIT", "tanggal_terbit_hak"),
    ("TGL_TERBIT", "tanggal_terbit_hak"),
    ("TGLTERBITH", "tanggal_terbit_hak"),
    ("ISSUED_DATE", "tanggal_terbit_hak"),
    ("TGLAKHIR", "tanggal_berakhir_hak"),
    ("TGL_AKHIR", "tanggal_berakhir_hak"),
    ("BERAKHIRHA", "tanggal_berakhir_hak"),
    ("BERAKHIR_HAK", "tanggal_berakhir_hak"),
    ("EXPIRY_DATE", "tanggal_berakhir_hak"),
    // Surfaces
    ("LUASTERTUL", "luas_tertulis"),
    ("LUAS_TERTULIS", "luas_tertulis"),
    ("LUASTERTULIS", "luas_tertulis"),
    ("LUAS", "luas_tertulis"),
    ("LUASPETA", "luas_peta"),
    ("LUAS_PETA", "luas_peta"),
    ("AREA_SQM", "luas_peta"),
    ("AREA", "luas_peta"),
    // Propriété
    ("PEMILIK", "pemilik"),
    ("NAMA_PEMILIK", "pemilik"),
    ("NAMAPEMILI", "pemilik"),
    ("OWNER", "pemilik"),
    ("OWNER_NAME", "pemilik"),
    ("TIPEPEMILI", "tipe_pemilik"),
    ("TIPE_PEMILIK", "tipe_pemilik"),
    ("TIPEPEMILIK", "tipe_pemilik"),
    ("OWNER_TYPE", "tipe_pemilik"),
    // Occupation du sol
    ("PENGGUNAAN", "penggunaan"),
    ("GUNATANAH", "penggunaan"),
    ("LAND_USE", "penggunaan"),
    ("LANDUSE", "penggunaan"),
    ("PEMANFAATA", "pemanfaatan"),
    ("PEMANFAATAN", "pemanfaatan"),
    ("PRIMARY_USE", "pemanfaatan"),
    ("STATUSPENG", "status_penggunaan"),
    ("STATUS_PENGGUNAAN", "status_penggunaan"),
    ("USAGE_STATUS", "status_penggunaan"),
    // Litiges
    ("KASUS", "kasus"),
    ("SENGKETA", "kasus"),
    ("DISPUTE", "kasus"),
    ("PIHAK", "pihak_bersengketa"),
    ("PIHAKSENGK", "pihak_bersengketa"),
    ("PIHAK_BERSENGKETA", "pihak_bersengketa"),
    ("DISPUTE_PARTIES", "pihak_bersengketa"),
    ("PENYELESAI", "penyelesaian"),
    ("PENYELESAIAN", "penyelesaian"),
    ("RESOLUTION", "penyelesaian"),
    ("HASIL", "hasil"),
    ("OUTCOME", "hasil"),
    ("PERBAIKAN", "catatan_perbaikan"),
    ("CATATANPER", "catatan_perbaikan"),
    ("CATATAN_PERBAIKAN", "catatan_perbaikan"),
    // Suivi
    ("NOPETA", "nomor_peta"),
    ("NO_PETA", "nomor_peta"),
    ("NOMORPETA", "nomor_peta"),
    ("MAP_REF", "nomor_peta"),
    ("STATUS", "status"),
    ("KETERANGAN", "keterangan"),
    ("KET", "keterangan"),
    ("REMARKS", "keterangan"),
    ("NOTES", "keterangan"),
];

/// Résout un nom d'attribut d'entrée vers son nom canonique
///
/// Les clés inconnues retombent sur leur propre forme en minuscules.
pub fn resolve(key: &str) -> String {
    resolve_with(key, &[])
}

/// Résolution avec des alias supplémentaires, prioritaires sur la table fixe
pub fn resolve_with(key: &str, extra: &[(String, String)]) -> String {
    let key = key.trim();
    let upper = key.to_uppercase();

    extra
        .iter()
        .find(|(alias, _)| alias.to_uppercase() == upper)
        .map(|(_, canonical)| canonical.clone())
        .or_else(|| {
            FIELD_ALIASES
                .iter()
                .find(|(alias, _)| *alias == upper)
                .map(|(_, canonical)| (*canonical).to_string())
        })
        .unwrap_or_else(|| key.to_lowercase())
}

/// Vérifie qu'un nom est un champ canonique
pub fn is_canonical(name: &str) -> bool {
    CANONICAL_FIELDS.contains(&name)
}
