//! Mapping des attributs bruts vers le schéma canonique des parcelles
//!
//! La résolution des noms (`aliases`) est séparée des règles de coercition
//! (`coerce`) : ajouter un alias ne touche pas à la normalisation.

pub mod aliases;
pub mod coerce;

use crate::types::{AttrValue, ParcelAttributes, Properties};

/// Statut par défaut d'une parcelle importée
pub const DEFAULT_STATUS: &str = "active";

/// Traduit des sacs de propriétés hétérogènes en `ParcelAttributes`
///
/// Fonction pure : aucun état partagé, ne renvoie jamais d'erreur.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    /// Alias supplémentaires (source -> canonique), prioritaires sur la table fixe
    extra_aliases: Vec<(String, String)>,
}

impl FieldMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute des alias venant de la configuration
    pub fn with_aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.extra_aliases
            .extend(aliases.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Nom canonique d'une clé d'entrée
    pub fn resolve(&self, key: &str) -> String {
        aliases::resolve_with(key, &self.extra_aliases)
    }

    /// Mappe un sac de propriétés vers les attributs canoniques
    pub fn map(&self, raw: &Properties) -> ParcelAttributes {
        let mut attrs = ParcelAttributes::default();

        for (key, value) in raw {
            let field = self.resolve(key);
            apply(&mut attrs, field, value);
        }

        if attrs.status.is_none() {
            attrs.status = Some(DEFAULT_STATUS.to_string());
        }

        attrs
    }
}

/// Affecte une valeur au champ canonique correspondant, avec sa coercition
fn apply(attrs: &mut ParcelAttributes, field: String, value: &AttrValue) {
    use coerce::{area, date, parties, text};

    match field.as_str() {
        "parcel_id" => attrs.parcel_id = text(value),
        "provinsi" => attrs.provinsi = text(value),
        "kabupaten" => attrs.kabupaten = text(value),
        "kecamatan" => attrs.kecamatan = text(value),
        "desa" => attrs.desa = text(value),
        "nib" => attrs.nib = text(value),
        "nomor_su" => attrs.nomor_su = text(value),
        "hak" => attrs.hak = text(value),
        "tipe_hak" => attrs.tipe_hak = text(value),
        "nomor_sk" => attrs.nomor_sk = text(value),
        "tanggal_sk" => attrs.tanggal_sk = date(value),
        "tanggal_terbit_hak" => attrs.tanggal_terbit_hak = date(value),
        "tanggal_berakhir_hak" => attrs.tanggal_berakhir_hak = date(value),
        "luas_tertulis" => attrs.luas_tertulis = area(value),
        "luas_peta" => attrs.luas_peta = area(value),
        "pemilik" => attrs.pemilik = text(value),
        "tipe_pemilik" => attrs.tipe_pemilik = text(value),
        "penggunaan" => attrs.penggunaan = text(value),
        "pemanfaatan" => attrs.pemanfaatan = text(value),
        "status_penggunaan" => attrs.status_penggunaan = text(value),
        "kasus" => attrs.kasus = text(value),
        "pihak_bersengketa" => attrs.pihak_bersengketa = parties(value),
        "penyelesaian" => attrs.penyelesaian = text(value),
        "hasil" => attrs.hasil = text(value),
        "catatan_perbaikan" => attrs.catatan_perbaikan = text(value),
        "nomor_peta" => attrs.nomor_peta = text(value),
        "status" => attrs.status = text(value),
        "keterangan" => attrs.keterangan = text(value),
        _ => {
            attrs.extra.insert(field, coerce::passthrough(value.clone()));
        }
    }
}
