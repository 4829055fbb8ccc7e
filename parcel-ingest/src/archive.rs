//! Extraction des membres d'une archive shapefile (.zip)

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{ArchiveError, IngestError};

/// Taille maximale décompressée d'un membre
pub const MAX_MEMBER_BYTES: u64 = 512 * 1024 * 1024;

/// Contenu utile d'une archive shapefile, lu en mémoire
#[derive(Debug)]
pub struct ShapefileArchive {
    /// Nom du membre `.shp` (sert de nom de couche)
    pub name: String,

    /// Géométries
    pub shp: Vec<u8>,

    /// Attributs dBase
    pub dbf: Vec<u8>,

    /// Index des géométries (optionnel, non utilisé pour la lecture)
    pub shx: Option<Vec<u8>>,

    /// Projection WKT (optionnelle, informative)
    pub prj: Option<Vec<u8>>,
}

/// Entrées à ignorer : dossiers et fourches de ressources macOS
fn is_ignored(name: &str) -> bool {
    name.ends_with('/') || name.starts_with("__MACOSX/") || name.contains("/__MACOSX/")
}

/// Extension en minuscules d'un nom de membre
fn extension(name: &str) -> Option<String> {
    let file_name = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = file_name.rsplit_once('.')?;
    // Fichiers cachés type "._parcel.shp"
    if stem.is_empty() || stem.starts_with("._") {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Ouvre une archive ZIP en mémoire et récupère les membres du shapefile
///
/// Le premier membre trouvé pour chaque extension est retenu. `.shp` et `.dbf`
/// sont obligatoires. Un membre de plus de [`MAX_MEMBER_BYTES`] une fois
/// décompressé est refusé.
pub fn extract(zip_bytes: &[u8]) -> Result<ShapefileArchive, IngestError> {
    extract_limited(zip_bytes, MAX_MEMBER_BYTES)
}

fn extract_limited(zip_bytes: &[u8], max_member_bytes: u64) -> Result<ShapefileArchive, IngestError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| IngestError::parse("zip", e.to_string()))?;

    let mut name = None;
    let mut shp = None;
    let mut dbf = None;
    let mut shx = None;
    let mut prj = None;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| IngestError::parse("zip", e.to_string()))?;

        let entry_name = entry.name().to_string();
        if entry.is_dir() || is_ignored(&entry_name) {
            continue;
        }

        let slot = match extension(&entry_name).as_deref() {
            Some("shp") => &mut shp,
            Some("dbf") => &mut dbf,
            Some("shx") => &mut shx,
            Some("prj") => &mut prj,
            _ => continue,
        };
        if slot.is_some() {
            debug!(member = %entry_name, "Duplicate archive member ignored");
            continue;
        }

        // Taille déclarée non fiable : lecture bornée, sans préallocation
        let mut content = Vec::new();
        entry
            .by_ref()
            .take(max_member_bytes + 1)
            .read_to_end(&mut content)
            .map_err(|e| ArchiveError::UnreadableMember {
                name: entry_name.clone(),
                reason: e.to_string(),
            })?;
        if content.len() as u64 > max_member_bytes {
            return Err(ArchiveError::UnreadableMember {
                name: entry_name,
                reason: format!("exceeds {} bytes once decompressed", max_member_bytes),
            }
            .into());
        }

        if entry_name.to_ascii_lowercase().ends_with(".shp") {
            name = Some(entry_name.clone());
        }
        debug!(member = %entry_name, bytes = content.len(), "Archive member read");
        *slot = Some(content);
    }

    let shp = shp.ok_or(ArchiveError::MissingMember("shp"))?;
    let dbf = dbf.ok_or(ArchiveError::MissingMember("dbf"))?;

    Ok(ShapefileArchive {
        name: name.unwrap_or_default(),
        shp,
        dbf,
        shx,
        prj,
    })
}
