//! Configuration de l'import

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use parcel_ingest::fields::aliases;
use parcel_ingest::{CoordinateTransform, FieldMapper, GeometryNormalizer, Ingestor};

/// Configuration principale (fichier JSON, tous les champs optionnels)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Schéma PostgreSQL cible
    pub schema: String,

    /// Table des parcelles
    pub table: String,

    /// Alias supplémentaires : nom d'attribut source -> champ canonique
    pub aliases: BTreeMap<String, String>,

    /// Conversion des coordonnées projetées
    pub transform: CoordinateTransform,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            table: "parcels".to_string(),
            aliases: BTreeMap::new(),
            transform: CoordinateTransform::default(),
        }
    }
}

impl Config {
    /// Charge une configuration depuis un fichier
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Fichier donné ou configuration par défaut
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for name in [&self.schema, &self.table] {
            if !is_identifier(name) {
                anyhow::bail!("Invalid SQL identifier: {:?}", name);
            }
        }

        for (source, canonical) in &self.aliases {
            if !aliases::is_canonical(canonical) {
                anyhow::bail!(
                    "Alias {} targets unknown field {:?} (known: {})",
                    source,
                    canonical,
                    aliases::CANONICAL_FIELDS.join(", ")
                );
            }
        }

        if let CoordinateTransform::Utm { zone, .. } = self.transform {
            if !(1..=60).contains(&zone) {
                anyhow::bail!("UTM zone must be between 1 and 60, got {}", zone);
            }
        }

        Ok(())
    }

    /// Chaîne d'ingestion correspondant à la configuration
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(
            FieldMapper::new().with_aliases(self.aliases.clone()),
            GeometryNormalizer::new(self.transform),
        )
    }
}

/// Identifiant SQL simple, interpolé tel quel dans les requêtes
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
