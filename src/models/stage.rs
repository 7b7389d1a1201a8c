// file: src/models/stage.rs
// description: stage catalog with display order, aliases and exclusion flags
// reference: internal data structures

use crate::error::{ProgressError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Row/column label that always denotes a derived sum, never a stage.
pub const RESERVED_TOTAL: &str = "Total";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,

    /// Terminal stages (declined, ineligible) are counted apart from the in-progress total.
    #[serde(default)]
    pub excluded: bool,

    #[serde(default)]
    pub aliases: Vec<String>,

    /// Rendering hint passed through to exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            excluded: false,
            aliases: Vec::new(),
            color: None,
        }
    }

    pub fn excluded(name: impl Into<String>) -> Self {
        Self {
            excluded: true,
            ..Self::new(name)
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn is_excluded(&self) -> bool {
        self.excluded
    }
}

/// Canonical form used for every label comparison: trimmed, inner
/// whitespace collapsed, lowercased.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn is_reserved_label(label: &str) -> bool {
    normalize_label(label) == normalize_label(RESERVED_TOTAL)
}

/// Ordered, validated list of stages. Order comes from configuration only.
#[derive(Debug, Clone)]
pub struct StageCatalog {
    stages: Vec<Stage>,
    fallback: Option<usize>,
    lookup: HashMap<String, usize>,
    fingerprint: String,
}

impl StageCatalog {
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        Self::build(stages, None)
    }

    pub fn builder() -> StageCatalogBuilder {
        StageCatalogBuilder::default()
    }

    fn build(mut stages: Vec<Stage>, fallback: Option<String>) -> Result<Self> {
        let fallback = match fallback {
            Some(name) => {
                let key = normalize_label(&name);
                let position = stages.iter().position(|s| normalize_label(&s.name) == key);
                Some(match position {
                    Some(index) => index,
                    None => {
                        stages.push(Stage::new(name.trim()));
                        stages.len() - 1
                    }
                })
            }
            None => None,
        };

        if stages.is_empty() {
            return Err(ProgressError::InvalidCatalog(
                "catalog must contain at least one stage".to_string(),
            ));
        }

        let mut lookup = HashMap::new();
        for (index, stage) in stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(ProgressError::InvalidCatalog(format!(
                    "stage at position {} has a blank name",
                    index
                )));
            }

            let labels = std::iter::once(&stage.name).chain(stage.aliases.iter());
            for label in labels {
                if is_reserved_label(label) {
                    return Err(ProgressError::InvalidCatalog(format!(
                        "'{}' is reserved for derived totals and cannot name a stage",
                        label.trim()
                    )));
                }

                if let Some(previous) = lookup.insert(normalize_label(label), index) {
                    return Err(ProgressError::InvalidCatalog(format!(
                        "label '{}' is used by both '{}' and '{}'",
                        label.trim(),
                        stages[previous].name,
                        stage.name
                    )));
                }
            }
        }

        let fingerprint = compute_fingerprint(&stages);

        Ok(Self {
            stages,
            fallback,
            lookup,
            fingerprint,
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Position of the stage whose name or alias matches `label`.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.lookup.get(&normalize_label(label)).copied()
    }

    pub fn resolve(&self, label: &str) -> Option<&Stage> {
        self.index_of(label).map(|index| &self.stages[index])
    }

    pub fn fallback_index(&self) -> Option<usize> {
        self.fallback
    }

    pub fn fallback(&self) -> Option<&Stage> {
        self.fallback.map(|index| &self.stages[index])
    }

    /// Hex SHA-256 over the ordered (name, excluded) pairs.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn short_fingerprint(&self) -> &str {
        &self.fingerprint[..12]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }
}

impl PartialEq for StageCatalog {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
    }
}

impl Eq for StageCatalog {}

fn compute_fingerprint(stages: &[Stage]) -> String {
    let mut hasher = Sha256::new();
    for stage in stages {
        hasher.update(stage.name.trim().as_bytes());
        hasher.update([0x1f, u8::from(stage.excluded), 0x1e]);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
pub struct StageCatalogBuilder {
    stages: Vec<Stage>,
    fallback: Option<String>,
}

impl StageCatalogBuilder {
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages.extend(stages);
        self
    }

    /// Bucket receiving unmatched stage labels in lenient mode. Appended
    /// to the catalog when no stage of that name exists.
    pub fn fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = Some(name.into());
        self
    }

    pub fn build(self) -> Result<StageCatalog> {
        StageCatalog::build(self.stages, self.fallback)
    }
}
