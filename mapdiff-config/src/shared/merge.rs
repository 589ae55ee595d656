use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::ValidationError;

/// Top level configuration of a mapdiff tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MapDiffConfig {
    #[serde(default)]
    pub merge: MergeConfig,
}

impl MapDiffConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.merge.validate()
    }
}

impl Config for MapDiffConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["merge.kinds"];
}

/// Settings of a single derive or apply merge session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MergeConfig {
    /// Entity kinds in global processing order. Both input streams of a session must deliver
    /// all entities of a kind before any entity of a later kind.
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,
}

impl MergeConfig {
    /// Kind ordering of OpenStreetMap style extracts.
    pub const DEFAULT_KINDS: &'static [&'static str] = &["node", "way", "relation"];

    /// Validates the kind ordering.
    ///
    /// Rejects empty orderings, blank names, duplicates and orderings which do not fit in
    /// 16 bit kind indices.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.kinds.is_empty() {
            return Err(ValidationError::NoKinds);
        }

        if self.kinds.len() > usize::from(u16::MAX) {
            return Err(ValidationError::TooManyKinds(self.kinds.len()));
        }

        let mut seen = HashSet::with_capacity(self.kinds.len());
        for (index, kind) in self.kinds.iter().enumerate() {
            if kind.trim().is_empty() {
                return Err(ValidationError::BlankKind(index));
            }

            if !seen.insert(kind.as_str()) {
                return Err(ValidationError::DuplicateKind(kind.clone()));
            }
        }

        Ok(())
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
        }
    }
}

fn default_kinds() -> Vec<String> {
    MergeConfig::DEFAULT_KINDS
        .iter()
        .map(|kind| kind.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_kinds_are_valid() {
        let config = MergeConfig::default();

        assert_eq!(config.kinds, vec!["node", "way", "relation"]);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_empty_blank_and_duplicate_kinds() {
        let empty = MergeConfig { kinds: vec![] };
        assert_eq!(empty.validate(), Err(ValidationError::NoKinds));

        let blank = MergeConfig {
            kinds: vec!["node".into(), "  ".into()],
        };
        assert_eq!(blank.validate(), Err(ValidationError::BlankKind(1)));

        let duplicate = MergeConfig {
            kinds: vec!["node".into(), "way".into(), "node".into()],
        };
        assert_eq!(
            duplicate.validate(),
            Err(ValidationError::DuplicateKind("node".into()))
        );
    }
}
