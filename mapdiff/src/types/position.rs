use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use mapdiff_config::shared::MergeConfig;
use serde::{Deserialize, Serialize};

use crate::error::{MapDiffError, MapDiffResult};

/// Index of an entity kind within a [`KindCatalog`].
///
/// Kinds are ordered by their index: every entity of kind `k` is processed before any entity
/// of kind `k + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Kind(u16);

impl Kind {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// Ordered list of entity kinds taking part in a merge session.
///
/// The catalog is fixed when a session is created. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindCatalog {
    names: Arc<[String]>,
}

impl KindCatalog {
    /// Creates a catalog from kind names in processing order.
    pub fn new<I, N>(names: I) -> MapDiffResult<Self>
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let config = MergeConfig {
            kinds: names.into_iter().map(Into::into).collect(),
        };

        Self::try_from(&config)
    }

    /// Nodes, then ways, then relations.
    pub fn osm() -> Self {
        let names: Vec<String> = MergeConfig::DEFAULT_KINDS
            .iter()
            .map(|name| name.to_string())
            .collect();

        Self {
            names: names.into(),
        }
    }

    /// Looks up a kind by name.
    pub fn kind(&self, name: &str) -> Option<Kind> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(|index| Kind(index as u16))
    }

    pub fn name(&self, kind: Kind) -> Option<&str> {
        self.names.get(kind.index()).map(String::as_str)
    }

    pub fn contains(&self, kind: Kind) -> bool {
        kind.index() < self.names.len()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over kinds in processing order.
    pub fn kinds(&self) -> impl Iterator<Item = Kind> + '_ {
        (0..self.names.len()).map(|index| Kind(index as u16))
    }
}

impl Default for KindCatalog {
    fn default() -> Self {
        Self::osm()
    }
}

impl TryFrom<&MergeConfig> for KindCatalog {
    type Error = MapDiffError;

    fn try_from(config: &MergeConfig) -> Result<Self, Self::Error> {
        config.validate()?;

        Ok(Self {
            names: config.kinds.clone().into(),
        })
    }
}

/// Location of an entity within a sorted stream: its kind, then its identifier.
///
/// The derived ordering is lexicographic over `(kind, id)`, which is the global order of both
/// streams of a merge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub kind: Kind,
    pub id: i64,
}

impl Position {
    pub const fn new(kind: Kind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Compares two positions by kind, then identifier.
pub fn compare(a: &Position, b: &Position) -> Ordering {
    a.cmp(b)
}

/// Progress of one source of a merge session.
///
/// A source only ever moves forward: `NotStarted`, then through the kinds in order, then
/// `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceStatus {
    NotStarted,
    AtKind(Kind),
    Complete,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn positions_order_by_kind_then_id() {
        let node_9 = Position::new(Kind::new(0), 9);
        let way_1 = Position::new(Kind::new(1), 1);
        let way_2 = Position::new(Kind::new(1), 2);

        assert_eq!(compare(&node_9, &way_1), Ordering::Less);
        assert_eq!(compare(&way_2, &way_1), Ordering::Greater);
        assert_eq!(compare(&way_1, &way_1), Ordering::Equal);
    }

    #[test]
    fn status_only_moves_forward() {
        assert!(SourceStatus::NotStarted < SourceStatus::AtKind(Kind::new(0)));
        assert!(SourceStatus::AtKind(Kind::new(0)) < SourceStatus::AtKind(Kind::new(2)));
        assert!(SourceStatus::AtKind(Kind::new(2)) < SourceStatus::Complete);
    }

    #[test]
    fn osm_catalog_orders_nodes_ways_relations() {
        let catalog = KindCatalog::osm();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.kind("node"), Some(Kind::new(0)));
        assert_eq!(catalog.kind("relation"), Some(Kind::new(2)));
        assert_eq!(catalog.name(Kind::new(1)), Some("way"));
        assert!(!catalog.contains(Kind::new(3)));
        assert_eq!(catalog.kinds().count(), 3);
    }

    #[test]
    fn catalog_rejects_invalid_kind_lists() {
        let err = KindCatalog::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let err = KindCatalog::new(["node", "way", "node"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let legacy = KindCatalog::new(["node", "segment", "way"]).unwrap();
        assert_eq!(legacy.kind("segment"), Some(Kind::new(1)));
    }
}
