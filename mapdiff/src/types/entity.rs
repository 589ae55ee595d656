use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Kind, KindCatalog};

/// Payload flowing through a merge session.
///
/// Entities are identified by [`Entity::id`] within their kind. [`PartialEq`] is the content
/// equality used to tell a modified entity from an unchanged one.
pub trait Entity: PartialEq + Send {
    fn id(&self) -> i64;
}

/// Tags of a map entity, sorted by key so equal tag sets compare equal.
pub type Tags = BTreeMap<String, String>;

/// Metadata shared by all map entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: i64,
    pub version: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changeset: Option<i64>,
    #[serde(default)]
    pub user: Option<String>,
}

impl EntityMeta {
    pub fn new(id: i64, version: u32) -> Self {
        Self {
            id,
            version,
            timestamp: None,
            changeset: None,
            user: None,
        }
    }
}

/// Coordinates are fixed point with seven decimal places, which keeps content comparison exact.
pub const COORDINATE_SCALE: f64 = 10_000_000.0;

/// A point feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub meta: EntityMeta,
    pub latitude: i32,
    pub longitude: i32,
    #[serde(default)]
    pub tags: Tags,
}

impl Node {
    /// Creates a node, rounding coordinates to the fixed point grid.
    pub fn new(meta: EntityMeta, latitude: f64, longitude: f64) -> Self {
        Self {
            meta,
            latitude: (latitude * COORDINATE_SCALE).round() as i32,
            longitude: (longitude * COORDINATE_SCALE).round() as i32,
            tags: Tags::new(),
        }
    }

    pub fn latitude_degrees(&self) -> f64 {
        f64::from(self.latitude) / COORDINATE_SCALE
    }

    pub fn longitude_degrees(&self) -> f64 {
        f64::from(self.longitude) / COORDINATE_SCALE
    }
}

/// A linear feature made of an ordered list of node references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Way {
    pub meta: EntityMeta,
    pub node_refs: Vec<i64>,
    #[serde(default)]
    pub tags: Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_type: MemberType,
    pub ref_id: i64,
    #[serde(default)]
    pub role: String,
}

/// A composite feature grouping other entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub meta: EntityMeta,
    pub members: Vec<Member>,
    #[serde(default)]
    pub tags: Tags,
}

/// Any map entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEntity {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl MapEntity {
    pub fn meta(&self) -> &EntityMeta {
        match self {
            MapEntity::Node(node) => &node.meta,
            MapEntity::Way(way) => &way.meta,
            MapEntity::Relation(relation) => &relation.meta,
        }
    }

    pub fn tags(&self) -> &Tags {
        match self {
            MapEntity::Node(node) => &node.tags,
            MapEntity::Way(way) => &way.tags,
            MapEntity::Relation(relation) => &relation.tags,
        }
    }

    /// Name of the kind this entity belongs to in [`KindCatalog::osm`].
    pub fn kind_name(&self) -> &'static str {
        match self {
            MapEntity::Node(_) => "node",
            MapEntity::Way(_) => "way",
            MapEntity::Relation(_) => "relation",
        }
    }

    /// Resolves the kind of this entity in `catalog`, by name.
    pub fn kind_in(&self, catalog: &KindCatalog) -> Option<Kind> {
        catalog.kind(self.kind_name())
    }
}

impl Entity for MapEntity {
    fn id(&self) -> i64 {
        self.meta().id
    }
}

impl Entity for Node {
    fn id(&self) -> i64 {
        self.meta.id
    }
}

impl Entity for Way {
    fn id(&self) -> i64 {
        self.meta.id
    }
}

impl Entity for Relation {
    fn id(&self) -> i64 {
        self.meta.id
    }
}

impl From<Node> for MapEntity {
    fn from(node: Node) -> Self {
        MapEntity::Node(node)
    }
}

impl From<Way> for MapEntity {
    fn from(way: Way) -> Self {
        MapEntity::Way(way)
    }
}

impl From<Relation> for MapEntity {
    fn from(relation: Relation) -> Self {
        MapEntity::Relation(relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_coordinates_round_to_fixed_point() {
        let node = Node::new(EntityMeta::new(1, 1), 52.5200066, 13.404954);

        assert_eq!(node.latitude, 525_200_066);
        assert_eq!(node.longitude, 134_049_540);
        assert!((node.latitude_degrees() - 52.5200066).abs() < 1e-9);
    }

    #[test]
    fn map_entity_resolves_kind_by_name() {
        let catalog = KindCatalog::osm();
        let way = MapEntity::from(Way {
            meta: EntityMeta::new(7, 2),
            node_refs: vec![1, 2, 3],
            tags: Tags::new(),
        });

        assert_eq!(way.id(), 7);
        assert_eq!(way.kind_in(&catalog), catalog.kind("way"));

        let without_ways = KindCatalog::new(["node", "relation"]).unwrap();
        assert_eq!(way.kind_in(&without_ways), None);
    }

    #[test]
    fn content_equality_includes_tags() {
        let mut a = Node::new(EntityMeta::new(1, 1), 1.0, 2.0);
        let b = a.clone();
        assert_eq!(a, b);

        a.tags.insert("amenity".into(), "cafe".into());
        assert_ne!(a, b);
    }

    #[test]
    fn map_entity_serializes_with_type_tag() {
        let node = MapEntity::from(Node::new(EntityMeta::new(3, 1), 0.5, -0.5));

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "node");

        let decoded: MapEntity = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, node);
    }
}
