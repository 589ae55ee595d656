//! Builders for entities, snapshots and changesets.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    Change, ChangeAction, Entity, EntityMeta, Kind, KindCatalog, MapEntity, Member, MemberType, Node,
    Position, Relation, Tags, Way,
};

/// Minimal entity for engine tests: an identifier and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestEntity {
    pub id: i64,
    pub payload: u64,
}

impl TestEntity {
    pub fn new(id: i64, payload: u64) -> Self {
        Self { id, payload }
    }
}

impl Entity for TestEntity {
    fn id(&self) -> i64 {
        self.id
    }
}

pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

pub fn node(id: i64, version: u32, latitude: f64, longitude: f64) -> MapEntity {
    Node::new(EntityMeta::new(id, version), latitude, longitude).into()
}

pub fn tagged_node(id: i64, version: u32, tags: Tags) -> MapEntity {
    let mut node = Node::new(EntityMeta::new(id, version), 0.0, 0.0);
    node.tags = tags;
    node.into()
}

pub fn way(id: i64, version: u32, node_refs: &[i64]) -> MapEntity {
    Way {
        meta: EntityMeta::new(id, version),
        node_refs: node_refs.to_vec(),
        tags: Tags::new(),
    }
    .into()
}

pub fn relation(id: i64, version: u32, members: &[(MemberType, i64, &str)]) -> MapEntity {
    Relation {
        meta: EntityMeta::new(id, version),
        members: members
            .iter()
            .map(|(member_type, ref_id, role)| Member {
                member_type: *member_type,
                ref_id: *ref_id,
                role: role.to_string(),
            })
            .collect(),
        tags: Tags::new(),
    }
    .into()
}

/// Pairs each map entity with its kind in `catalog` and sorts the result by position.
///
/// # Panics
///
/// Panics if an entity's kind is not part of `catalog`.
pub fn snapshot(
    catalog: &KindCatalog,
    entities: impl IntoIterator<Item = MapEntity>,
) -> Vec<(Kind, MapEntity)> {
    let mut snapshot: Vec<_> = entities
        .into_iter()
        .map(|entity| {
            let kind = entity
                .kind_in(catalog)
                .unwrap_or_else(|| panic!("kind {} is not in the catalog", entity.kind_name()));
            (kind, entity)
        })
        .collect();
    snapshot.sort_by_key(|(kind, entity)| (*kind, entity.id()));

    snapshot
}

/// Like [`snapshot`], for changesets.
pub fn changeset(
    catalog: &KindCatalog,
    changes: impl IntoIterator<Item = Change<MapEntity>>,
) -> Vec<(Kind, Change<MapEntity>)> {
    let mut changeset: Vec<_> = changes
        .into_iter()
        .map(|change| {
            let kind = change
                .entity
                .kind_in(catalog)
                .unwrap_or_else(|| panic!("kind {} is not in the catalog", change.entity.kind_name()));
            (kind, change)
        })
        .collect();
    changeset.sort_by_key(|(kind, change)| (*kind, change.entity.id()));

    changeset
}

/// Pairs every entry of a map keyed by position with its kind, in position order.
pub fn positioned(entries: &BTreeMap<Position, u64>) -> Vec<(Kind, TestEntity)> {
    entries
        .iter()
        .map(|(position, payload)| (position.kind, TestEntity::new(position.id, *payload)))
        .collect()
}

/// Reference derivation over maps keyed by position.
pub fn expected_changes(
    from: &BTreeMap<Position, u64>,
    to: &BTreeMap<Position, u64>,
) -> Vec<(Kind, Change<TestEntity>)> {
    let positions: BTreeSet<Position> = from.keys().chain(to.keys()).copied().collect();

    positions
        .into_iter()
        .filter_map(|position| {
            let entity = |payload: &u64| TestEntity::new(position.id, *payload);
            let change = match (from.get(&position), to.get(&position)) {
                (Some(old), None) => Change::delete(entity(old)),
                (None, Some(new)) => Change::create(entity(new)),
                (Some(old), Some(new)) if old != new => Change::modify(entity(new)),
                _ => return None,
            };

            Some((position.kind, change))
        })
        .collect()
}

/// Reference application over a map keyed by position.
pub fn expected_snapshot(
    base: &BTreeMap<Position, u64>,
    changes: &[(Kind, Change<TestEntity>)],
) -> Vec<TestEntity> {
    let mut result = base.clone();

    for (kind, change) in changes {
        let position = Position::new(*kind, change.entity.id);
        match change.action {
            ChangeAction::Create | ChangeAction::Modify => {
                result.insert(position, change.entity.payload);
            }
            ChangeAction::Delete => {
                result.remove(&position);
            }
        }
    }

    result
        .into_iter()
        .map(|(position, payload)| TestEntity::new(position.id, payload))
        .collect()
}
