//! Data model of merge sessions: kinds and positions, entities and changes.

mod change;
mod entity;
mod position;

pub use change::{Change, ChangeAction};
pub use entity::{
    COORDINATE_SCALE, Entity, EntityMeta, MapEntity, Member, MemberType, Node, Relation, Tags, Way,
};
pub use position::{Kind, KindCatalog, Position, SourceStatus, compare};
