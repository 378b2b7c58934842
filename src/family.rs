//! Reactive entity sets matching an `(all_of, none_of, any_of)` component
//! predicate.

use std::any::TypeId;

use crate::bag::Bag;
use crate::bitset::BitArray;
use crate::component_service::ComponentService;
use crate::entity::Entity;
use crate::entity_service::EntityService;
use crate::error::Error;

/// A stable handle to a `Family` owned by a `World`. Obtained from
/// `World::family`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FamilyId(pub(crate) usize);

/// The unresolved predicate for a `Family`, built from component types
/// rather than raw component ids so it can be constructed before (or
/// without ever) touching a `ComponentService`.
#[derive(Clone, Debug, Default)]
pub struct FamilySpec {
    all_of: Vec<(TypeId, &'static str)>,
    none_of: Vec<(TypeId, &'static str)>,
    any_of: Vec<(TypeId, &'static str)>,
}

impl FamilySpec {
    /// Starts building a new predicate.
    pub fn builder() -> FamilySpecBuilder {
        FamilySpecBuilder::default()
    }

    pub(crate) fn resolve(&self, components: &ComponentService) -> Result<ResolvedFamilySpec, Error> {
        if self.all_of.is_empty() && self.none_of.is_empty() && self.any_of.is_empty() {
            return Err(Error::FamilyEmpty);
        }

        let mut all_of = BitArray::new();
        for &(type_id, _) in &self.all_of {
            all_of.set(components.component_id_by_type(type_id)?.into());
        }
        let mut none_of = BitArray::new();
        for &(type_id, _) in &self.none_of {
            none_of.set(components.component_id_by_type(type_id)?.into());
        }
        let mut any_of = BitArray::new();
        for &(type_id, _) in &self.any_of {
            any_of.set(components.component_id_by_type(type_id)?.into());
        }

        Ok(ResolvedFamilySpec { all_of, none_of, any_of })
    }
}

/// Builder for `FamilySpec`. An empty builder (no `all_of`/`none_of`/`any_of`
/// calls at all) is rejected with `FamilyEmpty` once resolved against a
/// `World`.
#[derive(Default)]
pub struct FamilySpecBuilder {
    spec: FamilySpec,
}

impl FamilySpecBuilder {
    /// Require component `T` to be present.
    pub fn all_of<T: 'static>(mut self) -> Self {
        self.spec.all_of.push((TypeId::of::<T>(), std::any::type_name::<T>()));
        self
    }

    /// Require component `T` to be absent.
    pub fn none_of<T: 'static>(mut self) -> Self {
        self.spec.none_of.push((TypeId::of::<T>(), std::any::type_name::<T>()));
        self
    }

    /// Require at least one of the types passed to `any_of` (across all
    /// `any_of` calls on this builder) to be present.
    pub fn any_of<T: 'static>(mut self) -> Self {
        self.spec.any_of.push((TypeId::of::<T>(), std::any::type_name::<T>()));
        self
    }

    /// Finishes building the predicate.
    pub fn build(self) -> FamilySpec {
        self.spec
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ResolvedFamilySpec {
    pub(crate) all_of: BitArray,
    pub(crate) none_of: BitArray,
    pub(crate) any_of: BitArray,
}

/// A cached, incrementally-maintained set of entities matching a
/// predicate.
///
/// `Family` is created once per distinct resolved predicate (see
/// `World::family`'s deduplication) and lives for the lifetime of the
/// `World`. It does not eagerly recompute membership on every entity
/// mutation; instead it is marked `dirty` and lazily rebuilt the next time
/// `update_if_dirty` runs, which `World::family_for_each` always calls
/// before handing out a snapshot.
#[derive(Debug)]
pub struct Family {
    predicate: ResolvedFamilySpec,
    members: BitArray,
    member_list: Bag<Entity>,
    dirty: bool,
}

impl Family {
    pub(crate) fn new(predicate: ResolvedFamilySpec) -> Self {
        Family {
            predicate,
            members: BitArray::new(),
            member_list: Bag::new(),
            dirty: true,
        }
    }

    fn predicate_matches(predicate: &ResolvedFamilySpec, mask: &BitArray) -> bool {
        (predicate.all_of.is_empty() || mask.contains(&predicate.all_of))
            && (predicate.none_of.is_empty() || !mask.intersects(&predicate.none_of))
            && (predicate.any_of.is_empty() || mask.intersects(&predicate.any_of))
    }

    /// Marks this family as possibly out of date. The next
    /// `update_if_dirty` call will rebuild membership from scratch.
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Rebuilds `members`/`member_list` from `entities` if `dirty` is set.
    /// A no-op otherwise.
    pub(crate) fn update_if_dirty(&mut self, entities: &EntityService) {
        if !self.dirty {
            return;
        }

        self.members.clear_all();
        self.member_list.clear();

        // Cloned out so the closure below doesn't need to hold a borrow of
        // `self` while `self.members`/`self.member_list` are mutated.
        let predicate = self.predicate.clone();
        let members = &mut self.members;
        let member_list = &mut self.member_list;
        entities.active_bits().for_each_set_bit(|id| {
            let entity = Entity::new(id);
            let mask = entities.mask_of(entity).expect("active entity must have a mask");
            let matches = Family::predicate_matches(&predicate, mask);
            log::trace!("family recompute: entity {id} matches={matches}");
            if matches {
                members.set(id);
                member_list.add(entity);
            }
        });

        self.dirty = false;
        log::debug!("family rebuilt: {} member(s)", self.member_list.len());
    }

    /// Returns a snapshot of the current member list, in ascending id
    /// order. Call `update_if_dirty` first if membership may be stale.
    pub(crate) fn member_snapshot(&self) -> Vec<Entity> {
        self.member_list.iter().copied().collect()
    }

    /// The number of entities currently in this family.
    pub fn num_entities(&self) -> usize {
        self.member_list.len()
    }

    /// `true` if this family currently has no members.
    pub fn is_empty(&self) -> bool {
        self.member_list.is_empty()
    }

    /// `true` if `entity` is currently a member. Only meaningful once
    /// `update_if_dirty` has run since the entity's last mutation.
    pub fn contains(&self, entity: Entity) -> bool {
        self.members.get(entity.id())
    }
}
