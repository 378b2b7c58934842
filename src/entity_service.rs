//! Entity id allocation, recycling, and per-entity component bitset
//! tracking.

use crate::bag::Bag;
use crate::bitset::BitArray;
use crate::component_service::ComponentService;
use crate::entity::Entity;
use crate::error::Error;

/// A scoped handle for configuring an entity's components.
///
/// Passed to the closures given to `EntityService::create` and
/// `EntityService::configure`; not constructed directly.
pub struct EntityCreateCtx<'a> {
    entity: Entity,
    mask: &'a mut BitArray,
    components: &'a mut ComponentService,
}

impl<'a> EntityCreateCtx<'a> {
    /// The entity being configured.
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Installs or reconfigures component `T` on this entity. See
    /// `ComponentMapper::add` for the overwrite-silent contract when the
    /// component is already present.
    pub fn add<T: 'static>(&mut self, configure: impl FnOnce(&mut T)) -> Result<(), Error> {
        let mapper = self.components.mapper_mut::<T>()?;
        mapper.add(self.entity, self.mask, configure);
        Ok(())
    }

    /// Removes component `T` from this entity, returning its value. Fails
    /// with `NoSuchEntityComponent` if the entity doesn't have it.
    pub fn remove<T: 'static>(&mut self) -> Result<T, Error> {
        let mapper = self.components.mapper_mut::<T>()?;
        mapper.remove(self.entity, self.mask)
    }

    /// Returns `true` if this entity currently has component `T`.
    pub fn has<T: 'static>(&self) -> Result<bool, Error> {
        Ok(self.components.mapper::<T>()?.contains(self.entity))
    }
}

/// Allocates, recycles, and tracks the component masks of entities.
///
/// `EntityService` knows nothing about `Family`; `World` is responsible for
/// marking families dirty after any operation here that may have changed an
/// entity's mask (see the crate-level design notes on why that
/// responsibility sits one level up).
#[derive(Debug)]
pub struct EntityService {
    next_id: u32,
    recycled: Vec<u32>,
    comp_masks: Bag<BitArray>,
    active: BitArray,
    delay_removal_depth: u32,
    delayed_removals: Vec<Entity>,
}

impl EntityService {
    /// Creates a service with room for `initial_capacity` entities without
    /// the backing storage needing to grow.
    pub fn new(initial_capacity: u32) -> Self {
        EntityService {
            next_id: 0,
            recycled: Vec::new(),
            comp_masks: Bag::with_capacity(initial_capacity as usize),
            active: BitArray::with_capacity(initial_capacity as usize),
            delay_removal_depth: 0,
            delayed_removals: Vec::new(),
        }
    }

    /// `true` while a `Family` iteration is in progress and `remove` should
    /// queue rather than apply immediately.
    pub(crate) fn is_removal_delayed(&self) -> bool {
        self.delay_removal_depth > 0
    }

    pub(crate) fn enter_delay_removal(&mut self) {
        self.delay_removal_depth += 1;
    }

    /// Decrements the delay-removal reference count and, if it has reached
    /// zero, drains queued removals. Returns `true` if a drain happened (so
    /// the caller knows to mark families dirty again).
    pub(crate) fn exit_delay_removal(&mut self, components: &mut ComponentService) -> bool {
        debug_assert!(self.delay_removal_depth > 0);
        self.delay_removal_depth -= 1;
        if self.delay_removal_depth == 0 && !self.delayed_removals.is_empty() {
            self.drain_delayed(components);
            true
        } else {
            false
        }
    }

    fn drain_delayed(&mut self, components: &mut ComponentService) {
        let pending = std::mem::take(&mut self.delayed_removals);
        for entity in pending {
            self.perform_removal(components, entity)
                .expect("entity queued for delayed removal must still be active");
        }
    }

    fn ensure_mask_slot(&mut self, id: u32) {
        if self.comp_masks.get(id as usize).is_none() {
            self.comp_masks.set(id as usize, BitArray::new());
        }
    }

    /// Allocates a new entity (reusing a recycled id if one is available,
    /// LIFO), runs `configure` against it, and returns it.
    pub fn create(
        &mut self,
        components: &mut ComponentService,
        configure: impl FnOnce(&mut EntityCreateCtx),
    ) -> Entity {
        let id = self.recycled.pop().unwrap_or_else(|| {
            let id = self.next_id;
            self.next_id += 1;
            id
        });

        self.active.set(id);
        self.ensure_mask_slot(id);
        let entity = Entity::new(id);

        let mask = self.comp_masks.get_mut(id as usize).unwrap();
        let mut ctx = EntityCreateCtx { entity, mask, components };
        configure(&mut ctx);

        log::debug!("created entity {id}");
        entity
    }

    /// Runs `configure` against an already-live entity.
    pub fn configure(
        &mut self,
        components: &mut ComponentService,
        entity: Entity,
        configure: impl FnOnce(&mut EntityCreateCtx),
    ) {
        debug_assert!(self.active.get(entity.id()), "configure on a dead entity");
        let mask = self
            .comp_masks
            .get_mut(entity.id() as usize)
            .expect("active entity must have a mask slot");
        let mut ctx = EntityCreateCtx { entity, mask, components };
        configure(&mut ctx);
    }

    /// Removes `entity`. If a `Family` iteration is in progress, the
    /// removal is queued and applied once the outermost iteration exits;
    /// otherwise it happens immediately.
    pub fn remove(&mut self, components: &mut ComponentService, entity: Entity) -> Result<(), Error> {
        if self.is_removal_delayed() {
            log::trace!("queuing removal of entity {} (iteration in progress)", entity.id());
            self.delayed_removals.push(entity);
            return Ok(());
        }
        self.perform_removal(components, entity)
    }

    fn perform_removal(&mut self, components: &mut ComponentService, entity: Entity) -> Result<(), Error> {
        let id = entity.id();
        if !self.active.get(id) {
            // Already gone (e.g. removed twice in the same delayed batch);
            // a no-op rather than an error.
            return Ok(());
        }

        let mut component_ids = Vec::new();
        {
            let mask = self.comp_masks.get(id as usize).expect("active entity must have a mask");
            mask.for_each_set_bit(|c| component_ids.push(c));
        }
        components.remove_all_internal(entity, &component_ids)?;

        self.comp_masks.get_mut(id as usize).unwrap().clear_all();
        self.active.clear(id);
        self.recycled.push(id);

        log::debug!("removed entity {id}");
        Ok(())
    }

    /// Removes every currently active entity.
    pub fn remove_all(&mut self, components: &mut ComponentService) -> Result<(), Error> {
        let mut ids = Vec::new();
        self.active.for_each_set_bit(|id| ids.push(id));
        for id in ids {
            self.remove(components, Entity::new(id))?;
        }
        Ok(())
    }

    /// Iterates every active entity in ascending id order.
    pub fn for_each(&self, mut f: impl FnMut(Entity)) {
        self.active.for_each_set_bit(|id| f(Entity::new(id)));
    }

    /// Returns `true` if `entity` is currently active.
    pub fn is_active(&self, entity: Entity) -> bool {
        self.active.get(entity.id())
    }

    /// The number of currently active entities.
    pub fn num_entities(&self) -> usize {
        self.active.count_ones()
    }

    /// The size of the backing storage (number of mask slots allocated).
    pub fn capacity(&self) -> usize {
        self.comp_masks.len()
    }

    /// The number of ids waiting in the recycle stack.
    pub fn num_recycled(&self) -> usize {
        self.recycled.len()
    }

    pub(crate) fn active_bits(&self) -> &BitArray {
        &self.active
    }

    pub(crate) fn mask_of(&self, entity: Entity) -> Option<&BitArray> {
        self.comp_masks.get(entity.id() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    fn service_with_marker() -> (EntityService, ComponentService) {
        let mut components = ComponentService::new();
        components.register(|| Marker).unwrap();
        (EntityService::new(4), components)
    }

    #[test]
    fn create_allocates_ascending_ids() {
        let (mut entities, mut components) = service_with_marker();
        let e0 = entities.create(&mut components, |_| {});
        let e1 = entities.create(&mut components, |_| {});
        assert_eq!(e0.id(), 0);
        assert_eq!(e1.id(), 1);
        assert_eq!(entities.num_entities(), 2);
    }

    #[test]
    fn remove_recycles_lifo() {
        let (mut entities, mut components) = service_with_marker();
        let e0 = entities.create(&mut components, |_| {});
        let e1 = entities.create(&mut components, |_| {});
        let e2 = entities.create(&mut components, |_| {});

        entities.remove(&mut components, e1).unwrap();
        entities.remove(&mut components, e0).unwrap();

        assert_eq!(entities.num_entities(), 1);
        assert!(entities.is_active(e2));

        let reused_first = entities.create(&mut components, |_| {});
        let reused_second = entities.create(&mut components, |_| {});
        assert_eq!(reused_first.id(), 0);
        assert_eq!(reused_second.id(), 1);
    }

    #[test]
    fn re_allocated_id_has_empty_mask() {
        let (mut entities, mut components) = service_with_marker();
        let e0 = entities.create(&mut components, |ctx| {
            ctx.add::<Marker>(|_| {}).unwrap();
        });
        entities.remove(&mut components, e0).unwrap();

        let reused = entities.create(&mut components, |_| {});
        assert_eq!(reused.id(), e0.id());
        assert!(entities.mask_of(reused).unwrap().is_empty());
    }

    #[test]
    fn remove_delayed_while_iterating() {
        let (mut entities, mut components) = service_with_marker();
        let e0 = entities.create(&mut components, |_| {});

        entities.enter_delay_removal();
        entities.remove(&mut components, e0).unwrap();
        assert!(entities.is_active(e0), "removal must not apply immediately");

        let drained = entities.exit_delay_removal(&mut components);
        assert!(drained);
        assert!(!entities.is_active(e0));
    }

    #[test]
    fn remove_all_clears_every_entity() {
        let (mut entities, mut components) = service_with_marker();
        for _ in 0..5 {
            entities.create(&mut components, |_| {});
        }
        entities.remove_all(&mut components).unwrap();
        assert_eq!(entities.num_entities(), 0);
        assert_eq!(entities.num_recycled(), 5);
    }
}
