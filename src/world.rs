//! The top-level façade composing entities, components, families, and
//! systems into a single runtime.

use std::any::Any;
use std::collections::HashMap;

use ahash::RandomState;

use crate::component::ComponentMapper;
use crate::component_service::ComponentService;
use crate::entity::Entity;
use crate::entity_service::{EntityCreateCtx, EntityService};
use crate::error::Error;
use crate::family::{Family, FamilyId, FamilySpec, ResolvedFamilySpec};
use crate::injector::Injector;
use crate::system::IntervalSystem;
use crate::system_service::SystemService;

const DEFAULT_ENTITY_CAPACITY: u32 = 64;

/// Builds a `World` from a declarative set of components, systems, and
/// injected values.
///
/// Registration order is significant: component ids and system execution
/// order are both assigned in the order `component`/`system` are called.
pub struct WorldBuilder {
    entity_capacity: u32,
    component_registrars: Vec<Box<dyn FnOnce(&mut ComponentService) -> Result<(), Error>>>,
    system_factories: Vec<Box<dyn FnOnce(&Injector, &mut World) -> Result<(), Error>>>,
    injector: Injector,
}

impl WorldBuilder {
    /// Starts a builder with the default entity capacity.
    pub fn new() -> Self {
        WorldBuilder {
            entity_capacity: DEFAULT_ENTITY_CAPACITY,
            component_registrars: Vec::new(),
            system_factories: Vec::new(),
            injector: Injector::new(),
        }
    }

    /// Sets the initial backing-array capacity for entities.
    pub fn entity_capacity(mut self, capacity: u32) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Registers component type `T`, using `factory` to produce fresh
    /// values. Registration order assigns the component id.
    pub fn component<T: 'static>(mut self, factory: impl Fn() -> T + 'static) -> Self {
        self.component_registrars.push(Box::new(move |components| {
            components.register(factory).map(|_| ())
        }));
        self
    }

    /// Registers component type `T` along with an `on_add` listener that
    /// fires every time an entity first gains this component.
    pub fn component_with_listener<T: 'static>(
        mut self,
        factory: impl Fn() -> T + 'static,
        on_add: impl FnMut(Entity, &T) + 'static,
    ) -> Self {
        self.component_registrars.push(Box::new(move |components| {
            components.register(factory)?;
            components.mapper_mut::<T>()?.add_listener(on_add);
            Ok(())
        }));
        self
    }

    /// Stores `value` under `name`, available to system factories via
    /// `Injector::get`.
    pub fn inject(mut self, name: impl Into<String>, value: impl Any) -> Self {
        self.injector.insert(name.into(), Box::new(value));
        self
    }

    /// Registers a system, constructed by `factory` from the builder's
    /// `Injector`. Registration order assigns execution order.
    pub fn system<T: IntervalSystem + 'static>(
        mut self,
        factory: impl FnOnce(&Injector) -> T + 'static,
    ) -> Self {
        self.system_factories.push(Box::new(move |injector, world| {
            let system = factory(injector);
            world.systems.register(system)
        }));
        self
    }

    /// Consumes the builder, producing a ready-to-use `World`.
    pub fn build(self) -> Result<World, Error> {
        let mut components = ComponentService::new();
        for register in self.component_registrars {
            register(&mut components)?;
        }

        let mut world = World {
            entities: EntityService::new(self.entity_capacity),
            components,
            families: Vec::new(),
            family_index: HashMap::default(),
            systems: SystemService::new(),
            delta_time: 0.0,
            injector: Injector::new(),
        };

        for factory in self.system_factories {
            factory(&self.injector, &mut world)?;
        }
        world.injector = self.injector;

        log::debug!(
            "world built: {} component type(s), {} system(s)",
            world.components.len(),
            world.systems.len()
        );
        Ok(world)
    }
}

impl Default for WorldBuilder {
    fn default() -> Self {
        WorldBuilder::new()
    }
}

/// The runtime container owning entities, components, families, and
/// systems.
pub struct World {
    entities: EntityService,
    components: ComponentService,
    families: Vec<Family>,
    family_index: HashMap<ResolvedFamilySpec, FamilyId, RandomState>,
    systems: SystemService,
    delta_time: f32,
    injector: Injector,
}

impl World {
    /// Creates a new entity, running `configure` against it before
    /// returning. Marks every registered family dirty.
    pub fn create_entity(&mut self, configure: impl FnOnce(&mut EntityCreateCtx)) -> Entity {
        let entity = self.entities.create(&mut self.components, configure);
        self.mark_all_families_dirty();
        entity
    }

    /// Runs `configure` against an already-live entity. Marks every
    /// registered family dirty.
    pub fn configure_entity(&mut self, entity: Entity, configure: impl FnOnce(&mut EntityCreateCtx)) {
        self.entities.configure(&mut self.components, entity, configure);
        self.mark_all_families_dirty();
    }

    /// Removes `entity`, or queues the removal if a family iteration is in
    /// progress.
    pub fn remove(&mut self, entity: Entity) -> Result<(), Error> {
        self.entities.remove(&mut self.components, entity)?;
        if !self.entities.is_removal_delayed() {
            self.mark_all_families_dirty();
        }
        Ok(())
    }

    /// Removes every currently active entity.
    pub fn remove_all(&mut self) -> Result<(), Error> {
        self.entities.remove_all(&mut self.components)?;
        self.mark_all_families_dirty();
        Ok(())
    }

    /// Iterates every active entity in ascending id order.
    pub fn for_each(&self, f: impl FnMut(Entity)) {
        self.entities.for_each(f);
    }

    /// Returns `true` if `entity` is currently active.
    pub fn is_active(&self, entity: Entity) -> bool {
        self.entities.is_active(entity)
    }

    /// The number of currently active entities.
    pub fn num_entities(&self) -> usize {
        self.entities.num_entities()
    }

    fn mark_all_families_dirty(&mut self) {
        for family in &mut self.families {
            family.mark_dirty();
        }
    }

    /// Returns the mapper for component type `T`.
    pub fn mapper<T: 'static>(&self) -> Result<&ComponentMapper<T>, Error> {
        self.components.mapper::<T>()
    }

    /// Returns the mapper for component type `T`, mutably.
    pub fn mapper_mut<T: 'static>(&mut self) -> Result<&mut ComponentMapper<T>, Error> {
        self.components.mapper_mut::<T>()
    }

    /// Returns the registered system of type `T`.
    pub fn system<T: IntervalSystem + 'static>(&self) -> Result<&T, Error> {
        self.systems.system::<T>()
    }

    /// Returns the registered system of type `T`, mutably.
    pub fn system_mut<T: IntervalSystem + 'static>(&mut self) -> Result<&mut T, Error> {
        self.systems.system_mut::<T>()
    }

    /// The injector this world was built with.
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Resolves `spec` to a `FamilyId`, creating a new `Family` the first
    /// time a given predicate is requested and returning the existing one
    /// on every subsequent call with an equal predicate. Fails with
    /// `FamilyEmpty` if `spec` has no `all_of`/`none_of`/`any_of` terms.
    pub fn family(&mut self, spec: FamilySpec) -> Result<FamilyId, Error> {
        let resolved = spec.resolve(&self.components)?;
        if let Some(&id) = self.family_index.get(&resolved) {
            return Ok(id);
        }

        let id = FamilyId(self.families.len());
        self.families.push(Family::new(resolved.clone()));
        self.family_index.insert(resolved, id);
        Ok(id)
    }

    /// Iterates the members of the family identified by `family_id`,
    /// calling `f(self, entity)` once per member in ascending id order, at a
    /// snapshot taken before iteration starts.
    ///
    /// Structural mutation performed by `f` (via the `World` it receives) is
    /// deferred until the outermost `family_for_each` call on this world
    /// returns, even across nested or nested-in-different-family calls; see
    /// `EntityService`'s delay-removal reference count.
    ///
    /// `family_id` must have come from `World::family` on this same world —
    /// it is a `pub(crate)`-constructed index, not something a caller can
    /// fabricate, so a mismatch here would signal a bug in this crate rather
    /// than caller error.
    pub fn family_for_each(&mut self, family_id: FamilyId, mut f: impl FnMut(&mut World, Entity)) {
        let family = self
            .families
            .get_mut(family_id.0)
            .expect("FamilyId must have been produced by World::family on this world");
        family.update_if_dirty(&self.entities);
        let snapshot = family.member_snapshot();

        self.entities.enter_delay_removal();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            for entity in snapshot {
                f(self, entity);
            }
        }));

        let drained = self.entities.exit_delay_removal(&mut self.components);
        if drained {
            self.mark_all_families_dirty();
        }

        if let Err(payload) = result {
            std::panic::resume_unwind(payload);
        }
    }

    /// The number of entities currently in the family identified by
    /// `family_id`, recomputing membership first if stale.
    pub fn family_len(&mut self, family_id: FamilyId) -> usize {
        let family = self
            .families
            .get_mut(family_id.0)
            .expect("FamilyId must have been produced by World::family on this world");
        family.update_if_dirty(&self.entities);
        family.num_entities()
    }

    /// `true` if the family identified by `family_id` currently has no
    /// members, recomputing membership first if stale.
    pub fn family_is_empty(&mut self, family_id: FamilyId) -> bool {
        let family = self
            .families
            .get_mut(family_id.0)
            .expect("FamilyId must have been produced by World::family on this world");
        family.update_if_dirty(&self.entities);
        family.is_empty()
    }

    /// `true` if `entity` is currently a member of the family identified by
    /// `family_id`, recomputing membership first if stale.
    pub fn family_contains(&mut self, family_id: FamilyId, entity: Entity) -> bool {
        let family = self
            .families
            .get_mut(family_id.0)
            .expect("FamilyId must have been produced by World::family on this world");
        family.update_if_dirty(&self.entities);
        family.contains(entity)
    }

    /// Advances every enabled system by `delta_time` seconds.
    pub fn update(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        let mut systems = std::mem::take(&mut self.systems);
        systems.update(self, delta_time);
        self.systems = systems;
    }

    /// Calls `on_dispose` on every system in reverse registration order,
    /// then removes every entity.
    pub fn dispose(&mut self) {
        let mut systems = std::mem::take(&mut self.systems);
        systems.dispose(self);
        self.systems = systems;
        if let Err(err) = self.remove_all() {
            log::warn!("error removing entities during world disposal: {err}");
        }
    }

    /// The `delta_time` passed to the most recent `update` call (`0.0`
    /// before the first call).
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{EntityTickHandler, Interval, IteratingSystem};

    struct Position {
        x: i32,
    }
    struct Velocity {
        dx: i32,
    }

    #[test]
    fn create_entity_and_mapper_roundtrip() {
        let mut world = WorldBuilder::new()
            .component(|| Position { x: 0 })
            .build()
            .unwrap();

        let e0 = world.create_entity(|ctx| {
            ctx.add::<Position>(|p| p.x = 5).unwrap();
        });

        assert_eq!(world.mapper::<Position>().unwrap().get(e0).unwrap().x, 5);
    }

    #[test]
    fn family_tracks_membership_across_mutation() {
        let mut world = WorldBuilder::new()
            .component(|| Position { x: 0 })
            .component(|| Velocity { dx: 0 })
            .build()
            .unwrap();

        let family = world
            .family(FamilySpec::builder().all_of::<Position>().none_of::<Velocity>().build())
            .unwrap();

        let e0 = world.create_entity(|ctx| {
            ctx.add::<Position>(|_| {}).unwrap();
        });
        let e1 = world.create_entity(|ctx| {
            ctx.add::<Position>(|_| {}).unwrap();
            ctx.add::<Velocity>(|_| {}).unwrap();
        });

        assert_eq!(world.family_len(family), 1);
        assert!(world.family_contains(family, e0));
        assert!(!world.family_contains(family, e1));
        assert!(!world.family_is_empty(family));

        world.configure_entity(e1, |ctx| {
            ctx.remove::<Velocity>().unwrap();
        });
        assert_eq!(world.family_len(family), 2);
        assert!(world.family_contains(family, e1));

        world.remove(e0).unwrap();
        assert_eq!(world.family_len(family), 1);
        assert!(!world.family_contains(family, e0));
        assert!(world.family_contains(family, e1));
    }

    #[test]
    fn removal_during_family_iteration_is_deferred() {
        let mut world = WorldBuilder::new().component(|| Position { x: 0 }).build().unwrap();
        let family = world.family(FamilySpec::builder().all_of::<Position>().build()).unwrap();

        for _ in 0..3 {
            world.create_entity(|ctx| {
                ctx.add::<Position>(|_| {}).unwrap();
            });
        }

        let mut visited = 0;
        world.family_for_each(family, |w, e| {
            visited += 1;
            w.remove(e).unwrap();
        });

        assert_eq!(visited, 3);
        assert_eq!(world.num_entities(), 0);
    }

    struct Mover;
    impl EntityTickHandler for Mover {
        fn on_tick_entity(&mut self, world: &mut World, entity: Entity) {
            let dx = world.mapper::<Velocity>().unwrap().get(entity).unwrap().dx;
            world
                .mapper_mut::<Position>()
                .unwrap()
                .get_mut(entity)
                .unwrap()
                .x += dx;
        }
    }

    #[test]
    fn iterating_system_moves_matching_entities() {
        let mut world = WorldBuilder::new()
            .component(|| Position { x: 0 })
            .component(|| Velocity { dx: 0 })
            .system(|_injector| {
                IteratingSystem::new(
                    Mover,
                    FamilySpec::builder().all_of::<Position>().all_of::<Velocity>().build(),
                    Interval::EachFrame,
                )
            })
            .build()
            .unwrap();

        let e0 = world.create_entity(|ctx| {
            ctx.add::<Position>(|p| p.x = 0).unwrap();
            ctx.add::<Velocity>(|v| v.dx = 3).unwrap();
        });

        world.update(1.0 / 60.0);

        assert_eq!(world.mapper::<Position>().unwrap().get(e0).unwrap().x, 3);
    }

    #[test]
    fn duplicate_system_registration_fails() {
        let err = WorldBuilder::new()
            .system(|_| IteratingSystem::new(Mover, FamilySpec::builder().all_of::<Position>().build(), Interval::EachFrame))
            .system(|_| IteratingSystem::new(Mover, FamilySpec::builder().all_of::<Velocity>().build(), Interval::EachFrame))
            .component(|| Position { x: 0 })
            .component(|| Velocity { dx: 0 })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::SystemAlreadyAdded { .. }));
    }
}
