//! Per-tick system execution: fixed-timestep scheduling and family-bound
//! iteration.

use std::any::Any;

use crate::entity::Entity;
use crate::family::{FamilyId, FamilySpec};
use crate::world::World;

/// How often an `IntervalSystem`'s `on_tick` runs relative to
/// `World::update`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interval {
    /// `on_tick` runs exactly once per `World::update` call.
    EachFrame,
    /// `on_tick` runs zero or more times per `World::update` call, at a
    /// fixed `step` (in seconds), via an accumulator.
    Fixed(f32),
}

/// The scheduling state every `IntervalSystem` implementor owns.
#[derive(Clone, Copy, Debug)]
pub struct IntervalState {
    enabled: bool,
    interval: Interval,
    accumulator: f32,
    alpha: f32,
}

impl IntervalState {
    /// Creates scheduling state for the given interval, enabled by default.
    pub fn new(interval: Interval) -> Self {
        IntervalState { enabled: true, interval, accumulator: 0.0, alpha: 0.0 }
    }

    /// The fraction of a fixed step elapsed since the last `on_tick`, in
    /// `[0, 1)`. Always `0.0` for `Interval::EachFrame`.
    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

/// A unit of per-tick behavior, driven by `SystemService::update` in
/// registration order.
///
/// Implementors own their `IntervalState` and expose it via
/// `interval_state`/`interval_state_mut` so the default `on_update` can
/// drive the accumulator without the trait needing a field of its own.
pub trait IntervalSystem: Any {
    /// Accessor for this system's scheduling state.
    fn interval_state(&self) -> &IntervalState;
    /// Mutable accessor for this system's scheduling state.
    fn interval_state_mut(&mut self) -> &mut IntervalState;

    /// Runs one accumulated step of this system's behavior.
    fn on_tick(&mut self, world: &mut World);

    /// Runs once per `World::update` call after ticking, with the leftover
    /// fraction of a fixed step (`0.0` for `Interval::EachFrame`). Default:
    /// no-op.
    fn on_alpha(&mut self, _world: &mut World, _alpha: f32) {}

    /// Runs once when the owning `World` is disposed. Default: no-op.
    fn on_dispose(&mut self, _world: &mut World) {}

    /// Drives `on_tick`/`on_alpha` according to this system's `Interval`.
    /// `delta_time` is the wall-clock seconds elapsed since the previous
    /// `World::update` call.
    fn on_update(&mut self, world: &mut World, delta_time: f32) {
        match self.interval_state().interval {
            Interval::EachFrame => self.on_tick(world),
            Interval::Fixed(step) => {
                self.interval_state_mut().accumulator += delta_time;
                while self.interval_state().accumulator >= step {
                    self.on_tick(world);
                    self.interval_state_mut().accumulator -= step;
                }
                let alpha = self.interval_state().accumulator / step;
                self.interval_state_mut().alpha = alpha;
                self.on_alpha(world, alpha);
            }
        }
    }

    /// `true` if `SystemService::update` should drive this system at all.
    fn is_enabled(&self) -> bool {
        self.interval_state().enabled
    }

    /// Enables or disables this system. A disabled system is skipped
    /// entirely by `SystemService::update`, including its accumulator.
    fn set_enabled(&mut self, enabled: bool) {
        self.interval_state_mut().enabled = enabled;
    }
}

/// Per-entity behavior for an `IteratingSystem`.
pub trait EntityTickHandler: 'static {
    /// Runs once per matching entity, per accumulated tick.
    fn on_tick_entity(&mut self, world: &mut World, entity: Entity);
}

/// An `IntervalSystem` specialized to iterate one `Family` each tick.
///
/// `IteratingSystem` resolves its `FamilySpec` against the `World` lazily,
/// on the first tick, and caches the resulting `FamilyId` — the predicate
/// can be built before the `World` exists (e.g. inside a
/// `WorldBuilder::system` factory), but resolving it requires the
/// component registry to already be populated.
pub struct IteratingSystem<S: EntityTickHandler> {
    handler: S,
    family_spec: Option<FamilySpec>,
    family_id: Option<FamilyId>,
    state: IntervalState,
}

impl<S: EntityTickHandler> IteratingSystem<S> {
    /// Wraps `handler`, iterating entities matching `family_spec` on the
    /// given `interval`.
    pub fn new(handler: S, family_spec: FamilySpec, interval: Interval) -> Self {
        IteratingSystem {
            handler,
            family_spec: Some(family_spec),
            family_id: None,
            state: IntervalState::new(interval),
        }
    }

    /// The wrapped per-entity handler.
    pub fn handler(&self) -> &S {
        &self.handler
    }

    /// The wrapped per-entity handler, mutably.
    pub fn handler_mut(&mut self) -> &mut S {
        &mut self.handler
    }

    fn resolve_family(&mut self, world: &mut World) -> FamilyId {
        if let Some(id) = self.family_id {
            return id;
        }
        let spec = self.family_spec.take().expect("family spec resolved more than once");
        let id = world
            .family(spec)
            .expect("IteratingSystem's family predicate must resolve against the world's registered components");
        self.family_id = Some(id);
        id
    }
}

impl<S: EntityTickHandler> IntervalSystem for IteratingSystem<S> {
    fn interval_state(&self) -> &IntervalState {
        &self.state
    }

    fn interval_state_mut(&mut self) -> &mut IntervalState {
        &mut self.state
    }

    fn on_tick(&mut self, world: &mut World) {
        let family_id = self.resolve_family(world);
        let handler = &mut self.handler;
        world.family_for_each(family_id, |w, e| handler.on_tick_entity(w, e));
    }
}

/// Type-erased access to an `IntervalSystem`, used by `SystemService` to
/// hold systems of differing concrete type in a single dense registry, and
/// to support `World::system::<T>()` downcasting.
pub(crate) trait AnySystem: IntervalSystem {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: IntervalSystem + 'static> AnySystem for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingSystem {
        state: IntervalState,
        ticks: Rc<RefCell<u32>>,
    }

    impl IntervalSystem for CountingSystem {
        fn interval_state(&self) -> &IntervalState {
            &self.state
        }
        fn interval_state_mut(&mut self) -> &mut IntervalState {
            &mut self.state
        }
        fn on_tick(&mut self, _world: &mut World) {
            *self.ticks.borrow_mut() += 1;
        }
    }

    #[test]
    fn each_frame_ticks_once_per_update() {
        let ticks = Rc::new(RefCell::new(0));
        let mut system = CountingSystem { state: IntervalState::new(Interval::EachFrame), ticks: ticks.clone() };
        let mut world = crate::world::WorldBuilder::new().build().unwrap();

        system.on_update(&mut world, 0.5);
        system.on_update(&mut world, 100.0);

        assert_eq!(*ticks.borrow(), 2);
    }

    #[test]
    fn fixed_interval_accumulates_and_drains() {
        let ticks = Rc::new(RefCell::new(0));
        let mut system = CountingSystem { state: IntervalState::new(Interval::Fixed(0.1)), ticks: ticks.clone() };
        let mut world = crate::world::WorldBuilder::new().build().unwrap();

        system.on_update(&mut world, 0.25);
        assert_eq!(*ticks.borrow(), 2);
        assert!((system.interval_state().alpha() - 0.05).abs() < 1e-6);

        system.on_update(&mut world, 0.05);
        assert_eq!(*ticks.borrow(), 3);
    }

    #[test]
    fn disabled_system_is_not_driven_by_service() {
        let ticks = Rc::new(RefCell::new(0));
        let mut system = CountingSystem { state: IntervalState::new(Interval::EachFrame), ticks: ticks.clone() };
        system.set_enabled(false);
        assert!(!system.is_enabled());
    }
}
