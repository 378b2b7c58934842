//! The ordered collection of systems driven by `World::update`.

use std::any::TypeId;
use std::collections::HashMap;

use ahash::RandomState;

use crate::bag::Bag;
use crate::error::Error;
use crate::system::{AnySystem, IntervalSystem};
use crate::world::World;

/// Holds every registered `IntervalSystem`, in registration order.
///
/// Registration order is the execution order for `update()` and the
/// reverse-order for `dispose()`, matching the ordering guarantee in the
/// crate's concurrency notes: systems never run concurrently with each
/// other, so their relative order is the only scheduling knob a caller has.
#[derive(Default)]
pub struct SystemService {
    systems: Bag<Box<dyn AnySystem>>,
    id_by_type: HashMap<TypeId, usize, RandomState>,
}

impl SystemService {
    /// Creates an empty service.
    pub fn new() -> Self {
        SystemService { systems: Bag::new(), id_by_type: HashMap::default() }
    }

    pub(crate) fn register<T: IntervalSystem + 'static>(&mut self, system: T) -> Result<(), Error> {
        let type_id = TypeId::of::<T>();
        if self.id_by_type.contains_key(&type_id) {
            return Err(Error::SystemAlreadyAdded { type_name: std::any::type_name::<T>() });
        }
        let index = self.systems.add(Box::new(system));
        self.id_by_type.insert(type_id, index);
        log::debug!("registered system `{}`", std::any::type_name::<T>());
        Ok(())
    }

    /// Runs `on_update` on every enabled system, in registration order.
    pub(crate) fn update(&mut self, world: &mut World, delta_time: f32) {
        for index in 0..self.systems.len() {
            let Some(system) = self.systems.get_mut(index) else { continue };
            if system.is_enabled() {
                system.on_update(world, delta_time);
            }
        }
    }

    /// Runs `on_dispose` on every system, in reverse registration order.
    pub(crate) fn dispose(&mut self, world: &mut World) {
        for index in (0..self.systems.len()).rev() {
            if let Some(system) = self.systems.get_mut(index) {
                system.on_dispose(world);
            }
        }
    }

    /// Returns the registered system of type `T`. Fails with
    /// `NoSuchSystem` if none was registered.
    pub fn system<T: IntervalSystem + 'static>(&self) -> Result<&T, Error> {
        let index = *self
            .id_by_type
            .get(&TypeId::of::<T>())
            .ok_or(Error::NoSuchSystem { type_name: std::any::type_name::<T>() })?;
        Ok(self
            .systems
            .get(index)
            .expect("registered system id must have a system")
            .as_any()
            .downcast_ref::<T>()
            .expect("system id maps to the wrong system type"))
    }

    /// Returns the registered system of type `T`, mutably.
    pub fn system_mut<T: IntervalSystem + 'static>(&mut self) -> Result<&mut T, Error> {
        let index = *self
            .id_by_type
            .get(&TypeId::of::<T>())
            .ok_or(Error::NoSuchSystem { type_name: std::any::type_name::<T>() })?;
        Ok(self
            .systems
            .get_mut(index)
            .expect("registered system id must have a system")
            .as_any_mut()
            .downcast_mut::<T>()
            .expect("system id maps to the wrong system type"))
    }

    /// The number of registered systems.
    pub fn len(&self) -> usize {
        self.id_by_type.len()
    }

    /// `true` if no systems are registered.
    pub fn is_empty(&self) -> bool {
        self.id_by_type.is_empty()
    }
}
