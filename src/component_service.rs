//! The registry of component mappers, indexed both by type and by stable
//! small-integer id.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use ahash::RandomState;

use crate::bag::Bag;
use crate::component::{AnyMapper, ComponentMapper};
use crate::entity::Entity;
use crate::error::Error;

/// Holds one `ComponentMapper<T>` per registered component type.
///
/// Component ids are assigned at registration time, in registration order,
/// and never change afterward — this crate does not support registering
/// components after a `World` has been built (see the crate-level
/// non-goals).
#[derive(Default)]
pub struct ComponentService {
    mappers_by_id: Bag<Box<dyn AnyMapper>>,
    id_by_type: HashMap<TypeId, u16, RandomState>,
}

impl ComponentService {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ComponentService {
            mappers_by_id: Bag::new(),
            id_by_type: HashMap::default(),
        }
    }

    /// Registers a mapper for `T`, assigning it the next component id.
    /// Fails with `ComponentAlreadyAdded` if `T` was already registered.
    pub(crate) fn register<T: 'static>(
        &mut self,
        factory: impl Fn() -> T + 'static,
    ) -> Result<u16, Error> {
        let type_id = TypeId::of::<T>();
        if self.id_by_type.contains_key(&type_id) {
            return Err(Error::ComponentAlreadyAdded {
                type_name: std::any::type_name::<T>(),
            });
        }

        let id = self.mappers_by_id.len() as u16;
        let mapper = ComponentMapper::new(id, factory);
        self.mappers_by_id.add(Box::new(mapper));
        self.id_by_type.insert(type_id, id);
        log::debug!("registered component `{}` as id {}", std::any::type_name::<T>(), id);
        Ok(id)
    }

    /// Returns the typed mapper for `T`. Fails with `NoSuchComponent` if
    /// `T` was never registered.
    pub fn mapper<T: 'static>(&self) -> Result<&ComponentMapper<T>, Error> {
        let type_id = TypeId::of::<T>();
        let id = *self
            .id_by_type
            .get(&type_id)
            .ok_or(Error::NoSuchComponent { type_name: std::any::type_name::<T>() })?;
        Ok(self
            .mappers_by_id
            .get(id as usize)
            .expect("registered component id must have a mapper")
            .as_any()
            .downcast_ref::<ComponentMapper<T>>()
            .expect("component id maps to the wrong mapper type"))
    }

    /// Returns the typed mapper for `T`, mutably.
    pub fn mapper_mut<T: 'static>(&mut self) -> Result<&mut ComponentMapper<T>, Error> {
        let type_id = TypeId::of::<T>();
        let id = *self
            .id_by_type
            .get(&type_id)
            .ok_or(Error::NoSuchComponent { type_name: std::any::type_name::<T>() })?;
        Ok(self
            .mappers_by_id
            .get_mut(id as usize)
            .expect("registered component id must have a mapper")
            .as_any_mut()
            .downcast_mut::<ComponentMapper<T>>()
            .expect("component id maps to the wrong mapper type"))
    }

    /// Returns the component id assigned to `T`.
    pub fn component_id<T: 'static>(&self) -> Result<u16, Error> {
        self.id_by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(Error::NoSuchComponent { type_name: std::any::type_name::<T>() })
    }

    /// Returns the component id assigned to a type, looked up by `TypeId`
    /// rather than a generic parameter. Used by `FamilySpec::resolve`, which
    /// only has `TypeId`s to work with.
    pub(crate) fn component_id_by_type(&self, type_id: TypeId) -> Result<u16, Error> {
        self.id_by_type
            .get(&type_id)
            .copied()
            .ok_or(Error::NoSuchComponent { type_name: "<unknown>" })
    }

    /// Returns the type-erased mapper registered under component id `id`,
    /// if any. Callers that know `T` should prefer `mapper::<T>()`; this
    /// exists for code that only has a stable component id to work with
    /// (e.g. diagnostics walking every registered mapper by id).
    pub fn mapper_by_id(&self, id: u16) -> Option<&dyn Any> {
        self.mappers_by_id.get(id as usize).map(|m| m.as_any())
    }

    /// The number of registered component types.
    pub fn len(&self) -> usize {
        self.mappers_by_id.len()
    }

    /// Removes `entity`'s component for every bit set in `mask` via
    /// `remove_internal`, in ascending component-id order. Used by
    /// `EntityService` when removing an entity wholesale.
    pub(crate) fn remove_all_internal(
        &mut self,
        entity: Entity,
        component_ids: &[u32],
    ) -> Result<(), Error> {
        for &id in component_ids {
            if let Some(mapper) = self.mappers_by_id.get_mut(id as usize) {
                mapper.remove_internal(entity)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        x: i32,
    }
    struct Velocity {
        dx: i32,
    }

    #[test]
    fn registration_order_assigns_ids() {
        let mut svc = ComponentService::new();
        let pos_id = svc.register(|| Position { x: 0 }).unwrap();
        let vel_id = svc.register(|| Velocity { dx: 0 }).unwrap();
        assert_eq!(pos_id, 0);
        assert_eq!(vel_id, 1);
        assert_eq!(svc.component_id::<Position>().unwrap(), 0);
        assert_eq!(svc.component_id::<Velocity>().unwrap(), 1);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut svc = ComponentService::new();
        svc.register(|| Position { x: 0 }).unwrap();
        let err = svc.register(|| Position { x: 1 }).unwrap_err();
        assert!(matches!(err, Error::ComponentAlreadyAdded { .. }));
    }

    #[test]
    fn unregistered_lookup_fails() {
        let svc = ComponentService::new();
        let err = svc.mapper::<Position>().unwrap_err();
        assert!(matches!(err, Error::NoSuchComponent { .. }));
    }

    #[test]
    fn mapper_by_id_downcasts_to_the_registered_type() {
        let mut svc = ComponentService::new();
        let pos_id = svc.register(|| Position { x: 0 }).unwrap();

        let any_mapper = svc.mapper_by_id(pos_id).unwrap();
        assert!(any_mapper.downcast_ref::<crate::component::ComponentMapper<Position>>().is_some());
        assert!(svc.mapper_by_id(99).is_none());
    }
}
