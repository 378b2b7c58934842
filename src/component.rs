//! Per-component-type dense storage, indexed by entity id.

use std::any::Any;
use std::fmt;

use crate::bitset::BitArray;
use crate::entity::Entity;
use crate::error::Error;

/// Growth policy for a `ComponentMapper`'s backing array: on access to an
/// id past the current length, double the length (at least to `id + 1`).
fn grow_doubling<T>(slots: &mut Vec<Option<T>>, min_len: usize) {
    if slots.len() >= min_len {
        return;
    }
    let doubled = (slots.len() * 2).max(1);
    slots.resize_with(doubled.max(min_len), || None);
}

/// Per-type component store indexed by entity id.
///
/// A `ComponentMapper<T>` is the only place `T` values live. Adding a
/// component overwrites any prior value in place without firing listeners
/// (see the crate-level docs on re-adding); removing fires `on_remove`
/// listeners before the slot is actually cleared.
pub struct ComponentMapper<T> {
    id: u16,
    type_name: &'static str,
    factory: Box<dyn Fn() -> T>,
    slots: Vec<Option<T>>,
    add_listeners: Vec<Box<dyn FnMut(Entity, &T)>>,
    remove_listeners: Vec<Box<dyn FnMut(Entity, &T)>>,
}

impl<T> fmt::Debug for ComponentMapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMapper")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("len", &self.slots.len())
            .finish()
    }
}

impl<T: 'static> ComponentMapper<T> {
    /// Creates a mapper with the given stable component `id`, using
    /// `factory` to produce a fresh `T` whenever `add` installs a component
    /// that wasn't already present.
    pub fn new(id: u16, factory: impl Fn() -> T + 'static) -> Self {
        ComponentMapper {
            id,
            type_name: std::any::type_name::<T>(),
            factory: Box::new(factory),
            slots: Vec::new(),
            add_listeners: Vec::new(),
            remove_listeners: Vec::new(),
        }
    }

    /// The stable, small-integer id this mapper was registered under.
    pub fn component_id(&self) -> u16 {
        self.id
    }

    /// Registers a listener fired after a component of this type is
    /// installed for the first time on an entity. Listeners fire in
    /// registration order.
    pub fn add_listener(&mut self, listener: impl FnMut(Entity, &T) + 'static) {
        self.add_listeners.push(Box::new(listener));
    }

    /// Registers a listener fired just before a component of this type is
    /// cleared from an entity. Listeners fire in registration order.
    pub fn add_remove_listener(&mut self, listener: impl FnMut(Entity, &T) + 'static) {
        self.remove_listeners.push(Box::new(listener));
    }

    /// Installs or reconfigures the component for `entity`.
    ///
    /// If `entity` already has this component, `configure` runs against the
    /// existing value in place and no listener fires — this is a documented
    /// overwrite-silent contract, not a remove-then-add. Otherwise a fresh
    /// value comes from the factory, `configure` runs against it, the value
    /// is installed, `mask`'s bit for this component is set, and `on_add`
    /// listeners fire in registration order.
    pub fn add(&mut self, entity: Entity, mask: &mut BitArray, configure: impl FnOnce(&mut T)) {
        let id = entity.id() as usize;
        grow_doubling(&mut self.slots, id + 1);

        if let Some(existing) = self.slots[id].as_mut() {
            log::trace!("{}: reconfiguring entity {} in place", self.type_name, id);
            configure(existing);
            return;
        }

        let mut value = (self.factory)();
        configure(&mut value);
        self.slots[id] = Some(value);
        mask.set(self.id as u32);
        log::trace!("{}: installed on entity {}", self.type_name, id);

        let ComponentMapper { slots, add_listeners, .. } = self;
        let installed = slots[id].as_ref().unwrap();
        for listener in add_listeners.iter_mut() {
            listener(entity, installed);
        }
    }

    /// Removes the component from `entity`, firing `on_remove` listeners
    /// before clearing the slot and the mask bit. Fails with
    /// `NoSuchEntityComponent` if `entity` does not currently have this
    /// component.
    pub fn remove(&mut self, entity: Entity, mask: &mut BitArray) -> Result<T, Error> {
        let id = entity.id() as usize;
        if self.slots.get(id).map_or(true, Option::is_none) {
            return Err(Error::NoSuchEntityComponent {
                type_name: self.type_name,
                entity,
            });
        }

        let ComponentMapper { slots, remove_listeners, .. } = self;
        let value_ref = slots[id].as_ref().unwrap();
        for listener in remove_listeners.iter_mut() {
            listener(entity, value_ref);
        }

        mask.clear(self.id as u32);
        log::trace!("{}: removed from entity {}", self.type_name, id);
        Ok(self.slots[id].take().unwrap())
    }

    /// Removes the component from `entity` without checking for existence
    /// or touching the entity's mask. Used by `EntityService` while it is
    /// clearing an entity's whole mask in bulk during full removal; fires
    /// `on_remove` listeners if (and only if) the slot was occupied. Fails
    /// with `IndexOutOfBounds` if `entity`'s id is past this mapper's
    /// current backing array length.
    pub fn remove_internal(&mut self, entity: Entity) -> Result<(), Error> {
        let id = entity.id() as usize;
        if id >= self.slots.len() {
            return Err(Error::IndexOutOfBounds { entity });
        }

        if self.slots[id].is_some() {
            let ComponentMapper { slots, remove_listeners, .. } = self;
            let value_ref = slots[id].as_ref().unwrap();
            for listener in remove_listeners.iter_mut() {
                listener(entity, value_ref);
            }
            self.slots[id] = None;
            log::trace!("{}: removed (internal) from entity {}", self.type_name, id);
        }

        Ok(())
    }

    /// Returns a reference to `entity`'s component, if present.
    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slots.get(entity.id() as usize).and_then(Option::as_ref)
    }

    /// Returns a mutable reference to `entity`'s component, if present.
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slots.get_mut(entity.id() as usize).and_then(Option::as_mut)
    }

    /// Returns `true` if `entity` currently has this component.
    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }
}

/// Type-erased access to a `ComponentMapper<T>`, used by `ComponentService`
/// to hold mappers of differing `T` in a single dense registry.
pub(crate) trait AnyMapper: Any {
    fn remove_internal(&mut self, entity: Entity) -> Result<(), Error>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> AnyMapper for ComponentMapper<T> {
    fn remove_internal(&mut self, entity: Entity) -> Result<(), Error> {
        ComponentMapper::remove_internal(self, entity)
    }

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

    #[derive(Debug, PartialEq)]
    struct Position {
        x: i32,
        y: i32,
    }

    #[test]
    fn add_installs_and_sets_mask_bit() {
        let mut mapper = ComponentMapper::new(0, || Position { x: 0, y: 0 });
        let mut mask = BitArray::new();
        let e = Entity::new(0);

        mapper.add(e, &mut mask, |p| p.x = 5);

        assert!(mapper.contains(e));
        assert_eq!(mapper.get(e), Some(&Position { x: 5, y: 0 }));
        assert!(mask.get(0));
    }

    #[test]
    fn re_add_overwrites_without_firing_listeners() {
        let mut mapper = ComponentMapper::new(0, || Position { x: 0, y: 0 });
        let mut mask = BitArray::new();
        let e = Entity::new(0);

        let add_calls = std::cell::RefCell::new(0);
        mapper.add_listener(|_, _| *add_calls.borrow_mut() += 1);

        mapper.add(e, &mut mask, |p| p.x = 1);
        assert_eq!(*add_calls.borrow(), 1);

        mapper.add(e, &mut mask, |p| p.x = 2);
        assert_eq!(*add_calls.borrow(), 1, "overwrite must not re-fire on_add");
        assert_eq!(mapper.get(e), Some(&Position { x: 2, y: 0 }));
    }

    #[test]
    fn remove_fires_listener_then_clears() {
        let mut mapper = ComponentMapper::new(2, || Position { x: 0, y: 0 });
        let mut mask = BitArray::new();
        let e = Entity::new(3);
        mapper.add(e, &mut mask, |p| p.x = 7);

        let seen = std::cell::RefCell::new(None);
        mapper.add_remove_listener(|_, p: &Position| *seen.borrow_mut() = Some(p.x));

        let removed = mapper.remove(e, &mut mask).unwrap();
        assert_eq!(removed.x, 7);
        assert_eq!(*seen.borrow(), Some(7));
        assert!(!mapper.contains(e));
        assert!(!mask.get(2));
    }

    #[test]
    fn remove_missing_component_fails() {
        let mut mapper: ComponentMapper<Position> = ComponentMapper::new(0, || Position { x: 0, y: 0 });
        let mut mask = BitArray::new();
        let e = Entity::new(0);

        let err = mapper.remove(e, &mut mask).unwrap_err();
        match err {
            Error::NoSuchEntityComponent { entity, .. } => assert_eq!(entity, e),
            other => panic!("expected NoSuchEntityComponent, got {other:?}"),
        }
    }

    #[test]
    fn remove_internal_out_of_bounds_fails() {
        let mut mapper: ComponentMapper<Position> = ComponentMapper::new(0, || Position { x: 0, y: 0 });
        let far = Entity::new(10_000);

        let err = mapper.remove_internal(far).unwrap_err();
        assert_eq!(err, Error::IndexOutOfBounds { entity: far });
    }

    #[test]
    fn remove_internal_does_not_touch_mask() {
        let mut mapper = ComponentMapper::new(1, || Position { x: 0, y: 0 });
        let mut mask = BitArray::new();
        let e = Entity::new(0);
        mapper.add(e, &mut mask, |_| {});
        assert!(mask.get(1));

        mapper.remove_internal(e).unwrap();
        assert!(!mapper.contains(e));
        // mask bit is left set; bulk mask clearing is EntityService's job.
        assert!(mask.get(1));
    }

    #[test]
    fn listener_order_is_registration_order() {
        let mut mapper = ComponentMapper::new(0, || Position { x: 0, y: 0 });
        let mut mask = BitArray::new();
        let e = Entity::new(0);

        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let order1 = order.clone();
        let order2 = order.clone();
        mapper.add_listener(move |_, _| order1.borrow_mut().push(1));
        mapper.add_listener(move |_, _| order2.borrow_mut().push(2));

        mapper.add(e, &mut mask, |_| {});

        assert_eq!(*order.borrow(), vec![1, 2]);
    }
}
