//! The `Entity` handle.

/// The id type backing an [`Entity`]. Kept 32-bit so a component mask and a
/// few id-indexed `Bag`s stay cheap even for large worlds.
pub type Index = u32;

/// An opaque handle to a logical game object.
///
/// Unlike many ECS designs, `Entity` carries no generation counter: it is
/// nothing more than a recycled 32-bit id. Two entities compare equal iff
/// their ids are equal, and a recycled id can come back around to name a
/// completely different logical entity. See the crate-level documentation
/// for the tradeoffs this implies.
#[derive(Clone, Copy, Debug, Hash, Eq, Ord, PartialEq, PartialOrd)]
pub struct Entity(Index);

impl Entity {
    /// Creates an `Entity` wrapping the given id. Not normally called
    /// directly by users of the crate — entities are produced by
    /// `World::create_entity` / `EntityService::create` — but exposed for
    /// interop with code that persists raw ids, and for tests.
    pub fn new(id: Index) -> Entity {
        Entity(id)
    }

    /// Returns the id of this entity.
    #[inline]
    pub fn id(&self) -> Index {
        self.0
    }
}
