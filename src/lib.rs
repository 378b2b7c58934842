//! A sparse-set, single-threaded Entity-Component-System core.
//!
//! Entities are plain integer ids, recycled on removal. Components live in
//! one densely packed array per type ([`component::ComponentMapper`]),
//! indexed by entity id. [`family::Family`] maintains a cached, reactive
//! view of the entities matching an `all_of`/`none_of`/`any_of` predicate
//! over component presence. [`system::IntervalSystem`] and
//! [`system::IteratingSystem`] drive per-tick behavior, either globally or
//! bound to one family, on a fixed or per-frame schedule.
//!
//! ```no_run
//! use sparse_ecs::{FamilySpec, Interval, IteratingSystem, WorldBuilder};
//! use sparse_ecs::{Entity, EntityTickHandler, World};
//!
//! struct Position { x: f32 }
//! struct Velocity { dx: f32 }
//!
//! struct Motion;
//! impl EntityTickHandler for Motion {
//!     fn on_tick_entity(&mut self, world: &mut World, entity: Entity) {
//!         let dx = world.mapper::<Velocity>().unwrap().get(entity).unwrap().dx;
//!         world.mapper_mut::<Position>().unwrap().get_mut(entity).unwrap().x += dx;
//!     }
//! }
//!
//! let mut world = WorldBuilder::new()
//!     .component(|| Position { x: 0.0 })
//!     .component(|| Velocity { dx: 0.0 })
//!     .system(|_injector| {
//!         IteratingSystem::new(
//!             Motion,
//!             FamilySpec::builder().all_of::<Position>().all_of::<Velocity>().build(),
//!             Interval::EachFrame,
//!         )
//!     })
//!     .build()
//!     .unwrap();
//!
//! world.create_entity(|ctx| {
//!     ctx.add::<Position>(|p| p.x = 0.0).unwrap();
//!     ctx.add::<Velocity>(|v| v.dx = 1.0).unwrap();
//! });
//!
//! world.update(1.0 / 60.0);
//! ```

mod bag;
mod bitset;
mod component;
mod component_service;
mod entity;
mod entity_service;
mod error;
mod family;
mod injector;
mod system;
mod system_service;
mod world;

pub use bag::Bag;
pub use bitset::BitArray;
pub use component::ComponentMapper;
pub use component_service::ComponentService;
pub use entity::{Entity, Index};
pub use entity_service::{EntityCreateCtx, EntityService};
pub use error::Error;
pub use family::{Family, FamilyId, FamilySpec, FamilySpecBuilder};
pub use injector::Injector;
pub use system::{EntityTickHandler, Interval, IntervalState, IntervalSystem, IteratingSystem};
pub use system_service::SystemService;
pub use world::{World, WorldBuilder};
