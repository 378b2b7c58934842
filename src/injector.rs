//! A flat name-keyed map of opaque values, handed to system factories during
//! `WorldBuilder::build`.

use std::any::Any;
use std::collections::HashMap;

use ahash::RandomState;

use crate::error::Error;

/// Opaque name → value map populated by `WorldBuilder::inject` before
/// systems are constructed.
///
/// `Injector` does not know or care what any stored value means; it exists
/// so a system factory can pull configuration or shared handles out by name
/// without `World` needing a generic dependency-injection container. Lookups
/// are tracked so a caller that wants to assert every injectable was
/// actually consumed can call `unused_names`.
#[derive(Default)]
pub struct Injector {
    values: HashMap<String, Box<dyn Any>, RandomState>,
    used: std::cell::RefCell<std::collections::HashSet<String, RandomState>>,
}

impl Injector {
    /// Creates an empty injector.
    pub fn new() -> Self {
        Injector {
            values: HashMap::default(),
            used: std::cell::RefCell::new(std::collections::HashSet::default()),
        }
    }

    pub(crate) fn insert(&mut self, name: String, value: Box<dyn Any>) {
        self.values.insert(name, value);
    }

    /// Looks up `name` and downcasts it to `T`. Fails with
    /// `InjectableNotFound` if no value was stored under `name`, or if it
    /// was stored as a different type.
    pub fn get<T: 'static>(&self, name: &str) -> Result<&T, Error> {
        let value = self
            .values
            .get(name)
            .and_then(|v| v.downcast_ref::<T>())
            .ok_or_else(|| Error::InjectableNotFound { name: name.to_string() })?;
        self.used.borrow_mut().insert(name.to_string());
        Ok(value)
    }

    /// The names passed to `WorldBuilder::inject` that were never
    /// successfully fetched via `get`. Not consulted by the core itself;
    /// exposed for callers who want to assert full usage in their own
    /// tests.
    pub fn unused_names(&self) -> Vec<&str> {
        let used = self.used.borrow();
        self.values
            .keys()
            .filter(|name| !used.contains(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_stored_value() {
        let mut injector = Injector::new();
        injector.insert("max_hp".to_string(), Box::new(100_i32));
        assert_eq!(*injector.get::<i32>("max_hp").unwrap(), 100);
    }

    #[test]
    fn get_missing_name_fails() {
        let injector = Injector::new();
        let err = injector.get::<i32>("nope").unwrap_err();
        assert!(matches!(err, Error::InjectableNotFound { .. }));
    }

    #[test]
    fn get_wrong_type_fails() {
        let mut injector = Injector::new();
        injector.insert("max_hp".to_string(), Box::new(100_i32));
        let err = injector.get::<f32>("max_hp").unwrap_err();
        assert!(matches!(err, Error::InjectableNotFound { .. }));
    }

    #[test]
    fn unused_names_tracks_unfetched_entries() {
        let mut injector = Injector::new();
        injector.insert("a".to_string(), Box::new(1_i32));
        injector.insert("b".to_string(), Box::new(2_i32));
        injector.get::<i32>("a").unwrap();
        assert_eq!(injector.unused_names(), vec!["b"]);
    }
}
